use std::net;

use bytes::BufMut;

use super::{PacketHeader, HELLO_TYPE};
use crate::error::OspfError;
use crate::{AreaId, RouterId};

/// options advertised in hello packets.
pub const HELLO_OPTIONS: u8 = 0b001_0011;

/// # HelloPacket
/// periodic neighbor discovery. Lists every neighbor heard from recently so
/// peers can detect bidirectional communication.
#[derive(Clone, Debug)]
pub struct HelloPacket {
    pub header: PacketHeader,
    pub interface_id: u32,
    pub priority: u8,
    pub options: u8,
    pub hello_interval: u16,
    pub dead_interval: u16,
    pub designated_router: RouterId,
    pub backup_designated_router: RouterId,
    pub neighbors: Vec<RouterId>,
}

impl HelloPacket {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        router_id: RouterId,
        area_id: AreaId,
        interface_id: u32,
        priority: u8,
        hello_interval: u16,
        dead_interval: u16,
        designated_router: RouterId,
        backup_designated_router: RouterId,
        neighbors: Vec<RouterId>,
    ) -> Self {
        Self {
            header: PacketHeader::new(HELLO_TYPE, router_id, area_id),
            interface_id,
            priority,
            options: HELLO_OPTIONS,
            hello_interval,
            dead_interval,
            designated_router,
            backup_designated_router,
            neighbors,
        }
    }

    pub(super) fn body_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(20 + self.neighbors.len() * 4);
        bytes.put_u32(self.interface_id);
        bytes.put_u8(self.priority);
        bytes.put_u16(0);
        bytes.put_u8(self.options);
        bytes.put_u16(self.hello_interval);
        bytes.put_u16(self.dead_interval);
        bytes.extend_from_slice(&self.designated_router.octets());
        bytes.extend_from_slice(&self.backup_designated_router.octets());
        for neighbor in &self.neighbors {
            bytes.extend_from_slice(&neighbor.octets());
        }
        bytes
    }

    pub(super) fn from_body(header: PacketHeader, body: &[u8]) -> Result<Self, OspfError> {
        if body.len() < 20 || (body.len() - 20) % 4 != 0 {
            return Err(OspfError::Malformed(format!(
                "hello body of {} bytes",
                body.len()
            )));
        }
        let neighbors = body[20..]
            .chunks_exact(4)
            .map(|chunk| net::Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]))
            .collect();
        Ok(Self {
            header,
            interface_id: u32::from_be_bytes([body[0], body[1], body[2], body[3]]),
            priority: body[4],
            options: body[7],
            hello_interval: u16::from_be_bytes([body[8], body[9]]),
            dead_interval: u16::from_be_bytes([body[10], body[11]]),
            designated_router: net::Ipv4Addr::new(body[12], body[13], body[14], body[15]),
            backup_designated_router: net::Ipv4Addr::new(body[16], body[17], body[18], body[19]),
            neighbors,
        })
    }
}
