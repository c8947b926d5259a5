use bytes::BufMut;

use super::{PacketHeader, DB_DESCRIPTION_TYPE};
use crate::error::OspfError;
use crate::lsa::{LsaHeader, LSA_HEADER_LENGTH};
use crate::packet::hello::HELLO_OPTIONS;
use crate::{AreaId, RouterId, DEFAULT_MTU};

pub const DD_FLAG_I: u8 = 0b100;
pub const DD_FLAG_M: u8 = 0b010;
pub const DD_FLAG_MS: u8 = 0b001;

/// # DbDescriptionPacket
/// database description exchanged while an adjacency synchronizes: a
/// sequence-numbered envelope of LSA headers with the I, M and MS bits
/// steering the master/slave conversation.
#[derive(Clone, Debug)]
pub struct DbDescriptionPacket {
    pub header: PacketHeader,
    pub options: u8,
    pub interface_mtu: u16,
    pub flags: u8,
    pub dd_sequence_number: u32,
    pub lsa_headers: Vec<LsaHeader>,
}

impl DbDescriptionPacket {
    pub fn new(
        router_id: RouterId,
        area_id: AreaId,
        flags: u8,
        dd_sequence_number: u32,
        lsa_headers: Vec<LsaHeader>,
    ) -> Self {
        Self {
            header: PacketHeader::new(DB_DESCRIPTION_TYPE, router_id, area_id),
            options: HELLO_OPTIONS,
            interface_mtu: DEFAULT_MTU,
            flags,
            dd_sequence_number,
            lsa_headers,
        }
    }

    pub fn is_initial(&self) -> bool {
        self.flags & DD_FLAG_I != 0
    }

    pub fn is_master(&self) -> bool {
        self.flags & DD_FLAG_MS != 0
    }

    pub(super) fn body_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(12 + self.lsa_headers.len() * LSA_HEADER_LENGTH);
        bytes.put_u8(0);
        bytes.put_u16(0);
        bytes.put_u8(self.options);
        bytes.put_u16(self.interface_mtu);
        bytes.put_u8(0);
        bytes.put_u8(self.flags);
        bytes.put_u32(self.dd_sequence_number);
        for header in &self.lsa_headers {
            bytes.extend_from_slice(&header.to_be_bytes());
        }
        bytes
    }

    pub(super) fn from_body(header: PacketHeader, body: &[u8]) -> Result<Self, OspfError> {
        if body.len() < 12 || (body.len() - 12) % LSA_HEADER_LENGTH != 0 {
            return Err(OspfError::Malformed(format!(
                "database description body of {} bytes",
                body.len()
            )));
        }
        let lsa_headers = body[12..]
            .chunks_exact(LSA_HEADER_LENGTH)
            .map(LsaHeader::try_from_be_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            header,
            options: body[3],
            interface_mtu: u16::from_be_bytes([body[4], body[5]]),
            flags: body[7],
            dd_sequence_number: u32::from_be_bytes([body[8], body[9], body[10], body[11]]),
            lsa_headers,
        })
    }
}
