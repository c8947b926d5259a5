use std::net;

use bytes::BufMut;

use super::{PacketHeader, LS_REQUEST_TYPE};
use crate::error::OspfError;
use crate::lsa::LsaKey;
use crate::{AreaId, RouterId};

const REQUEST_LENGTH: usize = 12;

/// # LsRequestPacket
/// asks a neighbor for the full copies of the identities recorded during
/// database description.
#[derive(Clone, Debug)]
pub struct LsRequestPacket {
    pub header: PacketHeader,
    pub requests: Vec<LsaKey>,
}

impl LsRequestPacket {
    pub fn new(router_id: RouterId, area_id: AreaId, requests: Vec<LsaKey>) -> Self {
        Self {
            header: PacketHeader::new(LS_REQUEST_TYPE, router_id, area_id),
            requests,
        }
    }

    pub(super) fn body_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.requests.len() * REQUEST_LENGTH);
        for request in &self.requests {
            bytes.put_u16(0);
            bytes.put_u16(request.ls_type);
            bytes.extend_from_slice(&request.link_state_id.octets());
            bytes.extend_from_slice(&request.adv_router.octets());
        }
        bytes
    }

    pub(super) fn from_body(header: PacketHeader, body: &[u8]) -> Result<Self, OspfError> {
        if body.len() % REQUEST_LENGTH != 0 {
            return Err(OspfError::Malformed(format!(
                "ls request body of {} bytes",
                body.len()
            )));
        }
        let requests = body
            .chunks_exact(REQUEST_LENGTH)
            .map(|chunk| {
                LsaKey::new(
                    u16::from_be_bytes([chunk[2], chunk[3]]),
                    net::Ipv4Addr::new(chunk[8], chunk[9], chunk[10], chunk[11]),
                    net::Ipv4Addr::new(chunk[4], chunk[5], chunk[6], chunk[7]),
                )
            })
            .collect();
        Ok(Self { header, requests })
    }
}
