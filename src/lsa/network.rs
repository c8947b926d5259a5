use std::net;

use bytes::BufMut;

use crate::error::OspfError;
use crate::RouterId;

/// # NetworkLsa
/// originated by the designated router of a transit segment, listing every
/// router attached to it (the originator included).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NetworkLsa {
    pub options: u16,
    pub attached: Vec<RouterId>,
}

impl NetworkLsa {
    pub fn new(options: u16, attached: Vec<RouterId>) -> Self {
        Self { options, attached }
    }

    pub fn add_router(&mut self, router: RouterId) -> bool {
        if self.attached.contains(&router) {
            return false;
        }
        self.attached.push(router);
        true
    }

    pub fn remove_router(&mut self, router: RouterId) -> bool {
        let before = self.attached.len();
        self.attached.retain(|id| *id != router);
        self.attached.len() != before
    }

    pub(super) fn to_be_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.attached.len() * 4);
        bytes.put_u16(0);
        bytes.put_u16(self.options);
        for router in &self.attached {
            bytes.extend_from_slice(&router.octets());
        }
        bytes
    }

    pub(super) fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        if data.len() < 4 || (data.len() - 4) % 4 != 0 {
            return Err(OspfError::Malformed(format!(
                "network lsa body of {} bytes",
                data.len()
            )));
        }
        let options = u16::from_be_bytes([data[2], data[3]]);
        let attached = data[4..]
            .chunks_exact(4)
            .map(|chunk| net::Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]))
            .collect();
        Ok(Self { options, attached })
    }
}
