use std::collections::BTreeMap;
use std::net;

use bytes::BufMut;

use crate::error::OspfError;
use crate::RouterId;

/// set in the flags octet when the router borders more than one area.
pub const ROUTER_FLAG_B: u8 = 0x01;

const LINK_TYPE_TRANSIT: u8 = 2;
const LINK_LENGTH: usize = 16;

/// # RouterLink
/// one transit link of a router LSA. The neighbor fields point at the
/// designated router of the attached segment.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RouterLink {
    pub metric: u16,
    pub interface_id: u32,
    pub neighbor_interface_id: u32,
    pub neighbor_router_id: RouterId,
}

impl RouterLink {
    pub fn new(
        metric: u16,
        interface_id: u32,
        neighbor_interface_id: u32,
        neighbor_router_id: RouterId,
    ) -> Self {
        Self {
            metric,
            interface_id,
            neighbor_interface_id,
            neighbor_router_id,
        }
    }
}

/// # RouterLsa
/// body of a router LSA, links keyed by the local interface id so encoding
/// order stays stable across refreshes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RouterLsa {
    pub flags: u8,
    pub options: u16,
    pub links: BTreeMap<u32, RouterLink>,
}

impl RouterLsa {
    pub fn new(flags: u8, options: u16) -> Self {
        Self {
            flags,
            options,
            links: BTreeMap::new(),
        }
    }

    pub fn is_abr(&self) -> bool {
        self.flags & ROUTER_FLAG_B != 0
    }

    pub fn set_abr(&mut self, abr: bool) -> bool {
        let flags = if abr {
            self.flags | ROUTER_FLAG_B
        } else {
            self.flags & !ROUTER_FLAG_B
        };
        if flags == self.flags {
            return false;
        }
        self.flags = flags;
        true
    }

    pub fn add_link(&mut self, link: RouterLink) -> bool {
        self.links.insert(link.interface_id, link) != Some(link)
    }

    pub fn remove_link(&mut self, interface_id: u32) -> bool {
        self.links.remove(&interface_id).is_some()
    }

    pub fn update_link_cost(&mut self, interface_id: u32, metric: u16) -> bool {
        match self.links.get_mut(&interface_id) {
            Some(link) if link.metric != metric => {
                link.metric = metric;
                true
            }
            _ => false,
        }
    }

    /// # update_link_neighbor
    /// repoint a link at a new designated router.
    pub fn update_link_neighbor(
        &mut self,
        interface_id: u32,
        neighbor_interface_id: u32,
        neighbor_router_id: RouterId,
    ) -> bool {
        match self.links.get_mut(&interface_id) {
            Some(link) => {
                link.neighbor_interface_id = neighbor_interface_id;
                link.neighbor_router_id = neighbor_router_id;
                true
            }
            None => false,
        }
    }

    pub(super) fn to_be_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.links.len() * LINK_LENGTH);
        bytes.put_u8(self.flags);
        bytes.put_u8(0);
        bytes.put_u16(self.options);
        for link in self.links.values() {
            bytes.put_u8(LINK_TYPE_TRANSIT);
            bytes.put_u8(0);
            bytes.put_u16(link.metric);
            bytes.put_u32(link.interface_id);
            bytes.put_u32(link.neighbor_interface_id);
            bytes.extend_from_slice(&link.neighbor_router_id.octets());
        }
        bytes
    }

    pub(super) fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        if data.len() < 4 || (data.len() - 4) % LINK_LENGTH != 0 {
            return Err(OspfError::Malformed(format!(
                "router lsa body of {} bytes",
                data.len()
            )));
        }
        let mut lsa = RouterLsa::new(data[0], u16::from_be_bytes([data[2], data[3]]));
        for chunk in data[4..].chunks_exact(LINK_LENGTH) {
            let link = RouterLink::new(
                u16::from_be_bytes([chunk[2], chunk[3]]),
                u32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
                u32::from_be_bytes([chunk[8], chunk[9], chunk[10], chunk[11]]),
                net::Ipv4Addr::new(chunk[12], chunk[13], chunk[14], chunk[15]),
            );
            lsa.links.insert(link.interface_id, link);
        }
        Ok(lsa)
    }
}
