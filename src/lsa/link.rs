use std::collections::BTreeMap;
use std::net;

use bytes::BufMut;

use super::Prefix;
use crate::error::OspfError;

const PREFIX_ENTRY_LENGTH: usize = 20;

/// # LinkLsa
/// link-local scope: advertises the originator's link-local address and the
/// prefixes configured on the link. Prefix entries carry the full 16 byte
/// address.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LinkLsa {
    pub priority: u8,
    pub options: u16,
    pub link_local: net::Ipv6Addr,
    pub prefixes: BTreeMap<net::Ipv6Addr, Prefix>,
}

impl LinkLsa {
    pub fn new(priority: u8, options: u16, link_local: net::Ipv6Addr) -> Self {
        Self {
            priority,
            options,
            link_local,
            prefixes: BTreeMap::new(),
        }
    }

    pub fn add_prefix(&mut self, prefix: Prefix) -> bool {
        self.prefixes.insert(prefix.address, prefix) != Some(prefix)
    }

    pub fn remove_prefix(&mut self, address: net::Ipv6Addr) -> bool {
        self.prefixes.remove(&address).is_some()
    }

    pub(super) fn to_be_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(24 + self.prefixes.len() * PREFIX_ENTRY_LENGTH);
        bytes.put_u8(self.priority);
        bytes.put_u8(0);
        bytes.put_u16(self.options);
        bytes.extend_from_slice(&self.link_local.octets());
        bytes.put_u32(self.prefixes.len() as u32);
        for prefix in self.prefixes.values() {
            bytes.put_u8(prefix.length);
            bytes.put_u8(prefix.options);
            bytes.put_u16(prefix.metric);
            bytes.extend_from_slice(&prefix.address.octets());
        }
        bytes
    }

    pub(super) fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        if data.len() < 24 || (data.len() - 24) % PREFIX_ENTRY_LENGTH != 0 {
            return Err(OspfError::Malformed(format!(
                "link lsa body of {} bytes",
                data.len()
            )));
        }
        let mut link_local = [0u8; 16];
        link_local.copy_from_slice(&data[4..20]);
        let mut lsa = Self::new(
            data[0],
            u16::from_be_bytes([data[2], data[3]]),
            net::Ipv6Addr::from(link_local),
        );
        for chunk in data[24..].chunks_exact(PREFIX_ENTRY_LENGTH) {
            let mut address = [0u8; 16];
            address.copy_from_slice(&chunk[4..20]);
            lsa.add_prefix(Prefix::new(
                net::Ipv6Addr::from(address),
                chunk[0],
                u16::from_be_bytes([chunk[2], chunk[3]]),
                chunk[1],
            ));
        }
        Ok(lsa)
    }
}
