use std::collections::BTreeMap;
use std::net;

use bytes::BufMut;

use super::{prefix_octets, Prefix};
use crate::error::OspfError;
use crate::RouterId;

fn read_address(data: &[u8], length: u8) -> Result<net::Ipv6Addr, OspfError> {
    let octets = prefix_octets(length);
    if data.len() < octets {
        return Err(OspfError::Malformed(format!(
            "prefix /{} needs {} address bytes, got {}",
            length,
            octets,
            data.len()
        )));
    }
    let mut full = [0u8; 16];
    full[..octets].copy_from_slice(&data[..octets]);
    Ok(net::Ipv6Addr::from(full))
}

/// # InterAreaPrefixLsa
/// a single summarized prefix originated by a border router into an area.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct InterAreaPrefixLsa {
    pub prefix: Prefix,
}

impl InterAreaPrefixLsa {
    pub fn new(prefix: Prefix) -> Self {
        Self { prefix }
    }

    pub(super) fn to_be_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + prefix_octets(self.prefix.length));
        bytes.put_u8(0);
        bytes.put_u8(0);
        bytes.put_u16(self.prefix.metric);
        bytes.put_u8(self.prefix.length);
        bytes.put_u8(self.prefix.options);
        bytes.put_u16(0);
        let octets = self.prefix.address.octets();
        bytes.extend_from_slice(&octets[..prefix_octets(self.prefix.length)]);
        bytes
    }

    pub(super) fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        if data.len() < 8 {
            return Err(OspfError::Malformed(format!(
                "inter-area-prefix lsa body of {} bytes",
                data.len()
            )));
        }
        let metric = u16::from_be_bytes([data[2], data[3]]);
        let length = data[4];
        let options = data[5];
        let address = read_address(&data[8..], length)?;
        Ok(Self {
            prefix: Prefix::new(address, length, metric, options),
        })
    }
}

/// # IntraAreaPrefixLsa
/// the prefixes reachable through a referenced router or network LSA.
/// Prefixes are keyed by address so refresh order stays stable.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IntraAreaPrefixLsa {
    pub ref_ls_type: u16,
    pub ref_link_state_id: net::Ipv4Addr,
    pub ref_adv_router: RouterId,
    pub prefixes: BTreeMap<net::Ipv6Addr, Prefix>,
}

impl IntraAreaPrefixLsa {
    pub fn new(
        ref_ls_type: u16,
        ref_link_state_id: net::Ipv4Addr,
        ref_adv_router: RouterId,
    ) -> Self {
        Self {
            ref_ls_type,
            ref_link_state_id,
            ref_adv_router,
            prefixes: BTreeMap::new(),
        }
    }

    pub fn add_prefix(&mut self, prefix: Prefix) -> bool {
        self.prefixes.insert(prefix.address, prefix) != Some(prefix)
    }

    pub fn remove_prefix(&mut self, address: net::Ipv6Addr) -> bool {
        self.prefixes.remove(&address).is_some()
    }

    pub fn update_metric(&mut self, address: net::Ipv6Addr, metric: u16) -> bool {
        match self.prefixes.get_mut(&address) {
            Some(prefix) => prefix.update_metric(metric),
            None => false,
        }
    }

    pub(super) fn to_be_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.put_u16(self.prefixes.len() as u16);
        bytes.put_u16(self.ref_ls_type);
        bytes.extend_from_slice(&self.ref_link_state_id.octets());
        bytes.extend_from_slice(&self.ref_adv_router.octets());
        for prefix in self.prefixes.values() {
            bytes.put_u8(prefix.length);
            bytes.put_u8(prefix.options);
            bytes.put_u16(prefix.metric);
            let octets = prefix.address.octets();
            bytes.extend_from_slice(&octets[..prefix_octets(prefix.length)]);
        }
        bytes
    }

    pub(super) fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        if data.len() < 12 {
            return Err(OspfError::Malformed(format!(
                "intra-area-prefix lsa body of {} bytes",
                data.len()
            )));
        }
        let count = u16::from_be_bytes([data[0], data[1]]);
        let mut lsa = Self::new(
            u16::from_be_bytes([data[2], data[3]]),
            net::Ipv4Addr::new(data[4], data[5], data[6], data[7]),
            net::Ipv4Addr::new(data[8], data[9], data[10], data[11]),
        );
        let mut cursor = 12;
        for _ in 0..count {
            if data.len() < cursor + 4 {
                return Err(OspfError::Malformed(
                    "truncated intra-area-prefix entry".to_string(),
                ));
            }
            let length = data[cursor];
            let options = data[cursor + 1];
            let metric = u16::from_be_bytes([data[cursor + 2], data[cursor + 3]]);
            let address = read_address(&data[cursor + 4..], length)?;
            cursor += 4 + prefix_octets(length);
            lsa.add_prefix(Prefix::new(address, length, metric, options));
        }
        Ok(lsa)
    }
}
