use std::collections::BTreeMap;
use std::net;

use bytes::BufMut;

use super::{prefix_octets, Prefix};
use crate::error::OspfError;
use crate::RouterId;

fn neighbor_bytes(neighbors: &BTreeMap<RouterId, u8>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(neighbors.len() * 5);
    for (router, metric) in neighbors {
        bytes.put_u8(*metric);
        bytes.extend_from_slice(&router.octets());
    }
    bytes
}

fn neighbors_from_bytes(data: &[u8]) -> Result<BTreeMap<RouterId, u8>, OspfError> {
    if data.len() % 5 != 0 {
        return Err(OspfError::Malformed(format!(
            "overlay neighbor list of {} bytes",
            data.len()
        )));
    }
    let mut neighbors = BTreeMap::new();
    for chunk in data.chunks_exact(5) {
        neighbors.insert(
            net::Ipv4Addr::new(chunk[1], chunk[2], chunk[3], chunk[4]),
            chunk[0],
        );
    }
    Ok(neighbors)
}

/// # AbrLsa
/// overlay scope: the border routers this originator reaches, with the best
/// cost over all shared areas.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AbrLsa {
    pub neighbors: BTreeMap<RouterId, u8>,
}

impl AbrLsa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_neighbor(&mut self, router: RouterId, metric: u8) -> bool {
        self.neighbors.insert(router, metric) != Some(metric)
    }

    pub fn remove_neighbor(&mut self, router: RouterId) -> bool {
        self.neighbors.remove(&router).is_some()
    }

    pub(super) fn to_be_bytes(&self) -> Vec<u8> {
        neighbor_bytes(&self.neighbors)
    }

    pub(super) fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        Ok(Self {
            neighbors: neighbors_from_bytes(data)?,
        })
    }
}

/// # AsbrLsa
/// overlay scope: border routers with reachable AS boundary routers. Same
/// shape as the ABR LSA, kept as its own type for dispatch.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct AsbrLsa {
    pub neighbors: BTreeMap<RouterId, u8>,
}

impl AsbrLsa {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_neighbor(&mut self, router: RouterId, metric: u8) -> bool {
        self.neighbors.insert(router, metric) != Some(metric)
    }

    pub fn remove_neighbor(&mut self, router: RouterId) -> bool {
        self.neighbors.remove(&router).is_some()
    }

    pub(super) fn to_be_bytes(&self) -> Vec<u8> {
        neighbor_bytes(&self.neighbors)
    }

    pub(super) fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        Ok(Self {
            neighbors: neighbors_from_bytes(data)?,
        })
    }
}

/// # OverlayPrefixLsa
/// overlay scope: the prefixes an area border router can reach inside its
/// attached areas, with their best intra-area cost.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct OverlayPrefixLsa {
    pub prefixes: BTreeMap<net::Ipv6Addr, Prefix>,
}

impl OverlayPrefixLsa {
    pub fn new() -> Self {
        Self::default()
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
        for prefix in self.prefixes.values() {
            bytes.put_u8(prefix.metric.min(u8::MAX as u16) as u8);
            bytes.put_u8(prefix.length);
            bytes.put_u8(prefix.options);
            let octets = prefix.address.octets();
            bytes.extend_from_slice(&octets[..prefix_octets(prefix.length)]);
        }
        bytes
    }

    pub(super) fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        let mut lsa = Self::new();
        let mut cursor = 0;
        while cursor < data.len() {
            if data.len() < cursor + 3 {
                return Err(OspfError::Malformed(
                    "truncated overlay prefix entry".to_string(),
                ));
            }
            let metric = data[cursor] as u16;
            let length = data[cursor + 1];
            let options = data[cursor + 2];
            let octets = prefix_octets(length);
            if data.len() < cursor + 3 + octets {
                return Err(OspfError::Malformed(
                    "truncated overlay prefix address".to_string(),
                ));
            }
            let mut full = [0u8; 16];
            full[..octets].copy_from_slice(&data[cursor + 3..cursor + 3 + octets]);
            lsa.add_prefix(Prefix::new(net::Ipv6Addr::from(full), length, metric, options));
            cursor += 3 + octets;
        }
        Ok(lsa)
    }
}
