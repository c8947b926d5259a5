//! An OSPFv3-class link-state routing engine: per-interface hello and
//! adjacency state machines, per-area link-state databases with aging and
//! reliable flooding, shortest-path-first route computation with diff-based
//! installation, and an overlay tier that summarizes reachability between
//! areas on border routers.

pub mod area;
pub mod cli;
pub mod error;
pub mod flood;
pub mod interface;
pub mod lsa;
pub mod neighbor;
pub mod overlay;
pub mod packet;
pub mod router;
pub mod rtable;
pub mod transport;
pub mod util;

#[cfg(test)]
mod test;

use std::net;

/// Router and area identifiers are four-octet dotted values carried verbatim
/// on the wire and compared by value.
pub type RouterId = net::Ipv4Addr;
pub type AreaId = net::Ipv4Addr;

pub const NULL_ID: RouterId = net::Ipv4Addr::UNSPECIFIED;

pub const OSPF_VERSION: u8 = 3;
pub const OSPF_IP_PROTOCOL_NUMBER: u8 = 89;
pub const OSPF_MULTICAST_GROUP: net::Ipv6Addr = net::Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 5);

pub const INITIAL_SEQUENCE_NUMBER: u32 = 0x8000_0001;
pub const MAX_AGE: u16 = 3600;
pub const REFRESH_AGE: u16 = 1800;

pub const DEFAULT_HELLO_INTERVAL: u16 = 10;
pub const DEFAULT_RXMT_INTERVAL: u64 = 5;
pub const UPDATE_RXMT_INTERVAL: u64 = 10;
pub const DEFAULT_MTU: u16 = 1500;
pub const DEFAULT_COST: u16 = 10;
pub const DEFAULT_PRIORITY: u8 = 1;

pub const SPF_POLL_INTERVAL: u64 = 2;
pub const OVERLAY_SPF_POLL_INTERVAL: u64 = 5;
