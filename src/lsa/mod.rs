use std::fmt;
use std::net;

use crate::error::OspfError;
use crate::{RouterId, INITIAL_SEQUENCE_NUMBER, MAX_AGE};

pub mod link;
pub mod network;
pub mod overlay;
pub mod prefix;
pub mod router;

pub use link::LinkLsa;
pub use network::NetworkLsa;
pub use overlay::{AbrLsa, AsbrLsa, OverlayPrefixLsa};
pub use prefix::{InterAreaPrefixLsa, IntraAreaPrefixLsa};
pub use router::{RouterLink, RouterLsa};

pub const ROUTER_LSA_TYPE: u16 = 0x2001;
pub const NETWORK_LSA_TYPE: u16 = 0x2002;
pub const INTER_AREA_PREFIX_LSA_TYPE: u16 = 0x2003;
pub const LINK_LSA_TYPE: u16 = 0x0008;
pub const INTRA_AREA_PREFIX_LSA_TYPE: u16 = 0x2009;
pub const OVERLAY_ABR_LSA_TYPE: u16 = 0x400a;
pub const OVERLAY_PREFIX_LSA_TYPE: u16 = 0x400b;
pub const OVERLAY_ASBR_LSA_TYPE: u16 = 0x400c;

pub const LSA_HEADER_LENGTH: usize = 20;

/// # is_overlay
/// every ls type above the intra-area-prefix type belongs to the overlay
/// store and floods across area boundaries.
pub fn is_overlay(ls_type: u16) -> bool {
    ls_type > INTRA_AREA_PREFIX_LSA_TYPE
}

pub fn build_lsa_options(dc: u16, r: u16, e: u16, v6: u16) -> u16 {
    32 * dc + 16 * r + 2 * e + v6
}

pub fn default_lsa_options() -> u16 {
    build_lsa_options(1, 1, 1, 1)
}

/// # prefix_octets
/// number of address octets carried for a byte-aligned truncated prefix.
pub fn prefix_octets(length: u8) -> usize {
    (length as usize + 7) / 8
}

/// # trim_address
/// zero every bit of the address beyond the prefix length.
pub fn trim_address(address: net::Ipv6Addr, length: u8) -> net::Ipv6Addr {
    let mut octets = address.octets();
    let keep = prefix_octets(length);
    for octet in octets.iter_mut().skip(keep) {
        *octet = 0;
    }
    if length % 8 != 0 && keep > 0 {
        octets[keep - 1] &= 0xffu8 << (8 - length % 8);
    }
    net::Ipv6Addr::from(octets)
}

/// # LsaKey
/// identity of an LSA: type, advertising router and link state id. Stores
/// and the graph refer to each other through these keys only.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LsaKey {
    pub ls_type: u16,
    pub adv_router: RouterId,
    pub link_state_id: net::Ipv4Addr,
}

impl LsaKey {
    pub fn new(ls_type: u16, adv_router: RouterId, link_state_id: net::Ipv4Addr) -> Self {
        Self {
            ls_type,
            adv_router,
            link_state_id,
        }
    }
}

impl fmt::Display for LsaKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:#06x}-{}-{}",
            self.ls_type, self.adv_router, self.link_state_id
        )
    }
}

impl fmt::Debug for LsaKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// # Prefix
/// an IPv6 prefix together with the metric and options octet it is
/// advertised with.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Prefix {
    pub address: net::Ipv6Addr,
    pub length: u8,
    pub metric: u16,
    pub options: u8,
}

impl Prefix {
    pub fn new(address: net::Ipv6Addr, length: u8, metric: u16, options: u8) -> Self {
        Self {
            address: trim_address(address, length),
            length,
            metric,
            options,
        }
    }

    pub fn update_metric(&mut self, metric: u16) -> bool {
        if self.metric == metric {
            return false;
        }
        self.metric = metric;
        true
    }

    pub fn covers(&self, address: net::Ipv6Addr) -> bool {
        trim_address(address, self.length) == self.address
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.length)
    }
}

/// # LsaHeader
/// the 20 byte header every LSA starts with. `checksum` and `length` carry
/// wire values when parsed or produced by `Lsa::wire_header`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LsaHeader {
    pub age: u16,
    pub ls_type: u16,
    pub link_state_id: net::Ipv4Addr,
    pub adv_router: RouterId,
    pub sequence_number: u32,
    pub checksum: u16,
    pub length: u16,
}

impl LsaHeader {
    pub fn new(ls_type: u16, link_state_id: net::Ipv4Addr, adv_router: RouterId) -> Self {
        Self {
            age: 0,
            ls_type,
            link_state_id,
            adv_router,
            sequence_number: INITIAL_SEQUENCE_NUMBER,
            checksum: 0,
            length: 0,
        }
    }

    pub fn key(&self) -> LsaKey {
        LsaKey::new(self.ls_type, self.adv_router, self.link_state_id)
    }

    pub fn to_be_bytes(&self) -> [u8; LSA_HEADER_LENGTH] {
        let mut bytes = [0u8; LSA_HEADER_LENGTH];
        bytes[0..2].copy_from_slice(&self.age.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.ls_type.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.link_state_id.octets());
        bytes[8..12].copy_from_slice(&self.adv_router.octets());
        bytes[12..16].copy_from_slice(&self.sequence_number.to_be_bytes());
        bytes[16..18].copy_from_slice(&self.checksum.to_be_bytes());
        bytes[18..20].copy_from_slice(&self.length.to_be_bytes());
        bytes
    }

    pub fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        if data.len() < LSA_HEADER_LENGTH {
            return Err(OspfError::Malformed(format!(
                "lsa header needs 20 bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            age: u16::from_be_bytes([data[0], data[1]]),
            ls_type: u16::from_be_bytes([data[2], data[3]]),
            link_state_id: net::Ipv4Addr::new(data[4], data[5], data[6], data[7]),
            adv_router: net::Ipv4Addr::new(data[8], data[9], data[10], data[11]),
            sequence_number: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
            checksum: u16::from_be_bytes([data[16], data[17]]),
            length: u16::from_be_bytes([data[18], data[19]]),
        })
    }
}

/// # fletcher_checksum
/// Fletcher-16 over the LSA skipping the age field, with the checksum bytes
/// treated as zero. Returns the two check octets packed big-endian.
pub fn fletcher_checksum(lsa: &[u8]) -> u16 {
    let mut c0: i64 = 0;
    let mut c1: i64 = 0;
    for (pos, byte) in lsa.iter().enumerate().skip(2) {
        let value = if pos == 16 || pos == 17 {
            0
        } else {
            *byte as i64
        };
        c0 = (c0 + value) % 255;
        c1 = (c1 + c0) % 255;
    }
    let mut x = ((lsa.len() as i64 - 16 - 1) * c0 - c1).rem_euclid(255);
    if x <= 0 {
        x += 255;
    }
    let mut y = 510 - c0 - x;
    if y > 255 {
        y -= 255;
    }
    ((x as u16) << 8) | y as u16
}

pub fn verify_fletcher_checksum(lsa: &[u8]) -> bool {
    if lsa.len() < LSA_HEADER_LENGTH {
        return false;
    }
    let embedded = u16::from_be_bytes([lsa[16], lsa[17]]);
    fletcher_checksum(lsa) == embedded
}

/// # LsaBody
/// tagged union over every LSA body the engine carries. Dispatch happens by
/// matching the tag, never through trait objects.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LsaBody {
    Router(RouterLsa),
    Network(NetworkLsa),
    InterAreaPrefix(InterAreaPrefixLsa),
    Link(LinkLsa),
    IntraAreaPrefix(IntraAreaPrefixLsa),
    Abr(AbrLsa),
    OverlayPrefix(OverlayPrefixLsa),
    Asbr(AsbrLsa),
}

impl LsaBody {
    pub fn ls_type(&self) -> u16 {
        match self {
            LsaBody::Router(_) => ROUTER_LSA_TYPE,
            LsaBody::Network(_) => NETWORK_LSA_TYPE,
            LsaBody::InterAreaPrefix(_) => INTER_AREA_PREFIX_LSA_TYPE,
            LsaBody::Link(_) => LINK_LSA_TYPE,
            LsaBody::IntraAreaPrefix(_) => INTRA_AREA_PREFIX_LSA_TYPE,
            LsaBody::Abr(_) => OVERLAY_ABR_LSA_TYPE,
            LsaBody::OverlayPrefix(_) => OVERLAY_PREFIX_LSA_TYPE,
            LsaBody::Asbr(_) => OVERLAY_ASBR_LSA_TYPE,
        }
    }

    fn to_be_bytes(&self) -> Vec<u8> {
        match self {
            LsaBody::Router(body) => body.to_be_bytes(),
            LsaBody::Network(body) => body.to_be_bytes(),
            LsaBody::InterAreaPrefix(body) => body.to_be_bytes(),
            LsaBody::Link(body) => body.to_be_bytes(),
            LsaBody::IntraAreaPrefix(body) => body.to_be_bytes(),
            LsaBody::Abr(body) => body.to_be_bytes(),
            LsaBody::OverlayPrefix(body) => body.to_be_bytes(),
            LsaBody::Asbr(body) => body.to_be_bytes(),
        }
    }

    fn try_from_be_bytes(ls_type: u16, data: &[u8]) -> Result<Self, OspfError> {
        match ls_type {
            ROUTER_LSA_TYPE => Ok(LsaBody::Router(RouterLsa::try_from_be_bytes(data)?)),
            NETWORK_LSA_TYPE => Ok(LsaBody::Network(NetworkLsa::try_from_be_bytes(data)?)),
            INTER_AREA_PREFIX_LSA_TYPE => Ok(LsaBody::InterAreaPrefix(
                InterAreaPrefixLsa::try_from_be_bytes(data)?,
            )),
            LINK_LSA_TYPE => Ok(LsaBody::Link(LinkLsa::try_from_be_bytes(data)?)),
            INTRA_AREA_PREFIX_LSA_TYPE => Ok(LsaBody::IntraAreaPrefix(
                IntraAreaPrefixLsa::try_from_be_bytes(data)?,
            )),
            OVERLAY_ABR_LSA_TYPE => Ok(LsaBody::Abr(AbrLsa::try_from_be_bytes(data)?)),
            OVERLAY_PREFIX_LSA_TYPE => Ok(LsaBody::OverlayPrefix(
                OverlayPrefixLsa::try_from_be_bytes(data)?,
            )),
            OVERLAY_ASBR_LSA_TYPE => Ok(LsaBody::Asbr(AsbrLsa::try_from_be_bytes(data)?)),
            other => Err(OspfError::UnknownLsaType(other)),
        }
    }
}

/// # Lsa
/// a complete LSA, header plus typed body.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Lsa {
    pub header: LsaHeader,
    pub body: LsaBody,
}

impl Lsa {
    pub fn new(header: LsaHeader, body: LsaBody) -> Self {
        Self { header, body }
    }

    pub fn key(&self) -> LsaKey {
        self.header.key()
    }

    /// # refresh
    /// bump the sequence number and restart aging. Used at the refresh age
    /// for self-originated LSAs and whenever the content changes.
    pub fn refresh(&mut self) {
        self.header.sequence_number += 1;
        self.header.age = 0;
    }

    /// # set_sequence_number
    /// adopt a sequence number ahead of a copy seen on the wire.
    pub fn set_sequence_number(&mut self, sequence_number: u32) {
        self.header.sequence_number = sequence_number;
        self.header.age = 0;
    }

    /// # kill
    /// turn the LSA into a premature-aged announcement.
    pub fn kill(&mut self) {
        self.header.age = MAX_AGE;
        self.header.sequence_number += 1;
    }

    pub fn is_dead(&self) -> bool {
        self.header.age >= MAX_AGE
    }

    /// # to_be_bytes
    /// serialize with length and Fletcher checksum computed over the whole
    /// LSA. `full` yields the complete LSA, otherwise just the 20 byte
    /// header, still carrying the full-body length and checksum.
    pub fn to_be_bytes(&self, full: bool) -> Vec<u8> {
        let body = self.body.to_be_bytes();
        let mut header = self.header;
        header.length = (LSA_HEADER_LENGTH + body.len()) as u16;
        header.checksum = 0;
        let mut bytes = Vec::with_capacity(header.length as usize);
        bytes.extend_from_slice(&header.to_be_bytes());
        bytes.extend_from_slice(&body);
        let checksum = fletcher_checksum(&bytes);
        bytes[16..18].copy_from_slice(&checksum.to_be_bytes());
        if !full {
            bytes.truncate(LSA_HEADER_LENGTH);
        }
        bytes
    }

    /// # wire_header
    /// the header as it appears on the wire, checksum and length filled in.
    pub fn wire_header(&self) -> LsaHeader {
        let bytes = self.to_be_bytes(true);
        let mut header = self.header;
        header.checksum = u16::from_be_bytes([bytes[16], bytes[17]]);
        header.length = bytes.len() as u16;
        header
    }

    pub fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        let header = LsaHeader::try_from_be_bytes(data)?;
        let length = header.length as usize;
        if length < LSA_HEADER_LENGTH || data.len() < length {
            return Err(OspfError::Malformed(format!(
                "lsa {} claims {} bytes, got {}",
                header.key(),
                length,
                data.len()
            )));
        }
        let body = LsaBody::try_from_be_bytes(header.ls_type, &data[LSA_HEADER_LENGTH..length])?;
        Ok(Self { header, body })
    }
}
