use std::net;

use crate::error::OspfError;
use crate::{AreaId, RouterId, OSPF_IP_PROTOCOL_NUMBER, OSPF_MULTICAST_GROUP, OSPF_VERSION};

pub mod dd;
pub mod hello;
pub mod lsack;
pub mod lsr;
pub mod lsu;

pub use dd::DbDescriptionPacket;
pub use hello::HelloPacket;
pub use lsack::LsAcknowledgePacket;
pub use lsr::LsRequestPacket;
pub use lsu::LsUpdatePacket;

pub const HELLO_TYPE: u8 = 1;
pub const DB_DESCRIPTION_TYPE: u8 = 2;
pub const LS_REQUEST_TYPE: u8 = 3;
pub const LS_UPDATE_TYPE: u8 = 4;
pub const LS_ACKNOWLEDGE_TYPE: u8 = 5;

pub const PACKET_HEADER_LENGTH: usize = 16;

/// # PacketHeader
/// the 16 byte header in front of every protocol packet. `length` and
/// `checksum` are filled in during serialization.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PacketHeader {
    pub version: u8,
    pub packet_type: u8,
    pub length: u16,
    pub router_id: RouterId,
    pub area_id: AreaId,
    pub checksum: u16,
    pub instance_id: u8,
}

impl PacketHeader {
    pub fn new(packet_type: u8, router_id: RouterId, area_id: AreaId) -> Self {
        Self {
            version: OSPF_VERSION,
            packet_type,
            length: 0,
            router_id,
            area_id,
            checksum: 0,
            instance_id: 0,
        }
    }

    pub fn to_be_bytes(&self) -> [u8; PACKET_HEADER_LENGTH] {
        let mut bytes = [0u8; PACKET_HEADER_LENGTH];
        bytes[0] = self.version;
        bytes[1] = self.packet_type;
        bytes[2..4].copy_from_slice(&self.length.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.router_id.octets());
        bytes[8..12].copy_from_slice(&self.area_id.octets());
        bytes[12..14].copy_from_slice(&self.checksum.to_be_bytes());
        bytes[14] = self.instance_id;
        bytes[15] = 0;
        bytes
    }

    pub fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        if data.len() < PACKET_HEADER_LENGTH {
            return Err(OspfError::Malformed(format!(
                "packet header needs 16 bytes, got {}",
                data.len()
            )));
        }
        let header = Self {
            version: data[0],
            packet_type: data[1],
            length: u16::from_be_bytes([data[2], data[3]]),
            router_id: net::Ipv4Addr::new(data[4], data[5], data[6], data[7]),
            area_id: net::Ipv4Addr::new(data[8], data[9], data[10], data[11]),
            checksum: u16::from_be_bytes([data[12], data[13]]),
            instance_id: data[14],
        };
        if header.version != OSPF_VERSION {
            return Err(OspfError::Malformed(format!(
                "unsupported protocol version {}",
                header.version
            )));
        }
        Ok(header)
    }
}

/// # Packet
/// every protocol packet the engine sends or receives.
#[derive(Clone, Debug)]
pub enum Packet {
    Hello(HelloPacket),
    DbDescription(DbDescriptionPacket),
    LsRequest(LsRequestPacket),
    LsUpdate(LsUpdatePacket),
    LsAcknowledge(LsAcknowledgePacket),
}

impl Packet {
    pub fn header(&self) -> &PacketHeader {
        match self {
            Packet::Hello(p) => &p.header,
            Packet::DbDescription(p) => &p.header,
            Packet::LsRequest(p) => &p.header,
            Packet::LsUpdate(p) => &p.header,
            Packet::LsAcknowledge(p) => &p.header,
        }
    }

    fn body_bytes(&self) -> Vec<u8> {
        match self {
            Packet::Hello(p) => p.body_bytes(),
            Packet::DbDescription(p) => p.body_bytes(),
            Packet::LsRequest(p) => p.body_bytes(),
            Packet::LsUpdate(p) => p.body_bytes(),
            Packet::LsAcknowledge(p) => p.body_bytes(),
        }
    }

    /// # to_be_bytes
    /// serialize with length and checksum filled. The checksum covers the
    /// IPv6 pseudo-header, so source and destination must be the addresses
    /// the packet will actually travel between.
    pub fn to_be_bytes(&self, source: &net::Ipv6Addr, destination: &net::Ipv6Addr) -> Vec<u8> {
        let body = self.body_bytes();
        let mut header = *self.header();
        header.length = (PACKET_HEADER_LENGTH + body.len()) as u16;
        header.checksum = 0;
        let mut bytes = Vec::with_capacity(header.length as usize);
        bytes.extend_from_slice(&header.to_be_bytes());
        bytes.extend_from_slice(&body);
        let checksum = internet_checksum(source, destination, &bytes);
        bytes[12..14].copy_from_slice(&checksum.to_be_bytes());
        bytes
    }

    pub fn try_from_be_bytes(data: &[u8]) -> Result<Self, OspfError> {
        let header = PacketHeader::try_from_be_bytes(data)?;
        let length = header.length as usize;
        if data.len() < length || length < PACKET_HEADER_LENGTH {
            return Err(OspfError::Malformed(format!(
                "packet claims {} bytes, got {}",
                length,
                data.len()
            )));
        }
        let body = &data[PACKET_HEADER_LENGTH..length];
        match header.packet_type {
            HELLO_TYPE => Ok(Packet::Hello(HelloPacket::from_body(header, body)?)),
            DB_DESCRIPTION_TYPE => Ok(Packet::DbDescription(DbDescriptionPacket::from_body(
                header, body,
            )?)),
            LS_REQUEST_TYPE => Ok(Packet::LsRequest(LsRequestPacket::from_body(header, body)?)),
            LS_UPDATE_TYPE => Ok(Packet::LsUpdate(LsUpdatePacket::from_body(header, body)?)),
            LS_ACKNOWLEDGE_TYPE => Ok(Packet::LsAcknowledge(LsAcknowledgePacket::from_body(
                header, body,
            )?)),
            other => Err(OspfError::UnknownPacketType(other)),
        }
    }
}

/// # internet_checksum
/// ones-complement sum over the IPv6 pseudo-header and the packet, with the
/// packet checksum field treated as zero.
pub fn internet_checksum(
    source: &net::Ipv6Addr,
    destination: &net::Ipv6Addr,
    packet: &[u8],
) -> u16 {
    let mut data = Vec::with_capacity(40 + packet.len());
    data.extend_from_slice(&source.octets());
    data.extend_from_slice(&destination.octets());
    data.extend_from_slice(&0u16.to_be_bytes());
    data.extend_from_slice(&(packet.len() as u16).to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());
    data.extend_from_slice(&(OSPF_IP_PROTOCOL_NUMBER as u16).to_be_bytes());
    data.extend_from_slice(packet);
    if data.len() % 2 != 0 {
        data.push(0);
    }
    let mut sum: u32 = 0;
    for (pos, chunk) in data.chunks_exact(2).enumerate() {
        // the embedded checksum sits at packet offset 12
        let word = if pos == (40 + 12) / 2 {
            0
        } else {
            u16::from_be_bytes([chunk[0], chunk[1]]) as u32
        };
        sum += word;
        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }
    }
    !(sum as u16)
}

/// # check_data
/// validate a received packet's checksum, trying the receiving unicast
/// address first and the multicast group second. Returns the destination
/// that verified.
pub fn check_data(
    data: &[u8],
    source: &net::Ipv6Addr,
    unicast: &net::Ipv6Addr,
) -> Result<net::Ipv6Addr, OspfError> {
    if data.len() < PACKET_HEADER_LENGTH {
        return Err(OspfError::Malformed(format!(
            "received {} bytes",
            data.len()
        )));
    }
    let length = u16::from_be_bytes([data[2], data[3]]) as usize;
    if length < PACKET_HEADER_LENGTH || data.len() < length {
        return Err(OspfError::Malformed(format!(
            "packet claims {} bytes, got {}",
            length,
            data.len()
        )));
    }
    let packet = &data[..length];
    let embedded = u16::from_be_bytes([data[12], data[13]]);
    for destination in [*unicast, OSPF_MULTICAST_GROUP] {
        if internet_checksum(source, &destination, packet) == embedded {
            return Ok(destination);
        }
    }
    Err(OspfError::Checksum(format!(
        "packet from {} failed verification",
        source
    )))
}
