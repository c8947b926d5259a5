use bytes::BufMut;

use super::{PacketHeader, LS_UPDATE_TYPE};
use crate::error::OspfError;
use crate::lsa::{verify_fletcher_checksum, Lsa, LSA_HEADER_LENGTH};
use crate::{AreaId, RouterId};

/// # LsUpdatePacket
/// carries full LSAs, both during loading and for flooding.
#[derive(Clone, Debug)]
pub struct LsUpdatePacket {
    pub header: PacketHeader,
    pub lsas: Vec<Lsa>,
}

impl LsUpdatePacket {
    pub fn new(router_id: RouterId, area_id: AreaId, lsas: Vec<Lsa>) -> Self {
        Self {
            header: PacketHeader::new(LS_UPDATE_TYPE, router_id, area_id),
            lsas,
        }
    }

    pub(super) fn body_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.put_u32(self.lsas.len() as u32);
        for lsa in &self.lsas {
            bytes.extend_from_slice(&lsa.to_be_bytes(true));
        }
        bytes
    }

    pub(super) fn from_body(header: PacketHeader, body: &[u8]) -> Result<Self, OspfError> {
        if body.len() < 4 {
            return Err(OspfError::Malformed(format!(
                "ls update body of {} bytes",
                body.len()
            )));
        }
        let count = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
        let mut lsas = Vec::with_capacity(count as usize);
        let mut cursor = 4;
        for _ in 0..count {
            if body.len() < cursor + LSA_HEADER_LENGTH {
                return Err(OspfError::Malformed("truncated lsa in update".to_string()));
            }
            let lsa = Lsa::try_from_be_bytes(&body[cursor..])?;
            let length = lsa.header.length as usize;
            if body.len() < cursor + length {
                return Err(OspfError::Malformed("truncated lsa in update".to_string()));
            }
            if !verify_fletcher_checksum(&body[cursor..cursor + length]) {
                return Err(OspfError::Checksum(format!(
                    "lsa {} failed verification",
                    lsa.key()
                )));
            }
            cursor += length;
            lsas.push(lsa);
        }
        Ok(Self { header, lsas })
    }
}
