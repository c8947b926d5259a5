use super::{PacketHeader, LS_ACKNOWLEDGE_TYPE};
use crate::error::OspfError;
use crate::lsa::{LsaHeader, LSA_HEADER_LENGTH};
use crate::{AreaId, RouterId};

/// # LsAcknowledgePacket
/// acknowledges flooded LSAs by echoing their headers.
#[derive(Clone, Debug)]
pub struct LsAcknowledgePacket {
    pub header: PacketHeader,
    pub lsa_headers: Vec<LsaHeader>,
}

impl LsAcknowledgePacket {
    pub fn new(router_id: RouterId, area_id: AreaId, lsa_headers: Vec<LsaHeader>) -> Self {
        Self {
            header: PacketHeader::new(LS_ACKNOWLEDGE_TYPE, router_id, area_id),
            lsa_headers,
        }
    }

    pub(super) fn body_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.lsa_headers.len() * LSA_HEADER_LENGTH);
        for header in &self.lsa_headers {
            bytes.extend_from_slice(&header.to_be_bytes());
        }
        bytes
    }

    pub(super) fn from_body(header: PacketHeader, body: &[u8]) -> Result<Self, OspfError> {
        if body.len() % LSA_HEADER_LENGTH != 0 {
            return Err(OspfError::Malformed(format!(
                "ls acknowledge body of {} bytes",
                body.len()
            )));
        }
        let lsa_headers = body
            .chunks_exact(LSA_HEADER_LENGTH)
            .map(LsaHeader::try_from_be_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            header,
            lsa_headers,
        })
    }
}
