use std::{fmt, io};

use crate::AreaId;

/// # OspfError
/// crate-wide error type, every fallible operation in the engine returns it.
pub enum OspfError {
    Malformed(String),
    Checksum(String),
    UnknownPacketType(u8),
    UnknownLsaType(u16),
    UnknownInterface(u32),
    UnknownArea(AreaId),
    Transport(String),
}

impl std::error::Error for OspfError {}

impl fmt::Display for OspfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OspfError::Malformed(msg) => write!(f, "malformed packet: {}", msg),
            OspfError::Checksum(msg) => write!(f, "checksum mismatch: {}", msg),
            OspfError::UnknownPacketType(t) => write!(f, "unknown packet type: {}", t),
            OspfError::UnknownLsaType(t) => write!(f, "unknown lsa type: {:#06x}", t),
            OspfError::UnknownInterface(id) => write!(f, "unknown interface: {}", id),
            OspfError::UnknownArea(id) => write!(f, "unknown area: {}", id),
            OspfError::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl fmt::Debug for OspfError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<io::Error> for OspfError {
    fn from(err: io::Error) -> Self {
        OspfError::Transport(err.to_string())
    }
}
