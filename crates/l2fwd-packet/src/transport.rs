use crate::{ensure_len, read_be_u16, Layer, PacketError};

pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

/// Source and destination transport ports. Both stay 0 when no TCP/UDP header was decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ports {
    pub src: u16,
    pub dst: u16,
}

impl Ports {
    /// TCP and UDP both carry the port pair in their first four bytes.
    pub const LEN: usize = 4;

    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        ensure_len(data, Layer::Transport, Self::LEN)?;
        Ok(Self {
            src: read_be_u16(data, 0),
            dst: read_be_u16(data, 2),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transport {
    pub protocol: u8,
    pub ports: Ports,
}

pub fn carries_ports(protocol: u8) -> bool {
    matches!(protocol, IPPROTO_TCP | IPPROTO_UDP)
}
