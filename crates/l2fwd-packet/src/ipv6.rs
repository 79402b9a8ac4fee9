use core::net::Ipv6Addr;

use crate::{ensure_len, Layer, PacketError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv6Fields {
    pub next_header: u8,
    pub hop_limit: u8,
    pub src: Ipv6Addr,
    pub dst: Ipv6Addr,
}

/// Read-only view of the fixed IPv6 header. Extension headers are not walked.
#[derive(Clone, Copy, Debug)]
pub struct Ipv6Header<'a> {
    data: &'a [u8],
}

impl<'a> Ipv6Header<'a> {
    pub const LEN: usize = 40;

    pub fn parse(data: &'a [u8]) -> Result<Self, PacketError> {
        ensure_len(data, Layer::Ipv6, Self::LEN)?;
        if data[0] >> 4 != 6 {
            return Err(PacketError::Malformed("IPv6 version nibble is not 6"));
        }
        Ok(Self { data })
    }

    pub fn next_header(&self) -> u8 {
        self.data[6]
    }

    pub fn hop_limit(&self) -> u8 {
        self.data[7]
    }

    pub fn src(&self) -> Ipv6Addr {
        addr_at(self.data, 8)
    }

    pub fn dst(&self) -> Ipv6Addr {
        addr_at(self.data, 24)
    }

    pub fn fields(&self) -> Ipv6Fields {
        Ipv6Fields {
            next_header: self.next_header(),
            hop_limit: self.hop_limit(),
            src: self.src(),
            dst: self.dst(),
        }
    }
}

fn addr_at(data: &[u8], offset: usize) -> Ipv6Addr {
    let mut octets = [0u8; 16];
    octets.copy_from_slice(&data[offset..offset + 16]);
    Ipv6Addr::from(octets)
}
