use core::net::Ipv4Addr;

use crate::{ensure_len, read_be_u16, Layer, PacketError};

/// Header fields copied out of an [`Ipv4Header`] so they can be kept after the buffer borrow ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Fields {
    pub version_ihl: u8,
    pub total_len: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Fields {
    pub fn version(&self) -> u8 {
        self.version_ihl >> 4
    }

    /// Header length in 32-bit words.
    pub fn ihl(&self) -> u8 {
        self.version_ihl & 0x0f
    }

    pub fn header_len(&self) -> usize {
        usize::from(self.ihl()) * 4
    }
}

/// Read-only view of the fixed 20-byte part of an IPv4 header.
///
/// Construction only checks that the fixed header fits; version, IHL and total length are left for
/// [`crate::validate_ipv4`] so malformed headers can still be inspected.
#[derive(Clone, Copy, Debug)]
pub struct Ipv4Header<'a> {
    data: &'a [u8],
}

impl<'a> Ipv4Header<'a> {
    pub const MIN_LEN: usize = 20;

    pub fn parse(data: &'a [u8]) -> Result<Self, PacketError> {
        ensure_len(data, Layer::Ipv4, Self::MIN_LEN)?;
        Ok(Self { data })
    }

    pub fn version_ihl(&self) -> u8 {
        self.data[0]
    }

    pub fn total_len(&self) -> u16 {
        read_be_u16(self.data, 2)
    }

    pub fn ttl(&self) -> u8 {
        self.data[8]
    }

    pub fn protocol(&self) -> u8 {
        self.data[9]
    }

    pub fn checksum(&self) -> u16 {
        read_be_u16(self.data, 10)
    }

    pub fn src(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.data[12], self.data[13], self.data[14], self.data[15])
    }

    pub fn dst(&self) -> Ipv4Addr {
        Ipv4Addr::new(self.data[16], self.data[17], self.data[18], self.data[19])
    }

    pub fn fields(&self) -> Ipv4Fields {
        Ipv4Fields {
            version_ihl: self.version_ihl(),
            total_len: self.total_len(),
            ttl: self.ttl(),
            protocol: self.protocol(),
            checksum: self.checksum(),
            src: self.src(),
            dst: self.dst(),
        }
    }
}

/// Writable view over the fields the forwarder mutates (TTL and header checksum).
#[derive(Debug)]
pub struct Ipv4HeaderMut<'a> {
    data: &'a mut [u8],
}

impl<'a> Ipv4HeaderMut<'a> {
    pub fn parse(data: &'a mut [u8]) -> Result<Self, PacketError> {
        ensure_len(data, Layer::Ipv4, Ipv4Header::MIN_LEN)?;
        Ok(Self { data })
    }

    pub fn ttl(&self) -> u8 {
        self.data[8]
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.data[8] = ttl;
    }

    pub fn protocol(&self) -> u8 {
        self.data[9]
    }

    pub fn checksum(&self) -> u16 {
        read_be_u16(self.data, 10)
    }

    pub fn set_checksum(&mut self, checksum: u16) {
        self.data[10..12].copy_from_slice(&checksum.to_be_bytes());
    }
}
