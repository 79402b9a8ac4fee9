use core::fmt;

use crate::{ensure_len, read_be_u16, Layer, PacketError};

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_IPV6: u16 = 0x86dd;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: Self = Self([0xff; 6]);

    fn from_slice(bytes: &[u8]) -> Self {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&bytes[..6]);
        Self(mac)
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Read-only view of the 14-byte Ethernet II header.
#[derive(Clone, Copy, Debug)]
pub struct EthernetHeader<'a> {
    data: &'a [u8],
}

impl<'a> EthernetHeader<'a> {
    pub const LEN: usize = 14;

    pub fn parse(data: &'a [u8]) -> Result<Self, PacketError> {
        ensure_len(data, Layer::Ethernet, Self::LEN)?;
        Ok(Self { data })
    }

    pub fn dest_mac(&self) -> MacAddr {
        MacAddr::from_slice(&self.data[0..6])
    }

    pub fn src_mac(&self) -> MacAddr {
        MacAddr::from_slice(&self.data[6..12])
    }

    /// EtherType, decoded most-significant byte first from the two bytes after the addresses.
    pub fn ethertype(&self) -> u16 {
        read_be_u16(self.data, 12)
    }

    pub fn payload(&self) -> &'a [u8] {
        &self.data[Self::LEN..]
    }
}

/// Writable view of the Ethernet header.
#[derive(Debug)]
pub struct EthernetHeaderMut<'a> {
    data: &'a mut [u8],
}

impl<'a> EthernetHeaderMut<'a> {
    pub fn parse(data: &'a mut [u8]) -> Result<Self, PacketError> {
        ensure_len(data, Layer::Ethernet, EthernetHeader::LEN)?;
        Ok(Self { data })
    }

    /// Exchange the source and destination addresses in place.
    pub fn swap_macs(&mut self) {
        let (dst, rest) = self.data.split_at_mut(6);
        dst.swap_with_slice(&mut rest[..6]);
    }
}
