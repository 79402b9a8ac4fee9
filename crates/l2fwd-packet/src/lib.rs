//! Bounds-checked header views for the forwarding data path.
//!
//! Every view in this crate is a projection onto a caller-owned byte slice. Constructors check the
//! slice length up front, so accessors can index without further checks and a view can never
//! outlive (or read past) the buffer it was built from.
#![forbid(unsafe_code)]

pub mod builder;
pub mod checksum;
pub mod ethernet;
pub mod ipv4;
pub mod ipv6;
pub mod mutate;
pub mod parse;
pub mod transport;
pub mod validate;

use core::fmt;

pub use builder::UdpFrameBuilder;
pub use ethernet::{EthernetHeader, EthernetHeaderMut, MacAddr, ETHERTYPE_IPV4, ETHERTYPE_IPV6};
pub use ipv4::{Ipv4Fields, Ipv4Header, Ipv4HeaderMut};
pub use ipv6::{Ipv6Fields, Ipv6Header};
pub use mutate::{mutate_frame, ChecksumUpdate, MutateOptions};
pub use parse::{parse_frame, NetworkHeader, ParsedFrame};
pub use transport::{Ports, Transport, IPPROTO_TCP, IPPROTO_UDP};
pub use validate::{validate_ipv4, Rejection};

/// Protocol layer a view was requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Ethernet,
    Ipv4,
    Ipv6,
    Transport,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Ethernet => "ethernet",
            Layer::Ipv4 => "ipv4",
            Layer::Ipv6 => "ipv6",
            Layer::Transport => "transport",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("{layer} header needs {needed} bytes, buffer has {actual}")]
    TooShort {
        layer: Layer,
        needed: usize,
        actual: usize,
    },

    #[error("malformed packet: {0}")]
    Malformed(&'static str),
}

pub(crate) fn ensure_len(data: &[u8], layer: Layer, needed: usize) -> Result<(), PacketError> {
    if data.len() < needed {
        return Err(PacketError::TooShort {
            layer,
            needed,
            actual: data.len(),
        });
    }
    Ok(())
}

pub(crate) fn read_be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}
