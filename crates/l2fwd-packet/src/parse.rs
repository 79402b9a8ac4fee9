use crate::ethernet::{EthernetHeader, MacAddr, ETHERTYPE_IPV4, ETHERTYPE_IPV6};
use crate::ipv4::{Ipv4Fields, Ipv4Header};
use crate::ipv6::{Ipv6Fields, Ipv6Header};
use crate::transport::{carries_ports, Ports, Transport};
use crate::{ensure_len, Layer, PacketError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkHeader {
    Ipv4(Ipv4Fields),
    Ipv6(Ipv6Fields),
}

/// Header summary of one frame.
///
/// Layers past Ethernet are best effort: a layer that could not be decoded is `None`, and
/// `truncated` names the first layer that failed because the buffer ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFrame {
    pub dest_mac: MacAddr,
    pub src_mac: MacAddr,
    pub ethertype: u16,
    pub network: Option<NetworkHeader>,
    pub transport: Option<Transport>,
    pub truncated: Option<Layer>,
}

impl ParsedFrame {
    pub fn ipv4(&self) -> Option<&Ipv4Fields> {
        match &self.network {
            Some(NetworkHeader::Ipv4(fields)) => Some(fields),
            _ => None,
        }
    }

    pub fn ipv6(&self) -> Option<&Ipv6Fields> {
        match &self.network {
            Some(NetworkHeader::Ipv6(fields)) => Some(fields),
            _ => None,
        }
    }

    /// Transport ports, or `0/0` when the frame carries no decoded TCP/UDP header.
    pub fn ports(&self) -> Ports {
        self.transport.map(|t| t.ports).unwrap_or_default()
    }
}

/// Decode Ethernet, then IPv4/IPv6, then the TCP/UDP port pair.
///
/// Only a frame shorter than an Ethernet header fails the call. The buffer is never written.
pub fn parse_frame(frame: &[u8]) -> Result<ParsedFrame, PacketError> {
    let eth = EthernetHeader::parse(frame)?;
    let mut parsed = ParsedFrame {
        dest_mac: eth.dest_mac(),
        src_mac: eth.src_mac(),
        ethertype: eth.ethertype(),
        network: None,
        transport: None,
        truncated: None,
    };

    let l3 = eth.payload();
    let l4 = match parsed.ethertype {
        ETHERTYPE_IPV4 => match Ipv4Header::parse(l3) {
            Ok(ip) => {
                let fields = ip.fields();
                parsed.network = Some(NetworkHeader::Ipv4(fields));
                if fields.header_len() < Ipv4Header::MIN_LEN {
                    tracing::debug!(
                        ihl = fields.ihl(),
                        "IPv4 header length below minimum; skipping transport header"
                    );
                    None
                } else {
                    Some((fields.protocol, fields.header_len()))
                }
            }
            Err(err) => {
                record_failure(&mut parsed, err);
                None
            }
        },
        ETHERTYPE_IPV6 => match Ipv6Header::parse(l3) {
            Ok(ip) => {
                let fields = ip.fields();
                parsed.network = Some(NetworkHeader::Ipv6(fields));
                Some((fields.next_header, Ipv6Header::LEN))
            }
            Err(err) => {
                record_failure(&mut parsed, err);
                None
            }
        },
        _ => None,
    };

    if let Some((protocol, offset)) = l4.filter(|(protocol, _)| carries_ports(*protocol)) {
        match ports_at(l3, offset) {
            Ok(ports) => parsed.transport = Some(Transport { protocol, ports }),
            Err(err) => record_failure(&mut parsed, err),
        }
    }

    Ok(parsed)
}

fn ports_at(l3: &[u8], offset: usize) -> Result<Ports, PacketError> {
    ensure_len(l3, Layer::Transport, offset + Ports::LEN)?;
    Ports::parse(&l3[offset..])
}

fn record_failure(parsed: &mut ParsedFrame, err: PacketError) {
    tracing::debug!(ethertype = parsed.ethertype, "inner header not decoded: {err}");
    if let PacketError::TooShort { layer, .. } = err {
        parsed.truncated = Some(layer);
    }
}
