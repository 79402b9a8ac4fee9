use core::net::Ipv4Addr;

use crate::checksum::internet_checksum;
use crate::ethernet::{EthernetHeader, MacAddr, ETHERTYPE_IPV4};
use crate::ipv4::Ipv4Header;
use crate::transport::IPPROTO_UDP;
use crate::PacketError;

const UDP_HEADER_LEN: usize = 8;

/// Builds a complete Ethernet/IPv4/UDP frame with a valid IPv4 header checksum.
///
/// The UDP checksum is left as 0 ("not computed"), which IPv4 permits.
#[derive(Debug, Clone)]
pub struct UdpFrameBuilder<'a> {
    pub dest_mac: MacAddr,
    pub src_mac: MacAddr,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub ttl: u8,
    pub identification: u16,
    pub payload: &'a [u8],
}

impl Default for UdpFrameBuilder<'_> {
    fn default() -> Self {
        Self {
            dest_mac: MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
            src_mac: MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]),
            src_ip: Ipv4Addr::new(10, 0, 0, 2),
            dst_ip: Ipv4Addr::new(10, 0, 0, 1),
            src_port: 40000,
            dst_port: 9,
            ttl: 64,
            identification: 0,
            payload: &[],
        }
    }
}

impl UdpFrameBuilder<'_> {
    pub fn frame_len(&self) -> Result<usize, PacketError> {
        let ip_len = Ipv4Header::MIN_LEN + UDP_HEADER_LEN + self.payload.len();
        if ip_len > usize::from(u16::MAX) {
            return Err(PacketError::Malformed("IPv4 total length > 65535"));
        }
        Ok(EthernetHeader::LEN + ip_len)
    }

    pub fn build_vec(&self) -> Result<Vec<u8>, PacketError> {
        let len = self.frame_len()?;
        let ip_len = (len - EthernetHeader::LEN) as u16;
        let udp_len = ip_len - Ipv4Header::MIN_LEN as u16;

        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&self.dest_mac.0);
        out.extend_from_slice(&self.src_mac.0);
        out.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

        let ip_start = out.len();
        out.extend_from_slice(&[0x45, 0x00]);
        out.extend_from_slice(&ip_len.to_be_bytes());
        out.extend_from_slice(&self.identification.to_be_bytes());
        out.extend_from_slice(&0x4000u16.to_be_bytes()); // DF
        out.extend_from_slice(&[self.ttl, IPPROTO_UDP, 0, 0]);
        out.extend_from_slice(&self.src_ip.octets());
        out.extend_from_slice(&self.dst_ip.octets());
        let csum = internet_checksum(&out[ip_start..]);
        out[ip_start + 10..ip_start + 12].copy_from_slice(&csum.to_be_bytes());

        out.extend_from_slice(&self.src_port.to_be_bytes());
        out.extend_from_slice(&self.dst_port.to_be_bytes());
        out.extend_from_slice(&udp_len.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(self.payload);
        Ok(out)
    }
}
