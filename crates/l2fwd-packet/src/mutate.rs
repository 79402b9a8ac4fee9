use crate::checksum::incremental_update;
use crate::ethernet::{EthernetHeader, EthernetHeaderMut};
use crate::ipv4::Ipv4HeaderMut;
use crate::parse::ParsedFrame;
use crate::PacketError;

/// How the IPv4 header checksum follows the TTL decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumUpdate {
    /// Add 1 to the checksum field (16-bit wraparound). Leaves the checksum inconsistent with the
    /// new TTL; this is the historical forwarding behavior.
    #[default]
    Placeholder,
    /// Correct RFC 1624 incremental update of the TTL/protocol word.
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutateOptions {
    pub mac_swap: bool,
    pub checksum: ChecksumUpdate,
}

impl Default for MutateOptions {
    fn default() -> Self {
        Self {
            mac_swap: true,
            checksum: ChecksumUpdate::Placeholder,
        }
    }
}

/// Rewrite the forwarded fields of `frame` in place.
///
/// The MAC swap applies to every frame with an Ethernet header when enabled. TTL and checksum are
/// touched only when `parsed` carries an IPv4 header. Transport ports are never written.
pub fn mutate_frame(
    frame: &mut [u8],
    parsed: &ParsedFrame,
    options: MutateOptions,
) -> Result<(), PacketError> {
    if options.mac_swap {
        EthernetHeaderMut::parse(frame)?.swap_macs();
    }

    if parsed.ipv4().is_some() {
        let l3 = frame.get_mut(EthernetHeader::LEN..).unwrap_or_default();
        let mut ip = Ipv4HeaderMut::parse(l3)?;
        decrement_ttl(&mut ip, options.checksum);
    }

    Ok(())
}

fn decrement_ttl(ip: &mut Ipv4HeaderMut<'_>, update: ChecksumUpdate) {
    let old_ttl = ip.ttl();
    let new_ttl = old_ttl.wrapping_sub(1);
    ip.set_ttl(new_ttl);

    let checksum = match update {
        ChecksumUpdate::Placeholder => ip.checksum().wrapping_add(1),
        ChecksumUpdate::Incremental => {
            let protocol = ip.protocol();
            incremental_update(
                ip.checksum(),
                u16::from_be_bytes([old_ttl, protocol]),
                u16::from_be_bytes([new_ttl, protocol]),
            )
        }
    };
    ip.set_checksum(checksum);
}
