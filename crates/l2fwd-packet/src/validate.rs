use crate::ipv4::{Ipv4Fields, Ipv4Header};

/// Why an IPv4 header failed the RFC 1812 section 5.2.2 checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("link-layer length {wire_len} is below the 20-byte IPv4 minimum")]
    FrameTooShort { wire_len: usize },

    #[error("IP version {version} is not 4")]
    BadVersion { version: u8 },

    #[error("header length of {ihl} words is below 5")]
    HeaderLengthTooSmall { ihl: u8 },

    #[error("total length {total_len} is below the 20-byte IPv4 minimum")]
    TotalLengthTooSmall { total_len: u16 },
}

/// Minimal legality checks of an IPv4 header against the frame's reported length.
///
/// The header checksum is not examined; hardware or an upstream stage owns that check.
pub fn validate_ipv4(header: &Ipv4Fields, wire_len: usize) -> Result<(), Rejection> {
    if wire_len < Ipv4Header::MIN_LEN {
        return Err(Rejection::FrameTooShort { wire_len });
    }
    if header.version() != 4 {
        return Err(Rejection::BadVersion {
            version: header.version(),
        });
    }
    if header.ihl() < 5 {
        return Err(Rejection::HeaderLengthTooSmall { ihl: header.ihl() });
    }
    if usize::from(header.total_len) < Ipv4Header::MIN_LEN {
        return Err(Rejection::TotalLengthTooSmall {
            total_len: header.total_len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::net::Ipv4Addr;

    fn fields() -> Ipv4Fields {
        Ipv4Fields {
            version_ihl: 0x45,
            total_len: 60,
            ttl: 64,
            protocol: 6,
            checksum: 0,
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(10, 0, 0, 2),
        }
    }

    #[test]
    fn well_formed_header_is_valid() {
        assert_eq!(validate_ipv4(&fields(), 74), Ok(()));
    }

    #[test]
    fn wire_length_19_is_too_short_regardless_of_header() {
        let mut header = fields();
        header.version_ihl = 0x60;
        header.total_len = 0;
        assert_eq!(
            validate_ipv4(&header, 19),
            Err(Rejection::FrameTooShort { wire_len: 19 })
        );
    }

    #[test]
    fn version_6_is_rejected_regardless_of_other_fields() {
        let mut header = fields();
        header.version_ihl = 0x62;
        header.total_len = 3;
        assert_eq!(
            validate_ipv4(&header, 1500),
            Err(Rejection::BadVersion { version: 6 })
        );
    }

    #[test]
    fn small_ihl_is_rejected() {
        let mut header = fields();
        header.version_ihl = 0x44;
        assert_eq!(
            validate_ipv4(&header, 74),
            Err(Rejection::HeaderLengthTooSmall { ihl: 4 })
        );
    }

    #[test]
    fn small_total_length_is_rejected() {
        let mut header = fields();
        header.total_len = 19;
        assert_eq!(
            validate_ipv4(&header, 74),
            Err(Rejection::TotalLengthTooSmall { total_len: 19 })
        );
    }

    #[test]
    fn checksum_is_not_inspected() {
        let mut header = fields();
        header.checksum = 0xdead;
        assert_eq!(validate_ipv4(&header, 74), Ok(()));
    }
}
