//! Internet checksum helpers (RFC 1071 / RFC 1624).

fn fold(mut sum: u32) -> u16 {
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    sum as u16
}

/// Ones' complement of the ones' complement sum of `data` as big-endian 16-bit words.
///
/// Over a header whose checksum field is correct, the result is 0.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum = 0u32;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum = sum.wrapping_add(u32::from(u16::from_be_bytes([chunk[0], chunk[1]])));
        if sum > 0xffff_0000 {
            sum = u32::from(fold(sum));
        }
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }
    !fold(sum)
}

/// Update `checksum` after one 16-bit word of the covered data changed from `old` to `new`.
///
/// Uses RFC 1624 equation 3: `HC' = ~(~HC + ~m + m')`.
pub fn incremental_update(checksum: u16, old: u16, new: u16) -> u16 {
    let sum = u32::from(!checksum) + u32::from(!old) + u32::from(new);
    !fold(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Example header from RFC 1071 discussions; checksum field (bytes 10..12) is 0xb861.
    const HEADER: [u8; 20] = [
        0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xb8, 0x61, 0xc0, 0xa8, 0x00,
        0x01, 0xc0, 0xa8, 0x00, 0xc7,
    ];

    #[test]
    fn checksum_over_valid_header_is_zero() {
        assert_eq!(internet_checksum(&HEADER), 0);
    }

    #[test]
    fn checksum_with_field_zeroed_recovers_field() {
        let mut header = HEADER;
        header[10] = 0;
        header[11] = 0;
        assert_eq!(internet_checksum(&header), 0xb861);
    }

    #[test]
    fn odd_length_pads_with_zero() {
        assert_eq!(internet_checksum(&[0x01]), internet_checksum(&[0x01, 0x00]));
    }

    #[test]
    fn incremental_matches_full_recompute() {
        let mut header = HEADER;
        let old = u16::from_be_bytes([header[8], header[9]]);
        header[8] -= 1;
        let new = u16::from_be_bytes([header[8], header[9]]);
        let updated = incremental_update(0xb861, old, new);
        header[10..12].copy_from_slice(&updated.to_be_bytes());
        assert_eq!(internet_checksum(&header), 0);
    }
}
