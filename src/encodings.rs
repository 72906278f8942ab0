//! Generic ROHC encoding utilities.
//!
//! Implements Window-based Least Significant Bits (W-LSB) encoding as
//! specified in RFC 3095 Section 4.5 and the field scaling scheme of
//! RFC 6846 Section 6.5.2.4. The per-format `(k, p)` parameters live with
//! the packet formats; these helpers are profile-agnostic.

use crate::error::{Field, RohcParsingError};

/// Determines if a value falls within the W-LSB interpretation window.
///
/// The interpretation window is
/// `[reference_value - p_offset, reference_value - p_offset + (2^num_lsb_bits) - 1]`,
/// with all calculations performed modulo `2^64`.
pub fn is_value_in_lsb_interval(
    value: u64,
    reference_value: u64,
    num_lsb_bits: u8,
    p_offset: i64,
) -> bool {
    if num_lsb_bits == 0 || num_lsb_bits > 64 {
        return false;
    }
    if num_lsb_bits == 64 {
        // All 64 bits are LSBs, value is fully known
        return true;
    }

    let window_size = 1u64 << num_lsb_bits;

    let interval_base = if p_offset >= 0 {
        reference_value.wrapping_sub(p_offset as u64)
    } else {
        reference_value.wrapping_add((-p_offset) as u64)
    };

    value.wrapping_sub(interval_base) < window_size
}

/// Extracts the N least significant bits from a value for W-LSB encoding.
///
/// # Errors
/// - `RohcParsingError::UncompressibleFieldValue` - Invalid `num_lsb_bits`
#[inline]
pub fn encode_lsb(value: u64, num_lsb_bits: u8) -> Result<u64, RohcParsingError> {
    if num_lsb_bits == 0 || num_lsb_bits > 64 {
        return Err(RohcParsingError::UncompressibleFieldValue {
            field: Field::NumLsbBits,
            expected: 64,
            got: num_lsb_bits as u32,
        });
    }

    if num_lsb_bits == 64 {
        Ok(value)
    } else {
        let mask = (1u64 << num_lsb_bits) - 1;
        Ok(value & mask)
    }
}

/// Reconstructs the original value from its W-LSB encoded representation.
///
/// Finds the candidate value that has the same `k` least significant bits
/// as `received_lsbs` and falls within the interpretation window. Kept in
/// the compressor crate for window self-checks in tests (property P5) and
/// for callers that validate their own emissions.
///
/// # Errors
/// - `RohcParsingError::UncompressibleFieldValue` - Invalid parameters or
///   LSBs that cannot be resolved within the window
pub fn decode_lsb(
    received_lsb: u64,
    reference_value: u64,
    num_lsb_bits: u8,
    p_offset: i64,
) -> Result<u64, RohcParsingError> {
    if num_lsb_bits == 0 || num_lsb_bits >= 64 {
        return Err(RohcParsingError::UncompressibleFieldValue {
            field: Field::NumLsbBits,
            expected: 63,
            got: num_lsb_bits as u32,
        });
    }

    let window_size = 1u64 << num_lsb_bits;
    let lsb_mask = window_size - 1;

    if received_lsb > lsb_mask {
        return Err(RohcParsingError::UncompressibleFieldValue {
            field: Field::NumLsbBits,
            expected: lsb_mask as u32,
            got: received_lsb as u32,
        });
    }

    let interval_base = if p_offset >= 0 {
        reference_value.wrapping_sub(p_offset as u64)
    } else {
        reference_value.wrapping_add((-p_offset) as u64)
    };

    let mut candidate = (interval_base & !lsb_mask).wrapping_add(received_lsb);
    if candidate < interval_base {
        candidate = candidate.wrapping_add(window_size);
    }

    if candidate.wrapping_sub(interval_base) < window_size {
        Ok(candidate)
    } else {
        let alternative = candidate.wrapping_sub(window_size);
        if alternative.wrapping_sub(interval_base) < window_size {
            Ok(alternative)
        } else {
            Err(RohcParsingError::UncompressibleFieldValue {
                field: Field::NumLsbBits,
                expected: num_lsb_bits as u32,
                got: received_lsb as u32,
            })
        }
    }
}

/// Splits `value` into a scaled part and a residue against `factor`
/// (RFC 6846 Section 6.5.2.4).
///
/// For the TCP sequence number the factor is the payload size; for the
/// acknowledgment number it is the detected `ack_stride`. A factor of zero
/// disables scaling: the scaled part is zero and the residue carries the
/// full value.
#[inline]
pub fn field_scaling(factor: u32, value: u32) -> (u32, u32) {
    if factor == 0 {
        (0, value)
    } else {
        (value / factor, value % factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_lsb_valid_inputs() {
        assert_eq!(encode_lsb(0x1234, 8).unwrap(), 0x34);
        assert_eq!(encode_lsb(0x1234, 4).unwrap(), 0x04);
        assert_eq!(encode_lsb(0xFFFF, 16).unwrap(), 0xFFFF);
        assert_eq!(encode_lsb(u64::MAX, 64).unwrap(), u64::MAX);
        assert_eq!(encode_lsb(0, 1).unwrap(), 0);
    }

    #[test]
    fn encode_lsb_invalid_num_bits() {
        assert!(encode_lsb(0x1234, 0).is_err());
        assert!(encode_lsb(0x1234, 65).is_err());
    }

    #[test]
    fn decode_lsb_p0_basic_no_wrap() {
        // v_ref=100, k=4. Window [100, 115].
        assert_eq!(decode_lsb(0x4, 100, 4, 0).unwrap(), 100);
        assert_eq!(decode_lsb(0x0, 100, 4, 0).unwrap(), 112);
        assert_eq!(decode_lsb(0xF, 100, 4, 0).unwrap(), 111);
    }

    #[test]
    fn decode_lsb_p_positive_shifts_window_left() {
        // v_ref=100, k=4, p=2. Window [98, 113].
        assert_eq!(decode_lsb(0x2, 100, 4, 2).unwrap(), 98);
        assert_eq!(decode_lsb(0x1, 100, 4, 2).unwrap(), 113);
    }

    #[test]
    fn decode_lsb_wrapping_around_max_u64() {
        let k = 4;
        let ref_val = u64::MAX - 5;
        assert_eq!(decode_lsb(ref_val & 0xF, ref_val, k, 0).unwrap(), ref_val);
        assert_eq!(decode_lsb(0, ref_val, k, 0).unwrap(), 0);
        assert_eq!(decode_lsb(3, ref_val, k, 0).unwrap(), 3);
    }

    #[test]
    fn decode_lsb_rejects_oversized_lsbs() {
        assert!(decode_lsb(0x10, 10, 3, 0).is_err());
    }

    #[test]
    fn encode_decode_roundtrip_within_window() {
        for (value, reference, k, p) in [
            (1000u64, 995u64, 16u8, 32767i64),
            (0x12345u64, 0x12340u64, 14u8, 8191i64),
            (42u64, 40u64, 4u8, 3i64),
        ] {
            assert!(is_value_in_lsb_interval(value, reference, k, p));
            let lsbs = encode_lsb(value, k).unwrap();
            assert_eq!(decode_lsb(lsbs, reference, k, p).unwrap(), value);
        }
    }

    #[test]
    fn value_in_lsb_interval_verifies_correctly() {
        // p=0, v_ref=10, k=4. Window [10, 25].
        assert!(is_value_in_lsb_interval(12, 10, 4, 0));
        assert!(is_value_in_lsb_interval(25, 10, 4, 0));
        assert!(is_value_in_lsb_interval(10, 10, 4, 0));
        assert!(!is_value_in_lsb_interval(9, 10, 4, 0));
        assert!(!is_value_in_lsb_interval(26, 10, 4, 0));

        // p>0, v_ref=100, k=5, p=15. Window [85, 116].
        assert!(is_value_in_lsb_interval(85, 100, 5, 15));
        assert!(is_value_in_lsb_interval(116, 100, 5, 15));
        assert!(!is_value_in_lsb_interval(84, 100, 5, 15));
        assert!(!is_value_in_lsb_interval(117, 100, 5, 15));

        // Invalid k values
        assert!(!is_value_in_lsb_interval(10, 10, 0, 0));
        assert!(!is_value_in_lsb_interval(10, 10, 65, 0));
        assert!(is_value_in_lsb_interval(12345, 67890, 64, 0));
    }

    #[test]
    fn field_scaling_with_factor() {
        let (scaled, residue) = field_scaling(1448, 1448 * 7 + 100);
        assert_eq!(scaled, 7);
        assert_eq!(residue, 100);
    }

    #[test]
    fn field_scaling_zero_factor_disables() {
        let (scaled, residue) = field_scaling(0, 0xDEADBEEF);
        assert_eq!(scaled, 0);
        assert_eq!(residue, 0xDEADBEEF);
    }
}
