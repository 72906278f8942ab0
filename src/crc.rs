//! CRC (Cyclic Redundancy Check) calculation utilities.
//!
//! Wraps the `crc` crate to provide the three CRC algorithms used by the
//! TCP profile: the 3-bit and 7-bit CRCs protecting compressed base
//! headers and the 8-bit CRC protecting IR/IR-DYN packets (RFC 3095
//! Section 5.9, reused by RFC 6846). A `CrcCalculators` struct keeps the
//! algorithm instances alive for reuse on the per-packet hot path.

use crc::{Crc, CRC_3_ROHC, CRC_7_ROHC, CRC_8_ROHC};
use std::fmt;

/// Pre-initialized CRC algorithm instances for ROHC.
///
/// Intended for reuse to avoid re-creating `Crc<u8>` instances on every
/// compressed packet.
pub struct CrcCalculators {
    crc3_calculator: Crc<u8>,
    crc7_calculator: Crc<u8>,
    crc8_calculator: Crc<u8>,
}

impl fmt::Debug for CrcCalculators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrcCalculators")
            .field("crc3_calculator", &format_args!("Crc<u8>(ROHC_CRC3_Algo)"))
            .field("crc7_calculator", &format_args!("Crc<u8>(ROHC_CRC7_Algo)"))
            .field("crc8_calculator", &format_args!("Crc<u8>(ROHC_CRC8_Algo)"))
            .finish()
    }
}

impl CrcCalculators {
    /// Creates a new `CrcCalculators` instance with the ROHC CRC-3, CRC-7
    /// and CRC-8 algorithms initialized.
    pub fn new() -> Self {
        Self {
            crc3_calculator: Crc::<u8>::new(&CRC_3_ROHC),
            crc7_calculator: Crc::<u8>::new(&CRC_7_ROHC),
            crc8_calculator: Crc::<u8>::new(&CRC_8_ROHC),
        }
    }

    /// Calculates the ROHC 3-bit CRC over `input`.
    ///
    /// Used by the short rnd_/seq_ base headers. The result ranges from
    /// `0x00` to `0x07`.
    #[inline]
    pub fn crc3(&self, input: &[u8]) -> u8 {
        self.crc3_calculator.checksum(input)
    }

    /// Calculates the ROHC 7-bit CRC over `input`.
    ///
    /// Used by seq_8, rnd_8 and co_common base headers. The result ranges
    /// from `0x00` to `0x7F`.
    #[inline]
    pub fn crc7(&self, input: &[u8]) -> u8 {
        self.crc7_calculator.checksum(input)
    }

    /// Calculates the ROHC 8-bit CRC over `input`.
    ///
    /// Used by IR and IR-DYN packets, computed over the whole packet with
    /// the CRC field zeroed.
    #[inline]
    pub fn crc8(&self, input: &[u8]) -> u8 {
        self.crc8_calculator.checksum(input)
    }
}

impl Default for CrcCalculators {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_calculators_debug_format() {
        let calculators = CrcCalculators::new();
        let debug_str = format!("{:?}", calculators);
        assert!(debug_str.contains("CrcCalculators"));
        assert!(debug_str.contains("crc7_calculator: Crc<u8>(ROHC_CRC7_Algo)"));
    }

    #[test]
    fn rohc_crc8_standard_test_vector() {
        let calculators = CrcCalculators::new();
        let data = b"123456789";
        assert_eq!(
            calculators.crc8(data),
            0xD0,
            "CRC-8 mismatch for '123456789'. Expected ROHC-specific 0xD0."
        );
        assert_eq!(CRC_8_ROHC.check, 0xD0);
    }

    #[test]
    fn rohc_crc7_standard_test_vector() {
        let calculators = CrcCalculators::new();
        let data = b"123456789";
        assert_eq!(
            calculators.crc7(data),
            CRC_7_ROHC.check,
            "CRC-7 mismatch for '123456789' against the algorithm check value."
        );
    }

    #[test]
    fn rohc_crc3_standard_test_vector() {
        let calculators = CrcCalculators::new();
        let data = b"123456789";
        assert_eq!(
            calculators.crc3(data),
            0x06,
            "CRC-3 mismatch for '123456789'. Expected ROHC-specific 0x06."
        );
    }

    #[test]
    fn rohc_crc8_empty_input_is_init_value() {
        let calculators = CrcCalculators::new();
        assert_eq!(calculators.crc8(b""), 0xFF);
    }

    #[test]
    fn rohc_crc3_empty_input_is_init_value() {
        let calculators = CrcCalculators::new();
        assert_eq!(calculators.crc3(b""), 0x07);
    }

    #[test]
    fn rohc_crc7_empty_input_is_init_value() {
        let calculators = CrcCalculators::new();
        assert_eq!(calculators.crc7(b""), 0x7F);
    }

    #[test]
    fn crc_outputs_stay_in_width() {
        let calculators = CrcCalculators::new();
        let data_long = b"A longer test string for checking CRC output widths";
        assert!(calculators.crc3(data_long) <= 0x07);
        assert!(calculators.crc7(data_long) <= 0x7F);
    }
}
