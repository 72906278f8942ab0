//! ROHC profile identifiers and packet type tags.

use serde::{Deserialize, Serialize};

use crate::constants::{
    PROFILE_ID_IP_ONLY, PROFILE_ID_RTP_UDP_IP, PROFILE_ID_TCP_IP, PROFILE_ID_UDP_IP,
    PROFILE_ID_UNCOMPRESSED,
};

/// ROHC profile identifiers (RFC 3095 / RFC 6846 registrations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum RohcProfile {
    /// Uncompressed profile (0x0000).
    Uncompressed,
    /// RTP/UDP/IP profile (0x0001).
    RtpUdpIp,
    /// UDP/IP profile (0x0002).
    UdpIp,
    /// IP-only profile (0x0003).
    Ip,
    /// TCP/IP profile (0x0006), the one implemented by this crate.
    TcpIp,
    /// Unknown or unsupported profile.
    Unknown(u8),
}

impl From<u8> for RohcProfile {
    fn from(value: u8) -> Self {
        match value {
            PROFILE_ID_UNCOMPRESSED => Self::Uncompressed,
            PROFILE_ID_RTP_UDP_IP => Self::RtpUdpIp,
            PROFILE_ID_UDP_IP => Self::UdpIp,
            PROFILE_ID_IP_ONLY => Self::Ip,
            PROFILE_ID_TCP_IP => Self::TcpIp,
            other => Self::Unknown(other),
        }
    }
}

impl From<RohcProfile> for u8 {
    fn from(value: RohcProfile) -> Self {
        match value {
            RohcProfile::Uncompressed => PROFILE_ID_UNCOMPRESSED,
            RohcProfile::RtpUdpIp => PROFILE_ID_RTP_UDP_IP,
            RohcProfile::UdpIp => PROFILE_ID_UDP_IP,
            RohcProfile::Ip => PROFILE_ID_IP_ONLY,
            RohcProfile::TcpIp => PROFILE_ID_TCP_IP,
            RohcProfile::Unknown(other) => other,
        }
    }
}

/// The packet formats a TCP-profile compressor can emit.
///
/// IR and IR-DYN carry the synchronizing chains; the remaining seventeen
/// are the compressed-order (CO) base headers of RFC 6846 Section 7.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RohcPacketType {
    Ir,
    IrDyn,
    CoCommon,
    Rnd1,
    Rnd2,
    Rnd3,
    Rnd4,
    Rnd5,
    Rnd6,
    Rnd7,
    Rnd8,
    Seq1,
    Seq2,
    Seq3,
    Seq4,
    Seq5,
    Seq6,
    Seq7,
    Seq8,
}

impl RohcPacketType {
    /// Whether this format carries the full static chain.
    #[inline]
    pub fn is_ir(self) -> bool {
        self == Self::Ir
    }

    /// Whether this is one of the compressed-order base headers.
    #[inline]
    pub fn is_co(self) -> bool {
        !matches!(self, Self::Ir | Self::IrDyn)
    }

    /// Whether the format's base header is protected by the 7-bit CRC
    /// (the short formats use the 3-bit CRC).
    #[inline]
    pub fn uses_crc7(self) -> bool {
        matches!(self, Self::CoCommon | Self::Rnd8 | Self::Seq8)
    }
}

impl std::fmt::Display for RohcPacketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ir => "IR",
            Self::IrDyn => "IR-DYN",
            Self::CoCommon => "co_common",
            Self::Rnd1 => "rnd_1",
            Self::Rnd2 => "rnd_2",
            Self::Rnd3 => "rnd_3",
            Self::Rnd4 => "rnd_4",
            Self::Rnd5 => "rnd_5",
            Self::Rnd6 => "rnd_6",
            Self::Rnd7 => "rnd_7",
            Self::Rnd8 => "rnd_8",
            Self::Seq1 => "seq_1",
            Self::Seq2 => "seq_2",
            Self::Seq3 => "seq_3",
            Self::Seq4 => "seq_4",
            Self::Seq5 => "seq_5",
            Self::Seq6 => "seq_6",
            Self::Seq7 => "seq_7",
            Self::Seq8 => "seq_8",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_roundtrip_through_u8() {
        for profile in [
            RohcProfile::Uncompressed,
            RohcProfile::RtpUdpIp,
            RohcProfile::UdpIp,
            RohcProfile::Ip,
            RohcProfile::TcpIp,
        ] {
            assert_eq!(RohcProfile::from(u8::from(profile)), profile);
        }
        assert_eq!(RohcProfile::from(0xAB), RohcProfile::Unknown(0xAB));
    }

    #[test]
    fn packet_type_classification() {
        assert!(RohcPacketType::Ir.is_ir());
        assert!(!RohcPacketType::IrDyn.is_ir());
        assert!(!RohcPacketType::IrDyn.is_co());
        assert!(RohcPacketType::Seq2.is_co());
        assert!(RohcPacketType::CoCommon.uses_crc7());
        assert!(RohcPacketType::Seq8.uses_crc7());
        assert!(!RohcPacketType::Seq1.uses_crc7());
    }

    #[test]
    fn packet_type_display() {
        assert_eq!(format!("{}", RohcPacketType::CoCommon), "co_common");
        assert_eq!(format!("{}", RohcPacketType::Seq2), "seq_2");
        assert_eq!(format!("{}", RohcPacketType::IrDyn), "IR-DYN");
    }
}
