//! Error types for the TCP/IP compression profile.
//!
//! Distinguishes between parsing errors (the uncompressed packet could not
//! be understood), building errors (a ROHC packet could not be constructed)
//! and compression errors (the context rejected the operation). The
//! `thiserror` crate is used for ergonomic error definitions.

use thiserror::Error;

use crate::types::ContextId;

/// Context types for parsing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseContext {
    Ipv4HeaderMin,
    Ipv6HeaderMin,
    Ipv6ExtensionHeader,
    GreHeader,
    AhHeader,
    MineHeader,
    TcpHeaderMin,
    TcpOptions,
    IrPacket,
    IrDynPacket,
    CoBaseHeader,
    IrregularChain,
    CompressedOptionList,
    CidPrefix,
}

impl std::fmt::Display for ParseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ipv4HeaderMin => "IPv4 header (minimum)",
            Self::Ipv6HeaderMin => "IPv6 header (minimum)",
            Self::Ipv6ExtensionHeader => "IPv6 extension header",
            Self::GreHeader => "GRE header",
            Self::AhHeader => "AH header",
            Self::MineHeader => "MINE header",
            Self::TcpHeaderMin => "TCP header (minimum)",
            Self::TcpOptions => "TCP options",
            Self::IrPacket => "IR packet",
            Self::IrDynPacket => "IR-DYN packet",
            Self::CoBaseHeader => "CO base header",
            Self::IrregularChain => "irregular chain",
            Self::CompressedOptionList => "compressed TCP option list",
            Self::CidPrefix => "CID prefix",
        };
        write!(f, "{}", s)
    }
}

/// Field types for structured error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Cid,
    NumLsbBits,
    IpVersion,
    IpIhl,
    IpProtocol,
    IpNextHeader,
    FragmentFlags,
    TcpDataOffset,
    TcpOptionKind,
    TcpOptionCount,
    MsnLsb,
    SeqLsb,
    AckLsb,
    IpIdLsb,
    WindowLsb,
    TtlLsb,
    BufferSize,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Cid => "CID",
            Self::NumLsbBits => "num_lsb_bits",
            Self::IpVersion => "IP version",
            Self::IpIhl => "IPv4 IHL",
            Self::IpProtocol => "IP protocol",
            Self::IpNextHeader => "IPv6 next header",
            Self::FragmentFlags => "IPv4 fragment flags",
            Self::TcpDataOffset => "TCP data offset",
            Self::TcpOptionKind => "TCP option kind",
            Self::TcpOptionCount => "TCP option count",
            Self::MsnLsb => "msn_lsb",
            Self::SeqLsb => "seq_lsb",
            Self::AckLsb => "ack_lsb",
            Self::IpIdLsb => "ip_id_lsb",
            Self::WindowLsb => "window_lsb",
            Self::TtlLsb => "ttl_lsb",
            Self::BufferSize => "buffer size",
        };
        write!(f, "{}", s)
    }
}

/// Network layer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkLayer {
    Ip,
    Ipv6Extension,
    Tcp,
}

impl std::fmt::Display for NetworkLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ip => "IP",
            Self::Ipv6Extension => "IPv6 extension",
            Self::Tcp => "TCP",
        };
        write!(f, "{}", s)
    }
}

/// Errors raised while parsing an uncompressed IP/TCP packet.
///
/// These indicate that the packet is malformed or exercises a path the
/// profile does not cover (fragments, IPv4 options, ESP, ...). Callers are
/// expected to route such packets to a different profile.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RohcParsingError {
    /// Insufficient data to parse a complete field or structure.
    #[error("Incomplete packet data: needed {needed} bytes, got {got} for {context}")]
    NotEnoughData {
        needed: usize,
        got: usize,
        context: ParseContext,
    },

    /// Invalid IP version found; only 4 and 6 are compressible.
    #[error("Invalid IP version: got {got}")]
    InvalidIpVersion { got: u8 },

    /// Unsupported protocol in a header chain (e.g. ESP, or non-TCP
    /// transport at the end of the chain).
    #[error("Unsupported protocol: {protocol_id} in {layer} header")]
    UnsupportedProtocol {
        protocol_id: u8,
        layer: NetworkLayer,
    },

    /// A field contained a value the profile cannot compress.
    #[error("Uncompressible value for field '{field}': expected {expected}, got {got}")]
    UncompressibleFieldValue {
        field: Field,
        expected: u32,
        got: u32,
    },

    /// The packet is an IP fragment; fragments are rejected upstream.
    #[error("IP fragment cannot be compressed by the TCP profile")]
    IpFragment,
}

/// Errors raised while building a ROHC packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RohcBuildingError {
    /// Provided output buffer was too small for the packet being built.
    #[error("Buffer too small: needed {needed} bytes, have {available} for {context}")]
    BufferTooSmall {
        needed: usize,
        available: usize,
        context: ParseContext,
    },

    /// Context information insufficient to build the packet.
    #[error("Context insufficient for building packet: missing {field}")]
    ContextInsufficient { field: Field },

    /// Invalid value provided for a field during packet construction.
    #[error(
        "Invalid value for field '{field}' during packet building: {value} exceeds {max_bits}-bit limit"
    )]
    InvalidFieldValueForBuild { field: Field, value: u32, max_bits: u8 },
}

/// Errors raised by compression operations on a flow context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressionError {
    /// The packet does not belong to this context (addresses, ports or
    /// chain shape differ); the caller should look up another context.
    #[error("Packet does not belong to context {cid}")]
    ContextMismatch { cid: ContextId },

    /// The packet belongs to the flow but exercises an uncompressible
    /// path of the profile.
    #[error("Context {cid} cannot compress this packet: {reason}")]
    Uncompressible { cid: ContextId, reason: &'static str },

    /// Packet building failed during compression.
    #[error("Packet building failed: {0}")]
    BuildingFailed(#[from] RohcBuildingError),
}

/// Top-level error type consolidating all specific error categories.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RohcError {
    /// Error while parsing the uncompressed packet.
    #[error("Parsing error: {0}")]
    Parsing(#[from] RohcParsingError),

    /// Error while building the compressed packet.
    #[error("Building error: {0}")]
    Building(#[from] RohcBuildingError),

    /// Error during the compression operation itself.
    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_enough_data_error_display() {
        let err = RohcParsingError::NotEnoughData {
            needed: 20,
            got: 12,
            context: ParseContext::TcpHeaderMin,
        };
        assert_eq!(
            format!("{}", err),
            "Incomplete packet data: needed 20 bytes, got 12 for TCP header (minimum)"
        );
    }

    #[test]
    fn unsupported_protocol_error_display() {
        let err = RohcParsingError::UnsupportedProtocol {
            protocol_id: 50,
            layer: NetworkLayer::Ipv6Extension,
        };
        assert_eq!(
            format!("{}", err),
            "Unsupported protocol: 50 in IPv6 extension header"
        );
    }

    #[test]
    fn rohc_error_from_parsing_error() {
        let parsing_err = RohcParsingError::IpFragment;
        let rohc_err = RohcError::from(parsing_err.clone());
        match rohc_err {
            RohcError::Parsing(inner) => assert_eq!(inner, parsing_err),
            _ => panic!("Incorrect RohcError variant"),
        }
    }

    #[test]
    fn rohc_error_from_building_error() {
        let building_err = RohcBuildingError::BufferTooSmall {
            needed: 8,
            available: 4,
            context: ParseContext::CoBaseHeader,
        };
        let rohc_err = RohcError::from(building_err.clone());
        match rohc_err {
            RohcError::Building(inner) => assert_eq!(inner, building_err),
            _ => panic!("Incorrect RohcError variant"),
        }
    }

    #[test]
    fn compression_error_context_mismatch_display() {
        let err = CompressionError::ContextMismatch { cid: 7.into() };
        assert_eq!(format!("{}", err), "Packet does not belong to context CID7");
    }

    #[test]
    fn enum_display_implementations() {
        assert_eq!(format!("{}", ParseContext::CoBaseHeader), "CO base header");
        assert_eq!(format!("{}", Field::SeqLsb), "seq_lsb");
        assert_eq!(format!("{}", NetworkLayer::Tcp), "TCP");
    }
}
