//! Generic protocol constants and bitmasks.
//!
//! Defines constants broadly applicable across the ROHC framework or
//! standard protocol identifiers. Profile-specific constants (packet
//! discriminators, LSB widths) reside in the profile module.

// --- ROHC Packet Structure Constants (RFC 3095, Sec 5.2.3) ---

/// Mask for the prefix of an Add-CID octet.
pub const ROHC_ADD_CID_PREFIX_MASK: u8 = 0b1110_0000; // E0
/// Expected prefix value for an Add-CID octet.
pub const ROHC_ADD_CID_PREFIX_VALUE: u8 = 0b1110_0000; // E0
/// Mask to extract the small CID (0-15) from an Add-CID octet.
pub const ROHC_SMALL_CID_MASK: u8 = 0x0F;

// --- ROHC Profile Identifiers ---

/// ROHC Uncompressed Profile Identifier (0x0000).
pub const PROFILE_ID_UNCOMPRESSED: u8 = 0x00;
/// ROHC RTP/UDP/IP Profile Identifier (0x0001).
pub const PROFILE_ID_RTP_UDP_IP: u8 = 0x01;
/// ROHC UDP/IP Profile Identifier (0x0002).
pub const PROFILE_ID_UDP_IP: u8 = 0x02;
/// ROHC IP-only Profile Identifier (0x0003).
pub const PROFILE_ID_IP_ONLY: u8 = 0x03;
/// ROHC TCP/IP Profile Identifier (0x0006).
pub const PROFILE_ID_TCP_IP: u8 = 0x06;

// --- Standard Internet Protocol Numbers (IANA Assigned) ---

/// IPv6 Hop-by-Hop Options extension header.
pub const IP_PROTOCOL_HOPOPTS: u8 = 0;
/// IP protocol number for TCP (Transmission Control Protocol).
pub const IP_PROTOCOL_TCP: u8 = 6;
/// IP protocol number for IPv4 encapsulated in IP (tunneling).
pub const IP_PROTOCOL_IPIP: u8 = 4;
/// IP protocol number for IPv6 encapsulated in IP (tunneling).
pub const IP_PROTOCOL_IPV6: u8 = 41;
/// IPv6 Routing extension header.
pub const IP_PROTOCOL_ROUTING: u8 = 43;
/// IP protocol number for GRE (Generic Routing Encapsulation).
pub const IP_PROTOCOL_GRE: u8 = 47;
/// IP protocol number for ESP (Encapsulating Security Payload).
pub const IP_PROTOCOL_ESP: u8 = 50;
/// IP protocol number for AH (Authentication Header).
pub const IP_PROTOCOL_AH: u8 = 51;
/// IPv6 Destination Options extension header.
pub const IP_PROTOCOL_DSTOPTS: u8 = 60;
/// IP protocol number for MINE (Minimal IP-in-IP Encapsulation, RFC 2004).
pub const IP_PROTOCOL_MINE: u8 = 55;

/// Returns whether `protocol` names an IPv6 extension header the profile
/// understands.
#[inline]
pub const fn is_ipv6_extension(protocol: u8) -> bool {
    matches!(
        protocol,
        IP_PROTOCOL_HOPOPTS
            | IP_PROTOCOL_ROUTING
            | IP_PROTOCOL_GRE
            | IP_PROTOCOL_DSTOPTS
            | IP_PROTOCOL_MINE
            | IP_PROTOCOL_AH
    )
}

/// Returns whether `protocol` names a tunneled IP header (the chain walker
/// keeps descending through these).
#[inline]
pub const fn is_ip_tunneling(protocol: u8) -> bool {
    matches!(protocol, IP_PROTOCOL_IPIP | IP_PROTOCOL_IPV6)
}

// --- General Header Field Constants ---

/// Minimum IPv4 header length in bytes (5 words * 4 bytes/word).
pub const IPV4_MIN_HEADER_LENGTH_BYTES: usize = 20;
/// Standard IPv4 IHL (Internet Header Length) in 32-bit words (no options).
pub const IPV4_STANDARD_IHL: u8 = 5;
/// Fixed IPv6 base header length in bytes.
pub const IPV6_HEADER_LENGTH_BYTES: usize = 40;
/// Minimum TCP header length in bytes (data offset 5).
pub const TCP_MIN_HEADER_LENGTH_BYTES: usize = 20;
/// Minimum TCP data offset in 32-bit words.
pub const TCP_MIN_DATA_OFFSET: u8 = 5;
/// Maximum TCP data offset in 32-bit words.
pub const TCP_MAX_DATA_OFFSET: u8 = 15;

// --- TCP option kinds (IANA) ---

/// End of Option List.
pub const TCP_OPT_EOL: u8 = 0;
/// No-Operation.
pub const TCP_OPT_NOP: u8 = 1;
/// Maximum Segment Size.
pub const TCP_OPT_MAXSEG: u8 = 2;
/// Window Scale.
pub const TCP_OPT_WINDOW: u8 = 3;
/// SACK Permitted (RFC 2018).
pub const TCP_OPT_SACK_PERMITTED: u8 = 4;
/// Selective Acknowledgment (RFC 2018).
pub const TCP_OPT_SACK: u8 = 5;
/// Timestamps (RFC 7323).
pub const TCP_OPT_TIMESTAMP: u8 = 8;

/// Wire length of the MSS option.
pub const TCP_OLEN_MAXSEG: usize = 4;
/// Wire length of the Window Scale option.
pub const TCP_OLEN_WINDOW: usize = 3;
/// Wire length of the SACK-Permitted option.
pub const TCP_OLEN_SACK_PERMITTED: usize = 2;
/// Wire length of the Timestamp option.
pub const TCP_OLEN_TIMESTAMP: usize = 10;
