//! Protocol header types for the TCP/IP compression profile.
//!
//! Defines the structured view of an uncompressed packet: the ordered IP
//! header stack (outermost first), IPv6 extension headers, and the TCP
//! header with its parsed option list. These structures are produced by
//! the header parser and consumed by the classifier and chain builders;
//! all multi-byte values are host order (wire conversion happens at the
//! parse/serialize boundary only).

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::constants::{
    IP_PROTOCOL_AH, IP_PROTOCOL_DSTOPTS, IP_PROTOCOL_GRE, IP_PROTOCOL_HOPOPTS, IP_PROTOCOL_MINE,
    IP_PROTOCOL_ROUTING, TCP_OPT_EOL, TCP_OPT_MAXSEG, TCP_OPT_NOP, TCP_OPT_SACK,
    TCP_OPT_SACK_PERMITTED, TCP_OPT_TIMESTAMP, TCP_OPT_WINDOW,
};
use crate::types::{AckNumber, IpId, SeqNumber, Timestamp};

/// A parsed uncompressed IP/TCP packet: the full header chain plus the
/// offsets needed to splice the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpIpHeaders {
    /// IP headers, outermost first, innermost last. Never empty.
    pub ip_headers: Vec<IpHeader>,
    /// The TCP header terminating the chain.
    pub tcp: TcpHeader,
    /// Total length of all headers in the source packet; equals the
    /// payload offset returned to the caller.
    pub header_len: usize,
    /// Length of the TCP payload in the source packet.
    pub payload_len: usize,
}

impl TcpIpHeaders {
    /// The innermost IP header (the one carrying TCP).
    #[inline]
    pub fn innermost_ip(&self) -> &IpHeader {
        self.ip_headers
            .last()
            .expect("header chain always holds at least one IP header")
    }
}

/// One IP header of the stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IpHeader {
    V4(Ipv4Header),
    V6(Ipv6Header),
}

impl IpHeader {
    /// TTL (IPv4) or Hop Limit (IPv6).
    #[inline]
    pub fn ttl_hopl(&self) -> u8 {
        match self {
            Self::V4(v4) => v4.ttl,
            Self::V6(v6) => v6.hop_limit,
        }
    }

    /// Differentiated Services Code Point.
    #[inline]
    pub fn dscp(&self) -> u8 {
        match self {
            Self::V4(v4) => v4.dscp,
            Self::V6(v6) => v6.dscp,
        }
    }

    /// ECN bits of the traffic class / TOS byte.
    #[inline]
    pub fn ecn(&self) -> u8 {
        match self {
            Self::V4(v4) => v4.ecn,
            Self::V6(v6) => v6.ecn,
        }
    }
}

/// An IPv4 header without options (IHL is always 5 for this profile).
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Header {
    /// Differentiated Services Code Point.
    pub dscp: u8,
    /// Explicit Congestion Notification bits.
    pub ecn: u8,
    /// Total length of the IP datagram in bytes.
    pub total_length: u16,
    /// Identification field, host order.
    pub identification: IpId,
    /// "Don't Fragment" flag.
    pub dont_fragment: bool,
    /// Time To Live.
    pub ttl: u8,
    /// Protocol carried by this header.
    pub protocol: u8,
    /// Header checksum (recomputed by the decompressor, never sent).
    pub checksum: u16,
    /// Source address.
    #[serde_as(as = "DisplayFromStr")]
    pub src_addr: Ipv4Addr,
    /// Destination address.
    #[serde_as(as = "DisplayFromStr")]
    pub dst_addr: Ipv4Addr,
}

/// An IPv6 header and its extension headers, in wire order.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv6Header {
    /// Differentiated Services Code Point from the traffic class.
    pub dscp: u8,
    /// ECN bits from the traffic class.
    pub ecn: u8,
    /// Flow label, 20 bits, host order.
    pub flow_label: u32,
    /// Payload length field.
    pub payload_length: u16,
    /// Next Header value of the base header (first extension or final
    /// protocol).
    pub next_header: u8,
    /// Hop Limit.
    pub hop_limit: u8,
    /// Source address.
    #[serde_as(as = "DisplayFromStr")]
    pub src_addr: Ipv6Addr,
    /// Destination address.
    #[serde_as(as = "DisplayFromStr")]
    pub dst_addr: Ipv6Addr,
    /// Extension headers between the base header and the next IP/TCP
    /// header, in wire order.
    pub extensions: Vec<Ipv6Extension>,
}

/// An IPv6 extension header understood by the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ipv6Extension {
    HopByHop(RawExtension),
    Routing(RawExtension),
    Destination(RawExtension),
    Gre(GreHeader),
    Mine(MineHeader),
    Ah(AhHeader),
}

impl Ipv6Extension {
    /// The IANA protocol number identifying this extension kind.
    pub fn protocol(&self) -> u8 {
        match self {
            Self::HopByHop(_) => IP_PROTOCOL_HOPOPTS,
            Self::Routing(_) => IP_PROTOCOL_ROUTING,
            Self::Destination(_) => IP_PROTOCOL_DSTOPTS,
            Self::Gre(_) => IP_PROTOCOL_GRE,
            Self::Mine(_) => IP_PROTOCOL_MINE,
            Self::Ah(_) => IP_PROTOCOL_AH,
        }
    }

    /// Next Header value carried inside the extension.
    pub fn next_header(&self) -> u8 {
        match self {
            Self::HopByHop(raw) | Self::Routing(raw) | Self::Destination(raw) => raw.next_header,
            Self::Gre(gre) => gre.tunneled_protocol(),
            Self::Mine(mine) => mine.next_header,
            Self::Ah(ah) => ah.next_header,
        }
    }
}

/// A generic (Hop-by-Hop, Routing, Destination) extension header: next
/// header, length octet, and the remaining bytes verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExtension {
    /// Next Header value.
    pub next_header: u8,
    /// Hdr Ext Len octet: length in 8-byte units, not counting the first.
    pub length: u8,
    /// Bytes after the (next_header, length) pair; `(length + 1) * 8 - 2`
    /// of them.
    pub value: Vec<u8>,
}

impl RawExtension {
    /// Total wire length of the extension header.
    #[inline]
    pub fn wire_len(&self) -> usize {
        (self.length as usize + 1) * 8
    }
}

/// A GRE header (RFC 2784/2890) treated as an extension of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreHeader {
    /// Checksum-present flag.
    pub c_flag: bool,
    /// Key-present flag.
    pub k_flag: bool,
    /// Sequence-present flag.
    pub s_flag: bool,
    /// EtherType of the tunneled protocol; only IPv4 (0x0800) and IPv6
    /// (0x86DD) are compressible.
    pub protocol: u16,
    /// Checksum, when `c_flag` is set.
    pub checksum: Option<u16>,
    /// Key, when `k_flag` is set.
    pub key: Option<u32>,
    /// Sequence number, when `s_flag` is set.
    pub sequence: Option<u32>,
}

impl GreHeader {
    const ETHERTYPE_IPV4: u16 = 0x0800;

    /// IANA protocol number of the tunneled header.
    #[inline]
    pub fn tunneled_protocol(&self) -> u8 {
        if self.protocol == Self::ETHERTYPE_IPV4 {
            crate::constants::IP_PROTOCOL_IPIP
        } else {
            crate::constants::IP_PROTOCOL_IPV6
        }
    }

    /// Total wire length of the GRE header.
    #[inline]
    pub fn wire_len(&self) -> usize {
        4 + 4 * (self.c_flag as usize + self.k_flag as usize + self.s_flag as usize)
    }
}

/// A minimal encapsulation header (RFC 2004).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MineHeader {
    /// Protocol of the encapsulated datagram.
    pub next_header: u8,
    /// Original-source-present bit.
    pub s_bit: bool,
    /// Reserved bits following the S bit.
    pub res_bits: u8,
    /// Header checksum.
    pub checksum: u16,
    /// Original destination address.
    pub orig_dest: u32,
    /// Original source address, when `s_bit` is set.
    pub orig_src: Option<u32>,
}

impl MineHeader {
    /// Total wire length of the header.
    #[inline]
    pub fn wire_len(&self) -> usize {
        if self.s_bit {
            12
        } else {
            8
        }
    }
}

/// An Authentication Header (RFC 4302).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AhHeader {
    /// Next Header value.
    pub next_header: u8,
    /// Payload Len field: AH length in 4-byte units minus 2.
    pub length: u8,
    /// Security Parameters Index.
    pub spi: u32,
    /// Sequence number.
    pub sequence: u32,
    /// Integrity Check Value bytes.
    pub icv: Vec<u8>,
}

impl AhHeader {
    /// Total wire length of the header.
    #[inline]
    pub fn wire_len(&self) -> usize {
        (self.length as usize + 2) * 4
    }
}

/// A TCP header with parsed options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpHeader {
    /// Source port.
    pub src_port: u16,
    /// Destination port.
    pub dst_port: u16,
    /// Sequence number, host order.
    pub seq_number: SeqNumber,
    /// Acknowledgment number, host order.
    pub ack_number: AckNumber,
    /// Data offset in 32-bit words (5..15).
    pub data_offset: u8,
    /// The four reserved bits between data offset and the ECN flags.
    pub res_flags: u8,
    /// CWR and ECE flags.
    pub ecn_flags: u8,
    /// URG flag.
    pub urg_flag: bool,
    /// ACK flag.
    pub ack_flag: bool,
    /// PSH flag.
    pub psh_flag: bool,
    /// RST, SYN and FIN as a 3-bit group, RST most significant.
    pub rsf_flags: u8,
    /// Receive window.
    pub window: u16,
    /// Checksum (always carried irregularly).
    pub checksum: u16,
    /// Urgent pointer.
    pub urg_ptr: u16,
    /// Parsed options in wire order.
    pub options: Vec<TcpOption>,
    /// The raw option bytes, padding included, for IR item values.
    pub options_raw: Vec<u8>,
}

impl TcpHeader {
    /// Header length in bytes (data offset scaled to octets).
    #[inline]
    pub fn header_len(&self) -> usize {
        (self.data_offset as usize) * 4
    }

    /// Whether the header carries options (data offset above 5).
    #[inline]
    pub fn has_options(&self) -> bool {
        self.data_offset > crate::constants::TCP_MIN_DATA_OFFSET
    }
}

/// One SACK block (RFC 2018), edges in host order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SackBlock {
    /// Left edge of the block.
    pub start: u32,
    /// Right edge of the block.
    pub end: u32,
}

/// A parsed TCP option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TcpOption {
    /// End of Option List; terminates option parsing.
    Eol,
    /// No-Operation padding.
    Nop,
    /// Maximum Segment Size.
    Mss(u16),
    /// Window Scale shift count.
    WindowScale(u8),
    /// SACK Permitted.
    SackPermitted,
    /// Selective acknowledgment blocks (1..=4).
    Sack(Vec<SackBlock>),
    /// Timestamps: TSval and TSecr.
    Timestamp { tsval: Timestamp, tsecr: Timestamp },
    /// Any other option, carried verbatim.
    Generic { kind: u8, data: Vec<u8> },
}

impl TcpOption {
    /// The option's kind octet.
    pub fn kind(&self) -> u8 {
        match self {
            Self::Eol => TCP_OPT_EOL,
            Self::Nop => TCP_OPT_NOP,
            Self::Mss(_) => TCP_OPT_MAXSEG,
            Self::WindowScale(_) => TCP_OPT_WINDOW,
            Self::SackPermitted => TCP_OPT_SACK_PERMITTED,
            Self::Sack(_) => TCP_OPT_SACK,
            Self::Timestamp { .. } => TCP_OPT_TIMESTAMP,
            Self::Generic { kind, .. } => *kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_ip_is_last_of_stack() {
        let outer = IpHeader::V4(Ipv4Header {
            dscp: 0,
            ecn: 0,
            total_length: 60,
            identification: IpId::new(1),
            dont_fragment: true,
            ttl: 64,
            protocol: crate::constants::IP_PROTOCOL_IPIP,
            checksum: 0,
            src_addr: Ipv4Addr::new(10, 0, 0, 1),
            dst_addr: Ipv4Addr::new(10, 0, 0, 2),
        });
        let inner = IpHeader::V4(Ipv4Header {
            dscp: 0,
            ecn: 0,
            total_length: 40,
            identification: IpId::new(9),
            dont_fragment: true,
            ttl: 63,
            protocol: crate::constants::IP_PROTOCOL_TCP,
            checksum: 0,
            src_addr: Ipv4Addr::new(192, 168, 0, 1),
            dst_addr: Ipv4Addr::new(192, 168, 0, 2),
        });
        let headers = TcpIpHeaders {
            ip_headers: vec![outer, inner.clone()],
            tcp: minimal_tcp(),
            header_len: 60,
            payload_len: 0,
        };
        assert_eq!(headers.innermost_ip(), &inner);
    }

    #[test]
    fn option_kinds_match_iana_numbers() {
        assert_eq!(TcpOption::Eol.kind(), 0);
        assert_eq!(TcpOption::Nop.kind(), 1);
        assert_eq!(TcpOption::Mss(1460).kind(), 2);
        assert_eq!(TcpOption::WindowScale(7).kind(), 3);
        assert_eq!(TcpOption::SackPermitted.kind(), 4);
        assert_eq!(TcpOption::Sack(vec![]).kind(), 5);
        assert_eq!(
            TcpOption::Timestamp {
                tsval: Timestamp::new(1),
                tsecr: Timestamp::new(2)
            }
            .kind(),
            8
        );
        assert_eq!(
            TcpOption::Generic {
                kind: 254,
                data: vec![]
            }
            .kind(),
            254
        );
    }

    #[test]
    fn extension_wire_lengths() {
        let raw = RawExtension {
            next_header: 6,
            length: 1,
            value: vec![0; 14],
        };
        assert_eq!(raw.wire_len(), 16);

        let gre = GreHeader {
            c_flag: true,
            k_flag: false,
            s_flag: true,
            protocol: 0x0800,
            checksum: Some(0),
            key: None,
            sequence: Some(7),
        };
        assert_eq!(gre.wire_len(), 12);

        let ah = AhHeader {
            next_header: 6,
            length: 4,
            spi: 0x100,
            sequence: 1,
            icv: vec![0; 12],
        };
        assert_eq!(ah.wire_len(), 24);
    }

    fn minimal_tcp() -> TcpHeader {
        TcpHeader {
            src_port: 1,
            dst_port: 2,
            seq_number: SeqNumber::new(0),
            ack_number: AckNumber::new(0),
            data_offset: 5,
            res_flags: 0,
            ecn_flags: 0,
            urg_flag: false,
            ack_flag: false,
            psh_flag: false,
            rsf_flags: 0,
            window: 0,
            checksum: 0,
            urg_ptr: 0,
            options: Vec::new(),
            options_raw: Vec::new(),
        }
    }
}
