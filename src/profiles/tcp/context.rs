//! Compressor context for the TCP/IP profile.
//!
//! Holds all per-flow state: the IP header context stack (outermost
//! first), the snapshot of the last compressed TCP header, the Master
//! Sequence Number, the scaled-field residues, the ACK stride detector
//! and the option interning table. Every value is host order; the chain
//! builders convert at the wire boundary.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::encodings::field_scaling;
use crate::packet_defs::{RohcPacketType, RohcProfile};
use crate::types::{ContextId, IpId, Msn, SeqNumber};

use super::constants::{ACK_STRIDE_ESTABLISHMENT_THRESHOLD, ACK_STRIDE_MIN};
use super::options::TcpOptionsTable;
use super::protocol_types::{IpHeader, Ipv6Extension, TcpHeader, TcpIpHeaders};

/// IP-ID behavior classes of RFC 6846 Section 6.3.3 plus the internal
/// `Unknown` transient used before the first delta is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpIdBehavior {
    /// Not yet classified; only possible before the second packet of a
    /// flow (or while the IP-ID repeats verbatim).
    #[default]
    Unknown,
    /// Constant zero.
    Zero,
    /// Increments by one per packet in network order.
    Sequential,
    /// Increments by one per packet when viewed byte-swapped.
    SequentialSwapped,
    /// No exploitable pattern.
    Random,
}

impl IpIdBehavior {
    /// The two-bit wire value of the behavior. `Unknown` is announced as
    /// `Random`, the safe over-approximation.
    pub fn wire_value(self) -> u8 {
        use super::constants::*;
        match self {
            Self::Sequential => IP_ID_BEHAVIOR_SEQUENTIAL,
            Self::SequentialSwapped => IP_ID_BEHAVIOR_SEQUENTIAL_SWAPPED,
            Self::Random | Self::Unknown => IP_ID_BEHAVIOR_RANDOM,
            Self::Zero => IP_ID_BEHAVIOR_ZERO,
        }
    }

    /// Whether the seq_* family of base headers applies.
    #[inline]
    pub fn is_sequential_kind(self) -> bool {
        matches!(self, Self::Sequential | Self::SequentialSwapped)
    }

    /// Advances the behavior state machine with the IP-ID observed on the
    /// current packet, `last` being the previous packet's IP-ID.
    pub fn updated(self, last: IpId, current: IpId) -> Self {
        match self {
            Self::Sequential => {
                if last.wrapping_add(1) == current {
                    Self::Sequential
                } else {
                    Self::Random
                }
            }
            Self::SequentialSwapped => {
                if last.swapped().wrapping_add(1) == current.swapped() {
                    Self::SequentialSwapped
                } else {
                    Self::Random
                }
            }
            Self::Random => {
                if last.wrapping_add(1) == current {
                    Self::Sequential
                } else if last.swapped().wrapping_add(1) == current.swapped() {
                    Self::SequentialSwapped
                } else if current == 0 {
                    Self::Zero
                } else {
                    Self::Random
                }
            }
            Self::Zero => {
                if current == 0 {
                    Self::Zero
                } else if current == 0x0001 {
                    Self::Sequential
                } else if current == 0x0100 {
                    Self::SequentialSwapped
                } else {
                    Self::Random
                }
            }
            Self::Unknown => {
                if current == 0 {
                    Self::Zero
                } else if last.wrapping_add(1) == current {
                    Self::Sequential
                } else if last == current {
                    Self::Unknown
                } else if last.swapped().wrapping_add(1) == current.swapped() {
                    Self::SequentialSwapped
                } else {
                    Self::Random
                }
            }
        }
    }
}

/// Per-IPv4-header compression context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Context {
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub protocol: u8,
    pub dscp: u8,
    pub df: bool,
    pub ttl_hopl: u8,
    /// IP-ID of the last compressed packet, host order.
    pub last_ip_id: IpId,
    /// Current behavior classification.
    pub ip_id_behavior: IpIdBehavior,
    /// Behavior last communicated to the decompressor.
    pub last_ip_id_behavior: IpIdBehavior,
}

/// Per-IPv6-header compression context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Context {
    pub src_addr: Ipv6Addr,
    pub dst_addr: Ipv6Addr,
    pub next_header: u8,
    pub dscp: u8,
    pub ttl_hopl: u8,
    /// Flow label, 20 bits.
    pub flow_label: u32,
    /// Cached extension headers, in wire order.
    pub extensions: Vec<Ipv6ExtensionContext>,
}

/// One IP header context of the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpContext {
    V4(Ipv4Context),
    V6(Ipv6Context),
}

impl IpContext {
    /// TTL/Hop Limit remembered for this header.
    pub fn ttl_hopl(&self) -> u8 {
        match self {
            Self::V4(v4) => v4.ttl_hopl,
            Self::V6(v6) => v6.ttl_hopl,
        }
    }

    /// DSCP remembered for this header.
    pub fn dscp(&self) -> u8 {
        match self {
            Self::V4(v4) => v4.dscp,
            Self::V6(v6) => v6.dscp,
        }
    }
}

/// Cached state for one IPv6 extension header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ipv6ExtensionContext {
    /// Hop-by-Hop, Routing or Destination options: kind, length and value
    /// bytes are tracked so a change can force re-synchronization.
    Raw {
        protocol: u8,
        next_header: u8,
        length: u8,
        value: Vec<u8>,
    },
    Gre {
        c_flag: bool,
        k_flag: bool,
        s_flag: bool,
        key: u32,
        /// Last sequence number sent, reference for the 7-or-31-bit
        /// irregular encoding.
        sequence: u32,
    },
    Mine {
        next_header: u8,
        s_bit: bool,
        res_bits: u8,
        checksum: u16,
        orig_dest: u32,
        orig_src: Option<u32>,
    },
    Ah {
        next_header: u8,
        length: u8,
        spi: u32,
        /// Last sequence number sent, reference for the 7-or-31-bit
        /// irregular encoding.
        sequence: u32,
    },
}

impl Ipv6ExtensionContext {
    fn from_header(ext: &Ipv6Extension) -> Self {
        match ext {
            Ipv6Extension::HopByHop(raw)
            | Ipv6Extension::Routing(raw)
            | Ipv6Extension::Destination(raw) => Self::Raw {
                protocol: ext.protocol(),
                next_header: raw.next_header,
                length: raw.length,
                value: raw.value.clone(),
            },
            Ipv6Extension::Gre(gre) => Self::Gre {
                c_flag: gre.c_flag,
                k_flag: gre.k_flag,
                s_flag: gre.s_flag,
                key: gre.key.unwrap_or(0),
                sequence: gre.sequence.unwrap_or(0),
            },
            Ipv6Extension::Mine(mine) => Self::Mine {
                next_header: mine.next_header,
                s_bit: mine.s_bit,
                res_bits: mine.res_bits,
                checksum: mine.checksum,
                orig_dest: mine.orig_dest,
                orig_src: mine.orig_src,
            },
            Ipv6Extension::Ah(ah) => Self::Ah {
                next_header: ah.next_header,
                length: ah.length,
                spi: ah.spi,
                sequence: ah.sequence,
            },
        }
    }

    /// Whether `ext` still matches this cache; refreshes the cache and
    /// reports a change when it does not. Sequence-number advances of GRE
    /// and AH are expected and do not count as changes.
    fn refresh(&mut self, ext: &Ipv6Extension) -> bool {
        match (self, ext) {
            (
                Self::Raw {
                    protocol,
                    next_header,
                    length,
                    value,
                },
                Ipv6Extension::HopByHop(raw)
                | Ipv6Extension::Routing(raw)
                | Ipv6Extension::Destination(raw),
            ) if *protocol == ext.protocol() => {
                let changed =
                    *next_header != raw.next_header || *length != raw.length || *value != raw.value;
                if changed {
                    *next_header = raw.next_header;
                    *length = raw.length;
                    *value = raw.value.clone();
                }
                changed
            }
            (
                Self::Gre {
                    c_flag,
                    k_flag,
                    s_flag,
                    key,
                    ..
                },
                Ipv6Extension::Gre(gre),
            ) => {
                let changed = *c_flag != gre.c_flag
                    || *k_flag != gre.k_flag
                    || *s_flag != gre.s_flag
                    || *key != gre.key.unwrap_or(0);
                if changed {
                    *c_flag = gre.c_flag;
                    *k_flag = gre.k_flag;
                    *s_flag = gre.s_flag;
                    *key = gre.key.unwrap_or(0);
                }
                changed
            }
            (
                Self::Mine {
                    next_header,
                    s_bit,
                    res_bits,
                    checksum,
                    orig_dest,
                    orig_src,
                },
                Ipv6Extension::Mine(mine),
            ) => {
                let changed = *next_header != mine.next_header
                    || *s_bit != mine.s_bit
                    || *res_bits != mine.res_bits
                    || *checksum != mine.checksum
                    || *orig_dest != mine.orig_dest
                    || *orig_src != mine.orig_src;
                if changed {
                    *next_header = mine.next_header;
                    *s_bit = mine.s_bit;
                    *res_bits = mine.res_bits;
                    *checksum = mine.checksum;
                    *orig_dest = mine.orig_dest;
                    *orig_src = mine.orig_src;
                }
                changed
            }
            (
                Self::Ah {
                    next_header,
                    length,
                    spi,
                    ..
                },
                Ipv6Extension::Ah(ah),
            ) => {
                let changed =
                    *next_header != ah.next_header || *length != ah.length || *spi != ah.spi;
                if changed {
                    *next_header = ah.next_header;
                    *length = ah.length;
                    *spi = ah.spi;
                }
                changed
            }
            (slot, _) => {
                // Different extension kind in the same position.
                *slot = Self::from_header(ext);
                true
            }
        }
    }
}

/// Operational modes of the TCP-profile compressor state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TcpCompressorMode {
    /// Initial state, forces an IR packet.
    #[default]
    InitializationAndRefresh,
    /// Traversed exactly once after an IR; produces an IR-DYN packet.
    FirstOrder,
    /// Steady state; produces CO packets.
    SecondOrder,
}

/// Per-packet values derived before classification and committed after
/// emission.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressTmp {
    /// TCP payload size of the current packet, the seq scaling factor.
    pub payload_size: u32,
    /// ECN usage on this packet (IP or TCP ECN bits non-zero).
    pub ecn_used: bool,
    /// An outer header's TTL/Hop Limit changed since the last packet.
    pub ttl_irregular_chain_flag: bool,
    /// ECN bits of the innermost IP header.
    pub ip_inner_ecn: u8,
    /// Scaled sequence number of the current packet.
    pub seq_scaled: u32,
    /// Sequence residue of the current packet.
    pub seq_residue: u32,
    /// Scaled acknowledgment number of the current packet.
    pub ack_scaled: u32,
    /// Acknowledgment residue of the current packet.
    pub ack_residue: u32,
    /// ACK stride the compressor wants the decompressor to know.
    pub ack_stride: u16,
}

/// Compressor context for the ROHC TCP/IP profile.
#[derive(Debug, Clone)]
pub struct TcpCompressorContext {
    /// Profile identifier for this context.
    pub profile_id: RohcProfile,
    /// Context Identifier.
    pub cid: ContextId,
    /// Per-IP-header contexts, outermost first, innermost last.
    pub ip_contexts: Vec<IpContext>,
    /// Snapshot of the last compressed TCP header.
    pub old_tcp: TcpHeader,
    /// Master Sequence Number of the next packet to compress.
    pub msn: Msn,
    /// Current state-machine mode.
    pub mode: TcpCompressorMode,
    /// Whether the flow currently uses ECN.
    pub ecn_used: bool,
    /// Established ACK stride known to the decompressor; 0 disables the
    /// scaled-ack formats.
    pub ack_stride: u16,
    /// Scaled sequence number after the last commit.
    pub seq_scaled: u32,
    /// Sequence residue after the last commit.
    pub seq_residue: u32,
    /// Scaled acknowledgment number after the last commit.
    pub ack_scaled: u32,
    /// Acknowledgment residue after the last commit.
    pub ack_residue: u32,
    /// Sequence number of the last packet whose dynamic part was sent.
    pub tcp_last_seq_number: SeqNumber,
    /// How many compressed packets changed the sequence number.
    pub tcp_seq_number_change_count: u32,
    /// TCP option interning table.
    pub options: TcpOptionsTable,
    ack_stride_candidate: u32,
    ack_stride_packets: u32,
}

impl TcpCompressorContext {
    /// Creates a context from the first packet of a flow. `msn_seed`
    /// comes from the host's random callback; only its low 16 bits are
    /// used.
    pub fn new(cid: ContextId, headers: &TcpIpHeaders, msn_seed: u32) -> Self {
        Self {
            profile_id: RohcProfile::TcpIp,
            cid,
            ip_contexts: ip_contexts_from(headers),
            old_tcp: headers.tcp.clone(),
            msn: Msn::new(msn_seed as u16),
            mode: TcpCompressorMode::InitializationAndRefresh,
            ecn_used: false,
            ack_stride: 0,
            seq_scaled: 0,
            seq_residue: 0,
            ack_scaled: 0,
            ack_residue: 0,
            tcp_last_seq_number: headers.tcp.seq_number,
            tcp_seq_number_change_count: 0,
            options: TcpOptionsTable::new(),
            ack_stride_candidate: 0,
            ack_stride_packets: 0,
        }
    }

    /// The innermost IP context.
    pub fn innermost_ip(&self) -> &IpContext {
        self.ip_contexts
            .last()
            .expect("context always holds at least one IP header")
    }

    /// Re-initializes the IP context stack from `headers`, used when the
    /// chain shape changed mid-flow. The MSN and option table survive;
    /// the state machine must be reset to IR by the caller.
    pub fn reinit_ip_contexts(&mut self, headers: &TcpIpHeaders) {
        self.ip_contexts = ip_contexts_from(headers);
    }

    /// Advances the innermost IPv4 header's IP-ID behavior machine with
    /// the current packet.
    pub fn update_ip_id_behavior(&mut self, headers: &TcpIpHeaders) {
        if let (Some(IpContext::V4(ctx)), IpHeader::V4(hdr)) = (
            self.ip_contexts.last_mut(),
            headers.innermost_ip(),
        ) {
            ctx.ip_id_behavior = ctx
                .ip_id_behavior
                .updated(ctx.last_ip_id, hdr.identification);
        }
    }

    /// Refreshes the IPv6 extension caches against the current packet and
    /// reports whether any structural or value change requires IR
    /// re-synchronization.
    pub fn refresh_extension_contexts(&mut self, headers: &TcpIpHeaders) -> bool {
        let mut changed = false;
        for (ip_ctx, ip_hdr) in self.ip_contexts.iter_mut().zip(headers.ip_headers.iter()) {
            if let (IpContext::V6(ctx), IpHeader::V6(hdr)) = (ip_ctx, ip_hdr) {
                if ctx.extensions.len() != hdr.extensions.len() {
                    ctx.extensions = hdr
                        .extensions
                        .iter()
                        .map(Ipv6ExtensionContext::from_header)
                        .collect();
                    changed = true;
                    continue;
                }
                for (slot, ext) in ctx.extensions.iter_mut().zip(hdr.extensions.iter()) {
                    changed |= slot.refresh(ext);
                }
            }
        }
        changed
    }

    /// Runs the ACK stride detector with the current packet and returns
    /// the stride the compressor wants the decompressor to know.
    ///
    /// Modeled on the timestamp stride detection of the RTP profile: a
    /// stride is established after [`ACK_STRIDE_ESTABLISHMENT_THRESHOLD`]
    /// consecutive equal ACK deltas of at least [`ACK_STRIDE_MIN`].
    pub fn detect_ack_stride(&mut self, tcp: &TcpHeader) -> u16 {
        if tcp.ack_flag {
            let delta = tcp.ack_number.wrapping_sub(self.old_tcp.ack_number);
            if delta != 0 {
                if delta == self.ack_stride_candidate {
                    self.ack_stride_packets = self.ack_stride_packets.saturating_add(1);
                } else {
                    self.ack_stride_candidate = delta;
                    self.ack_stride_packets = 1;
                }
                if self.ack_stride_packets >= ACK_STRIDE_ESTABLISHMENT_THRESHOLD
                    && self.ack_stride_candidate >= ACK_STRIDE_MIN
                    && self.ack_stride_candidate <= u16::MAX as u32
                {
                    return self.ack_stride_candidate as u16;
                }
            }
        }
        self.ack_stride
    }

    /// Commits the context after a packet has been emitted: the "old"
    /// header snapshots now describe the packet just compressed, residues
    /// and MSN advance (invariant: after commit the context equals what
    /// the decompressor will reconstruct).
    pub fn commit(
        &mut self,
        headers: &TcpIpHeaders,
        tmp: &CompressTmp,
        packet_type: RohcPacketType,
    ) {
        for (ip_ctx, ip_hdr) in self.ip_contexts.iter_mut().zip(headers.ip_headers.iter()) {
            match (ip_ctx, ip_hdr) {
                (IpContext::V4(ctx), IpHeader::V4(hdr)) => {
                    ctx.last_ip_id = hdr.identification;
                    ctx.ttl_hopl = hdr.ttl;
                    ctx.dscp = hdr.dscp;
                    ctx.df = hdr.dont_fragment;
                    ctx.last_ip_id_behavior = ctx.ip_id_behavior;
                }
                (IpContext::V6(ctx), IpHeader::V6(hdr)) => {
                    ctx.ttl_hopl = hdr.hop_limit;
                    ctx.dscp = hdr.dscp;
                }
                _ => debug_assert!(false, "context/header stack shape mismatch"),
            }
        }

        if headers.tcp.seq_number != self.old_tcp.seq_number {
            self.tcp_seq_number_change_count = self.tcp_seq_number_change_count.saturating_add(1);
        }
        self.tcp_last_seq_number = headers.tcp.seq_number;
        self.old_tcp = headers.tcp.clone();
        self.ecn_used = tmp.ecn_used;

        // The stride only becomes the decompressor's reference when a
        // format that carries it was emitted.
        if matches!(
            packet_type,
            RohcPacketType::Ir | RohcPacketType::IrDyn | RohcPacketType::CoCommon
        ) {
            self.ack_stride = tmp.ack_stride;
        }

        self.seq_scaled = tmp.seq_scaled;
        self.seq_residue = tmp.seq_residue;
        let (ack_scaled, ack_residue) =
            field_scaling(self.ack_stride as u32, headers.tcp.ack_number.value());
        self.ack_scaled = ack_scaled;
        self.ack_residue = ack_residue;

        self.msn += 1;
    }
}

fn ip_contexts_from(headers: &TcpIpHeaders) -> Vec<IpContext> {
    headers
        .ip_headers
        .iter()
        .map(|hdr| match hdr {
            IpHeader::V4(v4) => IpContext::V4(Ipv4Context {
                src_addr: v4.src_addr,
                dst_addr: v4.dst_addr,
                protocol: v4.protocol,
                dscp: v4.dscp,
                df: v4.dont_fragment,
                ttl_hopl: v4.ttl,
                last_ip_id: v4.identification,
                ip_id_behavior: IpIdBehavior::Unknown,
                last_ip_id_behavior: IpIdBehavior::Unknown,
            }),
            IpHeader::V6(v6) => IpContext::V6(Ipv6Context {
                src_addr: v6.src_addr,
                dst_addr: v6.dst_addr,
                next_header: v6.next_header,
                dscp: v6.dscp,
                ttl_hopl: v6.hop_limit,
                flow_label: v6.flow_label,
                extensions: v6
                    .extensions
                    .iter()
                    .map(Ipv6ExtensionContext::from_header)
                    .collect(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use IpIdBehavior::*;

    #[test]
    fn behavior_unknown_classifies_on_second_packet() {
        assert_eq!(Unknown.updated(IpId::new(5), IpId::new(6)), Sequential);
        assert_eq!(Unknown.updated(IpId::new(5), IpId::new(0)), Zero);
        assert_eq!(
            Unknown.updated(IpId::new(0x0100), IpId::new(0x0200)),
            SequentialSwapped
        );
        assert_eq!(Unknown.updated(IpId::new(5), IpId::new(999)), Random);
    }

    #[test]
    fn behavior_unknown_persists_on_repeat() {
        assert_eq!(Unknown.updated(IpId::new(5), IpId::new(5)), Unknown);
    }

    #[test]
    fn behavior_sequential_breaks_to_random() {
        assert_eq!(Sequential.updated(IpId::new(7), IpId::new(8)), Sequential);
        assert_eq!(Sequential.updated(IpId::new(7), IpId::new(10)), Random);
    }

    #[test]
    fn behavior_swapped_counts_in_swapped_space() {
        // Wire 0x0100 -> 0x0200 is 1 -> 2 byte-swapped.
        assert_eq!(
            SequentialSwapped.updated(IpId::new(0x0100), IpId::new(0x0200)),
            SequentialSwapped
        );
        assert_eq!(
            SequentialSwapped.updated(IpId::new(0x0100), IpId::new(0x0300)),
            Random
        );
    }

    #[test]
    fn behavior_random_can_stabilize() {
        assert_eq!(Random.updated(IpId::new(3), IpId::new(4)), Sequential);
        assert_eq!(Random.updated(IpId::new(3), IpId::new(0)), Zero);
        assert_eq!(Random.updated(IpId::new(3), IpId::new(77)), Random);
    }

    #[test]
    fn behavior_zero_reclassifies_on_first_nonzero() {
        assert_eq!(Zero.updated(IpId::new(0), IpId::new(0)), Zero);
        assert_eq!(Zero.updated(IpId::new(0), IpId::new(1)), Sequential);
        assert_eq!(Zero.updated(IpId::new(0), IpId::new(0x0100)), SequentialSwapped);
        assert_eq!(Zero.updated(IpId::new(0), IpId::new(0x4242)), Random);
    }

    #[test]
    fn behavior_never_returns_to_unknown_once_classified() {
        for behavior in [Zero, Sequential, SequentialSwapped, Random] {
            for cur in [0u16, 1, 0x0100, 0x4242, 0xFFFF] {
                let next = behavior.updated(IpId::new(0x4241), IpId::new(cur));
                assert_ne!(next, Unknown, "{behavior:?} -> {next:?} on 0x{cur:04x}");
            }
        }
    }

    #[test]
    fn wire_values_match_rfc() {
        assert_eq!(Sequential.wire_value(), 0);
        assert_eq!(SequentialSwapped.wire_value(), 1);
        assert_eq!(Random.wire_value(), 2);
        assert_eq!(Unknown.wire_value(), 2);
        assert_eq!(Zero.wire_value(), 3);
    }
}
