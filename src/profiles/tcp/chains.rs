//! Static, dynamic and irregular chain builders.
//!
//! The three walks over the header stack, outermost header first:
//!
//! - the static chain identifies the flow (versions, addresses, ports);
//! - the dynamic chain carries the slowly changing fields and seeds the
//!   decompressor's references (TTL, DSCP, IP-ID behavior, MSN, the full
//!   TCP dynamic part with the option descriptor list);
//! - the irregular chain is the per-CO-packet tail holding only what the
//!   chosen base header cannot reconstruct.

use tracing::debug;

use crate::error::RohcBuildingError;
use crate::serialization::PacketWriter;

use super::constants::IP_ID_BEHAVIOR_RANDOM;
use super::context::{
    CompressTmp, IpContext, IpIdBehavior, Ipv6ExtensionContext, TcpCompressorContext,
};
use super::encodings::lsb_7_or_31;
use super::protocol_types::{IpHeader, Ipv6Extension, TcpHeader, TcpIpHeaders};

/// Emits the static chain: one static part per IP header (extension
/// headers included) followed by the TCP static part.
pub fn build_static_chain(
    headers: &TcpIpHeaders,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    for ip in &headers.ip_headers {
        match ip {
            IpHeader::V4(v4) => {
                w.write_u8(0x00)?; // version flag 0, 7 reserved bits
                w.write_u8(v4.protocol)?;
                w.write_slice(&v4.src_addr.octets())?;
                w.write_slice(&v4.dst_addr.octets())?;
            }
            IpHeader::V6(v6) => {
                if v6.flow_label == 0 {
                    w.write_u8(0x80)?;
                    w.write_u8(v6.next_header)?;
                } else {
                    w.write_u8(0x90 | ((v6.flow_label >> 16) & 0x0F) as u8)?;
                    w.write_u16(v6.flow_label as u16)?;
                    w.write_u8(v6.next_header)?;
                }
                w.write_slice(&v6.src_addr.octets())?;
                w.write_slice(&v6.dst_addr.octets())?;
                for ext in &v6.extensions {
                    build_extension_static(ext, w)?;
                }
            }
        }
    }

    w.write_u16(headers.tcp.src_port)?;
    w.write_u16(headers.tcp.dst_port)?;
    debug!(len = w.len(), "static chain built");
    Ok(())
}

fn build_extension_static(
    ext: &Ipv6Extension,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    match ext {
        Ipv6Extension::HopByHop(raw) | Ipv6Extension::Destination(raw) => {
            w.write_u8(raw.next_header)?;
            w.write_u8(raw.length)
        }
        Ipv6Extension::Routing(raw) => {
            w.write_u8(raw.next_header)?;
            w.write_u8(raw.length)?;
            w.write_slice(&raw.value)
        }
        Ipv6Extension::Gre(gre) => {
            w.write_u8(gre.tunneled_protocol())?;
            let protocol_bit = (gre.protocol != 0x0800) as u8;
            w.write_u8(
                (gre.c_flag as u8) << 7
                    | (gre.k_flag as u8) << 6
                    | (gre.s_flag as u8) << 5
                    | protocol_bit << 4,
            )?;
            if let Some(key) = gre.key {
                w.write_u32(key)?;
            }
            Ok(())
        }
        Ipv6Extension::Mine(mine) => {
            w.write_u8(mine.next_header)?;
            w.write_u8((mine.s_bit as u8) << 7 | (mine.res_bits & 0x7F))?;
            w.write_u32(mine.orig_dest)?;
            if let Some(orig_src) = mine.orig_src {
                w.write_u32(orig_src)?;
            }
            Ok(())
        }
        Ipv6Extension::Ah(ah) => {
            w.write_u8(ah.next_header)?;
            w.write_u8(ah.length)?;
            w.write_u32(ah.spi)
        }
    }
}

/// Emits the dynamic chain and updates the per-IP context fields it
/// communicates: one dynamic part per IP header (extensions included),
/// then the TCP dynamic part with the option descriptor list.
pub fn build_dynamic_chain(
    ctx: &mut TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let header_count = headers.ip_headers.len();
    for (position, ip) in headers.ip_headers.iter().enumerate() {
        let is_innermost = position + 1 == header_count;
        let ip_ctx = &mut ctx.ip_contexts[position];
        build_ip_dynamic(ip_ctx, ip, is_innermost, w)?;
        if let (IpContext::V6(v6_ctx), IpHeader::V6(v6)) = (&mut ctx.ip_contexts[position], ip) {
            for (slot, ext) in v6_ctx.extensions.iter_mut().zip(v6.extensions.iter()) {
                build_extension_dynamic(slot, ext, w)?;
            }
        }
    }

    build_tcp_dynamic(ctx, &headers.tcp, tmp, w)
}

fn build_ip_dynamic(
    ip_ctx: &mut IpContext,
    ip: &IpHeader,
    is_innermost: bool,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    match (ip_ctx, ip) {
        (IpContext::V4(ctx), IpHeader::V4(hdr)) => {
            // ip_id_behavior_choice: the innermost header may announce any
            // behavior; outer headers are restricted to random/zero and
            // their context is pinned accordingly.
            let behavior = if is_innermost {
                if hdr.identification == 0 {
                    IpIdBehavior::Zero
                } else {
                    ctx.ip_id_behavior
                }
            } else {
                let outer = if hdr.identification == 0 {
                    IpIdBehavior::Zero
                } else {
                    IpIdBehavior::Random
                };
                ctx.ip_id_behavior = outer;
                outer
            };
            ctx.last_ip_id_behavior = ctx.ip_id_behavior;
            let behavior_bits = behavior.wire_value();

            w.write_u8((hdr.dont_fragment as u8) << 2 | behavior_bits)?;
            w.write_u8(hdr.dscp << 2 | hdr.ecn)?;
            w.write_u8(hdr.ttl)?;
            // ip_id_enc_dyn: the value is absent for the zero behavior.
            if behavior_bits != super::constants::IP_ID_BEHAVIOR_ZERO {
                let id = if behavior == IpIdBehavior::SequentialSwapped {
                    hdr.identification.swapped()
                } else {
                    hdr.identification
                };
                w.write_u16(id.value())?;
            }

            ctx.dscp = hdr.dscp;
            ctx.ttl_hopl = hdr.ttl;
            ctx.df = hdr.dont_fragment;
            ctx.last_ip_id = hdr.identification;
            Ok(())
        }
        (IpContext::V6(ctx), IpHeader::V6(hdr)) => {
            w.write_u8(hdr.dscp << 2 | hdr.ecn)?;
            w.write_u8(hdr.hop_limit)?;
            ctx.dscp = hdr.dscp;
            ctx.ttl_hopl = hdr.hop_limit;
            Ok(())
        }
        _ => {
            debug_assert!(false, "context/header stack shape mismatch");
            Ok(())
        }
    }
}

fn build_extension_dynamic(
    slot: &mut Ipv6ExtensionContext,
    ext: &Ipv6Extension,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    match ext {
        Ipv6Extension::HopByHop(raw) | Ipv6Extension::Destination(raw) => w.write_slice(&raw.value),
        Ipv6Extension::Routing(_) | Ipv6Extension::Mine(_) => Ok(()),
        Ipv6Extension::Gre(gre) => {
            if let Some(checksum) = gre.checksum {
                w.write_u16(checksum)?;
            }
            if let Some(sequence) = gre.sequence {
                w.write_u32(sequence)?;
                if let Ipv6ExtensionContext::Gre { sequence: cached, .. } = slot {
                    *cached = sequence;
                }
            }
            Ok(())
        }
        Ipv6Extension::Ah(ah) => {
            w.write_u32(ah.sequence)?;
            w.write_slice(&ah.icv)?;
            if let Ipv6ExtensionContext::Ah { sequence: cached, .. } = slot {
                *cached = ah.sequence;
            }
            Ok(())
        }
    }
}

fn build_tcp_dynamic(
    ctx: &mut TcpCompressorContext,
    tcp: &TcpHeader,
    tmp: &CompressTmp,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let ack_carried = tcp.ack_flag && tcp.ack_number != 0;
    let urg_ptr_carried = tcp.urg_flag && tcp.urg_ptr != 0;
    let ack_stride_carried = tmp.ack_stride != 0;

    w.write_u8(
        (tmp.ecn_used as u8) << 7
            | (!ack_stride_carried as u8) << 6
            | (!ack_carried as u8) << 5
            | (!urg_ptr_carried as u8) << 4
            | (tcp.res_flags & 0x0F),
    )?;
    w.write_u8(
        (tcp.ecn_flags & 0x03) << 6
            | (tcp.urg_flag as u8) << 5
            | (tcp.ack_flag as u8) << 4
            | (tcp.psh_flag as u8) << 3
            | (tcp.rsf_flags & 0x07),
    )?;
    w.write_u16(ctx.msn.value())?;
    w.write_u32(tcp.seq_number.value())?;
    if ack_carried {
        w.write_u32(tcp.ack_number.value())?;
    }
    w.write_u16(tcp.window)?;
    w.write_u16(tcp.checksum)?;
    if urg_ptr_carried {
        w.write_u16(tcp.urg_ptr)?;
    }
    if ack_stride_carried {
        w.write_u16(tmp.ack_stride)?;
    }

    if tcp.has_options() {
        ctx.options.build_ir_list(tcp, w)?;
    } else {
        // Empty descriptor list: PS = 0, m = 0.
        w.write_u8(0x00)?;
    }
    Ok(())
}

/// Emits the irregular chain of a CO packet: per-IP irregular items
/// (outer first), then the TCP irregular part. GRE and AH sequence
/// caches advance as a side effect.
pub fn build_irregular_chain(
    ctx: &mut TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let header_count = headers.ip_headers.len();
    for (position, ip) in headers.ip_headers.iter().enumerate() {
        let is_innermost = position + 1 == header_count;
        match (&mut ctx.ip_contexts[position], ip) {
            (IpContext::V4(ip_ctx), IpHeader::V4(hdr)) => {
                // ip_id_enc_irreg: a random IP-ID travels in full.
                if ip_ctx.ip_id_behavior.wire_value() == IP_ID_BEHAVIOR_RANDOM {
                    w.write_u16(hdr.identification.value())?;
                }
                if !is_innermost {
                    if tmp.ecn_used {
                        w.write_u8(hdr.dscp << 2 | hdr.ecn)?;
                    }
                    if tmp.ttl_irregular_chain_flag {
                        w.write_u8(hdr.ttl)?;
                    }
                }
            }
            (IpContext::V6(ip_ctx), IpHeader::V6(hdr)) => {
                if !is_innermost {
                    if tmp.ecn_used {
                        w.write_u8(hdr.dscp << 2 | hdr.ecn)?;
                    }
                    if tmp.ttl_irregular_chain_flag {
                        w.write_u8(hdr.hop_limit)?;
                    }
                }
                for (slot, ext) in ip_ctx.extensions.iter_mut().zip(hdr.extensions.iter()) {
                    build_extension_irregular(slot, ext, w)?;
                }
            }
            _ => debug_assert!(false, "context/header stack shape mismatch"),
        }
    }

    // TCP irregular part: ECN byte when in use, then the checksum.
    if tmp.ecn_used {
        w.write_u8(
            ((tmp.ip_inner_ecn & 0x03) << 2 | (headers.tcp.ecn_flags & 0x03)) << 4
                | (headers.tcp.res_flags & 0x0F),
        )?;
    }
    w.write_u16(headers.tcp.checksum)
}

fn build_extension_irregular(
    slot: &mut Ipv6ExtensionContext,
    ext: &Ipv6Extension,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    match ext {
        Ipv6Extension::Gre(gre) => {
            if let Some(checksum) = gre.checksum {
                w.write_u16(checksum)?;
            }
            if let Some(sequence) = gre.sequence {
                if let Ipv6ExtensionContext::Gre { sequence: cached, .. } = slot {
                    lsb_7_or_31(w, *cached, sequence)?;
                    *cached = sequence;
                }
            }
            Ok(())
        }
        Ipv6Extension::Ah(ah) => {
            if let Ipv6ExtensionContext::Ah { sequence: cached, .. } = slot {
                lsb_7_or_31(w, *cached, ah.sequence)?;
                *cached = ah.sequence;
            }
            w.write_slice(&ah.icv)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseContext;
    use crate::serialization::headers::deserialize_tcp_ip_headers;
    use crate::types::ContextId;

    fn sample_packet() -> Vec<u8> {
        let mut packet = vec![
            0x45, 0x00, 0x00, 0x28, 0x12, 0x34, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00, 192, 168, 0,
            1, 192, 168, 0, 2,
        ];
        packet.extend_from_slice(&5001u16.to_be_bytes());
        packet.extend_from_slice(&44100u16.to_be_bytes());
        packet.extend_from_slice(&0x1000u32.to_be_bytes());
        packet.extend_from_slice(&0x2000u32.to_be_bytes());
        packet.push(0x50);
        packet.push(0x10); // ACK
        packet.extend_from_slice(&8192u16.to_be_bytes());
        packet.extend_from_slice(&0xCAFEu16.to_be_bytes());
        packet.extend_from_slice(&0u16.to_be_bytes());
        packet
    }

    #[test]
    fn static_chain_for_single_ipv4() {
        let headers = deserialize_tcp_ip_headers(&sample_packet()).unwrap();
        let mut buf = [0u8; 64];
        let mut w = PacketWriter::new(&mut buf, ParseContext::IrPacket);
        build_static_chain(&headers, &mut w).unwrap();
        // 10 bytes IPv4 static + 4 bytes TCP static
        assert_eq!(w.len(), 14);
        let written = w.as_written();
        assert_eq!(written[0], 0x00);
        assert_eq!(written[1], 6);
        assert_eq!(&written[2..6], &[192, 168, 0, 1]);
        assert_eq!(&written[6..10], &[192, 168, 0, 2]);
        assert_eq!(&written[10..12], &5001u16.to_be_bytes());
        assert_eq!(&written[12..14], &44100u16.to_be_bytes());
    }

    #[test]
    fn dynamic_chain_announces_behavior_and_msn() {
        let headers = deserialize_tcp_ip_headers(&sample_packet()).unwrap();
        let mut ctx = TcpCompressorContext::new(ContextId::new(0), &headers, 0x1234);
        let tmp = CompressTmp::default();
        let mut buf = [0u8; 64];
        let mut w = PacketWriter::new(&mut buf, ParseContext::IrPacket);
        build_dynamic_chain(&mut ctx, &headers, &tmp, &mut w).unwrap();
        let written = w.as_written();
        // IPv4 dynamic: behavior byte (DF set, unknown announced random),
        // DSCP/ECN, TTL, 2-byte IP-ID.
        assert_eq!(written[0], 0x04 | IP_ID_BEHAVIOR_RANDOM);
        assert_eq!(written[1], 0x00);
        assert_eq!(written[2], 64);
        assert_eq!(&written[3..5], &0x1234u16.to_be_bytes());
        // TCP dynamic: flags byte has ack_stride absent, ack present,
        // urg_ptr absent.
        assert_eq!(written[5], 0b0101_0000);
        assert_eq!(written[6], 0b0001_0000);
        assert_eq!(&written[7..9], &0x1234u16.to_be_bytes()); // MSN
        assert_eq!(&written[9..13], &0x1000u32.to_be_bytes()); // seq
        assert_eq!(&written[13..17], &0x2000u32.to_be_bytes()); // ack
        assert_eq!(&written[17..19], &8192u16.to_be_bytes()); // window
        assert_eq!(&written[19..21], &0xCAFEu16.to_be_bytes()); // checksum
        assert_eq!(written[21], 0x00); // empty option list
        assert_eq!(w.len(), 22);
    }

    #[test]
    fn irregular_chain_for_random_ip_id_carries_it() {
        let headers = deserialize_tcp_ip_headers(&sample_packet()).unwrap();
        let mut ctx = TcpCompressorContext::new(ContextId::new(0), &headers, 0);
        if let IpContext::V4(v4) = &mut ctx.ip_contexts[0] {
            v4.ip_id_behavior = IpIdBehavior::Random;
        }
        let tmp = CompressTmp::default();
        let mut buf = [0u8; 32];
        let mut w = PacketWriter::new(&mut buf, ParseContext::IrregularChain);
        build_irregular_chain(&mut ctx, &headers, &tmp, &mut w).unwrap();
        // 2 bytes IP-ID + 2 bytes TCP checksum
        assert_eq!(w.as_written(), &[0x12, 0x34, 0xCA, 0xFE]);
    }

    #[test]
    fn irregular_chain_for_sequential_ip_id_is_checksum_only() {
        let headers = deserialize_tcp_ip_headers(&sample_packet()).unwrap();
        let mut ctx = TcpCompressorContext::new(ContextId::new(0), &headers, 0);
        if let IpContext::V4(v4) = &mut ctx.ip_contexts[0] {
            v4.ip_id_behavior = IpIdBehavior::Sequential;
        }
        let tmp = CompressTmp::default();
        let mut buf = [0u8; 32];
        let mut w = PacketWriter::new(&mut buf, ParseContext::IrregularChain);
        build_irregular_chain(&mut ctx, &headers, &tmp, &mut w).unwrap();
        assert_eq!(w.as_written(), &[0xCA, 0xFE]);
    }

    #[test]
    fn irregular_chain_with_ecn_adds_tcp_ecn_byte() {
        let headers = deserialize_tcp_ip_headers(&sample_packet()).unwrap();
        let mut ctx = TcpCompressorContext::new(ContextId::new(0), &headers, 0);
        if let IpContext::V4(v4) = &mut ctx.ip_contexts[0] {
            v4.ip_id_behavior = IpIdBehavior::Sequential;
        }
        let tmp = CompressTmp {
            ecn_used: true,
            ip_inner_ecn: 0b10,
            ..Default::default()
        };
        let mut buf = [0u8; 32];
        let mut w = PacketWriter::new(&mut buf, ParseContext::IrregularChain);
        build_irregular_chain(&mut ctx, &headers, &tmp, &mut w).unwrap();
        assert_eq!(w.as_written(), &[0b1000_0000, 0xCA, 0xFE]);
    }
}
