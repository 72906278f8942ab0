//! Serialization of the seventeen CO base headers.
//!
//! Every format is written with explicit field writes against RFC 6846
//! Section 8.1 bit layouts. The CRC (3-bit for the short formats, 7-bit
//! for seq_8/rnd_8/co_common) is computed over the bytes written so far
//! with its field zeroed, then patched in place; the irregular chain is
//! appended by the caller afterwards and is never CRC-covered.

use crate::crc::CrcCalculators;
use crate::error::RohcBuildingError;
use crate::packet_defs::RohcPacketType;
use crate::serialization::PacketWriter;
use crate::types::IpId;

use super::super::constants::*;
use super::super::context::{CompressTmp, IpContext, IpIdBehavior, TcpCompressorContext};
use super::super::encodings::{
    dscp_encode, ip_id_lsb, optional_ip_id_lsb, rsf_index_enc, static_or_irreg8, static_or_irreg16,
    variable_length_32,
};
use super::super::protocol_types::{IpHeader, TcpIpHeaders};

/// Dispatches to the chosen format's writer. The writer `w` must be
/// positioned at the base header's first octet.
pub fn serialize_co_base_header(
    packet_type: RohcPacketType,
    ctx: &mut TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    use RohcPacketType::*;
    match packet_type {
        Rnd1 => serialize_rnd_1(ctx, headers, crcs, w),
        Rnd2 => serialize_rnd_2(ctx, headers, tmp, crcs, w),
        Rnd3 => serialize_rnd_3(ctx, headers, crcs, w),
        Rnd4 => serialize_rnd_4(ctx, headers, tmp, crcs, w),
        Rnd5 => serialize_rnd_5(ctx, headers, crcs, w),
        Rnd6 => serialize_rnd_6(ctx, headers, tmp, crcs, w),
        Rnd7 => serialize_rnd_7(ctx, headers, crcs, w),
        Rnd8 => serialize_rnd_8(ctx, headers, tmp, crcs, w),
        Seq1 => serialize_seq_1(ctx, headers, crcs, w),
        Seq2 => serialize_seq_2(ctx, headers, tmp, crcs, w),
        Seq3 => serialize_seq_3(ctx, headers, crcs, w),
        Seq4 => serialize_seq_4(ctx, headers, tmp, crcs, w),
        Seq5 => serialize_seq_5(ctx, headers, crcs, w),
        Seq6 => serialize_seq_6(ctx, headers, tmp, crcs, w),
        Seq7 => serialize_seq_7(ctx, headers, crcs, w),
        Seq8 => serialize_seq_8(ctx, headers, tmp, crcs, w),
        CoCommon => serialize_co_common(ctx, headers, tmp, crcs, w),
        Ir | IrDyn => unreachable!("IR packets are built by the chain assembler"),
    }
}

#[inline]
fn msn_lsb(ctx: &TcpCompressorContext) -> u8 {
    (ctx.msn.value() & 0x0F) as u8
}

#[inline]
fn psh(headers: &TcpIpHeaders) -> u8 {
    headers.tcp.psh_flag as u8
}

/// Trailer byte shared by most short formats: msn(4) psh(1) crc3(3).
fn finish_with_msn_psh_crc3(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    w.write_u8(msn_lsb(ctx) << 4 | psh(headers) << 3)?;
    let crc_at = w.len() - 1;
    let crc = crcs.crc3(w.as_written());
    w.patch_u8(crc_at, w.written_u8(crc_at) | (crc & 0x07));
    Ok(())
}

/// Innermost IPv4 state used by the seq family.
fn inner_v4(ctx: &TcpCompressorContext, headers: &TcpIpHeaders) -> (IpIdBehavior, IpId) {
    match (ctx.innermost_ip(), headers.innermost_ip()) {
        (IpContext::V4(ip_ctx), IpHeader::V4(hdr)) => {
            (ip_ctx.ip_id_behavior, hdr.identification)
        }
        _ => (IpIdBehavior::Random, IpId::new(0)),
    }
}

fn serialize_rnd_1(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let seq18 = headers.tcp.seq_number.value() & 0x3FFFF;
    w.write_u8(DISC_RND_1 << 2 | (seq18 >> 16) as u8)?;
    w.write_u16(seq18 as u16)?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_rnd_2(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    w.write_u8(DISC_RND_2 << 4 | (tmp.seq_scaled & 0x0F) as u8)?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_rnd_3(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let ack15 = (headers.tcp.ack_number.value() & 0x7FFF) as u16;
    w.write_u16(ack15)?; // discriminator '0' is the zero top bit
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_rnd_4(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    w.write_u8(DISC_RND_4 << 4 | (tmp.ack_scaled & 0x0F) as u8)?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_rnd_5(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let seq14 = headers.tcp.seq_number.value() & 0x3FFF;
    let ack15 = headers.tcp.ack_number.value() & 0x7FFF;
    w.write_u8(DISC_RND_5 << 5 | psh(headers) << 4 | msn_lsb(ctx))?;
    let crc_at = w.len();
    w.write_u8(((seq14 >> 9) & 0x1F) as u8)?; // crc3 patched into the top bits
    w.write_u8((seq14 >> 1) as u8)?;
    w.write_u8(((seq14 & 0x01) << 7) as u8 | ((ack15 >> 8) & 0x7F) as u8)?;
    w.write_u8(ack15 as u8)?;
    let crc = crcs.crc3(w.as_written());
    w.patch_u8(crc_at, w.written_u8(crc_at) | (crc & 0x07) << 5);
    Ok(())
}

fn serialize_rnd_6(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let crc_at = w.len();
    w.write_u8(DISC_RND_6 << 4 | psh(headers))?; // crc3 patched into bits 3..1
    w.write_u16((headers.tcp.ack_number.value() & 0xFFFF) as u16)?;
    w.write_u8(msn_lsb(ctx) << 4 | (tmp.seq_scaled & 0x0F) as u8)?;
    let crc = crcs.crc3(w.as_written());
    w.patch_u8(crc_at, w.written_u8(crc_at) | (crc & 0x07) << 1);
    Ok(())
}

fn serialize_rnd_7(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let ack18 = headers.tcp.ack_number.value() & 0x3FFFF;
    w.write_u8(DISC_RND_7 << 2 | (ack18 >> 16) as u8)?;
    w.write_u16(ack18 as u16)?;
    w.write_u16(headers.tcp.window)?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_rnd_8(
    ctx: &mut TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let tcp = &headers.tcp;
    let list_present = tcp.has_options();
    let msn = msn_lsb(ctx);
    let ttl = headers.innermost_ip().ttl_hopl();

    w.write_u8(DISC_RND_8 << 3 | rsf_index_enc(tcp.rsf_flags) << 1 | list_present as u8)?;
    let crc_at = w.len();
    w.write_u8(msn >> 3)?; // crc7 patched into the top bits
    w.write_u8((msn & 0x07) << 5 | psh(headers) << 4 | (ttl & 0x07) << 1 | tmp.ecn_used as u8)?;
    w.write_u16((tcp.seq_number.value() & 0xFFFF) as u16)?;
    w.write_u16((tcp.ack_number.value() & 0xFFFF) as u16)?;
    if list_present {
        ctx.options.build_co_list(tcp, w)?;
    }
    let crc = crcs.crc7(w.as_written());
    w.patch_u8(crc_at, w.written_u8(crc_at) | (crc & 0x7F) << 1);
    Ok(())
}

fn serialize_seq_1(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let (behavior, ip_id) = inner_v4(ctx, headers);
    w.write_u8(DISC_SEQ_1 << 4 | ip_id_lsb(behavior, 4, ip_id, ctx.msn) as u8)?;
    w.write_u16((headers.tcp.seq_number.value() & 0xFFFF) as u16)?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_seq_2(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let (behavior, ip_id) = inner_v4(ctx, headers);
    let ip_id7 = ip_id_lsb(behavior, 7, ip_id, ctx.msn);
    w.write_u8(DISC_SEQ_2 << 3 | (ip_id7 >> 4) as u8)?;
    w.write_u8(((ip_id7 & 0x0F) << 4) as u8 | (tmp.seq_scaled & 0x0F) as u8)?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_seq_3(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let (behavior, ip_id) = inner_v4(ctx, headers);
    w.write_u8(DISC_SEQ_3 << 4 | ip_id_lsb(behavior, 4, ip_id, ctx.msn) as u8)?;
    w.write_u16((headers.tcp.ack_number.value() & 0xFFFF) as u16)?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_seq_4(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let (behavior, ip_id) = inner_v4(ctx, headers);
    w.write_u8(
        ((tmp.ack_scaled & 0x0F) as u8) << 3 | ip_id_lsb(behavior, 3, ip_id, ctx.msn) as u8,
    )?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_seq_5(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let (behavior, ip_id) = inner_v4(ctx, headers);
    w.write_u8(DISC_SEQ_5 << 4 | ip_id_lsb(behavior, 4, ip_id, ctx.msn) as u8)?;
    w.write_u16((headers.tcp.ack_number.value() & 0xFFFF) as u16)?;
    w.write_u16((headers.tcp.seq_number.value() & 0xFFFF) as u16)?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_seq_6(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let (behavior, ip_id) = inner_v4(ctx, headers);
    let scaled = (tmp.seq_scaled & 0x0F) as u8;
    w.write_u8(DISC_SEQ_6 << 3 | scaled >> 1)?;
    w.write_u8((scaled & 0x01) << 7 | ip_id_lsb(behavior, 7, ip_id, ctx.msn) as u8)?;
    w.write_u16((headers.tcp.ack_number.value() & 0xFFFF) as u16)?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_seq_7(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let (behavior, ip_id) = inner_v4(ctx, headers);
    let window15 = headers.tcp.window & 0x7FFF;
    w.write_u8(DISC_SEQ_7 << 4 | (window15 >> 11) as u8)?;
    w.write_u8((window15 >> 3) as u8)?;
    w.write_u8(((window15 & 0x07) << 5) as u8 | ip_id_lsb(behavior, 5, ip_id, ctx.msn) as u8)?;
    w.write_u16((headers.tcp.ack_number.value() & 0xFFFF) as u16)?;
    finish_with_msn_psh_crc3(ctx, headers, crcs, w)
}

fn serialize_seq_8(
    ctx: &mut TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let tcp = &headers.tcp;
    let (behavior, ip_id) = inner_v4(ctx, headers);
    let list_present = tcp.has_options();
    let ttl = headers.innermost_ip().ttl_hopl();
    let ack15 = tcp.ack_number.value() & 0x7FFF;
    let seq14 = tcp.seq_number.value() & 0x3FFF;

    w.write_u8(DISC_SEQ_8 << 4 | ip_id_lsb(behavior, 4, ip_id, ctx.msn) as u8)?;
    let crc_at = w.len();
    w.write_u8((list_present as u8) << 7)?; // crc7 patched into the low bits
    w.write_u8(msn_lsb(ctx) << 4 | psh(headers) << 3 | (ttl & 0x07))?;
    w.write_u8((tmp.ecn_used as u8) << 7 | ((ack15 >> 8) & 0x7F) as u8)?;
    w.write_u8(ack15 as u8)?;
    w.write_u8(rsf_index_enc(tcp.rsf_flags) << 6 | ((seq14 >> 8) & 0x3F) as u8)?;
    w.write_u8(seq14 as u8)?;
    if list_present {
        ctx.options.build_co_list(tcp, w)?;
    }
    let crc = crcs.crc7(w.as_written());
    w.patch_u8(crc_at, w.written_u8(crc_at) | (crc & 0x7F));
    Ok(())
}

fn serialize_co_common(
    ctx: &mut TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    w: &mut PacketWriter<'_>,
) -> Result<(), RohcBuildingError> {
    let tcp = &headers.tcp;
    let old_seq = ctx.old_tcp.seq_number.value();
    let old_ack = ctx.old_tcp.ack_number.value();
    let old_window = ctx.old_tcp.window;
    let old_urg_ptr = ctx.old_tcp.urg_ptr;
    let known_stride = ctx.ack_stride;
    let msn = msn_lsb(ctx);

    w.write_u8(DISC_CO_COMMON << 1 | tmp.ttl_irregular_chain_flag as u8)?;
    w.write_u8(
        (tcp.ack_flag as u8) << 7
            | psh(headers) << 6
            | rsf_index_enc(tcp.rsf_flags) << 4
            | msn,
    )?;
    let indicators_at = w.len();
    w.write_u8(0)?; // indicator byte, patched below
    w.write_u8(0)?; // flags byte, patched below
    let crc_byte_at = w.len();
    w.write_u8(0)?; // df + crc7, patched below

    let seq_indicator = variable_length_32(w, old_seq, tcp.seq_number.value())?;
    let ack_indicator = variable_length_32(w, old_ack, tcp.ack_number.value())?;
    let ack_stride_indicator = static_or_irreg16(w, known_stride, tmp.ack_stride)?;
    let window_indicator = static_or_irreg16(w, old_window, tcp.window)?;

    let (ip_id_indicator, behavior_bits, df) = match (ctx.innermost_ip(), headers.innermost_ip()) {
        (IpContext::V4(ip_ctx), IpHeader::V4(hdr)) => {
            let indicator = optional_ip_id_lsb(
                w,
                ip_ctx.ip_id_behavior,
                ip_ctx.last_ip_id,
                hdr.identification,
                ctx.msn,
            )?;
            (
                indicator,
                ip_ctx.ip_id_behavior.wire_value(),
                hdr.dont_fragment as u8,
            )
        }
        _ => (false, IP_ID_BEHAVIOR_RANDOM, 0),
    };

    let (inner_ctx_dscp, inner_ctx_ttl) = {
        let inner = ctx.innermost_ip();
        (inner.dscp(), inner.ttl_hopl())
    };
    let inner = headers.innermost_ip();
    let dscp_present = dscp_encode(w, inner_ctx_dscp, inner.dscp())?;
    let ttl_hopl_present = static_or_irreg8(w, inner_ctx_ttl, inner.ttl_hopl())?;

    let urg_ptr_present = if tcp.urg_flag {
        static_or_irreg16(w, old_urg_ptr, tcp.urg_ptr)?
    } else {
        false
    };

    let list_present = tcp.has_options();
    if list_present {
        ctx.options.build_co_list(tcp, w)?;
    }

    w.patch_u8(
        indicators_at,
        seq_indicator << 6
            | ack_indicator << 4
            | (ack_stride_indicator as u8) << 3
            | (window_indicator as u8) << 2
            | (ip_id_indicator as u8) << 1
            | urg_ptr_present as u8,
    );
    w.patch_u8(
        indicators_at + 1,
        (tmp.ecn_used as u8) << 6
            | (dscp_present as u8) << 5
            | (ttl_hopl_present as u8) << 4
            | (list_present as u8) << 3
            | behavior_bits << 1
            | tcp.urg_flag as u8,
    );
    w.patch_u8(crc_byte_at, df << 7);
    let crc = crcs.crc7(w.as_written());
    w.patch_u8(crc_byte_at, df << 7 | (crc & 0x7F));
    Ok(())
}
