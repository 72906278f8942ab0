//! The TCP/IP profile compressor entry points.
//!
//! `TcpProfileHandler` owns the per-channel pieces (CRC calculators, CID
//! addressing mode) and drives one packet through the pipeline: eligibility
//! and context checks, per-packet analysis, the IR/FO/SO state machine,
//! serialization of the chosen packet, and the context commit.

use tracing::debug;

use crate::cid::{code_cid_values, CidType};
use crate::crc::CrcCalculators;
use crate::encodings::field_scaling;
use crate::error::{CompressionError, ParseContext, RohcError, RohcParsingError};
use crate::packet_defs::{RohcPacketType, RohcProfile};
use crate::random::RandomSource;
use crate::serialization::headers::deserialize_tcp_ip_headers;
use crate::serialization::PacketWriter;
use crate::types::ContextId;

use super::classifier::decide_co_packet;
use super::chains::build_irregular_chain;
use super::context::{CompressTmp, IpContext, TcpCompressorContext, TcpCompressorMode};
use super::encodings::rsf_index_encodable;
use super::protocol_types::{IpHeader, TcpIpHeaders};
use super::serialization::base_header::serialize_co_base_header;
use super::serialization::ir_packets::build_ir_packet;

/// Result of `check_context`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextCheck {
    /// The packet continues the context's flow.
    Belongs,
    /// The packet is a different flow; the caller should look up or
    /// create another context.
    DifferentFlow,
    /// The packet shares the flow identifiers but its chain shape does
    /// not match the context; this context cannot compress it.
    Uncompressible,
}

/// Outcome of a successful `compress` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressResult {
    /// Bytes written into the output buffer.
    pub len: usize,
    /// The format that was emitted.
    pub packet_type: RohcPacketType,
    /// Offset of the TCP payload in the source packet, for the caller to
    /// splice behind the compressed header.
    pub payload_offset: usize,
}

/// Compressor-side handler for ROHC profile 0x0006.
#[derive(Debug)]
pub struct TcpProfileHandler {
    crc_calculators: CrcCalculators,
    cid_type: CidType,
}

impl Default for TcpProfileHandler {
    fn default() -> Self {
        Self::new(CidType::Small)
    }
}

impl TcpProfileHandler {
    /// Creates a handler for the given CID addressing mode.
    pub fn new(cid_type: CidType) -> Self {
        Self {
            crc_calculators: CrcCalculators::new(),
            cid_type,
        }
    }

    /// The profile this handler implements.
    pub fn profile_id(&self) -> RohcProfile {
        RohcProfile::TcpIp
    }

    /// Whether a raw packet is eligible for this profile: IPv4 (IHL 5, no
    /// fragmentation) or IPv6 headers down to a TCP transport, no ESP.
    pub fn check_profile(&self, packet: &[u8]) -> bool {
        deserialize_tcp_ip_headers(packet).is_ok()
    }

    /// Parses a raw packet into the structured header view.
    ///
    /// # Errors
    /// - [`RohcParsingError`] - The packet is malformed or ineligible
    pub fn parse_headers(&self, packet: &[u8]) -> Result<TcpIpHeaders, RohcParsingError> {
        deserialize_tcp_ip_headers(packet)
    }

    /// Creates a compressor context from the first packet of a flow,
    /// seeding the MSN from the host's randomness source.
    pub fn create_compressor_context(
        &self,
        cid: ContextId,
        headers: &TcpIpHeaders,
        random: &mut dyn RandomSource,
    ) -> TcpCompressorContext {
        TcpCompressorContext::new(cid, headers, random.next_u32())
    }

    /// Whether `headers` continues the flow held by `ctx` (addresses,
    /// flow label, chain shape and TCP ports).
    pub fn check_context(&self, ctx: &TcpCompressorContext, headers: &TcpIpHeaders) -> ContextCheck {
        if ctx.ip_contexts.len() != headers.ip_headers.len() {
            return ContextCheck::Uncompressible;
        }
        for (ip_ctx, ip_hdr) in ctx.ip_contexts.iter().zip(headers.ip_headers.iter()) {
            match (ip_ctx, ip_hdr) {
                (IpContext::V4(c), IpHeader::V4(h)) => {
                    if c.src_addr != h.src_addr
                        || c.dst_addr != h.dst_addr
                        || c.protocol != h.protocol
                    {
                        return ContextCheck::DifferentFlow;
                    }
                }
                (IpContext::V6(c), IpHeader::V6(h)) => {
                    if c.src_addr != h.src_addr || c.dst_addr != h.dst_addr {
                        return ContextCheck::DifferentFlow;
                    }
                    if c.flow_label != h.flow_label {
                        return ContextCheck::DifferentFlow;
                    }
                }
                _ => return ContextCheck::Uncompressible,
            }
        }
        if ctx.old_tcp.src_port != headers.tcp.src_port
            || ctx.old_tcp.dst_port != headers.tcp.dst_port
        {
            return ContextCheck::DifferentFlow;
        }
        ContextCheck::Belongs
    }

    /// Compresses one packet of the flow into `out`.
    ///
    /// On success the context has been committed: its snapshots describe
    /// the packet just compressed and the MSN has advanced.
    ///
    /// # Errors
    /// - [`RohcError::Compression`] - The packet does not belong to the
    ///   context
    /// - [`RohcError::Building`] - `out` is too small
    pub fn compress(
        &self,
        ctx: &mut TcpCompressorContext,
        headers: &TcpIpHeaders,
        out: &mut [u8],
    ) -> Result<CompressResult, RohcError> {
        match self.check_context(ctx, headers) {
            ContextCheck::Belongs => {}
            ContextCheck::DifferentFlow => {
                return Err(CompressionError::ContextMismatch { cid: ctx.cid }.into());
            }
            ContextCheck::Uncompressible => {
                return Err(CompressionError::Uncompressible {
                    cid: ctx.cid,
                    reason: "header chain shape does not match the context",
                }
                .into());
            }
        }

        let (tmp, force_ir) = self.analyze_packet(ctx, headers);
        if force_ir {
            debug!(cid = %ctx.cid, "re-synchronizing: state reset to IR");
            ctx.mode = TcpCompressorMode::InitializationAndRefresh;
        }

        let (len, packet_type) = match ctx.mode {
            TcpCompressorMode::InitializationAndRefresh => {
                let len = build_ir_packet(
                    ctx,
                    headers,
                    &tmp,
                    &self.crc_calculators,
                    self.cid_type,
                    false,
                    out,
                )?;
                ctx.mode = TcpCompressorMode::FirstOrder;
                (len, RohcPacketType::Ir)
            }
            TcpCompressorMode::FirstOrder => {
                let len = build_ir_packet(
                    ctx,
                    headers,
                    &tmp,
                    &self.crc_calculators,
                    self.cid_type,
                    true,
                    out,
                )?;
                ctx.mode = TcpCompressorMode::SecondOrder;
                (len, RohcPacketType::IrDyn)
            }
            TcpCompressorMode::SecondOrder => {
                if !rsf_index_encodable(headers.tcp.rsf_flags) {
                    // RSF combinations only fit the full 3-bit group of
                    // the dynamic chain.
                    let len = build_ir_packet(
                        ctx,
                        headers,
                        &tmp,
                        &self.crc_calculators,
                        self.cid_type,
                        true,
                        out,
                    )?;
                    (len, RohcPacketType::IrDyn)
                } else {
                    let packet_type = decide_co_packet(ctx, headers, &tmp);
                    let len = self.build_co_packet(packet_type, ctx, headers, &tmp, out)?;
                    (len, packet_type)
                }
            }
        };

        ctx.commit(headers, &tmp, packet_type);
        debug!(cid = %ctx.cid, packet_type = %packet_type, len, "packet compressed");

        Ok(CompressResult {
            len,
            packet_type,
            payload_offset: headers.header_len,
        })
    }

    /// Convenience wrapper: parse, then compress.
    ///
    /// # Errors
    /// - [`RohcError::Parsing`] - The packet is ineligible
    /// - [`RohcError`] - As for [`Self::compress`]
    pub fn compress_packet(
        &self,
        ctx: &mut TcpCompressorContext,
        packet: &[u8],
        out: &mut [u8],
    ) -> Result<CompressResult, RohcError> {
        let headers = deserialize_tcp_ip_headers(packet)?;
        self.compress(ctx, &headers, out)
    }

    /// Derives the per-packet values and decides whether the packet
    /// requires IR re-synchronization (extension header change, or an
    /// outer-header field the CO chains cannot carry).
    fn analyze_packet(
        &self,
        ctx: &mut TcpCompressorContext,
        headers: &TcpIpHeaders,
    ) -> (CompressTmp, bool) {
        let mut force_ir = ctx.refresh_extension_contexts(headers);

        let mut ecn_used = headers.tcp.ecn_flags != 0;
        let mut ttl_irregular = false;
        let header_count = headers.ip_headers.len();
        for (position, ip) in headers.ip_headers.iter().enumerate() {
            ecn_used |= ip.ecn() != 0;
            let is_innermost = position + 1 == header_count;
            let ip_ctx = &ctx.ip_contexts[position];
            if !is_innermost {
                if ip.ttl_hopl() != ip_ctx.ttl_hopl() {
                    ttl_irregular = true;
                }
                // Outer DSCP only travels irregularly while ECN is in
                // use; outer DF never travels outside the dynamic chain.
                if let (IpContext::V4(c), IpHeader::V4(h)) = (ip_ctx, ip) {
                    if c.df != h.dont_fragment {
                        force_ir = true;
                    }
                }
                if ip.dscp() != ip_ctx.dscp() && !ecn_used {
                    force_ir = true;
                }
            }
        }

        ctx.update_ip_id_behavior(headers);
        let ack_stride = ctx.detect_ack_stride(&headers.tcp);

        let payload_size = headers.payload_len as u32;
        let (seq_scaled, seq_residue) =
            field_scaling(payload_size, headers.tcp.seq_number.value());
        let (ack_scaled, ack_residue) =
            field_scaling(ack_stride as u32, headers.tcp.ack_number.value());

        let tmp = CompressTmp {
            payload_size,
            ecn_used,
            ttl_irregular_chain_flag: ttl_irregular,
            ip_inner_ecn: headers.innermost_ip().ecn(),
            seq_scaled,
            seq_residue,
            ack_scaled,
            ack_residue,
            ack_stride,
        };
        (tmp, force_ir)
    }

    /// Assembles a CO packet: CID bytes, base header, irregular chain.
    /// With large CIDs the base header's first octet is swapped in front
    /// of the CID bytes afterwards.
    fn build_co_packet(
        &self,
        packet_type: RohcPacketType,
        ctx: &mut TcpCompressorContext,
        headers: &TcpIpHeaders,
        tmp: &CompressTmp,
        out: &mut [u8],
    ) -> Result<usize, RohcError> {
        let prefix = code_cid_values(self.cid_type, ctx.cid, out)?;
        let base_start = prefix.after - 1;
        let saved_byte = out[base_start];

        let written = {
            let mut w = PacketWriter::new(&mut out[base_start..], ParseContext::CoBaseHeader);
            serialize_co_base_header(
                packet_type,
                ctx,
                headers,
                tmp,
                &self.crc_calculators,
                &mut w,
            )?;
            build_irregular_chain(ctx, headers, tmp, &mut w)?;
            w.len()
        };

        if self.cid_type == CidType::Large {
            out[prefix.first_position] = out[base_start];
            out[base_start] = saved_byte;
        }

        Ok(base_start + written)
    }
}
