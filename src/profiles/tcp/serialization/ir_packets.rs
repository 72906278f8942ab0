//! IR and IR-DYN packet assembly.
//!
//! Layout (after the CID bytes): packet type octet, profile octet, CRC-8
//! placeholder, static chain (IR only), dynamic chain. The CRC-8 is
//! computed over the whole packet, CID bytes included, with the CRC field
//! zeroed, then patched in.

use crate::cid::{code_cid_values, CidType};
use crate::constants::PROFILE_ID_TCP_IP;
use crate::crc::CrcCalculators;
use crate::error::{ParseContext, RohcBuildingError};
use crate::serialization::PacketWriter;

use super::super::chains::{build_dynamic_chain, build_static_chain};
use super::super::constants::{PACKET_TYPE_IR, PACKET_TYPE_IR_DYN};
use super::super::context::{CompressTmp, TcpCompressorContext};
use super::super::protocol_types::TcpIpHeaders;

/// Builds a complete IR (or, with `dynamic_only`, IR-DYN) packet into
/// `out` and returns its length.
///
/// # Errors
/// - [`RohcBuildingError::BufferTooSmall`] - `out` cannot hold the packet
pub fn build_ir_packet(
    ctx: &mut TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
    crcs: &CrcCalculators,
    cid_type: CidType,
    dynamic_only: bool,
    out: &mut [u8],
) -> Result<usize, RohcBuildingError> {
    let prefix = code_cid_values(cid_type, ctx.cid, out)?;
    out[prefix.first_position] = if dynamic_only {
        PACKET_TYPE_IR_DYN
    } else {
        PACKET_TYPE_IR
    };

    let context_tag = if dynamic_only {
        ParseContext::IrDynPacket
    } else {
        ParseContext::IrPacket
    };
    let chains_len = {
        let mut w = PacketWriter::new(&mut out[prefix.after..], context_tag);
        w.write_u8(PROFILE_ID_TCP_IP)?;
        w.write_u8(0)?; // CRC-8, patched over the finished packet
        if !dynamic_only {
            build_static_chain(headers, &mut w)?;
        }
        build_dynamic_chain(ctx, headers, tmp, &mut w)?;
        w.len()
    };

    let total = prefix.after + chains_len;
    let crc = crcs.crc8(&out[..total]);
    out[prefix.after + 1] = crc;
    Ok(total)
}
