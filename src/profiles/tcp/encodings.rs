//! Field encodings specific to the TCP profile (RFC 6846 Section 6.5).
//!
//! These are the compressed-value building blocks shared by the chain
//! builders and the CO base headers: self-describing variable-length
//! 32-bit values, static-or-irregular fields, the timestamp and SACK LSB
//! encodings, the RSF index, and the IP-ID offset encodings.

use tracing::warn;

use crate::error::RohcBuildingError;
use crate::serialization::PacketWriter;
use crate::types::{IpId, Msn, Timestamp};

use super::context::IpIdBehavior;
use super::protocol_types::TcpHeader;

/// Encodes a 32-bit value against its context reference with a 2-bit
/// indicator: `00` absent (unchanged), `01` one byte, `10` two bytes,
/// `11` four bytes.
pub fn variable_length_32(
    w: &mut PacketWriter<'_>,
    reference: u32,
    value: u32,
) -> Result<u8, RohcBuildingError> {
    if value == reference {
        Ok(0b00)
    } else if value & 0xFFFF_FF00 == reference & 0xFFFF_FF00 {
        w.write_u8(value as u8)?;
        Ok(0b01)
    } else if value & 0xFFFF_0000 == reference & 0xFFFF_0000 {
        w.write_u16(value as u16)?;
        Ok(0b10)
    } else {
        w.write_u32(value)?;
        Ok(0b11)
    }
}

/// static_or_irreg for an 8-bit field: emits nothing when the value
/// matches the context, the full octet otherwise. Returns the presence
/// indicator.
pub fn static_or_irreg8(
    w: &mut PacketWriter<'_>,
    reference: u8,
    value: u8,
) -> Result<bool, RohcBuildingError> {
    if value == reference {
        Ok(false)
    } else {
        w.write_u8(value)?;
        Ok(true)
    }
}

/// static_or_irreg for a 16-bit field.
pub fn static_or_irreg16(
    w: &mut PacketWriter<'_>,
    reference: u16,
    value: u16,
) -> Result<bool, RohcBuildingError> {
    if value == reference {
        Ok(false)
    } else {
        w.write_u16(value)?;
        Ok(true)
    }
}

/// dscp_enc: emits the 6-bit DSCP (padded to an octet) when it differs
/// from the context. Returns the presence indicator.
pub fn dscp_encode(
    w: &mut PacketWriter<'_>,
    reference: u8,
    dscp: u8,
) -> Result<bool, RohcBuildingError> {
    if dscp == reference {
        Ok(false)
    } else {
        w.write_u8(dscp & 0x3F)?;
        Ok(true)
    }
}

/// rsf_index_enc: maps the RST/SYN/FIN group onto 2 bits.
///
/// Callers must have verified [`rsf_index_encodable`]; combinations fall
/// back to the chains that carry the full 3-bit group.
#[inline]
pub fn rsf_index_enc(rsf_flags: u8) -> u8 {
    match rsf_flags {
        0b100 => 1, // RST
        0b010 => 2, // SYN
        0b001 => 3, // FIN
        _ => 0,
    }
}

/// Whether the RSF group can travel in a 2-bit index.
#[inline]
pub fn rsf_index_encodable(rsf_flags: u8) -> bool {
    matches!(rsf_flags, 0b000 | 0b001 | 0b010 | 0b100)
}

/// The IP-ID offset used by sequential behaviors: the distance between
/// the (possibly byte-swapped) IP-ID and the MSN.
#[inline]
pub fn ip_id_offset(behavior: IpIdBehavior, ip_id: IpId, msn: Msn) -> u16 {
    let id = match behavior {
        IpIdBehavior::SequentialSwapped => ip_id.swapped().value(),
        _ => ip_id.value(),
    };
    id.wrapping_sub(msn.value())
}

/// ip_id_lsb: the `k` low bits of the IP-ID offset (RFC 6846 Section
/// 6.5.2.3). Only meaningful for the sequential behaviors.
#[inline]
pub fn ip_id_lsb(behavior: IpIdBehavior, k: u8, ip_id: IpId, msn: Msn) -> u16 {
    debug_assert!(behavior.is_sequential_kind());
    debug_assert!(k <= 16);
    let mask = if k == 16 { u16::MAX } else { (1u16 << k) - 1 };
    ip_id_offset(behavior, ip_id, msn) & mask
}

/// optional_ip_id_lsb used by co_common: sequential behaviors transmit 8
/// offset LSBs when the window allows, the full 16-bit offset otherwise;
/// random and zero behaviors transmit nothing here. Returns the
/// indicator bit.
pub fn optional_ip_id_lsb(
    w: &mut PacketWriter<'_>,
    behavior: IpIdBehavior,
    last_ip_id: IpId,
    ip_id: IpId,
    msn: Msn,
) -> Result<bool, RohcBuildingError> {
    if !behavior.is_sequential_kind() {
        return Ok(false);
    }
    let offset = ip_id_offset(behavior, ip_id, msn);
    let reference = {
        let last = match behavior {
            IpIdBehavior::SequentialSwapped => last_ip_id.swapped().value(),
            _ => last_ip_id.value(),
        };
        last.wrapping_sub(msn.value().wrapping_sub(1))
    };
    if crate::encodings::is_value_in_lsb_interval(offset as u64, reference as u64, 8, 3) {
        w.write_u8(offset as u8)?;
        Ok(false)
    } else {
        w.write_u16(offset)?;
        Ok(true)
    }
}

/// Compresses one TCP Timestamp option field against its cached previous
/// value (RFC 6846 Section 6.3.5): 1 to 4 bytes selected by how many
/// high bits of the reference still match, with discriminators `0`,
/// `10`, `110` and `111`.
pub fn ts_lsb(
    w: &mut PacketWriter<'_>,
    reference: Timestamp,
    ts: Timestamp,
) -> Result<(), RohcBuildingError> {
    let value = ts.value();
    let last = reference.value();

    if value & 0xFFFF_FF80 == last & 0xFFFF_FF80 {
        w.write_u8((value & 0x7F) as u8)
    } else if value & 0xFFFF_C000 == last & 0xFFFF_C000 {
        w.write_u8(0x80 | ((value >> 8) & 0x3F) as u8)?;
        w.write_u8(value as u8)
    } else if value & 0xFFE0_0000 == last & 0xFFE0_0000 {
        w.write_u8(0xC0 | ((value >> 16) & 0x1F) as u8)?;
        w.write_u8((value >> 8) as u8)?;
        w.write_u8(value as u8)
    } else if value & 0xE000_0000 == last & 0xE000_0000 {
        w.write_u8(0xE0 | ((value >> 24) & 0x1F) as u8)?;
        w.write_u8((value >> 16) as u8)?;
        w.write_u8((value >> 8) as u8)?;
        w.write_u8(value as u8)
    } else {
        // Even the 3 high bits moved; the decoder can only take this via
        // the '111' discriminator, which mangles the top bits.
        warn!(ts = value, reference = last, "timestamp outside every LSB window");
        w.write_u32(value)
    }
}

/// sack_var_length_enc for one SACK field (RFC 6846 Section 6.3.6): the
/// delta to `base` in 2, 3 or 4 bytes with discriminators `0`, `10` and
/// `11`.
pub fn sack_pure_lsb(
    w: &mut PacketWriter<'_>,
    base: u32,
    value: u32,
) -> Result<(), RohcBuildingError> {
    let delta = value.wrapping_sub(base);

    if delta < 0x8000 {
        w.write_u8(((delta >> 8) & 0x7F) as u8)?;
        w.write_u8(delta as u8)
    } else if delta < 0x40_0000 {
        w.write_u8(0x80 | ((delta >> 16) & 0x3F) as u8)?;
        w.write_u8((delta >> 8) as u8)?;
        w.write_u8(delta as u8)
    } else if delta < 0x4000_0000 {
        w.write_u8(0xC0 | ((delta >> 24) & 0x3F) as u8)?;
        w.write_u8((delta >> 16) as u8)?;
        w.write_u8((delta >> 8) as u8)?;
        w.write_u8(delta as u8)
    } else {
        Err(RohcBuildingError::InvalidFieldValueForBuild {
            field: crate::error::Field::AckLsb,
            value: delta,
            max_bits: 30,
        })
    }
}

/// Encodes a GRE or AH sequence number against its cached previous value
/// with a one-bit discriminator: `0` plus 7 LSBs when the high 25 bits
/// match, `1` plus the low 31 bits otherwise.
pub fn lsb_7_or_31(
    w: &mut PacketWriter<'_>,
    reference: u32,
    sequence: u32,
) -> Result<(), RohcBuildingError> {
    if sequence & 0xFFFF_FF80 == reference & 0xFFFF_FF80 {
        w.write_u8((sequence & 0x7F) as u8)
    } else {
        w.write_u32(0x8000_0000 | sequence)
    }
}

/// CRC over the static TCP fields (the port pair). The decompressor uses
/// it as a consistency check against its reconstructed static chain.
pub fn tcp_static_crc(crcs: &crate::crc::CrcCalculators, tcp: &TcpHeader) -> u8 {
    let mut input = [0u8; 4];
    input[..2].copy_from_slice(&tcp.src_port.to_be_bytes());
    input[2..].copy_from_slice(&tcp.dst_port.to_be_bytes());
    crcs.crc8(&input)
}

/// CRC over the TCP fields subject to change (sequence and
/// acknowledgment numbers, flags, window, checksum, urgent pointer).
pub fn tcp_dynamic_crc(crcs: &crate::crc::CrcCalculators, tcp: &TcpHeader) -> u8 {
    let mut input = [0u8; 16];
    input[..4].copy_from_slice(&tcp.seq_number.to_be_bytes());
    input[4..8].copy_from_slice(&tcp.ack_number.to_be_bytes());
    input[8] = tcp.res_flags & 0x0F;
    input[9] = (tcp.ecn_flags & 0x03) << 6
        | (tcp.urg_flag as u8) << 5
        | (tcp.ack_flag as u8) << 4
        | (tcp.psh_flag as u8) << 3
        | (tcp.rsf_flags & 0x07);
    input[10..12].copy_from_slice(&tcp.window.to_be_bytes());
    input[12..14].copy_from_slice(&tcp.checksum.to_be_bytes());
    input[14..16].copy_from_slice(&tcp.urg_ptr.to_be_bytes());
    crcs.crc8(&input)
}
