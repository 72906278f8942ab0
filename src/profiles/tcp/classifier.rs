//! CO packet format selection.
//!
//! Decides which compressed base header carries the current packet, given
//! the deltas against the context. The decision is a predicate tree over
//! the changed fields; every candidate verifies that each of its LSB
//! fields actually covers the observed delta before being selected, and
//! any miss falls through, ultimately to co_common, which always fits.

use tracing::debug;

use crate::encodings::is_value_in_lsb_interval;
use crate::packet_defs::RohcPacketType;
use crate::types::{IpId, Msn};

use super::context::{CompressTmp, IpContext, IpIdBehavior, TcpCompressorContext};
use super::encodings::ip_id_offset;
use super::protocol_types::{IpHeader, TcpIpHeaders};

/// Per-field LSB widths and interpretation offsets, `(k, p)` pairs taken
/// from the format definitions.
mod window {
    pub const MSN: (u8, i64) = (4, 4);
    pub const SEQ_14: (u8, i64) = (14, 8191);
    pub const SEQ_16: (u8, i64) = (16, 32767);
    pub const SEQ_16_WIDE: (u8, i64) = (16, 65535);
    pub const SEQ_18: (u8, i64) = (18, 65535);
    pub const SEQ_SCALED: (u8, i64) = (4, 7);
    pub const ACK_15: (u8, i64) = (15, 8191);
    pub const ACK_16: (u8, i64) = (16, 16383);
    pub const ACK_16_MID: (u8, i64) = (16, 32767);
    pub const ACK_16_WIDE: (u8, i64) = (16, 65535);
    pub const ACK_18: (u8, i64) = (18, 65535);
    pub const ACK_SCALED: (u8, i64) = (4, 3);
    pub const WINDOW_15: (u8, i64) = (15, 16383);
    pub const TTL_3: (u8, i64) = (3, 3);
    pub const IP_ID_3: (u8, i64) = (3, 1);
    pub const IP_ID_4: (u8, i64) = (4, 3);
    pub const IP_ID_5: (u8, i64) = (5, 3);
    pub const IP_ID_7: (u8, i64) = (7, 3);
}

struct Deltas<'a> {
    ctx: &'a TcpCompressorContext,
    headers: &'a TcpIpHeaders,
    tmp: &'a CompressTmp,
    seq_family: bool,
    behavior: IpIdBehavior,
    inner_ip_id: IpId,
    last_ip_id: IpId,
    seq_changed: bool,
    ack_changed: bool,
    window_changed: bool,
    rsf_changed: bool,
    inner_ttl_changed: bool,
}

impl Deltas<'_> {
    fn seq_in(&self, (k, p): (u8, i64)) -> bool {
        is_value_in_lsb_interval(
            self.headers.tcp.seq_number.as_u64(),
            self.ctx.old_tcp.seq_number.as_u64(),
            k,
            p,
        )
    }

    fn ack_in(&self, (k, p): (u8, i64)) -> bool {
        is_value_in_lsb_interval(
            self.headers.tcp.ack_number.as_u64(),
            self.ctx.old_tcp.ack_number.as_u64(),
            k,
            p,
        )
    }

    fn window_in(&self, (k, p): (u8, i64)) -> bool {
        is_value_in_lsb_interval(
            self.headers.tcp.window as u64,
            self.ctx.old_tcp.window as u64,
            k,
            p,
        )
    }

    fn ttl_in(&self, (k, p): (u8, i64)) -> bool {
        let ctx_ttl = self.ctx.innermost_ip().ttl_hopl();
        is_value_in_lsb_interval(
            self.headers.innermost_ip().ttl_hopl() as u64,
            ctx_ttl as u64,
            k,
            p,
        )
    }

    /// Whether the IP-ID offset delta fits the given window. Vacuously
    /// true in the rnd family, which carries no IP-ID field.
    fn ip_id_in(&self, (k, p): (u8, i64)) -> bool {
        if !self.seq_family {
            return true;
        }
        let offset = ip_id_offset(self.behavior, self.inner_ip_id, self.ctx.msn);
        let reference = ip_id_offset(
            self.behavior,
            self.last_ip_id,
            Msn::new(self.ctx.msn.value().wrapping_sub(1)),
        );
        is_value_in_lsb_interval(offset as u64, reference as u64, k, p)
    }

    /// Scaled sequence usable: a payload is present, the residue the
    /// decompressor holds still applies, and the scaled delta fits.
    fn seq_scaled_ok(&self) -> bool {
        self.tmp.payload_size != 0
            && self.tmp.seq_residue == self.ctx.seq_residue
            && is_value_in_lsb_interval(
                self.tmp.seq_scaled as u64,
                self.ctx.seq_scaled as u64,
                window::SEQ_SCALED.0,
                window::SEQ_SCALED.1,
            )
    }

    /// Scaled acknowledgment usable: the stride is established and
    /// unchanged, the residue holds, and the scaled delta fits.
    fn ack_scaled_ok(&self) -> bool {
        self.ctx.ack_stride != 0
            && self.tmp.ack_stride == self.ctx.ack_stride
            && self.tmp.ack_residue == self.ctx.ack_residue
            && is_value_in_lsb_interval(
                self.tmp.ack_scaled as u64,
                self.ctx.ack_scaled as u64,
                window::ACK_SCALED.0,
                window::ACK_SCALED.1,
            )
    }
}

/// Selects the CO base header for the current packet.
///
/// Callers have already ruled out IR/IR-DYN and verified that the RSF
/// group is index-encodable.
pub fn decide_co_packet(
    ctx: &TcpCompressorContext,
    headers: &TcpIpHeaders,
    tmp: &CompressTmp,
) -> RohcPacketType {
    let tcp = &headers.tcp;
    let old = &ctx.old_tcp;

    let (behavior, last_behavior, inner_ip_id, last_ip_id, df_changed) =
        match (ctx.innermost_ip(), headers.innermost_ip()) {
            (IpContext::V4(ip_ctx), IpHeader::V4(hdr)) => (
                ip_ctx.ip_id_behavior,
                ip_ctx.last_ip_id_behavior,
                hdr.identification,
                ip_ctx.last_ip_id,
                hdr.dont_fragment != ip_ctx.df,
            ),
            _ => (
                IpIdBehavior::Random,
                IpIdBehavior::Random,
                IpId::new(0),
                IpId::new(0),
                false,
            ),
        };

    // Conditions only co_common can communicate.
    let forced = tcp.ack_flag != old.ack_flag
        || tcp.urg_flag != old.urg_flag
        || tcp.urg_flag
        || behavior != last_behavior
        || df_changed
        || tcp.ecn_flags != old.ecn_flags
        || tmp.ecn_used != ctx.ecn_used
        || tmp.ttl_irregular_chain_flag
        || tmp.ack_stride != ctx.ack_stride;
    if forced {
        debug!("classifier: forced co_common");
        return RohcPacketType::CoCommon;
    }

    let deltas = Deltas {
        ctx,
        headers,
        tmp,
        seq_family: matches!(headers.innermost_ip(), IpHeader::V4(_))
            && behavior.is_sequential_kind(),
        behavior,
        inner_ip_id,
        last_ip_id,
        seq_changed: tcp.seq_number != old.seq_number,
        ack_changed: tcp.ack_flag && tcp.ack_number != old.ack_number,
        window_changed: tcp.window != old.window,
        rsf_changed: tcp.rsf_flags != old.rsf_flags,
        inner_ttl_changed: headers.innermost_ip().ttl_hopl() != ctx.innermost_ip().ttl_hopl(),
    };

    let chosen = select(&deltas);
    debug!(packet_type = %chosen, "classifier decision");
    chosen
}

fn select(d: &Deltas<'_>) -> RohcPacketType {
    use RohcPacketType::*;

    debug_assert!(is_value_in_lsb_interval(
        d.ctx.msn.as_u64(),
        d.ctx.msn.as_u64().wrapping_sub(1),
        window::MSN.0,
        window::MSN.1,
    ));

    // Anything carrying options, an RSF change, ECN usage or an innermost
    // TTL step needs the 7-bit-CRC formats with their extra fields.
    if d.headers.tcp.has_options() || d.rsf_changed || d.tmp.ecn_used || d.inner_ttl_changed {
        let fits = !d.window_changed
            && d.ttl_in(window::TTL_3)
            && if d.seq_family {
                d.seq_in(window::SEQ_14) && d.ack_in(window::ACK_15) && d.ip_id_in(window::IP_ID_4)
            } else {
                d.seq_in(window::SEQ_16_WIDE) && d.ack_in(window::ACK_16_WIDE)
            };
        return if fits {
            if d.seq_family { Seq8 } else { Rnd8 }
        } else {
            CoCommon
        };
    }

    if d.window_changed {
        let fits = !d.seq_changed
            && if d.seq_family {
                d.window_in(window::WINDOW_15)
                    && d.ack_in(window::ACK_16_MID)
                    && d.ip_id_in(window::IP_ID_5)
            } else {
                d.ack_in(window::ACK_18)
            };
        return if fits {
            if d.seq_family { Seq7 } else { Rnd7 }
        } else {
            CoCommon
        };
    }

    match (d.seq_changed, d.ack_changed) {
        (true, true) => {
            if d.seq_scaled_ok() && d.ack_in(window::ACK_16) && d.ip_id_in(window::IP_ID_7) {
                if d.seq_family { Seq6 } else { Rnd6 }
            } else if d.seq_in(if d.seq_family { window::SEQ_16 } else { window::SEQ_14 })
                && d.ack_in(if d.seq_family { window::ACK_16 } else { window::ACK_15 })
                && d.ip_id_in(window::IP_ID_4)
            {
                if d.seq_family { Seq5 } else { Rnd5 }
            } else {
                CoCommon
            }
        }
        (false, true) => {
            if d.ack_scaled_ok() && d.ip_id_in(window::IP_ID_3) {
                if d.seq_family { Seq4 } else { Rnd4 }
            } else if d.ack_in(if d.seq_family { window::ACK_16 } else { window::ACK_15 })
                && d.ip_id_in(window::IP_ID_4)
            {
                if d.seq_family { Seq3 } else { Rnd3 }
            } else {
                CoCommon
            }
        }
        (true, false) => {
            if d.seq_scaled_ok() && d.ip_id_in(window::IP_ID_7) {
                if d.seq_family { Seq2 } else { Rnd2 }
            } else if d.seq_in(if d.seq_family { window::SEQ_16 } else { window::SEQ_18 })
                && d.ip_id_in(window::IP_ID_4)
            {
                if d.seq_family { Seq1 } else { Rnd1 }
            } else {
                CoCommon
            }
        }
        (false, false) => {
            // Only the MSN (and possibly the PSH flag) moved.
            if d.ip_id_in(window::IP_ID_4) {
                if d.seq_family { Seq1 } else { Rnd1 }
            } else {
                CoCommon
            }
        }
    }
}
