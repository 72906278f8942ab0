//! Shared helpers for the TCP-profile integration tests.
//!
//! Provides a raw-packet builder and helpers to walk a fresh flow through
//! its IR and IR-DYN packets so tests can focus on steady-state behavior.

#![allow(dead_code)] // Not every test file uses every helper.

use rohcpress::profiles::tcp::{TcpCompressorContext, TcpProfileHandler};
use rohcpress::random::FixedRandom;
use rohcpress::types::ContextId;
use rohcpress::{CompressResult, RohcPacketType};

/// Deterministic MSN seed used by every test flow.
pub const TEST_MSN_SEED: u32 = 0x0064;

/// Builder for raw IPv4/TCP test packets.
#[derive(Debug, Clone)]
pub struct TcpPacketBuilder {
    pub src_addr: [u8; 4],
    pub dst_addr: [u8; 4],
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    /// Raw TCP flag byte (CWR..FIN).
    pub flags: u8,
    pub window: u16,
    pub ip_id: u16,
    pub ttl: u8,
    pub dscp: u8,
    pub ecn: u8,
    pub df: bool,
    pub urg_ptr: u16,
    /// Raw option bytes; must be a multiple of 4.
    pub options: Vec<u8>,
    pub payload_len: usize,
}

impl Default for TcpPacketBuilder {
    fn default() -> Self {
        Self {
            src_addr: [192, 168, 1, 10],
            dst_addr: [192, 168, 1, 20],
            src_port: 5001,
            dst_port: 44100,
            seq: 0x1000_0000,
            ack: 0x2000_0000,
            flags: 0x10, // ACK
            window: 8192,
            ip_id: 0x0100,
            ttl: 64,
            dscp: 0,
            ecn: 0,
            df: true,
            urg_ptr: 0,
            options: Vec::new(),
            payload_len: 0,
        }
    }
}

impl TcpPacketBuilder {
    pub fn seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self
    }

    pub fn ack(mut self, ack: u32) -> Self {
        self.ack = ack;
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn window(mut self, window: u16) -> Self {
        self.window = window;
        self
    }

    pub fn ip_id(mut self, ip_id: u16) -> Self {
        self.ip_id = ip_id;
        self
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn payload_len(mut self, payload_len: usize) -> Self {
        self.payload_len = payload_len;
        self
    }

    pub fn options(mut self, options: Vec<u8>) -> Self {
        assert_eq!(options.len() % 4, 0, "options must pad to 32-bit words");
        self.options = options;
        self
    }

    pub fn urg(mut self, urg_ptr: u16) -> Self {
        self.flags |= 0x20;
        self.urg_ptr = urg_ptr;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let tcp_len = 20 + self.options.len();
        let total = 20 + tcp_len + self.payload_len;
        let mut p = Vec::with_capacity(total);

        p.push(0x45);
        p.push(self.dscp << 2 | self.ecn);
        p.extend_from_slice(&(total as u16).to_be_bytes());
        p.extend_from_slice(&self.ip_id.to_be_bytes());
        p.extend_from_slice(&if self.df { 0x4000u16 } else { 0 }.to_be_bytes());
        p.push(self.ttl);
        p.push(6);
        p.extend_from_slice(&0u16.to_be_bytes());
        p.extend_from_slice(&self.src_addr);
        p.extend_from_slice(&self.dst_addr);

        p.extend_from_slice(&self.src_port.to_be_bytes());
        p.extend_from_slice(&self.dst_port.to_be_bytes());
        p.extend_from_slice(&self.seq.to_be_bytes());
        p.extend_from_slice(&self.ack.to_be_bytes());
        p.push(((tcp_len / 4) as u8) << 4);
        p.push(self.flags);
        p.extend_from_slice(&self.window.to_be_bytes());
        p.extend_from_slice(&0xBEEFu16.to_be_bytes());
        p.extend_from_slice(&self.urg_ptr.to_be_bytes());
        p.extend_from_slice(&self.options);
        p.extend(std::iter::repeat(0x5A).take(self.payload_len));
        p
    }
}

/// MSS + SACK-permitted + Timestamp + padding, a typical SYN option
/// block (12 + 8 = 20 bytes).
pub fn syn_options(tsval: u32, tsecr: u32) -> Vec<u8> {
    let mut options = vec![2, 4, 0x05, 0xB4, 4, 2, 1, 1];
    options.extend_from_slice(&[8, 10]);
    options.extend_from_slice(&tsval.to_be_bytes());
    options.extend_from_slice(&tsecr.to_be_bytes());
    options.extend_from_slice(&[1, 1]);
    options
}

/// A SACK option with one block plus NOP padding (12 bytes).
pub fn sack_option(start: u32, end: u32) -> Vec<u8> {
    let mut options = vec![1, 1, 5, 10];
    options.extend_from_slice(&start.to_be_bytes());
    options.extend_from_slice(&end.to_be_bytes());
    options
}

/// Compresses one raw packet, asserting success.
pub fn compress(
    handler: &TcpProfileHandler,
    ctx: &mut TcpCompressorContext,
    packet: &[u8],
) -> (CompressResult, Vec<u8>) {
    let mut out = [0u8; 512];
    let result = handler
        .compress_packet(ctx, packet, &mut out)
        .expect("compression should succeed");
    (result, out[..result.len].to_vec())
}

/// Creates a context from `first` and drives the flow through IR and
/// IR-DYN using `second`, leaving the compressor in its steady state.
pub fn establish_flow(
    handler: &TcpProfileHandler,
    first: &[u8],
    second: &[u8],
) -> TcpCompressorContext {
    let headers = handler.parse_headers(first).expect("first packet parses");
    let mut ctx = handler.create_compressor_context(
        ContextId::new(0),
        &headers,
        &mut FixedRandom(TEST_MSN_SEED),
    );
    let (r1, _) = compress(handler, &mut ctx, first);
    assert_eq!(r1.packet_type, RohcPacketType::Ir);
    let (r2, _) = compress(handler, &mut ctx, second);
    assert_eq!(r2.packet_type, RohcPacketType::IrDyn);
    ctx
}
