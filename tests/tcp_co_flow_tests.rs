//! Steady-state CO flow scenarios: bulk transfer, interactive traffic,
//! SACK arrival, urgent data.

mod common;

use common::{compress, establish_flow, sack_option, syn_options, TcpPacketBuilder};
use rohcpress::profiles::tcp::TcpProfileHandler;
use rohcpress::RohcPacketType;

const MSS: u32 = 1448;

#[test]
fn bulk_transfer_settles_on_seq_2() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();
    let seq0 = 0x1000_0000u32;

    // The handshake carries the option block; data segments do not.
    let first = base
        .clone()
        .seq(seq0)
        .ip_id(0x0100)
        .options(syn_options(1000, 0))
        .build();
    let second = base
        .clone()
        .seq(seq0)
        .ip_id(0x0101)
        .payload_len(MSS as usize)
        .build();
    let mut ctx = establish_flow(&handler, &first, &second);

    for n in 1..100u32 {
        let packet = base
            .clone()
            .seq(seq0 + n * MSS)
            .ip_id(0x0101 + n as u16)
            .payload_len(MSS as usize)
            .build();
        let (result, bytes) = compress(&handler, &mut ctx, &packet);
        assert_eq!(
            result.packet_type,
            RohcPacketType::Seq2,
            "segment {} should ride seq_2",
            n
        );
        // 3-byte base header + 2-byte checksum irregular, CID 0.
        assert!(bytes.len() <= 7, "segment {} took {} bytes", n, bytes.len());
        assert_eq!(result.payload_offset, 40);
    }
}

#[test]
fn interactive_flow_alternates_seq_1_and_seq_3() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();
    let seq0 = 5_000u32;
    let ack0 = 9_000u32;

    let first = base.clone().seq(seq0).ack(ack0).ip_id(1).build();
    let second = base.clone().seq(seq0).ack(ack0).ip_id(2).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    let mut seq = seq0;
    let mut ack = ack0;
    let mut ip_id = 2u16;
    for round in 0..20u32 {
        // One byte of urgent typing: PSH+ACK, seq advances.
        seq += 1;
        ip_id += 1;
        let data = base
            .clone()
            .seq(seq)
            .ack(ack)
            .ip_id(ip_id)
            .flags(0x18)
            .payload_len(1)
            .build();
        let (result, _) = compress(&handler, &mut ctx, &data);
        assert_eq!(
            result.packet_type,
            RohcPacketType::Seq1,
            "round {} data segment",
            round
        );

        // The echo: a pure ACK, ack advances.
        ack += 1;
        ip_id += 1;
        let echo = base
            .clone()
            .seq(seq + 1)
            .ack(ack)
            .ip_id(ip_id)
            .flags(0x10)
            .build();
        // seq moved by the 1-byte segment too, so the first echo after a
        // data segment actually changes both fields.
        let (result, _) = compress(&handler, &mut ctx, &echo);
        assert!(
            result.packet_type == RohcPacketType::Seq3
                || result.packet_type == RohcPacketType::Seq5,
            "round {} echo got {}",
            round,
            result.packet_type
        );
    }
}

#[test]
fn pure_ack_stream_uses_seq_3() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();
    let ack0 = 0x4000u32;

    let first = base.clone().ack(ack0).ip_id(10).build();
    let second = base.clone().ack(ack0).ip_id(11).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    // Irregular ack advances (not stride-like) keep seq_3 in play.
    let mut ack = ack0;
    for (n, delta) in [37u32, 205, 11, 450, 1, 90].into_iter().enumerate() {
        ack += delta;
        let packet = base.clone().ack(ack).ip_id(12 + n as u16).build();
        let (result, _) = compress(&handler, &mut ctx, &packet);
        assert_eq!(result.packet_type, RohcPacketType::Seq3, "ack {}", n);
    }
}

#[test]
fn constant_ack_stride_establishes_and_uses_seq_4() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();
    let ack0 = 100_000u32;

    let first = base.clone().ack(ack0).ip_id(1).build();
    let second = base.clone().ack(ack0).ip_id(2).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    let mut seen_co_common = false;
    let mut seen_seq_4 = false;
    for n in 1..=10u32 {
        let packet = base
            .clone()
            .ack(ack0 + n * MSS)
            .ip_id(2 + n as u16)
            .build();
        let (result, _) = compress(&handler, &mut ctx, &packet);
        match result.packet_type {
            // The establishment packet announces the stride.
            RohcPacketType::CoCommon => seen_co_common = true,
            RohcPacketType::Seq4 => seen_seq_4 = true,
            RohcPacketType::Seq3 => {}
            other => panic!("unexpected format {} on ack {}", other, n),
        }
    }
    assert!(seen_co_common, "stride establishment must pass through co_common");
    assert!(seen_seq_4, "established stride should enable seq_4");
    assert_eq!(ctx.ack_stride, MSS as u16);
}

#[test]
fn sack_arrival_switches_to_a_list_bearing_format() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();
    let ack0 = 0x0050_0000u32;

    let first = base.clone().ack(ack0).ip_id(1).build();
    let second = base.clone().ack(ack0).ip_id(2).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    // A hole appears: the receiver reports one SACK block above the ack.
    let packet = base
        .clone()
        .ack(ack0)
        .ip_id(3)
        .options(sack_option(ack0 + 3 * MSS, ack0 + 4 * MSS))
        .build();
    let (result, bytes) = compress(&handler, &mut ctx, &packet);
    assert_eq!(result.packet_type, RohcPacketType::Seq8);
    // seq_8: list_present is the top bit of the second octet.
    assert_eq!(bytes[1] & 0x80, 0x80);
    // The block is now cached for the next packet's delta encoding.
    assert_eq!(ctx.options.cached_sack().len(), 1);
}

#[test]
fn urgent_flag_forces_co_common() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();

    let first = base.clone().seq(1000).ip_id(1).build();
    let second = base.clone().seq(1000).ip_id(2).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    let (result, _) = compress(
        &handler,
        &mut ctx,
        &base.clone().seq(1010).ip_id(3).payload_len(10).urg(4).build(),
    );
    assert_eq!(result.packet_type, RohcPacketType::CoCommon);

    // Dropping URG again toggles the flag: still co_common, then the
    // flow returns to the short formats.
    let (result, _) = compress(
        &handler,
        &mut ctx,
        &base.clone().seq(1020).ip_id(4).payload_len(10).build(),
    );
    assert_eq!(result.packet_type, RohcPacketType::CoCommon);

    let (result, _) = compress(
        &handler,
        &mut ctx,
        &base.clone().seq(1030).ip_id(5).payload_len(10).build(),
    );
    assert_eq!(result.packet_type, RohcPacketType::Seq2);
}

#[test]
fn window_update_rides_seq_7() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();

    let first = base.clone().ack(7000).ip_id(1).build();
    let second = base.clone().ack(7000).ip_id(2).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    let (result, _) = compress(
        &handler,
        &mut ctx,
        &base.clone().ack(7100).ip_id(3).window(8192 + 512).build(),
    );
    assert_eq!(result.packet_type, RohcPacketType::Seq7);
}

#[test]
fn fin_teardown_uses_seq_8() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();

    let first = base.clone().seq(100).ip_id(1).build();
    let second = base.clone().seq(100).ip_id(2).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    let (result, _) = compress(
        &handler,
        &mut ctx,
        &base.clone().seq(100).ip_id(3).flags(0x11).build(), // ACK|FIN
    );
    assert_eq!(result.packet_type, RohcPacketType::Seq8);
}

#[test]
fn compressed_headers_beat_the_original_on_a_bulk_flow() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();
    let seq0 = 77_000u32;

    let first = base.clone().seq(seq0).ip_id(1).build();
    let second = base
        .clone()
        .seq(seq0)
        .ip_id(2)
        .payload_len(MSS as usize)
        .build();
    let mut ctx = establish_flow(&handler, &first, &second);

    let mut compressed_total = 0usize;
    let mut original_total = 0usize;
    for n in 1..50u32 {
        let packet = base
            .clone()
            .seq(seq0 + n * MSS)
            .ip_id(2 + n as u16)
            .payload_len(MSS as usize)
            .build();
        let (result, bytes) = compress(&handler, &mut ctx, &packet);
        compressed_total += bytes.len();
        original_total += result.payload_offset;
    }
    assert!(
        compressed_total * 4 < original_total,
        "steady-state headers should compress at least 4x: {} vs {}",
        compressed_total,
        original_total
    );
}
