//! IP-ID behavior classification scenarios: random, sequential,
//! sequential-swapped and zero flows.

mod common;

use common::{compress, establish_flow, TcpPacketBuilder};
use rohcpress::profiles::tcp::{IpHeader, TcpProfileHandler};
use rohcpress::RohcPacketType;

fn is_rnd_family(packet_type: RohcPacketType) -> bool {
    matches!(
        packet_type,
        RohcPacketType::Rnd1
            | RohcPacketType::Rnd2
            | RohcPacketType::Rnd3
            | RohcPacketType::Rnd4
            | RohcPacketType::Rnd5
            | RohcPacketType::Rnd6
            | RohcPacketType::Rnd7
            | RohcPacketType::Rnd8
    )
}

fn is_seq_family(packet_type: RohcPacketType) -> bool {
    matches!(
        packet_type,
        RohcPacketType::Seq1
            | RohcPacketType::Seq2
            | RohcPacketType::Seq3
            | RohcPacketType::Seq4
            | RohcPacketType::Seq5
            | RohcPacketType::Seq6
            | RohcPacketType::Seq7
            | RohcPacketType::Seq8
    )
}

#[test]
fn random_ip_ids_settle_on_the_rnd_family() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();
    // Values with no sequential or byte-swapped pattern.
    let ids = [0x7A3Fu16, 0x19C2, 0xE001, 0x0B66, 0x94D8, 0x3317, 0xC0AA];

    let first = base.clone().seq(1000).ip_id(ids[0]).build();
    let second = base.clone().seq(1000).ip_id(ids[1]).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    for (n, &ip_id) in ids[2..].iter().enumerate() {
        let packet = base
            .clone()
            .seq(1000 + (n as u32 + 1))
            .ip_id(ip_id)
            .build();
        let (result, _) = compress(&handler, &mut ctx, &packet);
        assert!(
            is_rnd_family(result.packet_type),
            "packet {} got {}",
            n,
            result.packet_type
        );
    }
}

#[test]
fn random_ip_id_travels_in_the_irregular_chain() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();

    let first = base.clone().seq(500).ip_id(0x7A3F).build();
    let second = base.clone().seq(500).ip_id(0x19C2).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    let (result, bytes) = compress(&handler, &mut ctx, &base.clone().seq(500).ip_id(0xE001).build());
    assert_eq!(result.packet_type, RohcPacketType::Rnd1);
    // rnd_1 base header is 4 bytes; the irregular chain carries the
    // 16-bit IP-ID then the TCP checksum.
    assert_eq!(bytes.len(), 4 + 2 + 2);
    assert_eq!(&bytes[4..6], &0xE001u16.to_be_bytes());
    assert_eq!(&bytes[6..8], &0xBEEFu16.to_be_bytes());
}

#[test]
fn little_endian_counter_is_classified_sequential_swapped() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();
    // A host writing its counter without byte-order conversion: the wire
    // carries 0x0100, 0x0200, 0x0300, ...
    let ids: Vec<u16> = (1..=12u16).map(|n| n.swap_bytes()).collect();

    let first = base.clone().seq(1000).ip_id(ids[0]).build();
    let second = base.clone().seq(1000).ip_id(ids[1]).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    for (n, &ip_id) in ids[2..].iter().enumerate() {
        let packet = base.clone().seq(1000).ip_id(ip_id).build();
        let (result, _) = compress(&handler, &mut ctx, &packet);
        assert!(
            is_seq_family(result.packet_type),
            "packet {} got {}",
            n,
            result.packet_type
        );
    }

    let headers = handler.parse_headers(&base.clone().ip_id(13u16.swap_bytes()).build()).unwrap();
    match headers.innermost_ip() {
        IpHeader::V4(v4) => assert_eq!(v4.identification.swapped(), 13u16),
        IpHeader::V6(_) => unreachable!(),
    }
}

#[test]
fn zero_ip_id_flow_uses_rnd_family_without_irregular_ip_id() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();

    let first = base.clone().seq(9_000).ip_id(0).build();
    let second = base.clone().seq(9_000).ip_id(0).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    let (result, bytes) = compress(&handler, &mut ctx, &base.clone().seq(9_001).ip_id(0).build());
    assert_eq!(result.packet_type, RohcPacketType::Rnd1);
    // No IP-ID in the irregular chain: 4-byte base header + checksum.
    assert_eq!(bytes.len(), 6);
}

#[test]
fn behavior_change_passes_through_co_common() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();

    let first = base.clone().seq(100).ip_id(0x0010).build();
    let second = base.clone().seq(100).ip_id(0x0011).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    // Two sequential packets, then the counter breaks.
    let (r, _) = compress(&handler, &mut ctx, &base.clone().seq(101).ip_id(0x0012).build());
    assert!(is_seq_family(r.packet_type));

    let (r, _) = compress(&handler, &mut ctx, &base.clone().seq(102).ip_id(0x9B41).build());
    assert_eq!(r.packet_type, RohcPacketType::CoCommon);

    // Once announced, the flow continues in the rnd family.
    let (r, _) = compress(&handler, &mut ctx, &base.clone().seq(103).ip_id(0x22D0).build());
    assert!(is_rnd_family(r.packet_type));
}

#[test]
fn sequential_flow_never_reverts_to_ir() {
    let handler = TcpProfileHandler::default();
    let base = TcpPacketBuilder::default();

    let first = base.clone().seq(0).ip_id(100).build();
    let second = base.clone().seq(0).ip_id(101).build();
    let mut ctx = establish_flow(&handler, &first, &second);

    for n in 0..50u16 {
        let packet = base.clone().seq(n as u32).ip_id(102 + n).build();
        let (result, _) = compress(&handler, &mut ctx, &packet);
        assert!(
            result.packet_type.is_co(),
            "packet {} regressed to {}",
            n,
            result.packet_type
        );
    }
}
