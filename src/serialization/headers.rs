//! Uncompressed IP/TCP header chain deserialization.
//!
//! Walks the header chain of a raw packet, outermost header first,
//! descending through tunneled IP headers and IPv6 extension headers until
//! the TCP header is reached. Packets that exercise paths the profile does
//! not cover (fragments, IPv4 options, ESP, more than 15 TCP options) are
//! rejected with a typed error so the caller can route them elsewhere.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::constants::{
    is_ip_tunneling, is_ipv6_extension, IPV4_MIN_HEADER_LENGTH_BYTES, IPV4_STANDARD_IHL,
    IPV6_HEADER_LENGTH_BYTES, IP_PROTOCOL_AH, IP_PROTOCOL_DSTOPTS, IP_PROTOCOL_GRE,
    IP_PROTOCOL_HOPOPTS, IP_PROTOCOL_MINE, IP_PROTOCOL_ROUTING, IP_PROTOCOL_TCP,
    TCP_MIN_DATA_OFFSET, TCP_MIN_HEADER_LENGTH_BYTES, TCP_OLEN_MAXSEG, TCP_OLEN_SACK_PERMITTED,
    TCP_OLEN_TIMESTAMP, TCP_OLEN_WINDOW, TCP_OPT_EOL, TCP_OPT_MAXSEG, TCP_OPT_NOP, TCP_OPT_SACK,
    TCP_OPT_SACK_PERMITTED, TCP_OPT_TIMESTAMP, TCP_OPT_WINDOW,
};
use crate::error::{Field, NetworkLayer, ParseContext, RohcParsingError};
use crate::profiles::tcp::protocol_types::{
    AhHeader, GreHeader, IpHeader, Ipv4Header, Ipv6Extension, Ipv6Header, MineHeader, RawExtension,
    SackBlock, TcpHeader, TcpIpHeaders, TcpOption,
};
use crate::types::{AckNumber, IpId, SeqNumber, Timestamp};

/// Maximum number of IP headers in one chain (outer + tunneled).
const MAX_IP_HEADERS: usize = 4;
/// Maximum number of options a compressible TCP header may carry; bounded
/// by the 4-bit item count of the compressed list.
const MAX_TCP_OPTIONS: usize = 15;

/// Deserializes the complete IP/TCP header chain of `data`.
///
/// # Errors
/// - [`RohcParsingError`] - Malformed chain, or a path the profile rejects
pub fn deserialize_tcp_ip_headers(data: &[u8]) -> Result<TcpIpHeaders, RohcParsingError> {
    let mut ip_headers = Vec::new();
    let mut offset = 0usize;

    loop {
        if ip_headers.len() >= MAX_IP_HEADERS {
            return Err(RohcParsingError::UncompressibleFieldValue {
                field: Field::IpProtocol,
                expected: MAX_IP_HEADERS as u32,
                got: (MAX_IP_HEADERS + 1) as u32,
            });
        }

        let version = peek_version(data, offset)?;
        let (header, next_protocol) = match version {
            4 => parse_ipv4(data, &mut offset)?,
            6 => parse_ipv6(data, &mut offset)?,
            got => return Err(RohcParsingError::InvalidIpVersion { got }),
        };
        ip_headers.push(header);

        if next_protocol == IP_PROTOCOL_TCP {
            break;
        }
        if !is_ip_tunneling(next_protocol) {
            return Err(RohcParsingError::UnsupportedProtocol {
                protocol_id: next_protocol,
                layer: NetworkLayer::Ip,
            });
        }
    }

    let tcp = parse_tcp(data, &mut offset)?;
    let header_len = offset;
    let payload_len = data.len() - header_len;

    Ok(TcpIpHeaders {
        ip_headers,
        tcp,
        header_len,
        payload_len,
    })
}

fn peek_version(data: &[u8], offset: usize) -> Result<u8, RohcParsingError> {
    if data.len() < offset + 1 {
        return Err(RohcParsingError::NotEnoughData {
            needed: offset + 1,
            got: data.len(),
            context: ParseContext::Ipv4HeaderMin,
        });
    }
    Ok(data[offset] >> 4)
}

fn parse_ipv4(data: &[u8], offset: &mut usize) -> Result<(IpHeader, u8), RohcParsingError> {
    let start = *offset;
    if data.len() < start + IPV4_MIN_HEADER_LENGTH_BYTES {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + IPV4_MIN_HEADER_LENGTH_BYTES,
            got: data.len(),
            context: ParseContext::Ipv4HeaderMin,
        });
    }

    let ihl = data[start] & 0x0F;
    if ihl != IPV4_STANDARD_IHL {
        // IPv4 options are not compressible by this profile.
        return Err(RohcParsingError::UncompressibleFieldValue {
            field: Field::IpIhl,
            expected: IPV4_STANDARD_IHL as u32,
            got: ihl as u32,
        });
    }

    let flags_and_offset = u16::from_be_bytes([data[start + 6], data[start + 7]]);
    let reserved_flag = (flags_and_offset >> 15) & 0x1 == 1;
    let dont_fragment = (flags_and_offset >> 14) & 0x1 == 1;
    let more_fragments = (flags_and_offset >> 13) & 0x1 == 1;
    let fragment_offset = flags_and_offset & 0x1FFF;
    if reserved_flag || more_fragments || fragment_offset != 0 {
        return Err(RohcParsingError::IpFragment);
    }

    let protocol = data[start + 9];
    let header = Ipv4Header {
        dscp: data[start + 1] >> 2,
        ecn: data[start + 1] & 0x03,
        total_length: u16::from_be_bytes([data[start + 2], data[start + 3]]),
        identification: IpId::new(u16::from_be_bytes([data[start + 4], data[start + 5]])),
        dont_fragment,
        ttl: data[start + 8],
        protocol,
        checksum: u16::from_be_bytes([data[start + 10], data[start + 11]]),
        src_addr: Ipv4Addr::new(
            data[start + 12],
            data[start + 13],
            data[start + 14],
            data[start + 15],
        ),
        dst_addr: Ipv4Addr::new(
            data[start + 16],
            data[start + 17],
            data[start + 18],
            data[start + 19],
        ),
    };
    *offset = start + IPV4_MIN_HEADER_LENGTH_BYTES;
    Ok((IpHeader::V4(header), protocol))
}

fn parse_ipv6(data: &[u8], offset: &mut usize) -> Result<(IpHeader, u8), RohcParsingError> {
    let start = *offset;
    if data.len() < start + IPV6_HEADER_LENGTH_BYTES {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + IPV6_HEADER_LENGTH_BYTES,
            got: data.len(),
            context: ParseContext::Ipv6HeaderMin,
        });
    }

    let traffic_class = ((data[start] & 0x0F) << 4) | (data[start + 1] >> 4);
    let flow_label = ((data[start + 1] as u32 & 0x0F) << 16)
        | ((data[start + 2] as u32) << 8)
        | data[start + 3] as u32;
    let next_header = data[start + 6];

    let mut src = [0u8; 16];
    src.copy_from_slice(&data[start + 8..start + 24]);
    let mut dst = [0u8; 16];
    dst.copy_from_slice(&data[start + 24..start + 40]);

    let mut header = Ipv6Header {
        dscp: traffic_class >> 2,
        ecn: traffic_class & 0x03,
        flow_label,
        payload_length: u16::from_be_bytes([data[start + 4], data[start + 5]]),
        next_header,
        hop_limit: data[start + 7],
        src_addr: Ipv6Addr::from(src),
        dst_addr: Ipv6Addr::from(dst),
        extensions: Vec::new(),
    };
    *offset = start + IPV6_HEADER_LENGTH_BYTES;

    let mut protocol = next_header;
    while is_ipv6_extension(protocol) {
        let extension = parse_ipv6_extension(data, offset, protocol)?;
        protocol = extension.next_header();
        header.extensions.push(extension);
    }

    if protocol != IP_PROTOCOL_TCP && !is_ip_tunneling(protocol) {
        return Err(RohcParsingError::UnsupportedProtocol {
            protocol_id: protocol,
            layer: NetworkLayer::Ipv6Extension,
        });
    }

    Ok((IpHeader::V6(header), protocol))
}

fn parse_ipv6_extension(
    data: &[u8],
    offset: &mut usize,
    protocol: u8,
) -> Result<Ipv6Extension, RohcParsingError> {
    match protocol {
        IP_PROTOCOL_HOPOPTS | IP_PROTOCOL_ROUTING | IP_PROTOCOL_DSTOPTS => {
            let raw = parse_raw_extension(data, offset)?;
            Ok(match protocol {
                IP_PROTOCOL_HOPOPTS => Ipv6Extension::HopByHop(raw),
                IP_PROTOCOL_ROUTING => Ipv6Extension::Routing(raw),
                _ => Ipv6Extension::Destination(raw),
            })
        }
        IP_PROTOCOL_GRE => parse_gre(data, offset).map(Ipv6Extension::Gre),
        IP_PROTOCOL_MINE => parse_mine(data, offset).map(Ipv6Extension::Mine),
        IP_PROTOCOL_AH => parse_ah(data, offset).map(Ipv6Extension::Ah),
        other => Err(RohcParsingError::UnsupportedProtocol {
            protocol_id: other,
            layer: NetworkLayer::Ipv6Extension,
        }),
    }
}

fn parse_raw_extension(data: &[u8], offset: &mut usize) -> Result<RawExtension, RohcParsingError> {
    let start = *offset;
    if data.len() < start + 2 {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + 2,
            got: data.len(),
            context: ParseContext::Ipv6ExtensionHeader,
        });
    }
    let length = data[start + 1];
    let wire_len = (length as usize + 1) * 8;
    if data.len() < start + wire_len {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + wire_len,
            got: data.len(),
            context: ParseContext::Ipv6ExtensionHeader,
        });
    }
    let raw = RawExtension {
        next_header: data[start],
        length,
        value: data[start + 2..start + wire_len].to_vec(),
    };
    *offset = start + wire_len;
    Ok(raw)
}

fn parse_gre(data: &[u8], offset: &mut usize) -> Result<GreHeader, RohcParsingError> {
    let start = *offset;
    if data.len() < start + 4 {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + 4,
            got: data.len(),
            context: ParseContext::GreHeader,
        });
    }
    let c_flag = data[start] & 0x80 != 0;
    let k_flag = data[start] & 0x20 != 0;
    let s_flag = data[start] & 0x10 != 0;
    let protocol = u16::from_be_bytes([data[start + 2], data[start + 3]]);
    if protocol != 0x0800 && protocol != 0x86DD {
        return Err(RohcParsingError::UnsupportedProtocol {
            protocol_id: (protocol >> 8) as u8,
            layer: NetworkLayer::Ipv6Extension,
        });
    }

    let mut cursor = start + 4;
    let mut take_u32 = |ctx_needed: usize| -> Result<u32, RohcParsingError> {
        if data.len() < cursor + 4 {
            return Err(RohcParsingError::NotEnoughData {
                needed: ctx_needed,
                got: data.len(),
                context: ParseContext::GreHeader,
            });
        }
        let word = u32::from_be_bytes([
            data[cursor],
            data[cursor + 1],
            data[cursor + 2],
            data[cursor + 3],
        ]);
        cursor += 4;
        Ok(word)
    };

    let checksum = if c_flag {
        Some((take_u32(start + 8)? >> 16) as u16)
    } else {
        None
    };
    let key = if k_flag { Some(take_u32(start + 12)?) } else { None };
    let sequence = if s_flag { Some(take_u32(start + 16)?) } else { None };

    *offset = cursor;
    Ok(GreHeader {
        c_flag,
        k_flag,
        s_flag,
        protocol,
        checksum,
        key,
        sequence,
    })
}

fn parse_mine(data: &[u8], offset: &mut usize) -> Result<MineHeader, RohcParsingError> {
    let start = *offset;
    if data.len() < start + 8 {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + 8,
            got: data.len(),
            context: ParseContext::MineHeader,
        });
    }
    let s_bit = data[start + 1] & 0x80 != 0;
    let wire_len = if s_bit { 12 } else { 8 };
    if data.len() < start + wire_len {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + wire_len,
            got: data.len(),
            context: ParseContext::MineHeader,
        });
    }
    let orig_src = if s_bit {
        Some(u32::from_be_bytes([
            data[start + 8],
            data[start + 9],
            data[start + 10],
            data[start + 11],
        ]))
    } else {
        None
    };
    let header = MineHeader {
        next_header: data[start],
        s_bit,
        res_bits: data[start + 1] & 0x7F,
        checksum: u16::from_be_bytes([data[start + 2], data[start + 3]]),
        orig_dest: u32::from_be_bytes([
            data[start + 4],
            data[start + 5],
            data[start + 6],
            data[start + 7],
        ]),
        orig_src,
    };
    *offset = start + wire_len;
    Ok(header)
}

fn parse_ah(data: &[u8], offset: &mut usize) -> Result<AhHeader, RohcParsingError> {
    let start = *offset;
    if data.len() < start + 12 {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + 12,
            got: data.len(),
            context: ParseContext::AhHeader,
        });
    }
    let length = data[start + 1];
    let wire_len = (length as usize + 2) * 4;
    if wire_len < 12 || data.len() < start + wire_len {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + wire_len.max(12),
            got: data.len(),
            context: ParseContext::AhHeader,
        });
    }
    let header = AhHeader {
        next_header: data[start],
        length,
        spi: u32::from_be_bytes([
            data[start + 4],
            data[start + 5],
            data[start + 6],
            data[start + 7],
        ]),
        sequence: u32::from_be_bytes([
            data[start + 8],
            data[start + 9],
            data[start + 10],
            data[start + 11],
        ]),
        icv: data[start + 12..start + wire_len].to_vec(),
    };
    *offset = start + wire_len;
    Ok(header)
}

fn parse_tcp(data: &[u8], offset: &mut usize) -> Result<TcpHeader, RohcParsingError> {
    let start = *offset;
    if data.len() < start + TCP_MIN_HEADER_LENGTH_BYTES {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + TCP_MIN_HEADER_LENGTH_BYTES,
            got: data.len(),
            context: ParseContext::TcpHeaderMin,
        });
    }

    let data_offset = data[start + 12] >> 4;
    if data_offset < TCP_MIN_DATA_OFFSET {
        return Err(RohcParsingError::UncompressibleFieldValue {
            field: Field::TcpDataOffset,
            expected: TCP_MIN_DATA_OFFSET as u32,
            got: data_offset as u32,
        });
    }
    let header_len = data_offset as usize * 4;
    if data.len() < start + header_len {
        return Err(RohcParsingError::NotEnoughData {
            needed: start + header_len,
            got: data.len(),
            context: ParseContext::TcpHeaderMin,
        });
    }

    let flags = data[start + 13];
    let options_raw = data[start + TCP_MIN_HEADER_LENGTH_BYTES..start + header_len].to_vec();
    let options = parse_tcp_options(&options_raw)?;

    let header = TcpHeader {
        src_port: u16::from_be_bytes([data[start], data[start + 1]]),
        dst_port: u16::from_be_bytes([data[start + 2], data[start + 3]]),
        seq_number: SeqNumber::new(u32::from_be_bytes([
            data[start + 4],
            data[start + 5],
            data[start + 6],
            data[start + 7],
        ])),
        ack_number: AckNumber::new(u32::from_be_bytes([
            data[start + 8],
            data[start + 9],
            data[start + 10],
            data[start + 11],
        ])),
        data_offset,
        res_flags: data[start + 12] & 0x0F,
        ecn_flags: (flags >> 6) & 0x03,
        urg_flag: flags & 0x20 != 0,
        ack_flag: flags & 0x10 != 0,
        psh_flag: flags & 0x08 != 0,
        rsf_flags: flags & 0x07,
        window: u16::from_be_bytes([data[start + 14], data[start + 15]]),
        checksum: u16::from_be_bytes([data[start + 16], data[start + 17]]),
        urg_ptr: u16::from_be_bytes([data[start + 18], data[start + 19]]),
        options,
        options_raw,
    };
    *offset = start + header_len;
    Ok(header)
}

fn parse_tcp_options(raw: &[u8]) -> Result<Vec<TcpOption>, RohcParsingError> {
    let mut options = Vec::new();
    let mut i = 0usize;

    while i < raw.len() {
        if options.len() >= MAX_TCP_OPTIONS {
            return Err(RohcParsingError::UncompressibleFieldValue {
                field: Field::TcpOptionCount,
                expected: MAX_TCP_OPTIONS as u32,
                got: (MAX_TCP_OPTIONS + 1) as u32,
            });
        }

        let kind = raw[i];
        match kind {
            TCP_OPT_EOL => {
                options.push(TcpOption::Eol);
                // Bytes after EOL are padding, preserved via options_raw.
                break;
            }
            TCP_OPT_NOP => {
                options.push(TcpOption::Nop);
                i += 1;
            }
            _ => {
                if i + 2 > raw.len() {
                    return Err(RohcParsingError::NotEnoughData {
                        needed: i + 2,
                        got: raw.len(),
                        context: ParseContext::TcpOptions,
                    });
                }
                let len = raw[i + 1] as usize;
                if len < 2 || i + len > raw.len() {
                    return Err(RohcParsingError::NotEnoughData {
                        needed: i + len.max(2),
                        got: raw.len(),
                        context: ParseContext::TcpOptions,
                    });
                }
                let body = &raw[i + 2..i + len];
                options.push(parse_single_option(kind, len, body)?);
                i += len;
            }
        }
    }

    Ok(options)
}

fn parse_single_option(
    kind: u8,
    len: usize,
    body: &[u8],
) -> Result<TcpOption, RohcParsingError> {
    let bad_length = |expected: usize| RohcParsingError::UncompressibleFieldValue {
        field: Field::TcpOptionKind,
        expected: expected as u32,
        got: len as u32,
    };

    match kind {
        TCP_OPT_MAXSEG => {
            if len != TCP_OLEN_MAXSEG {
                return Err(bad_length(TCP_OLEN_MAXSEG));
            }
            Ok(TcpOption::Mss(u16::from_be_bytes([body[0], body[1]])))
        }
        TCP_OPT_WINDOW => {
            if len != TCP_OLEN_WINDOW {
                return Err(bad_length(TCP_OLEN_WINDOW));
            }
            Ok(TcpOption::WindowScale(body[0]))
        }
        TCP_OPT_SACK_PERMITTED => {
            if len != TCP_OLEN_SACK_PERMITTED {
                return Err(bad_length(TCP_OLEN_SACK_PERMITTED));
            }
            Ok(TcpOption::SackPermitted)
        }
        TCP_OPT_SACK => {
            let blocks_len = len - 2;
            if blocks_len % 8 != 0 || blocks_len > 32 {
                return Err(bad_length(2 + 8));
            }
            let blocks = body
                .chunks_exact(8)
                .map(|chunk| SackBlock {
                    start: u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
                    end: u32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]),
                })
                .collect();
            Ok(TcpOption::Sack(blocks))
        }
        TCP_OPT_TIMESTAMP => {
            if len != TCP_OLEN_TIMESTAMP {
                return Err(bad_length(TCP_OLEN_TIMESTAMP));
            }
            Ok(TcpOption::Timestamp {
                tsval: Timestamp::new(u32::from_be_bytes([body[0], body[1], body[2], body[3]])),
                tsecr: Timestamp::new(u32::from_be_bytes([body[4], body[5], body[6], body[7]])),
            })
        }
        _ => Ok(TcpOption::Generic {
            kind,
            data: body.to_vec(),
        }),
    }
}
