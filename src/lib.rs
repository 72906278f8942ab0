//! `rohcpress`: a ROHC (Robust Header Compression) TCP/IP profile
//! compressor in safe Rust.
//!
//! This library implements the compressor side of ROHC profile 0x0006
//! (RFC 6846): it replaces the IP header stack, the TCP header and the
//! TCP options of a long-lived flow with a short compressed header that a
//! synchronized decompressor can expand back into the original bytes.
//!
//! ## Core Concepts
//!
//! - **[`TcpProfileHandler`]**: the per-channel entry point. It checks
//!   eligibility, creates per-flow contexts and compresses packets.
//! - **[`TcpCompressorContext`]**: per-flow state (addresses, last TCP
//!   header, IP-ID behavior, option table, MSN). One context per flow,
//!   mutated on every compressed packet.
//! - **Packet formats**: the first packets of a flow are IR and IR-DYN
//!   (full synchronization); the steady state uses the compressed-order
//!   formats rnd_1..8, seq_1..8 and co_common.
//!
//! ## Quick Start
//!
//! ```rust
//! use rohcpress::profiles::tcp::TcpProfileHandler;
//! use rohcpress::random::SystemRandom;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = TcpProfileHandler::default();
//!
//!     // A minimal IPv4/TCP packet (no options, no payload).
//!     let mut packet = vec![
//!         0x45, 0x00, 0x00, 0x28, 0x00, 0x01, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00,
//!         192, 168, 0, 1, 192, 168, 0, 2,
//!     ];
//!     packet.extend_from_slice(&[
//!         0x13, 0x89, 0xAC, 0x44, // ports 5001 -> 44100
//!         0x00, 0x00, 0x10, 0x00, // seq
//!         0x00, 0x00, 0x20, 0x00, // ack
//!         0x50, 0x10, 0x20, 0x00, // doff, ACK, window
//!         0x00, 0x00, 0x00, 0x00, // checksum, urg ptr
//!     ]);
//!
//!     assert!(handler.check_profile(&packet));
//!     let headers = handler.parse_headers(&packet)?;
//!     let mut context =
//!         handler.create_compressor_context(0.into(), &headers, &mut SystemRandom);
//!
//!     let mut compressed = [0u8; 256];
//!     let result = handler.compress(&mut context, &headers, &mut compressed)?;
//!     println!(
//!         "{} -> {} bytes ({})",
//!         packet.len(),
//!         result.len,
//!         result.packet_type
//!     );
//!     Ok(())
//! }
//! ```

pub mod cid;
pub mod constants;
pub mod crc;
pub mod encodings;
pub mod error;
pub mod packet_defs;
pub mod profiles;
pub mod random;
pub mod serialization;
pub mod types;

pub use cid::CidType;
pub use error::{CompressionError, RohcBuildingError, RohcError, RohcParsingError};
pub use packet_defs::{RohcPacketType, RohcProfile};
pub use profiles::tcp::{CompressResult, ContextCheck, TcpCompressorContext, TcpProfileHandler};
