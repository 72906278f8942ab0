//! ROHC TCP/IP compression profile (profile 0x0006, RFC 6846),
//! compressor side.
//!
//! The pipeline for one packet: parse the uncompressed chain
//! ([`crate::serialization::headers`]), check eligibility and context
//! membership, analyze deltas, pick a format
//! ([`classifier`]), serialize ([`serialization`], [`chains`],
//! [`options`]) and commit the context ([`context`]).

pub mod chains;
pub mod classifier;
pub mod constants;
pub mod context;
pub mod encodings;
pub mod options;
pub mod protocol_types;
pub mod serialization;

mod handler;

pub use context::{IpIdBehavior, TcpCompressorContext, TcpCompressorMode};
pub use handler::{CompressResult, ContextCheck, TcpProfileHandler};
pub use protocol_types::{IpHeader, TcpHeader, TcpIpHeaders, TcpOption};
