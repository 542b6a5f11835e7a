//! # shardtx codec
//!
//! Wire encoding primitives for shardtx.
//!
//! This crate provides:
//! - A typed [`Value`] cell model for piece inputs, outputs, and record keys
//! - [`RecordKey`], a composite key of ordered values
//! - [`WireEncoder`] / [`WireDecoder`], a length-prefixed little-endian
//!   binary format with strict field-order round-tripping
//!
//! The format is deliberately positional: callers write and read fields in
//! a fixed order, and the decoder validates structure as it goes. Protocol
//! types that must interoperate bit-exactly (such as the versioned option
//! set) are built on these primitives in `shardtx_protocol`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::WireDecoder;
pub use encoder::WireEncoder;
pub use error::{CodecError, CodecResult};
pub use value::{RecordKey, Value};
