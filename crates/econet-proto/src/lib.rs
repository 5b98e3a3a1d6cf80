//! Wire-level codec for the ecoNET heating-controller protocol.
//!
//! ecoNET is the serial/TCP protocol spoken by Plum ecoMAX pellet-boiler
//! controllers and their attached ecoSTER panels, mixers and thermostats.
//! This crate owns everything below the transport: the envelope framing with
//! its XOR checksum, the frame-type registry, and the bit/byte layout of
//! every known payload.
//!
//! The crate is pure: no I/O, no async, no globals. A [`Frame`] decodes from
//! a byte slice and encodes back to one; payload structures are independent,
//! reversible sub-codecs over [`codec::ByteReader`] / [`codec::ByteWriter`].
//! Unknown frame-type codes decode to [`Payload::Unknown`] with the raw body
//! retained; they are never fatal.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
mod errors;
mod frame;
pub mod payloads;
mod types;
mod value;

pub use errors::ProtocolError;
pub use frame::{
    ECONET_TYPE, ECONET_VERSION, FRAME_END, FRAME_START, Frame, FrameHeader, HEADER_SIZE,
    MIN_FRAME_SIZE,
};
pub use payloads::Payload;
pub use types::{Direction, FrameType, STATE_OFF, STATE_ON, address};
pub use value::Value;

/// Convenience alias for codec results.
pub type Result<T> = std::result::Result<T, ProtocolError>;
