//! Signal values and their packed wire representation.
//!
//! Both endpoints of the bench expose the same set of digital channels.
//! This crate holds the per-channel value type, the ordered vector of
//! channel values, and the two byte formats the wire-protocol peer speaks:
//! the 2-bit-per-channel signal packing and the chunked program upload.

pub mod chunk;
pub mod codec;
pub mod signal;

pub use chunk::{split_program, ChunkHeader, ProgramAssembler, CHUNK_PAYLOAD, MAX_CHUNKS};
pub use codec::{decode, encode, CodecError};
pub use signal::{Signal, SignalVector};
