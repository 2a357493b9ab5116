//! Packing between signal vectors and wire buffers.
//!
//! Each byte carries four channels, two bits each, lowest channel in the
//! lowest bits; bytes are ordered lowest channel first. Bytes start as
//! `0xFF` so any channel not written reads back as `Unset`.

use crate::signal::{Signal, SignalVector};

const CHANNELS_PER_BYTE: usize = 4;
const FIELD_MASK: u8 = 0b11;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("Reserved 2-bit code {code:#04b} on channel {channel}")]
    ReservedCode { channel: usize, code: u8 },

    #[error("Invalid signal symbol '{symbol}'")]
    InvalidSymbol { symbol: char },

    #[error("Program payload too large ({len} bytes, max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Empty program chunk")]
    EmptyChunk,

    #[error("Program chunk out of order (expected index {expected}, got {got})")]
    ChunkOutOfOrder { expected: u8, got: u8 },
}

/// Pack `signals` into `ceil(len / 4)` bytes.
pub fn encode(signals: &[Signal]) -> Vec<u8> {
    let mut bytes = vec![0xFF; signals.len().div_ceil(CHANNELS_PER_BYTE)];
    for (channel, signal) in signals.iter().enumerate() {
        let byte = channel / CHANNELS_PER_BYTE;
        let shift = (channel % CHANNELS_PER_BYTE) * 2;
        bytes[byte] = (bytes[byte] & !(FIELD_MASK << shift)) | (signal.code() << shift);
    }
    bytes
}

/// Unpack a wire buffer into a trimmed signal vector.
pub fn decode(bytes: &[u8]) -> Result<SignalVector, CodecError> {
    let mut signals = Vec::with_capacity(bytes.len() * CHANNELS_PER_BYTE);
    for (index, byte) in bytes.iter().enumerate() {
        for field in 0..CHANNELS_PER_BYTE {
            let code = (byte >> (field * 2)) & FIELD_MASK;
            let channel = index * CHANNELS_PER_BYTE + field;
            let signal =
                Signal::from_code(code).ok_or(CodecError::ReservedCode { channel, code })?;
            signals.push(signal);
        }
    }
    let mut vector = SignalVector::new(signals);
    vector.trim();
    Ok(vector)
}
