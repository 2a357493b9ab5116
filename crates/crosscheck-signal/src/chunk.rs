//! Chunked upload of a compiled timing program.
//!
//! The peer's program characteristic accepts writes of at most 20 bytes.
//! Each write is one header byte followed by up to [`CHUNK_PAYLOAD`] payload
//! bytes. Header bit 7 is set while more chunks follow; bits 0-6 are the
//! chunk index, so a program spans at most [`MAX_CHUNKS`] writes.

use crate::codec::CodecError;

/// Payload bytes per chunk (20-byte write minus the header).
pub const CHUNK_PAYLOAD: usize = 19;

/// Chunk indices are 7 bits wide.
pub const MAX_CHUNKS: usize = 128;

const MORE_FLAG: u8 = 0x80;
const INDEX_MASK: u8 = 0x7F;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub index: u8,
    pub more: bool,
}

impl ChunkHeader {
    pub fn to_byte(self) -> u8 {
        let more = if self.more { MORE_FLAG } else { 0 };
        more | (self.index & INDEX_MASK)
    }

    pub fn from_byte(byte: u8) -> Self {
        Self {
            index: byte & INDEX_MASK,
            more: byte & MORE_FLAG != 0,
        }
    }
}

/// Split `payload` into header-prefixed chunks, in upload order.
///
/// An empty payload still produces one header-only chunk so the peer sees
/// a terminating write.
pub fn split_program(payload: &[u8]) -> Result<Vec<Vec<u8>>, CodecError> {
    let max = MAX_CHUNKS * CHUNK_PAYLOAD;
    if payload.len() > max {
        return Err(CodecError::PayloadTooLarge {
            len: payload.len(),
            max,
        });
    }

    if payload.is_empty() {
        return Ok(vec![vec![ChunkHeader { index: 0, more: false }.to_byte()]]);
    }

    let count = payload.len().div_ceil(CHUNK_PAYLOAD);
    let chunks = payload
        .chunks(CHUNK_PAYLOAD)
        .enumerate()
        .map(|(index, body)| {
            let header = ChunkHeader {
                index: index as u8,
                more: index + 1 < count,
            };
            let mut chunk = Vec::with_capacity(body.len() + 1);
            chunk.push(header.to_byte());
            chunk.extend_from_slice(body);
            chunk
        })
        .collect();
    Ok(chunks)
}

/// Peer-side reassembly of an uploaded program.
#[derive(Debug, Default)]
pub struct ProgramAssembler {
    buffer: Vec<u8>,
    next_index: u8,
}

impl ProgramAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept one chunk. Returns the complete payload once the final chunk
    /// (more-flag clear) arrives, after which the assembler is reset.
    ///
    /// A chunk with index 0 always restarts assembly, so an aborted upload
    /// does not poison the next one.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>, CodecError> {
        let (&first, body) = chunk.split_first().ok_or(CodecError::EmptyChunk)?;
        let header = ChunkHeader::from_byte(first);

        if header.index == 0 {
            self.reset();
        } else if header.index != self.next_index {
            let expected = self.next_index;
            self.reset();
            return Err(CodecError::ChunkOutOfOrder {
                expected,
                got: header.index,
            });
        }

        self.buffer.extend_from_slice(body);
        self.next_index = header.index.wrapping_add(1);

        if header.more {
            Ok(None)
        } else {
            let payload = std::mem::take(&mut self.buffer);
            self.reset();
            Ok(Some(payload))
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.next_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_byte_layout() {
        let header = ChunkHeader { index: 5, more: true };
        assert_eq!(header.to_byte(), 0x85);
        assert_eq!(ChunkHeader::from_byte(0x85), header);
        assert!(!ChunkHeader::from_byte(0x05).more);
    }

    #[test]
    fn test_empty_payload_single_terminator() {
        assert_eq!(split_program(&[]).unwrap(), vec![vec![0x00]]);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_chunk() {
        let chunks = split_program(&[7u8; CHUNK_PAYLOAD * 2]).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0][0], 0x80);
        assert_eq!(chunks[1][0], 0x01);
    }
}
