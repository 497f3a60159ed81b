//! RIFF/WAVE Header Parsing
//!
//! Parses the fixed-size prefix of a WAVE file into the few facts the
//! playback engine needs: the PCM layout, the sample rate and the byte range
//! of the `data` chunk.
//!
//! Layout consumed (all integers little-endian):
//! - `"RIFF"` at offset 0, riff length at 4, `"WAVE"` at 8
//! - a chunk table from offset 12: 4-byte tag, 4-byte length, body
//! - `fmt ` body: encoding (u16), channels (u16), sample rate (u32),
//!   byte rate (u32), block align (u16), bits per sample (u16)

pub mod format;
pub mod scanner;

pub use format::{resolve, AudioFormat};
pub use scanner::{find_chunk, Chunk};

use nom::number::complete::{le_u16, le_u32};
use std::fmt;

/// Number of header bytes read from the front of the file before parsing.
pub const HEADER_PREFIX_LEN: usize = 4096;

/// Size of a chunk header (tag + length)
pub const CHUNK_HEADER_LEN: usize = 8;

/// Four-character chunk identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    /// Container signature at offset 0
    pub const RIFF: ChunkId = ChunkId(*b"RIFF");
    /// Form type at offset 8
    pub const WAVE: ChunkId = ChunkId(*b"WAVE");
    /// Format description subchunk
    pub const FMT: ChunkId = ChunkId(*b"fmt ");
    /// Sample data subchunk
    pub const DATA: ChunkId = ChunkId(*b"data");

    /// Check whether `buf` carries this identifier at `offset`
    pub fn matches_at(&self, buf: &[u8], offset: usize) -> bool {
        offset
            .checked_add(4)
            .and_then(|end| buf.get(offset..end))
            .is_some_and(|bytes| bytes == self.0)
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", String::from_utf8_lossy(&self.0))
    }
}

/// Error type for header parsing
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// `"RIFF"` or `"WAVE"` signature missing
    #[error("not a RIFF/WAVE file (bad signature)")]
    BadSignature,

    /// The chunk table was walked past the header prefix without a match
    #[error("chunk {0} not found in header")]
    ChunkNotFound(ChunkId),

    /// `fmt ` encoding field is not linear PCM
    #[error("unsupported encoding {0:#06x} (only linear PCM is supported)")]
    UnsupportedEncoding(u16),

    /// Channel count or bit depth outside {1,2} x {16,24}
    #[error("unsupported layout: {channels} channel(s) at {bit_depth} bits")]
    UnsupportedLayout {
        /// Declared channel count
        channels: u16,
        /// Declared bits per sample
        bit_depth: u16,
    },

    /// A chunk body ends beyond the header prefix
    #[error("chunk {0} is truncated")]
    Truncated(ChunkId),
}

/// Decode a little-endian u16 at `offset`, `None` if out of range.
pub fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    let input = buf.get(offset..)?;
    le_u16::<_, nom::error::Error<&[u8]>>(input)
        .ok()
        .map(|(_, value)| value)
}

/// Decode a little-endian u32 at `offset`, `None` if out of range.
pub fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let input = buf.get(offset..)?;
    le_u32::<_, nom::error::Error<&[u8]>>(input)
        .ok()
        .map(|(_, value)| value)
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Hand-assembled WAVE headers for parser tests

    /// Append a chunk (tag, length, body, pad byte if odd)
    pub fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], body: &[u8]) {
        out.extend_from_slice(tag);
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
    }

    /// 16-byte `fmt ` body
    pub fn fmt_body(encoding: u16, channels: u16, sample_rate: u32, bit_depth: u16) -> Vec<u8> {
        let block_align = channels * bit_depth / 8;
        let mut body = Vec::with_capacity(16);
        body.extend_from_slice(&encoding.to_le_bytes());
        body.extend_from_slice(&channels.to_le_bytes());
        body.extend_from_slice(&sample_rate.to_le_bytes());
        body.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        body.extend_from_slice(&block_align.to_le_bytes());
        body.extend_from_slice(&bit_depth.to_le_bytes());
        body
    }

    /// Complete WAVE file: RIFF header, optional extra chunks, fmt, data
    pub fn wave_file(
        encoding: u16,
        channels: u16,
        sample_rate: u32,
        bit_depth: u16,
        extra: &[(&[u8; 4], &[u8])],
        data: &[u8],
    ) -> Vec<u8> {
        let mut chunks = Vec::new();
        for (tag, body) in extra {
            push_chunk(&mut chunks, tag, body);
        }
        push_chunk(
            &mut chunks,
            b"fmt ",
            &fmt_body(encoding, channels, sample_rate, bit_depth),
        );
        push_chunk(&mut chunks, b"data", data);

        let mut file = Vec::with_capacity(12 + chunks.len());
        file.extend_from_slice(b"RIFF");
        file.extend_from_slice(&((4 + chunks.len()) as u32).to_le_bytes());
        file.extend_from_slice(b"WAVE");
        file.extend_from_slice(&chunks);
        file
    }
}
