//! Format resolution
//!
//! Turns a header prefix into an [`AudioFormat`]. Pure function over bytes;
//! reading the prefix from disk is the loader's job.

use super::scanner::find_chunk;
use super::{read_u16_le, read_u32_le, ChunkId, FormatError};
use crate::transcode::PcmLayout;
use std::fmt;

/// `fmt ` encoding tag for linear PCM
pub const WAVE_FORMAT_PCM: u16 = 1;

/// Minimum `fmt ` body carrying every field we read
const FMT_MIN_LEN: usize = 16;

/// Offset of the chunk table (after "RIFF", length, "WAVE")
const CHUNK_TABLE_OFFSET: usize = 12;

/// Canonical description of a playable PCM stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Layout (channel count and bit depth)
    pub layout: PcmLayout,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// File offset of the first sample byte
    pub data_begin: u64,
    /// File offset one past the last sample byte
    pub data_end: u64,
}

impl AudioFormat {
    /// Channel count stored in the file
    pub fn channels(&self) -> u16 {
        self.layout.channels()
    }

    /// Bits per stored sample
    pub fn bit_depth(&self) -> u16 {
        self.layout.bit_depth()
    }

    /// Length of the sample data in bytes
    pub fn data_len(&self) -> u64 {
        self.data_end.saturating_sub(self.data_begin)
    }

    /// Whole frames contained in the data range
    pub fn frame_count(&self) -> u64 {
        self.data_len() / self.layout.raw_bytes_per_frame() as u64
    }

    /// Playback duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} Hz, data {}..{} ({:.2}s)",
            self.layout,
            self.sample_rate,
            self.data_begin,
            self.data_end,
            self.duration_seconds()
        )
    }
}

/// Resolve the stream format from a header prefix.
///
/// Order of checks: `"RIFF"`/`"WAVE"` signatures, `fmt ` chunk, encoding,
/// `fmt ` length, layout, then the `data` chunk (searched after `fmt `).
pub fn resolve(prefix: &[u8]) -> Result<AudioFormat, FormatError> {
    if !ChunkId::RIFF.matches_at(prefix, 0) || !ChunkId::WAVE.matches_at(prefix, 8) {
        return Err(FormatError::BadSignature);
    }

    let fmt_chunk = find_chunk(prefix, CHUNK_TABLE_OFFSET, ChunkId::FMT)?;
    let body = fmt_chunk.body_offset();
    let field = |offset: usize| read_u16_le(prefix, body + offset);

    // The encoding tag is classified even when the rest of the body is short
    let encoding = (fmt_chunk.length >= 2)
        .then(|| field(0))
        .flatten()
        .ok_or(FormatError::Truncated(ChunkId::FMT))?;
    if encoding != WAVE_FORMAT_PCM {
        return Err(FormatError::UnsupportedEncoding(encoding));
    }
    if (fmt_chunk.length as usize) < FMT_MIN_LEN {
        return Err(FormatError::Truncated(ChunkId::FMT));
    }

    let channels = field(2).ok_or(FormatError::Truncated(ChunkId::FMT))?;
    let sample_rate =
        read_u32_le(prefix, body + 4).ok_or(FormatError::Truncated(ChunkId::FMT))?;
    let bit_depth = field(14).ok_or(FormatError::Truncated(ChunkId::FMT))?;

    let layout = PcmLayout::from_format(channels, bit_depth).ok_or(
        FormatError::UnsupportedLayout {
            channels,
            bit_depth,
        },
    )?;

    let data_search = fmt_chunk
        .next_offset()
        .ok_or(FormatError::ChunkNotFound(ChunkId::DATA))?;
    let data_chunk = find_chunk(prefix, data_search, ChunkId::DATA)?;

    let data_begin = data_chunk.body_offset() as u64;
    let data_end = data_begin + u64::from(data_chunk.length);

    Ok(AudioFormat {
        layout,
        sample_rate,
        data_begin,
        data_end,
    })
}
