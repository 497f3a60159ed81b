//! Chunk table walker
//!
//! Walks the chunk table inside a bounded header prefix. Each step reads the
//! tag and length of the chunk at the cursor and skips `length + 8` bytes,
//! plus the pad byte RIFF requires after an odd-length body.

use super::{ChunkId, FormatError, CHUNK_HEADER_LEN};
use nom::bytes::complete::take;
use nom::number::complete::le_u32;
use nom::sequence::tuple;
use nom::IResult;

/// A chunk located in the header prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Offset of the chunk tag
    pub offset: usize,
    /// Declared body length
    pub length: u32,
}

impl Chunk {
    /// Offset of the first body byte
    pub fn body_offset(&self) -> usize {
        self.offset + CHUNK_HEADER_LEN
    }

    /// Offset of the next chunk header, including the pad byte of odd bodies
    pub fn next_offset(&self) -> Option<usize> {
        let length = self.length as usize;
        self.body_offset()
            .checked_add(length)?
            .checked_add(length & 1)
    }
}

fn chunk_header(input: &[u8]) -> IResult<&[u8], (&[u8], u32)> {
    tuple((take(4usize), le_u32))(input)
}

/// Locate chunk `tag`, walking the table from `start`.
///
/// Fails with [`FormatError::ChunkNotFound`] once the cursor leaves the
/// prefix (no full chunk header fits) before the tag matches.
pub fn find_chunk(prefix: &[u8], start: usize, tag: ChunkId) -> Result<Chunk, FormatError> {
    let mut offset = start;

    loop {
        let input = prefix
            .get(offset..)
            .ok_or(FormatError::ChunkNotFound(tag))?;
        let (_, (id, length)) =
            chunk_header(input).map_err(|_| FormatError::ChunkNotFound(tag))?;

        let chunk = Chunk { offset, length };
        if id == &tag.0[..] {
            return Ok(chunk);
        }

        offset = chunk.next_offset().ok_or(FormatError::ChunkNotFound(tag))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riff::fixtures::push_chunk;

    fn table(chunks: &[(&[u8; 4], &[u8])]) -> Vec<u8> {
        let mut out = Vec::new();
        for (tag, body) in chunks {
            push_chunk(&mut out, tag, body);
        }
        out
    }

    #[test]
    fn test_finds_first_chunk() {
        let buf = table(&[(b"fmt ", &[0u8; 16])]);
        let chunk = find_chunk(&buf, 0, ChunkId::FMT).unwrap();
        assert_eq!(chunk, Chunk { offset: 0, length: 16 });
        assert_eq!(chunk.body_offset(), 8);
    }

    #[test]
    fn test_skips_unrelated_chunks() {
        let buf = table(&[(b"LIST", &[1u8; 26]), (b"junk", &[0u8; 4]), (b"data", &[9u8; 6])]);
        let chunk = find_chunk(&buf, 0, ChunkId::DATA).unwrap();
        assert_eq!(chunk.offset, 8 + 26 + 8 + 4);
        assert_eq!(chunk.length, 6);
    }

    #[test]
    fn test_skips_pad_byte_after_odd_chunk() {
        let buf = table(&[(b"odd ", &[7u8; 3]), (b"data", &[0u8; 2])]);
        let chunk = find_chunk(&buf, 0, ChunkId::DATA).unwrap();
        assert_eq!(chunk.offset, 8 + 3 + 1);
    }

    #[test]
    fn test_not_found_when_table_ends() {
        let buf = table(&[(b"fmt ", &[0u8; 16])]);
        assert_eq!(
            find_chunk(&buf, 0, ChunkId::DATA),
            Err(FormatError::ChunkNotFound(ChunkId::DATA))
        );
    }

    #[test]
    fn test_not_found_when_length_jumps_out_of_prefix() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"LIST");
        buf.extend_from_slice(&u32::MAX.to_le_bytes());
        buf.extend_from_slice(&[0u8; 64]);
        assert_eq!(
            find_chunk(&buf, 0, ChunkId::DATA),
            Err(FormatError::ChunkNotFound(ChunkId::DATA))
        );
    }

    #[test]
    fn test_start_beyond_prefix() {
        let buf = [0u8; 8];
        assert!(find_chunk(&buf, 100, ChunkId::FMT).is_err());
        assert!(find_chunk(&buf, 4, ChunkId::FMT).is_err());
    }
}
