//! Bounded period reader
//!
//! Reads the sample data range of the input one period at a time with
//! positioned reads. Raw bytes land in a staging buffer (3-byte samples need
//! one before they can be widened) and are transcoded into the load target.

use crate::transcode::{DeviceSample, LayoutTraits};
use std::io::{self, Read, Seek, SeekFrom};

/// Positioned reader over `[data_begin, data_end)`
#[derive(Debug)]
pub struct PeriodReader<R> {
    source: R,
    pos: u64,
    end: u64,
    staging: Vec<u8>,
}

impl<R: Read + Seek> PeriodReader<R> {
    /// Reader over `data_begin..data_end` loading `chunk_bytes` raw bytes per load
    pub fn new(source: R, data_begin: u64, data_end: u64, chunk_bytes: usize) -> Self {
        PeriodReader {
            source,
            pos: data_begin,
            end: data_end.max(data_begin),
            staging: vec![0; chunk_bytes],
        }
    }

    /// Current read cursor
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// End of the data range
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Bytes left in the data range
    pub fn remaining(&self) -> u64 {
        self.end - self.pos
    }

    /// Whether the cursor reached the end of the data range
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.end
    }

    /// Load the next chunk into `out`.
    ///
    /// `out` is zeroed first, so a short read leaves trailing silence. The
    /// cursor advances by the bytes requested (never past the data range);
    /// the return value is the number of bytes actually read.
    pub fn load<S: DeviceSample>(
        &mut self,
        traits: &LayoutTraits<S>,
        out: &mut [S],
    ) -> io::Result<usize> {
        out.fill(S::default());
        let read = self.fill_staging()?;
        (traits.transcode)(&self.staging, out);
        Ok(read)
    }

    fn fill_staging(&mut self) -> io::Result<usize> {
        self.staging.fill(0);

        let want = self.remaining().min(self.staging.len() as u64) as usize;
        if want == 0 {
            return Ok(0);
        }

        self.source.seek(SeekFrom::Start(self.pos))?;
        let mut filled = 0;
        while filled < want {
            match self.source.read(&mut self.staging[filled..want]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        self.pos += want as u64;
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::{MONO_16, STEREO_24};
    use std::io::Cursor;

    fn mono16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_loads_within_range() {
        // 4 bytes of header junk, 6 samples of data, trailing junk
        let mut file = vec![0xAAu8; 4];
        file.extend(mono16_bytes(&[1, 2, 3, 4, 5, 6]));
        file.extend([0x55u8; 4]);

        let mut reader = PeriodReader::new(Cursor::new(file), 4, 16, MONO_16.raw_bytes_per_period(4));
        let mut out = vec![0i16; 8];

        assert_eq!(reader.load(&MONO_16, &mut out).unwrap(), 8);
        assert_eq!(out, vec![1, 1, 2, 2, 3, 3, 4, 4]);
        assert!(!reader.is_exhausted());

        assert_eq!(reader.load(&MONO_16, &mut out).unwrap(), 4);
        assert_eq!(out, vec![5, 5, 6, 6, 0, 0, 0, 0]);
        assert!(reader.is_exhausted());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_short_read_zero_pads() {
        let data = mono16_bytes(&[7, 8]);
        // data range claims more than the source holds
        let mut reader = PeriodReader::new(Cursor::new(data), 0, 100, 8);
        let mut out = vec![9i16; 8];
        assert_eq!(reader.load(&MONO_16, &mut out).unwrap(), 4);
        assert_eq!(out, vec![7, 7, 8, 8, 0, 0, 0, 0]);
        assert_eq!(reader.pos(), 8);
    }

    #[test]
    fn test_stale_samples_cleared() {
        let data = vec![0x01, 0x00, 0x00, 0xFF, 0xFF, 0xFF];
        let mut reader = PeriodReader::new(Cursor::new(data), 0, 6, STEREO_24.raw_bytes_per_period(2));
        let mut out = vec![42i32; 4];
        reader.load(&STEREO_24, &mut out).unwrap();
        assert_eq!(out, vec![1, -1, 0, 0]);
    }

    #[test]
    fn test_empty_range() {
        let mut reader = PeriodReader::new(Cursor::new(vec![1u8; 8]), 8, 4, 4);
        assert!(reader.is_exhausted());
        let mut out = vec![3i16; 4];
        assert_eq!(reader.load(&MONO_16, &mut out).unwrap(), 0);
        assert_eq!(out, vec![0; 4]);
    }
}
