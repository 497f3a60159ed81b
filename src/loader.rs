//! Input file access
//!
//! Opens a WAVE file, reads its header prefix and resolves the stream
//! format. Only the first `prefix_len` bytes are ever used for parsing; sample
//! data is read later by the playback reader with positioned reads.

use crate::riff::{self, AudioFormat};
use crate::Result;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// An opened WAVE input file
#[derive(Debug)]
pub struct WaveFile {
    file: File,
    format: AudioFormat,
}

impl WaveFile {
    /// Open `path` and resolve its format from the first `prefix_len` bytes
    pub fn open(path: impl AsRef<Path>, prefix_len: usize) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();

        let prefix = read_prefix(&mut file, prefix_len, len)?;
        let format = riff::resolve(&prefix)?;
        debug!(path = %path.display(), %format, "header resolved");

        Ok(Self::with_format(path, file, len, format))
    }

    /// Open `path` trusting an already resolved format (dispatch mode)
    pub fn open_preparsed(path: impl AsRef<Path>, format: AudioFormat) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self::with_format(path, file, len, format))
    }

    fn with_format(path: &Path, file: File, len: u64, mut format: AudioFormat) -> Self {
        if format.data_end > len {
            warn!(
                path = %path.display(),
                declared_end = format.data_end,
                file_len = len,
                "data chunk runs past end of file, clamping"
            );
            format.data_end = len;
        }
        format.data_begin = format.data_begin.min(format.data_end);

        WaveFile { file, format }
    }

    /// Resolved stream format (data range clamped to the file)
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Give up the handle for streaming
    pub fn into_file(self) -> File {
        self.file
    }
}

/// Read up to `prefix_len` bytes from the front of a file of `file_len` bytes
fn read_prefix(file: &mut File, prefix_len: usize, file_len: u64) -> Result<Vec<u8>> {
    let want = file_len.min(prefix_len as u64);
    let mut prefix = Vec::with_capacity(want as usize);
    file.by_ref().take(want).read_to_end(&mut prefix)?;
    Ok(prefix)
}
