//! Session configuration
//!
//! What a playback session needs from its caller: the output device, the
//! input file and, in dispatch mode, a stream description resolved by another
//! process so the header does not have to be parsed again.

use crate::riff::{AudioFormat, FormatError, HEADER_PREFIX_LEN};
use crate::transcode::PcmLayout;
use crate::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default dual-thread buffer span in frames
pub const DEFAULT_OVERLAP_BUFFER_FRAMES: usize = 4096;

/// Prefix selecting the offline render sink (`wav:<path>`)
pub const WAV_RENDER_PREFIX: &str = "wav:";

/// Smallest usable header prefix ("RIFF", length, "WAVE", one chunk header)
const MIN_HEADER_PREFIX_LEN: usize = 20;

/// Largest header prefix a session may scan
pub const MAX_HEADER_PREFIX_LEN: usize = 1 << 20;

/// Output device selected by a descriptor string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceDescriptor {
    /// Render into a WAVE file
    WavRender(PathBuf),
    /// System output device by name (`default` for the host default)
    System(String),
}

impl DeviceDescriptor {
    /// Parse a descriptor: `wav:<path>` or a system device name
    pub fn parse(descriptor: &str) -> Self {
        match descriptor.strip_prefix(WAV_RENDER_PREFIX) {
            Some(path) => DeviceDescriptor::WavRender(PathBuf::from(path)),
            None => DeviceDescriptor::System(descriptor.to_string()),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceDescriptor::WavRender(path) => {
                write!(f, "{}{}", WAV_RENDER_PREFIX, path.display())
            }
            DeviceDescriptor::System(name) => write!(f, "{name}"),
        }
    }
}

/// Stream description handed over by a dispatching process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparsedStream {
    /// File offset of the first sample byte
    pub data_begin: u64,
    /// File offset one past the last sample byte
    pub data_end: u64,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count stored in the file
    pub channels: u16,
    /// Bits per stored sample
    pub bit_depth: u16,
}

impl PreparsedStream {
    /// Validate into an [`AudioFormat`] using the same layout rules as the header parser
    pub fn to_format(&self) -> Result<AudioFormat> {
        let layout = PcmLayout::from_format(self.channels, self.bit_depth).ok_or(
            FormatError::UnsupportedLayout {
                channels: self.channels,
                bit_depth: self.bit_depth,
            },
        )?;

        if self.data_end < self.data_begin {
            return Err(PlaybackError::Config(format!(
                "pre-parsed data range {}..{} is inverted",
                self.data_begin, self.data_end
            )));
        }
        if self.sample_rate == 0 {
            return Err(PlaybackError::Config(
                "pre-parsed sample rate is zero".into(),
            ));
        }

        Ok(AudioFormat {
            layout,
            sample_rate: self.sample_rate,
            data_begin: self.data_begin,
            data_end: self.data_end,
        })
    }
}

impl From<AudioFormat> for PreparsedStream {
    fn from(format: AudioFormat) -> Self {
        PreparsedStream {
            data_begin: format.data_begin,
            data_end: format.data_end,
            sample_rate: format.sample_rate,
            channels: format.channels(),
            bit_depth: format.bit_depth(),
        }
    }
}

fn default_overlap_buffer_frames() -> usize {
    DEFAULT_OVERLAP_BUFFER_FRAMES
}

fn default_header_prefix_len() -> usize {
    HEADER_PREFIX_LEN
}

/// Configuration for one playback session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Device descriptor (`wav:<path>` or a system device name)
    pub device: String,

    /// Input WAVE file
    pub input: PathBuf,

    /// Stream description resolved elsewhere; skips header parsing
    #[serde(default)]
    pub preparsed: Option<PreparsedStream>,

    /// Preferred device period in frames
    #[serde(default)]
    pub period_frames: Option<usize>,

    /// Buffer span of the dual-thread cycle (24-bit stereo), in frames.
    /// Rounded down to whole device periods, minimum one period.
    #[serde(default = "default_overlap_buffer_frames")]
    pub overlap_buffer_frames: usize,

    /// Bytes read from the front of the file for header parsing
    #[serde(default = "default_header_prefix_len")]
    pub header_prefix_len: usize,
}

impl SessionConfig {
    /// Configuration with defaults for everything but device and input
    pub fn new(device: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        SessionConfig {
            device: device.into(),
            input: input.into(),
            preparsed: None,
            period_frames: None,
            overlap_buffer_frames: DEFAULT_OVERLAP_BUFFER_FRAMES,
            header_prefix_len: HEADER_PREFIX_LEN,
        }
    }

    /// Parse a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SessionConfig =
            serde_json::from_str(json).map_err(|e| PlaybackError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Parsed device descriptor
    pub fn device_descriptor(&self) -> DeviceDescriptor {
        DeviceDescriptor::parse(&self.device)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(PlaybackError::Config("device descriptor is empty".into()));
        }
        if self.period_frames == Some(0) {
            return Err(PlaybackError::Config("period_frames must be > 0".into()));
        }
        if self.overlap_buffer_frames == 0 {
            return Err(PlaybackError::Config(
                "overlap_buffer_frames must be > 0".into(),
            ));
        }
        if !(MIN_HEADER_PREFIX_LEN..=MAX_HEADER_PREFIX_LEN).contains(&self.header_prefix_len) {
            return Err(PlaybackError::Config(format!(
                "header_prefix_len must be between {MIN_HEADER_PREFIX_LEN} and {MAX_HEADER_PREFIX_LEN} bytes"
            )));
        }
        Ok(())
    }
}
