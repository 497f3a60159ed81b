//! Sample Transcoding
//!
//! Converts raw little-endian PCM bytes into the device's native interleaved
//! stereo representation. One [`PcmLayout`] exists per supported file layout;
//! the playback engine is generic over a [`LayoutTraits`] value instead of
//! carrying one copy of the loop per layout.

pub mod pcm;

use crate::streaming::{SampleFormat, Samples};
use std::fmt;

/// Output channel count for every layout (mono is duplicated)
pub const OUTPUT_CHANNELS: usize = 2;

/// Supported WAVE PCM layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PcmLayout {
    /// 16-bit, 1 channel
    Mono16,
    /// 16-bit, 2 channels
    Stereo16,
    /// 24-bit, 1 channel
    Mono24,
    /// 24-bit, 2 channels
    Stereo24,
}

impl PcmLayout {
    /// Map a `fmt ` channel count and bit depth to a layout
    pub fn from_format(channels: u16, bit_depth: u16) -> Option<Self> {
        match (channels, bit_depth) {
            (1, 16) => Some(PcmLayout::Mono16),
            (2, 16) => Some(PcmLayout::Stereo16),
            (1, 24) => Some(PcmLayout::Mono24),
            (2, 24) => Some(PcmLayout::Stereo24),
            _ => None,
        }
    }

    /// Channels stored in the file
    pub fn channels(self) -> u16 {
        match self {
            PcmLayout::Mono16 | PcmLayout::Mono24 => 1,
            PcmLayout::Stereo16 | PcmLayout::Stereo24 => 2,
        }
    }

    /// Bits per stored sample
    pub fn bit_depth(self) -> u16 {
        match self {
            PcmLayout::Mono16 | PcmLayout::Stereo16 => 16,
            PcmLayout::Mono24 | PcmLayout::Stereo24 => 24,
        }
    }

    /// Raw bytes per file frame
    pub fn raw_bytes_per_frame(self) -> usize {
        usize::from(self.channels()) * usize::from(self.bit_depth() / 8)
    }

    /// Sample format the device is opened with
    pub fn device_format(self) -> SampleFormat {
        match self {
            PcmLayout::Mono16 | PcmLayout::Stereo16 => SampleFormat::S16Le,
            PcmLayout::Mono24 | PcmLayout::Stereo24 => SampleFormat::S24In32Le,
        }
    }

    /// Whether this layout streams with the dual-thread overlap cycle
    pub fn uses_overlap(self) -> bool {
        self == PcmLayout::Stereo24
    }
}

impl fmt::Display for PcmLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = match self.channels() {
            1 => "mono",
            _ => "stereo",
        };
        write!(f, "{}-bit {}", self.bit_depth(), channels)
    }
}

/// Device-native sample container
pub trait DeviceSample: Copy + Default + Send + Sync + fmt::Debug + 'static {
    /// Device format this container carries
    const FORMAT: SampleFormat;

    /// Borrow a buffer of this type as device write input
    fn as_samples(buf: &[Self]) -> Samples<'_>;
}

impl DeviceSample for i16 {
    const FORMAT: SampleFormat = SampleFormat::S16Le;

    fn as_samples(buf: &[Self]) -> Samples<'_> {
        Samples::I16(buf)
    }
}

impl DeviceSample for i32 {
    const FORMAT: SampleFormat = SampleFormat::S24In32Le;

    fn as_samples(buf: &[Self]) -> Samples<'_> {
        Samples::I32(buf)
    }
}

/// Strategy value describing one layout to the playback engine
#[derive(Clone, Copy)]
pub struct LayoutTraits<S: DeviceSample> {
    /// File layout
    pub layout: PcmLayout,
    /// Converts whole raw frames into interleaved stereo frames
    pub transcode: fn(&[u8], &mut [S]),
}

impl<S: DeviceSample> LayoutTraits<S> {
    /// Raw bytes consumed per period of `frames` frames
    pub fn raw_bytes_per_period(&self, frames: usize) -> usize {
        frames * self.layout.raw_bytes_per_frame()
    }

    /// Device samples produced per period of `frames` frames
    pub fn output_samples_per_period(&self, frames: usize) -> usize {
        frames * OUTPUT_CHANNELS
    }
}

impl<S: DeviceSample> fmt::Debug for LayoutTraits<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutTraits")
            .field("layout", &self.layout)
            .field("format", &S::FORMAT)
            .finish()
    }
}

/// 16-bit mono into S16 stereo
pub const MONO_16: LayoutTraits<i16> = LayoutTraits {
    layout: PcmLayout::Mono16,
    transcode: pcm::mono16,
};

/// 16-bit stereo into S16 stereo
pub const STEREO_16: LayoutTraits<i16> = LayoutTraits {
    layout: PcmLayout::Stereo16,
    transcode: pcm::stereo16,
};

/// 24-bit mono into 24-in-32 stereo
pub const MONO_24: LayoutTraits<i32> = LayoutTraits {
    layout: PcmLayout::Mono24,
    transcode: pcm::mono24,
};

/// 24-bit stereo into 24-in-32 stereo
pub const STEREO_24: LayoutTraits<i32> = LayoutTraits {
    layout: PcmLayout::Stereo24,
    transcode: pcm::stereo24,
};
