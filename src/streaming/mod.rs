//! Device sinks
//!
//! The playback engine talks to its output through [`PcmDevice`]: open,
//! negotiate hardware parameters, blocking period writes, underrun re-arm,
//! drain and close. Two sinks are provided:
//! - [`WavRenderDevice`]: offline render into a WAVE file (never underruns)
//! - `AudioDevice`: realtime system output through rodio (feature `streaming`)

pub mod ring_buffer;
pub mod wav_device;

#[cfg(feature = "streaming")]
pub mod audio_device;

pub use ring_buffer::{RingBuffer, RingBufferError};
pub use wav_device::WavRenderDevice;

#[cfg(feature = "streaming")]
pub use audio_device::AudioDevice;

use crate::config::DeviceDescriptor;
use std::fmt;
use tracing::warn;

/// Period size used when a device has no period of its own to confirm
pub const DEFAULT_PERIOD_FRAMES: usize = 1024;

/// Channels the device is always opened with (mono sources are duplicated)
pub const DEVICE_CHANNELS: u16 = 2;

/// Buffer backoff time in microseconds
pub const BUFFER_BACKOFF_MICROS: u64 = 100;

/// Device sample formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian
    S16Le,
    /// Signed 24-bit samples in 32-bit little-endian containers
    S24In32Le,
}

impl SampleFormat {
    /// Significant bits per sample
    pub fn bits_per_sample(self) -> u16 {
        match self {
            SampleFormat::S16Le => 16,
            SampleFormat::S24In32Le => 24,
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::S16Le => write!(f, "S16_LE"),
            SampleFormat::S24In32Le => write!(f, "S24_LE"),
        }
    }
}

/// Interleaved samples handed to a device write
#[derive(Debug, Clone, Copy)]
pub enum Samples<'a> {
    /// 16-bit samples
    I16(&'a [i16]),
    /// 24-in-32 samples
    I32(&'a [i32]),
}

impl Samples<'_> {
    /// Format of the borrowed samples
    pub fn format(&self) -> SampleFormat {
        match self {
            Samples::I16(_) => SampleFormat::S16Le,
            Samples::I32(_) => SampleFormat::S24In32Le,
        }
    }

    /// Number of individual samples
    pub fn len(&self) -> usize {
        match self {
            Samples::I16(buf) => buf.len(),
            Samples::I32(buf) => buf.len(),
        }
    }

    /// Whether no samples are borrowed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Address of the first sample (buffer identity)
    pub fn as_ptr(&self) -> *const u8 {
        match self {
            Samples::I16(buf) => buf.as_ptr().cast(),
            Samples::I32(buf) => buf.as_ptr().cast(),
        }
    }
}

/// Hardware parameters requested by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwParams {
    /// Interleaved channel count
    pub channels: u16,
    /// Sample format
    pub format: SampleFormat,
    /// Requested sample rate in Hz
    pub sample_rate: u32,
    /// Preferred period size, if any
    pub period_frames_hint: Option<usize>,
}

impl HwParams {
    /// Stereo parameters for `format` at `sample_rate`
    pub fn stereo(format: SampleFormat, sample_rate: u32) -> Self {
        HwParams {
            channels: DEVICE_CHANNELS,
            format,
            sample_rate,
            period_frames_hint: None,
        }
    }
}

/// Parameters confirmed by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedParams {
    /// Frames per period; every write is sized to exactly this
    pub period_frames: usize,
    /// Confirmed sample rate in Hz
    pub sample_rate: u32,
}

impl NegotiatedParams {
    /// Check the confirmed parameters against the request.
    ///
    /// A zero period or a rate below the requested one fails; a higher rate
    /// is accepted with a warning.
    pub fn check(&self, requested: &HwParams) -> Result<(), DeviceError> {
        if self.period_frames == 0 {
            return Err(DeviceError::ParamNegotiationFailed(
                "device confirmed a zero period size".into(),
            ));
        }
        if self.sample_rate < requested.sample_rate {
            return Err(DeviceError::ParamNegotiationFailed(format!(
                "device rate {} Hz is below the stream rate {} Hz",
                self.sample_rate, requested.sample_rate
            )));
        }
        if self.sample_rate > requested.sample_rate {
            warn!(
                requested = requested.sample_rate,
                confirmed = self.sample_rate,
                "device confirmed a higher sample rate"
            );
        }
        Ok(())
    }
}

/// Outcome of a period write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// The period was accepted
    Written,
    /// The device ran dry before this write; the period was not played
    Underrun,
}

/// Error type for device sinks
#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    /// The device could not be opened
    #[error("cannot open device: {0}")]
    OpenFailed(String),

    /// The device rejected the requested hardware parameters
    #[error("cannot configure device: {0}")]
    ParamNegotiationFailed(String),

    /// A write failed for a reason other than underrun
    #[error("device write failed: {0}")]
    WriteFailed(String),

    /// The requested device kind is not compiled in
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

/// Platform PCM output boundary
pub trait PcmDevice {
    /// Configure the device; the engine sizes its buffers from the result
    fn negotiate(&mut self, params: &HwParams) -> Result<NegotiatedParams, DeviceError>;

    /// Blocking write of `frames` interleaved frames from `samples`
    fn write(&mut self, samples: Samples<'_>, frames: usize) -> Result<WriteStatus, DeviceError>;

    /// Re-arm the device after an underrun
    fn prepare(&mut self) -> Result<(), DeviceError>;

    /// Block until everything written has been played
    fn drain(&mut self) -> Result<(), DeviceError>;

    /// Release the device; further calls fail
    fn close(&mut self) -> Result<(), DeviceError>;
}

impl<D: PcmDevice + ?Sized> PcmDevice for Box<D> {
    fn negotiate(&mut self, params: &HwParams) -> Result<NegotiatedParams, DeviceError> {
        (**self).negotiate(params)
    }

    fn write(&mut self, samples: Samples<'_>, frames: usize) -> Result<WriteStatus, DeviceError> {
        (**self).write(samples, frames)
    }

    fn prepare(&mut self) -> Result<(), DeviceError> {
        (**self).prepare()
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        (**self).drain()
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        (**self).close()
    }
}

impl<D: PcmDevice + ?Sized> PcmDevice for &mut D {
    fn negotiate(&mut self, params: &HwParams) -> Result<NegotiatedParams, DeviceError> {
        (**self).negotiate(params)
    }

    fn write(&mut self, samples: Samples<'_>, frames: usize) -> Result<WriteStatus, DeviceError> {
        (**self).write(samples, frames)
    }

    fn prepare(&mut self) -> Result<(), DeviceError> {
        (**self).prepare()
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        (**self).drain()
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        (**self).close()
    }
}

/// Owned device handle as returned by [`open_device`]
pub type BoxedDevice = Box<dyn PcmDevice + Send>;

/// Open the sink named by `descriptor`
pub fn open_device(descriptor: &DeviceDescriptor) -> Result<BoxedDevice, DeviceError> {
    match descriptor {
        DeviceDescriptor::WavRender(path) => Ok(Box::new(WavRenderDevice::open(path)?)),
        DeviceDescriptor::System(name) => open_system_device(name),
    }
}

#[cfg(feature = "streaming")]
fn open_system_device(name: &str) -> Result<BoxedDevice, DeviceError> {
    Ok(Box::new(AudioDevice::open(name)?))
}

#[cfg(not(feature = "streaming"))]
fn open_system_device(name: &str) -> Result<BoxedDevice, DeviceError> {
    Err(DeviceError::Unavailable(format!(
        "system output {name:?} requires the \"streaming\" feature (use wav:<path> to render)"
    )))
}
