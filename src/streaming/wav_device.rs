//! Offline render sink
//!
//! Writes every period to a WAVE file in the device-native format (16-bit, or
//! 24-bit for 24-in-32 input) using hound. The file is created on open so a
//! bad path fails before any negotiation; the WAVE writer itself is created
//! once the format is known.

use super::{
    DeviceError, HwParams, NegotiatedParams, PcmDevice, SampleFormat, Samples, WriteStatus,
    DEFAULT_PERIOD_FRAMES,
};
use hound::{SampleFormat as HoundFormat, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

enum RenderState {
    Opened(File),
    Rendering {
        writer: WavWriter<BufWriter<File>>,
        format: SampleFormat,
        channels: u16,
    },
    Closed,
}

/// Device sink rendering into a WAVE file
pub struct WavRenderDevice {
    path: PathBuf,
    state: RenderState,
    frames_written: u64,
}

impl WavRenderDevice {
    /// Create (truncate) the output file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)
            .map_err(|e| DeviceError::OpenFailed(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "render sink opened");
        Ok(WavRenderDevice {
            path,
            state: RenderState::Opened(file),
            frames_written: 0,
        })
    }

    /// Frames written so far
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

fn not_rendering(path: &Path) -> DeviceError {
    DeviceError::WriteFailed(format!("{} is not configured for rendering", path.display()))
}

impl PcmDevice for WavRenderDevice {
    fn negotiate(&mut self, params: &HwParams) -> Result<NegotiatedParams, DeviceError> {
        let file = match std::mem::replace(&mut self.state, RenderState::Closed) {
            RenderState::Opened(file) => file,
            other => {
                self.state = other;
                return Err(DeviceError::ParamNegotiationFailed(
                    "render sink is already configured".into(),
                ));
            }
        };

        if params.channels == 0 || params.sample_rate == 0 {
            return Err(DeviceError::ParamNegotiationFailed(format!(
                "{} channel(s) at {} Hz",
                params.channels, params.sample_rate
            )));
        }

        let spec = WavSpec {
            channels: params.channels,
            sample_rate: params.sample_rate,
            bits_per_sample: params.format.bits_per_sample(),
            sample_format: HoundFormat::Int,
        };
        let writer = WavWriter::new(BufWriter::new(file), spec)
            .map_err(|e| DeviceError::ParamNegotiationFailed(e.to_string()))?;

        self.state = RenderState::Rendering {
            writer,
            format: params.format,
            channels: params.channels,
        };

        Ok(NegotiatedParams {
            period_frames: params.period_frames_hint.unwrap_or(DEFAULT_PERIOD_FRAMES),
            sample_rate: params.sample_rate,
        })
    }

    fn write(&mut self, samples: Samples<'_>, frames: usize) -> Result<WriteStatus, DeviceError> {
        let RenderState::Rendering {
            writer,
            format,
            channels,
        } = &mut self.state
        else {
            return Err(not_rendering(&self.path));
        };

        if samples.format() != *format {
            return Err(DeviceError::WriteFailed(format!(
                "expected {format} samples, got {}",
                samples.format()
            )));
        }

        let count = frames * usize::from(*channels);
        if samples.len() < count {
            return Err(DeviceError::WriteFailed(format!(
                "{frames} frames requested but only {} samples supplied",
                samples.len()
            )));
        }

        let result = match samples {
            Samples::I16(buf) => buf[..count].iter().try_for_each(|&s| writer.write_sample(s)),
            Samples::I32(buf) => buf[..count].iter().try_for_each(|&s| writer.write_sample(s)),
        };
        result.map_err(|e| DeviceError::WriteFailed(e.to_string()))?;

        self.frames_written += frames as u64;
        Ok(WriteStatus::Written)
    }

    fn prepare(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        match &mut self.state {
            RenderState::Rendering { writer, .. } => writer
                .flush()
                .map_err(|e| DeviceError::WriteFailed(e.to_string())),
            _ => Ok(()),
        }
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        match std::mem::replace(&mut self.state, RenderState::Closed) {
            RenderState::Rendering { writer, .. } => {
                writer
                    .finalize()
                    .map_err(|e| DeviceError::WriteFailed(e.to_string()))?;
                debug!(
                    path = %self.path.display(),
                    frames = self.frames_written,
                    "render sink finalized"
                );
                Ok(())
            }
            _ => Ok(()),
        }
    }
}
