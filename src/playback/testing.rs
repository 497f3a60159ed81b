//! Scripted in-memory device for engine tests

use crate::streaming::{
    DeviceError, HwParams, NegotiatedParams, PcmDevice, Samples, WriteStatus,
};
use std::collections::HashSet;

/// Device calls in the order they happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Negotiate,
    Write,
    Prepare,
    Drain,
    Close,
}

/// One recorded write
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub ptr: usize,
    pub frames: usize,
    pub samples: Vec<i32>,
    pub status: WriteStatus,
}

/// Records every call; answers `Underrun` on the chosen write indices and
/// fails the write at `fail_write_on`
#[derive(Debug)]
pub struct RecordingDevice {
    pub period_frames: usize,
    pub confirmed_rate: Option<u32>,
    pub underrun_on: HashSet<usize>,
    pub fail_write_on: Option<usize>,
    pub fail_negotiate: bool,
    pub requested: Option<HwParams>,
    pub writes: Vec<RecordedWrite>,
    pub calls: Vec<Call>,
}

impl RecordingDevice {
    pub fn new(period_frames: usize) -> Self {
        RecordingDevice {
            period_frames,
            confirmed_rate: None,
            underrun_on: HashSet::new(),
            fail_write_on: None,
            fail_negotiate: false,
            requested: None,
            writes: Vec::new(),
            calls: Vec::new(),
        }
    }

    pub fn with_underruns(mut self, writes: &[usize]) -> Self {
        self.underrun_on.extend(writes.iter().copied());
        self
    }

    pub fn with_write_failure(mut self, write: usize) -> Self {
        self.fail_write_on = Some(write);
        self
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls.iter().filter(|&&c| c == call).count()
    }

    /// Samples of all accepted writes, in order
    pub fn played(&self) -> Vec<i32> {
        self.writes
            .iter()
            .filter(|w| w.status == WriteStatus::Written)
            .flat_map(|w| w.samples.iter().copied())
            .collect()
    }
}

impl PcmDevice for RecordingDevice {
    fn negotiate(&mut self, params: &HwParams) -> Result<NegotiatedParams, DeviceError> {
        self.calls.push(Call::Negotiate);
        self.requested = Some(*params);
        if self.fail_negotiate {
            return Err(DeviceError::ParamNegotiationFailed("scripted".into()));
        }
        Ok(NegotiatedParams {
            period_frames: self.period_frames,
            sample_rate: self.confirmed_rate.unwrap_or(params.sample_rate),
        })
    }

    fn write(&mut self, samples: Samples<'_>, frames: usize) -> Result<WriteStatus, DeviceError> {
        self.calls.push(Call::Write);
        let index = self.writes.len();
        if self.fail_write_on == Some(index) {
            return Err(DeviceError::WriteFailed("scripted".into()));
        }
        let status = if self.underrun_on.contains(&index) {
            WriteStatus::Underrun
        } else {
            WriteStatus::Written
        };

        let count = frames * 2;
        let recorded = match samples {
            Samples::I16(buf) => buf[..count].iter().map(|&s| i32::from(s)).collect(),
            Samples::I32(buf) => buf[..count].to_vec(),
        };
        self.writes.push(RecordedWrite {
            ptr: samples.as_ptr() as usize,
            frames,
            samples: recorded,
            status,
        });
        Ok(status)
    }

    fn prepare(&mut self) -> Result<(), DeviceError> {
        self.calls.push(Call::Prepare);
        Ok(())
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        self.calls.push(Call::Drain);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.calls.push(Call::Close);
        Ok(())
    }
}

/// Expected device samples for 16-bit mono input
pub fn mono16_expected(samples: &[i16]) -> Vec<i32> {
    samples
        .iter()
        .flat_map(|&s| [i32::from(s), i32::from(s)])
        .collect()
}

/// Little-endian bytes of 16-bit samples
pub fn i16_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Little-endian 3-byte packing of 24-bit samples
pub fn s24_bytes(samples: &[i32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|s| {
            let b = s.to_le_bytes();
            [b[0], b[1], b[2]]
        })
        .collect()
}
