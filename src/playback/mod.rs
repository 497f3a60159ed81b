//! Playback engine
//!
//! - [`Cycle`]: single-threaded double-buffer load/play loop (16-bit layouts, 24-bit mono)
//! - [`OverlapCycle`]: dual-thread variant overlapping file I/O with device writes (24-bit stereo)
//! - [`PlaybackSession`]: open, stream, drain and close one input on one device

pub mod buffer;
pub mod cycle;
pub mod overlap;
pub mod reader;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::BufferPair;
pub use cycle::{Cycle, CycleState};
pub use overlap::OverlapCycle;
pub use reader::PeriodReader;
pub use session::PlaybackSession;

use crate::streaming::{DeviceError, PcmDevice, WriteStatus};
use crate::transcode::DeviceSample;
use tracing::warn;

/// Counters collected while streaming
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReport {
    /// Period writes issued to the device
    pub write_calls: u64,
    /// Writes answered with an underrun (their period was skipped)
    pub underruns: u64,
    /// Streaming iterations (play step plus optional load step)
    pub cycles: u64,
    /// Frames accepted by the device
    pub frames_written: u64,
}

impl StreamReport {
    /// Add the write counters of `other` (collected on a worker thread)
    pub fn absorb_writes(&mut self, other: &StreamReport) {
        self.write_calls += other.write_calls;
        self.underruns += other.underruns;
        self.frames_written += other.frames_written;
    }
}

/// Write one period, re-arming the device if it reports an underrun.
///
/// An underrun drops the period: nothing is retried or replayed.
pub(crate) fn write_period<S, D>(
    device: &mut D,
    period: &[S],
    frames: usize,
    report: &mut StreamReport,
) -> Result<(), DeviceError>
where
    S: DeviceSample,
    D: PcmDevice + ?Sized,
{
    report.write_calls += 1;
    match device.write(S::as_samples(period), frames)? {
        WriteStatus::Written => report.frames_written += frames as u64,
        WriteStatus::Underrun => {
            report.underruns += 1;
            warn!(write = report.write_calls, "device underrun, re-arming");
            device.prepare()?;
        }
    }
    Ok(())
}
