//! Double-buffer cycle (single thread)
//!
//! State machine: `Uninitialized -> Primed -> Streaming -> Stopped`.
//!
//! Priming loads the first period into buffer 0 and flips it into the play
//! role. Each streaming step then writes the play source (exactly one device
//! period), and unless the read cursor already reached the end of the data
//! range, loads the next period into the load target and flips the roles.
//! The final loaded buffer is always played; a short tail is played once as
//! a zero-padded period.

use super::buffer::BufferPair;
use super::reader::PeriodReader;
use super::{write_period, StreamReport};
use crate::streaming::PcmDevice;
use crate::transcode::{DeviceSample, LayoutTraits};
use crate::Result;
use std::io::{Read, Seek};
use tracing::debug;

/// Lifecycle of a playback cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Buffers not allocated yet
    Uninitialized,
    /// First period loaded, nothing written
    Primed,
    /// At least one play step done
    Streaming,
    /// End of data reached; no further writes
    Stopped,
}

/// Single-threaded load/play loop over one layout
pub struct Cycle<'d, S: DeviceSample, D: PcmDevice + ?Sized, R> {
    traits: LayoutTraits<S>,
    device: &'d mut D,
    reader: PeriodReader<R>,
    buffers: BufferPair<S>,
    period_frames: usize,
    state: CycleState,
    report: StreamReport,
}

impl<'d, S, D, R> Cycle<'d, S, D, R>
where
    S: DeviceSample,
    D: PcmDevice + ?Sized,
    R: Read + Seek,
{
    /// Cycle writing `period_frames` frames per device write.
    ///
    /// `reader` must load `traits.raw_bytes_per_period(period_frames)` bytes.
    pub fn new(
        traits: LayoutTraits<S>,
        device: &'d mut D,
        reader: PeriodReader<R>,
        period_frames: usize,
    ) -> Self {
        Cycle {
            traits,
            device,
            reader,
            buffers: BufferPair::new(0),
            period_frames,
            state: CycleState::Uninitialized,
            report: StreamReport::default(),
        }
    }

    /// Current state
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Counters so far
    pub fn report(&self) -> StreamReport {
        self.report
    }

    /// Buffer pair (role inspection)
    pub fn buffers(&self) -> &BufferPair<S> {
        &self.buffers
    }

    /// Allocate the buffers and load the first period
    pub fn prime(&mut self) -> Result<()> {
        if self.state != CycleState::Uninitialized {
            return Ok(());
        }

        let samples = self.traits.output_samples_per_period(self.period_frames);
        self.buffers = BufferPair::new(samples);
        debug!(
            layout = %self.traits.layout,
            period_frames = self.period_frames,
            samples,
            "buffers allocated"
        );

        self.reader.load(&self.traits, self.buffers.load_mut())?;
        self.buffers.flip();
        self.state = CycleState::Primed;
        Ok(())
    }

    /// One play step followed by a load step (or the stop check)
    pub fn step(&mut self) -> Result<CycleState> {
        match self.state {
            CycleState::Uninitialized => {
                self.prime()?;
                return Ok(self.state);
            }
            CycleState::Stopped => return Ok(CycleState::Stopped),
            CycleState::Primed | CycleState::Streaming => {}
        }

        self.report.cycles += 1;
        write_period(
            &mut *self.device,
            self.buffers.play(),
            self.period_frames,
            &mut self.report,
        )?;

        if self.reader.is_exhausted() {
            debug!(cycles = self.report.cycles, "end of data");
            self.state = CycleState::Stopped;
            return Ok(self.state);
        }

        self.reader.load(&self.traits, self.buffers.load_mut())?;
        self.buffers.flip();
        self.state = CycleState::Streaming;
        Ok(self.state)
    }

    /// Prime, then step until stopped
    pub fn run(mut self) -> Result<StreamReport> {
        self.prime()?;
        while self.step()? != CycleState::Stopped {}
        Ok(self.report)
    }
}
