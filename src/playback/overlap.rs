//! Dual-thread overlap cycle
//!
//! Used for 24-bit stereo, where file I/O plus 3-to-4 byte widening is the
//! slowest load. Each buffer spans `blocks` device periods. Every cycle runs
//! two scoped threads:
//! - play task: writes the play source as `blocks` period writes, recovering
//!   from underrun per write
//! - load task: reads and transcodes the next chunk into the load target
//!
//! Both are joined before the roles flip, so the device never reads a buffer
//! the loader is writing. The threads live for one cycle only.

use super::buffer::BufferPair;
use super::cycle::CycleState;
use super::reader::PeriodReader;
use super::{write_period, StreamReport};
use crate::streaming::{DeviceError, PcmDevice};
use crate::transcode::{DeviceSample, LayoutTraits};
use crate::{PlaybackError, Result};
use std::io::{Read, Seek};
use std::thread;
use tracing::debug;

/// Number of whole periods per overlap buffer (at least one)
pub fn blocks_per_buffer(buffer_frames: usize, period_frames: usize) -> usize {
    if period_frames == 0 {
        return 1;
    }
    (buffer_frames / period_frames).max(1)
}

/// Load/play loop with the load of cycle N+1 overlapping the writes of cycle N
pub struct OverlapCycle<'d, S: DeviceSample, D: PcmDevice + ?Sized, R> {
    traits: LayoutTraits<S>,
    device: &'d mut D,
    reader: PeriodReader<R>,
    buffers: BufferPair<S>,
    period_frames: usize,
    blocks: usize,
    state: CycleState,
    report: StreamReport,
    #[cfg(test)]
    roles: Vec<(usize, usize)>,
}

impl<'d, S, D, R> OverlapCycle<'d, S, D, R>
where
    S: DeviceSample,
    D: PcmDevice + Send + ?Sized,
    R: Read + Seek + Send,
{
    /// Overlap cycle with `blocks` periods of `period_frames` frames per buffer.
    ///
    /// `reader` must load `traits.raw_bytes_per_period(blocks * period_frames)` bytes.
    pub fn new(
        traits: LayoutTraits<S>,
        device: &'d mut D,
        reader: PeriodReader<R>,
        period_frames: usize,
        blocks: usize,
    ) -> Self {
        OverlapCycle {
            traits,
            device,
            reader,
            buffers: BufferPair::new(0),
            period_frames,
            blocks: blocks.max(1),
            state: CycleState::Uninitialized,
            report: StreamReport::default(),
            #[cfg(test)]
            roles: Vec::new(),
        }
    }

    /// Current state
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Frames held by one buffer
    pub fn buffer_frames(&self) -> usize {
        self.blocks * self.period_frames
    }

    /// Allocate the buffers and load the first chunk synchronously
    pub fn prime(&mut self) -> Result<()> {
        if self.state != CycleState::Uninitialized {
            return Ok(());
        }

        let samples = self.traits.output_samples_per_period(self.buffer_frames());
        self.buffers = BufferPair::new(samples);
        debug!(
            layout = %self.traits.layout,
            period_frames = self.period_frames,
            blocks = self.blocks,
            samples,
            "overlap buffers allocated"
        );

        self.reader.load(&self.traits, self.buffers.load_mut())?;
        self.buffers.flip();
        self.state = CycleState::Primed;
        Ok(())
    }

    /// One cycle: play and (unless at end of data) load concurrently, then flip
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
        let load_next = !self.reader.is_exhausted();

        #[cfg(test)]
        self.roles
            .push((self.buffers.play_index(), self.buffers.load_index()));

        let traits = self.traits;
        let period_frames = self.period_frames;
        let device = &mut *self.device;
        let reader = &mut self.reader;
        let (play, load) = self.buffers.split_roles();

        let (played, loaded) = thread::scope(|scope| {
            let play_task = scope.spawn(move || play_blocks(device, play, period_frames));
            let load_task =
                load_next.then(|| scope.spawn(move || reader.load(&traits, load)));

            let played = play_task.join();
            let loaded = load_task.map(|task| task.join());
            (played, loaded)
        });

        let tally = played.map_err(|_| PlaybackError::WorkerPanicked("play"))??;
        self.report.absorb_writes(&tally);
        if let Some(loaded) = loaded {
            loaded.map_err(|_| PlaybackError::WorkerPanicked("load"))??;
        }

        if !load_next {
            debug!(cycles = self.report.cycles, "end of data");
            self.state = CycleState::Stopped;
            return Ok(self.state);
        }

        self.buffers.flip();
        self.state = CycleState::Streaming;
        Ok(self.state)
    }

    /// Prime, then cycle until stopped
    pub fn run(mut self) -> Result<StreamReport> {
        self.prime()?;
        while self.step()? != CycleState::Stopped {}
        Ok(self.report)
    }
}

/// Write `play` as consecutive period-sized sub-blocks
fn play_blocks<S, D>(
    device: &mut D,
    play: &[S],
    period_frames: usize,
) -> std::result::Result<StreamReport, DeviceError>
where
    S: DeviceSample,
    D: PcmDevice + ?Sized,
{
    let mut tally = StreamReport::default();
    let block_len = period_frames * crate::transcode::OUTPUT_CHANNELS;
    for block in play.chunks_exact(block_len) {
        write_period(device, block, period_frames, &mut tally)?;
    }
    Ok(tally)
}
