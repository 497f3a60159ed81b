//! Audio device integration using rodio
//!
//! Plays periods on the system audio output. The rodio `OutputStream` is not
//! `Send`, so it lives on a dedicated output thread together with its `Sink`;
//! the device itself only holds the shared ring buffer and a few flags, which
//! lets the playback engine move it between its worker threads.

use super::{
    DeviceError, HwParams, NegotiatedParams, PcmDevice, RingBuffer, Samples, WriteStatus,
    BUFFER_BACKOFF_MICROS, DEFAULT_PERIOD_FRAMES,
};
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

/// Name selecting the host's default output device
pub const DEFAULT_DEVICE_NAME: &str = "default";

/// Ring capacity in periods
const RING_PERIODS: usize = 4;

/// Samples pulled from the ring per refill
const SOURCE_BATCH: usize = 512;

const I16_SCALE: f32 = 32_768.0;
const S24_SCALE: f32 = 8_388_608.0;

/// Flags shared between the device handle and the output source
#[derive(Debug, Default)]
struct SharedFlags {
    /// Set once the first period is queued; underruns before that are priming
    armed: AtomicBool,
    /// Latched by the source when it found the ring empty while armed
    underrun: AtomicBool,
    /// Ends the source iterator
    finished: AtomicBool,
}

/// Audio source that reads from the ring buffer
struct RingBufferSource {
    ring_buffer: Arc<RingBuffer>,
    flags: Arc<SharedFlags>,
    sample_rate: u32,
    channels: u16,
    /// Batch read from the ring (reduces lock contention)
    buffer: Vec<f32>,
    /// Valid samples in `buffer`
    filled: usize,
    /// Next sample in `buffer`
    buffer_pos: usize,
}

impl RingBufferSource {
    fn new(
        ring_buffer: Arc<RingBuffer>,
        flags: Arc<SharedFlags>,
        sample_rate: u32,
        channels: u16,
    ) -> Self {
        RingBufferSource {
            ring_buffer,
            flags,
            sample_rate,
            channels,
            buffer: vec![0.0; SOURCE_BATCH],
            filled: 0,
            buffer_pos: 0,
        }
    }

    fn refill(&mut self) {
        let read = self.ring_buffer.read(&mut self.buffer);
        self.buffer_pos = 0;
        if read > 0 {
            self.filled = read;
            return;
        }

        // Ring ran dry: play silence and latch the underrun for the writer
        if self.flags.armed.load(Ordering::Acquire) {
            self.flags.underrun.store(true, Ordering::Release);
        }
        self.buffer.fill(0.0);
        self.filled = self.buffer.len();
    }
}

impl Source for RingBufferSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.filled.saturating_sub(self.buffer_pos).max(1))
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Iterator for RingBufferSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.flags.finished.load(Ordering::Acquire) {
            return None;
        }

        if self.buffer_pos >= self.filled {
            self.refill();
        }

        let sample = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Some(sample)
    }
}

/// Handle to the thread owning the rodio stream
struct OutputThread {
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Realtime output device using rodio
pub struct AudioDevice {
    name: String,
    ring_buffer: Option<Arc<RingBuffer>>,
    flags: Arc<SharedFlags>,
    output: Option<OutputThread>,
    scratch: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioDevice {
    /// Look up an output device by name (`"default"` for the host default)
    pub fn open(name: &str) -> Result<Self, DeviceError> {
        if name != DEFAULT_DEVICE_NAME {
            let found = output_device_names()?.iter().any(|n| n == name);
            if !found {
                return Err(DeviceError::OpenFailed(format!(
                    "no output device named {name:?}"
                )));
            }
        }

        Ok(AudioDevice {
            name: name.to_string(),
            ring_buffer: None,
            flags: Arc::new(SharedFlags::default()),
            output: None,
            scratch: Vec::new(),
            channels: 0,
            sample_rate: 0,
        })
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Push converted samples with backpressure until all are queued
    fn write_blocking(&self, ring_buffer: &RingBuffer) -> Result<(), DeviceError> {
        let mut remaining = &self.scratch[..];

        while !remaining.is_empty() {
            if self.output.as_ref().is_some_and(|o| o.handle.is_finished()) {
                return Err(DeviceError::WriteFailed("output thread exited".into()));
            }

            let written = ring_buffer.write(remaining);
            if written == 0 {
                std::thread::sleep(Duration::from_micros(BUFFER_BACKOFF_MICROS));
            } else {
                remaining = &remaining[written..];
            }
        }

        Ok(())
    }

    fn shutdown(&mut self) {
        self.flags.finished.store(true, Ordering::Release);
        if let Some(output) = self.output.take() {
            let _ = output.shutdown.send(());
            if output.handle.join().is_err() {
                warn!(device = %self.name, "output thread panicked");
            }
        }
    }
}

fn output_device_names() -> Result<Vec<String>, DeviceError> {
    let host = rodio::cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| DeviceError::OpenFailed(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

fn open_stream(name: &str) -> Result<(OutputStream, OutputStreamHandle), String> {
    if name == DEFAULT_DEVICE_NAME {
        return OutputStream::try_default().map_err(|e| e.to_string());
    }

    let host = rodio::cpal::default_host();
    let devices = host.output_devices().map_err(|e| e.to_string())?;
    for device in devices {
        if device.name().ok().as_deref() == Some(name) {
            return OutputStream::try_from_device(&device).map_err(|e| e.to_string());
        }
    }
    Err(format!("no output device named {name:?}"))
}

/// Output thread body: keep the stream alive until shutdown
fn run_output(
    name: String,
    source: RingBufferSource,
    ready: mpsc::SyncSender<Result<(), String>>,
    shutdown: mpsc::Receiver<()>,
) {
    let opened = open_stream(&name).and_then(|(stream, handle)| {
        Sink::try_new(&handle)
            .map(|sink| (stream, sink))
            .map_err(|e| e.to_string())
    });

    match opened {
        Ok((_stream, sink)) => {
            sink.append(source);
            let _ = ready.send(Ok(()));
            let _ = shutdown.recv();
            sink.stop();
        }
        Err(e) => {
            let _ = ready.send(Err(e));
        }
    }
}

impl PcmDevice for AudioDevice {
    fn negotiate(&mut self, params: &HwParams) -> Result<NegotiatedParams, DeviceError> {
        if self.output.is_some() {
            return Err(DeviceError::ParamNegotiationFailed(
                "device is already configured".into(),
            ));
        }

        let period_frames = params.period_frames_hint.unwrap_or(DEFAULT_PERIOD_FRAMES);
        let period_samples = period_frames * usize::from(params.channels);
        let ring_buffer = Arc::new(
            RingBuffer::new(period_samples * RING_PERIODS)
                .map_err(|e| DeviceError::ParamNegotiationFailed(e.to_string()))?,
        );

        let source = RingBufferSource::new(
            Arc::clone(&ring_buffer),
            Arc::clone(&self.flags),
            params.sample_rate,
            params.channels,
        );

        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let name = self.name.clone();
        let handle = std::thread::Builder::new()
            .name("wavplay-output".into())
            .spawn(move || run_output(name, source, ready_tx, shutdown_rx))
            .map_err(|e| DeviceError::OpenFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(DeviceError::OpenFailed(e));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(DeviceError::OpenFailed("output thread exited".into()));
            }
        }

        debug!(
            device = %self.name,
            rate = params.sample_rate,
            period_frames,
            ring = ring_buffer.capacity(),
            "output stream started"
        );

        self.ring_buffer = Some(ring_buffer);
        self.channels = params.channels;
        self.sample_rate = params.sample_rate;
        self.scratch = Vec::with_capacity(period_samples);
        self.output = Some(OutputThread {
            shutdown: shutdown_tx,
            handle,
        });

        // rodio resamples on its own; the stream rate is what we asked for
        Ok(NegotiatedParams {
            period_frames,
            sample_rate: params.sample_rate,
        })
    }

    fn write(&mut self, samples: Samples<'_>, frames: usize) -> Result<WriteStatus, DeviceError> {
        let Some(ring_buffer) = self.ring_buffer.clone() else {
            return Err(DeviceError::WriteFailed("device is not configured".into()));
        };

        if self.flags.underrun.load(Ordering::Acquire) {
            return Ok(WriteStatus::Underrun);
        }

        let count = frames * usize::from(self.channels);
        if samples.len() < count {
            return Err(DeviceError::WriteFailed(format!(
                "{frames} frames requested but only {} samples supplied",
                samples.len()
            )));
        }

        self.scratch.clear();
        match samples {
            Samples::I16(buf) => self
                .scratch
                .extend(buf[..count].iter().map(|&s| f32::from(s) / I16_SCALE)),
            Samples::I32(buf) => self
                .scratch
                .extend(buf[..count].iter().map(|&s| s as f32 / S24_SCALE)),
        }

        self.write_blocking(&ring_buffer)?;
        self.flags.armed.store(true, Ordering::Release);
        Ok(WriteStatus::Written)
    }

    fn prepare(&mut self) -> Result<(), DeviceError> {
        self.flags.underrun.store(false, Ordering::Release);
        Ok(())
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        let Some(ring_buffer) = self.ring_buffer.as_ref() else {
            return Ok(());
        };

        while !ring_buffer.is_empty() {
            if self.output.as_ref().is_some_and(|o| o.handle.is_finished()) {
                return Err(DeviceError::WriteFailed("output thread exited".into()));
            }
            std::thread::sleep(Duration::from_micros(BUFFER_BACKOFF_MICROS));
        }

        // The last batch is still inside the source
        self.flags.armed.store(false, Ordering::Release);
        let samples_per_second = u64::from(self.sample_rate) * u64::from(self.channels);
        if samples_per_second > 0 {
            std::thread::sleep(Duration::from_secs_f64(
                SOURCE_BATCH as f64 / samples_per_second as f64,
            ));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.shutdown();
        self.ring_buffer = None;
        Ok(())
    }
}

impl Drop for AudioDevice {
    fn drop(&mut self) {
        self.shutdown();
    }
}
