//! Playback session
//!
//! Owns the input file and the device for one playback: negotiates the
//! hardware parameters, picks the cycle for the layout, streams, drains and
//! closes. The device is closed on every exit path, including errors.

use super::cycle::Cycle;
use super::overlap::{blocks_per_buffer, OverlapCycle};
use super::reader::PeriodReader;
use super::StreamReport;
use crate::config::SessionConfig;
use crate::loader::WaveFile;
use crate::riff::AudioFormat;
use crate::streaming::{self, HwParams, NegotiatedParams, PcmDevice};
use crate::transcode::{
    DeviceSample, LayoutTraits, PcmLayout, MONO_16, MONO_24, STEREO_16, STEREO_24,
};
use crate::{PlaybackError, Result};
use std::fs::File;
use tracing::{info, warn};

/// One open input streaming to one open device
pub struct PlaybackSession<D: PcmDevice = streaming::BoxedDevice> {
    device: D,
    input: Option<File>,
    format: AudioFormat,
    negotiated: NegotiatedParams,
    overlap_buffer_frames: usize,
    closed: bool,
}

impl PlaybackSession<streaming::BoxedDevice> {
    /// Open the input and the device named by `config`, stream to the end
    /// and close everything.
    pub fn run(config: &SessionConfig) -> Result<StreamReport> {
        config.validate()?;

        let wave = match &config.preparsed {
            Some(stream) => WaveFile::open_preparsed(&config.input, stream.to_format()?)?,
            None => WaveFile::open(&config.input, config.header_prefix_len)?,
        };

        let descriptor = config.device_descriptor();
        let device = streaming::open_device(&descriptor)?;
        info!(
            input = %config.input.display(),
            device = %descriptor,
            format = %wave.format(),
            "playback started"
        );

        PlaybackSession::open(wave, device, config)?.stream()
    }
}

impl<D: PcmDevice + Send> PlaybackSession<D> {
    /// Negotiate `device` for the format of `wave`
    pub fn open(wave: WaveFile, device: D, config: &SessionConfig) -> Result<Self> {
        let format = wave.format();
        let mut session = PlaybackSession {
            device,
            input: Some(wave.into_file()),
            format,
            negotiated: NegotiatedParams {
                period_frames: 0,
                sample_rate: format.sample_rate,
            },
            overlap_buffer_frames: config.overlap_buffer_frames,
            closed: false,
        };

        let requested = HwParams {
            period_frames_hint: config.period_frames,
            ..HwParams::stereo(format.layout.device_format(), format.sample_rate)
        };
        let negotiated = session.device.negotiate(&requested)?;
        negotiated.check(&requested)?;
        session.negotiated = negotiated;

        info!(
            format = %requested.format,
            rate = negotiated.sample_rate,
            period_frames = negotiated.period_frames,
            "device configured"
        );
        Ok(session)
    }

    /// Stream format
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Parameters confirmed by the device
    pub fn negotiated(&self) -> NegotiatedParams {
        self.negotiated
    }

    /// Stream the whole data range, then drain and close the device
    pub fn stream(mut self) -> Result<StreamReport> {
        let file = self
            .input
            .take()
            .ok_or_else(|| PlaybackError::Config("session input already consumed".into()))?;

        let layout = self.format.layout;
        let report = match layout {
            PcmLayout::Mono16 => self.run_cycle(MONO_16, file)?,
            PcmLayout::Stereo16 => self.run_cycle(STEREO_16, file)?,
            PcmLayout::Mono24 => self.run_cycle(MONO_24, file)?,
            PcmLayout::Stereo24 => self.run_overlap(STEREO_24, file)?,
        };

        self.device.drain()?;
        self.close()?;

        info!(
            mode = if layout.uses_overlap() { "dual-thread" } else { "single-thread" },
            writes = report.write_calls,
            underruns = report.underruns,
            cycles = report.cycles,
            frames = report.frames_written,
            "playback finished"
        );
        Ok(report)
    }

    fn run_cycle<S: DeviceSample>(
        &mut self,
        traits: LayoutTraits<S>,
        file: File,
    ) -> Result<StreamReport> {
        let period_frames = self.negotiated.period_frames;
        let reader = PeriodReader::new(
            file,
            self.format.data_begin,
            self.format.data_end,
            traits.raw_bytes_per_period(period_frames),
        );
        Cycle::new(traits, &mut self.device, reader, period_frames).run()
    }

    fn run_overlap<S: DeviceSample>(
        &mut self,
        traits: LayoutTraits<S>,
        file: File,
    ) -> Result<StreamReport> {
        let period_frames = self.negotiated.period_frames;
        let blocks = blocks_per_buffer(self.overlap_buffer_frames, period_frames);
        let reader = PeriodReader::new(
            file,
            self.format.data_begin,
            self.format.data_end,
            traits.raw_bytes_per_period(blocks * period_frames),
        );
        OverlapCycle::new(traits, &mut self.device, reader, period_frames, blocks).run()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.device.close()?;
        Ok(())
    }
}

impl<D: PcmDevice> Drop for PlaybackSession<D> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.device.close() {
                warn!("closing device after failure: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::testing::{i16_bytes, s24_bytes, Call, RecordingDevice};
    use crate::riff::fixtures::wave_file;
    use crate::riff::HEADER_PREFIX_LEN;
    use crate::streaming::{DeviceError, SampleFormat};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_wave(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn config(path: &std::path::Path) -> SessionConfig {
        SessionConfig::new("test", path)
    }

    /// Run a session against a recording device and hand the device back
    fn stream_with(
        tmp: &NamedTempFile,
        device: RecordingDevice,
        config: &SessionConfig,
    ) -> (Result<StreamReport>, RecordingDevice) {
        let wave = WaveFile::open(tmp.path(), HEADER_PREFIX_LEN).unwrap();
        let mut device = device;
        let result = PlaybackSession::open(wave, &mut device, config).and_then(|s| s.stream());
        (result, device)
    }

    #[test]
    fn test_mono16_one_and_a_half_periods() {
        let samples: Vec<i16> = (1..=6).collect();
        let tmp = temp_wave(&wave_file(1, 1, 8_000, 16, &[], &i16_bytes(&samples)));
        let (result, device) = stream_with(&tmp, RecordingDevice::new(4), &config(tmp.path()));

        let report = result.unwrap();
        assert_eq!(report.write_calls, 2);
        assert_eq!(device.writes[1].samples, vec![5, 5, 6, 6, 0, 0, 0, 0]);
        assert_eq!(
            device.calls,
            vec![Call::Negotiate, Call::Write, Call::Write, Call::Drain, Call::Close]
        );
    }

    #[test]
    fn test_requested_params_follow_layout() {
        let tmp = temp_wave(&wave_file(1, 1, 96_000, 24, &[], &s24_bytes(&[1, 2])));
        let mut cfg = config(tmp.path());
        cfg.period_frames = Some(64);
        let (result, device) = stream_with(&tmp, RecordingDevice::new(64), &cfg);
        result.unwrap();

        let requested = device.requested.unwrap();
        assert_eq!(requested.channels, 2);
        assert_eq!(requested.format, SampleFormat::S24In32Le);
        assert_eq!(requested.sample_rate, 96_000);
        assert_eq!(requested.period_frames_hint, Some(64));
    }

    #[test]
    fn test_stereo24_uses_overlap_buffer_span() {
        let frames = 40;
        let samples: Vec<i32> = (0..frames * 2).map(|i| i - 40).collect();
        let tmp = temp_wave(&wave_file(1, 2, 44_100, 24, &[], &s24_bytes(&samples)));
        let mut cfg = config(tmp.path());
        cfg.overlap_buffer_frames = 16;

        let (result, device) = stream_with(&tmp, RecordingDevice::new(4), &cfg);
        let report = result.unwrap();

        // 16-frame buffers of 4 sub-blocks; 40 frames need 3 buffers
        assert_eq!(report.cycles, 3);
        assert_eq!(report.write_calls, 12);
        let mut expected = samples.clone();
        expected.resize(3 * 16 * 2, 0);
        assert_eq!(device.played(), expected);
    }

    #[test]
    fn test_lower_confirmed_rate_fails_and_closes() {
        let tmp = temp_wave(&wave_file(1, 2, 48_000, 16, &[], &[0u8; 16]));
        let mut device = RecordingDevice::new(4);
        device.confirmed_rate = Some(44_100);
        let (result, device) = stream_with(&tmp, device, &config(tmp.path()));

        assert!(matches!(
            result,
            Err(PlaybackError::Device(DeviceError::ParamNegotiationFailed(_)))
        ));
        assert_eq!(device.calls, vec![Call::Negotiate, Call::Close]);
    }

    #[test]
    fn test_negotiation_failure_closes_device() {
        let tmp = temp_wave(&wave_file(1, 2, 48_000, 16, &[], &[0u8; 16]));
        let mut device = RecordingDevice::new(4);
        device.fail_negotiate = true;
        let (result, device) = stream_with(&tmp, device, &config(tmp.path()));

        assert!(result.is_err());
        assert_eq!(device.count(Call::Close), 1);
        assert_eq!(device.count(Call::Write), 0);
    }

    #[test]
    fn test_write_failure_closes_device_once() {
        let samples: Vec<i16> = (1..=32).collect();
        let tmp = temp_wave(&wave_file(1, 1, 8_000, 16, &[], &i16_bytes(&samples)));
        let device = RecordingDevice::new(4).with_write_failure(2);
        let (result, device) = stream_with(&tmp, device, &config(tmp.path()));

        assert!(matches!(
            result,
            Err(PlaybackError::Device(DeviceError::WriteFailed(_)))
        ));
        assert_eq!(device.writes.len(), 2);
        assert_eq!(device.count(Call::Drain), 0);
        assert_eq!(device.count(Call::Close), 1);
        assert_eq!(device.calls.last(), Some(&Call::Close));
    }

    #[test]
    fn test_overlap_write_failure_closes_device_once() {
        let samples: Vec<i32> = (0..64).collect();
        let tmp = temp_wave(&wave_file(1, 2, 44_100, 24, &[], &s24_bytes(&samples)));
        let mut cfg = config(tmp.path());
        cfg.overlap_buffer_frames = 8;
        let device = RecordingDevice::new(4).with_write_failure(3);
        let (result, device) = stream_with(&tmp, device, &cfg);

        assert!(matches!(
            result,
            Err(PlaybackError::Device(DeviceError::WriteFailed(_)))
        ));
        assert_eq!(device.count(Call::Close), 1);
        assert_eq!(device.count(Call::Drain), 0);
    }

    #[test]
    fn test_close_happens_once() {
        let tmp = temp_wave(&wave_file(1, 2, 8_000, 16, &[], &[0u8; 8]));
        let (result, device) = stream_with(&tmp, RecordingDevice::new(2), &config(tmp.path()));
        result.unwrap();
        assert_eq!(device.count(Call::Close), 1);
        assert_eq!(device.count(Call::Drain), 1);
    }
}
