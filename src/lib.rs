//! WAVE streaming playback engine
//!
//! Streams the sample data of a RIFF/WAVE linear PCM file to an audio output
//! device in real time. Four fixed layouts are supported: 16-bit mono, 16-bit
//! stereo, 24-bit mono and 24-bit stereo.
//!
//! # Features
//! - Bounded RIFF chunk scanning over a header prefix (`riff`)
//! - Per-layout transcoding into device-native interleaved stereo (`transcode`)
//! - Double-buffered load/play cycle with underrun recovery (`playback`)
//! - Dual-thread overlap of file I/O and device writes for 24-bit stereo
//! - Offline rendering to a WAVE file and realtime output (`streaming`)
//!
//! # Crate feature flags
//! - `streaming` (opt-in): realtime output to the system audio device (enables optional `rodio` dep)
//!
//! # Quick start
//! ## Inspect a file
//! ```no_run
//! use wavplay::loader::WaveFile;
//! let wave = WaveFile::open("song.wav", wavplay::riff::HEADER_PREFIX_LEN).unwrap();
//! println!("{}", wave.format());
//! ```
//!
//! ## Render a file through the playback engine
//! ```no_run
//! use wavplay::{config::SessionConfig, playback::PlaybackSession};
//! let config = SessionConfig::new("wav:copy.wav", "song.wav");
//! let report = PlaybackSession::run(&config).unwrap();
//! println!("{} periods written", report.write_calls);
//! ```

#![warn(missing_docs)]

pub mod config; // Session configuration
pub mod loader; // Input file I/O
pub mod playback; // Double-buffer cycle and session
pub mod riff; // RIFF/WAVE header parsing
pub mod streaming; // Device sinks
pub mod transcode; // Raw bytes to device samples

pub use riff::FormatError;
pub use streaming::DeviceError;

/// Error type for playback sessions
#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    /// The input file could not be opened or read
    #[error("File error: {0}")]
    File(#[from] std::io::Error),

    /// The header does not describe a supported PCM stream
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// The output device could not be opened, configured or written
    #[error("Audio device error: {0}")]
    Device(#[from] DeviceError),

    /// Invalid session configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A dual-thread cycle worker panicked
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

// Public API exports
pub use config::{DeviceDescriptor, PreparsedStream, SessionConfig};
pub use loader::WaveFile;
pub use playback::{CycleState, PlaybackSession, StreamReport};
pub use riff::AudioFormat;
pub use streaming::{PcmDevice, WavRenderDevice, WriteStatus};
pub use transcode::PcmLayout;

#[cfg(feature = "streaming")]
pub use streaming::AudioDevice;
