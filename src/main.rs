//! wavplay - stream a WAVE file to an audio device
//!
//! Subcommands:
//! - `play`: stream a file to a system device, or render it with `-d wav:<path>`
//! - `probe`: resolve the header and print the stream description as JSON,
//!   for handing to `play --preparsed` in another process

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wavplay::config::SessionConfig;
use wavplay::riff::HEADER_PREFIX_LEN;
use wavplay::{PlaybackSession, PreparsedStream, WaveFile};

/// Command-line arguments for wavplay
#[derive(Parser, Debug)]
#[command(name = "wavplay")]
#[command(about = "Double-buffered WAVE (PCM 16/24-bit, mono/stereo) player")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream a WAVE file to an output device
    Play {
        /// Input WAVE file (optional when --config names one)
        file: Option<PathBuf>,

        /// Output device: a system device name or wav:<path> to render
        #[arg(short, long, env = "WAVPLAY_DEVICE")]
        device: Option<String>,

        /// Preferred device period in frames
        #[arg(long)]
        period_frames: Option<usize>,

        /// Buffer span of the 24-bit stereo dual-thread cycle, in frames
        #[arg(long)]
        overlap_frames: Option<usize>,

        /// JSON session configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pre-parsed stream description (JSON from `probe`); skips header parsing
        #[arg(long)]
        preparsed: Option<String>,
    },

    /// Print the resolved stream description as JSON
    Probe {
        /// Input WAVE file
        file: PathBuf,

        /// Header bytes to scan
        #[arg(long, default_value_t = HEADER_PREFIX_LEN)]
        prefix_len: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wavplay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    match args.command {
        Command::Play {
            file,
            device,
            period_frames,
            overlap_frames,
            config,
            preparsed,
        } => {
            let mut session = match &config {
                Some(path) => SessionConfig::from_json_file(path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => {
                    let Some(input) = file.clone() else {
                        bail!("no input file given");
                    };
                    SessionConfig::new("default", input)
                }
            };

            if let Some(input) = file {
                session.input = input;
            }
            if let Some(device) = device {
                session.device = device;
            }
            if period_frames.is_some() {
                session.period_frames = period_frames;
            }
            if let Some(frames) = overlap_frames {
                session.overlap_buffer_frames = frames;
            }
            if let Some(json) = preparsed {
                let stream: PreparsedStream = serde_json::from_str(&json)
                    .context("Failed to parse --preparsed stream description")?;
                session.preparsed = Some(stream);
            }

            let report = PlaybackSession::run(&session)
                .with_context(|| format!("Failed to play {}", session.input.display()))?;

            info!(
                periods = report.write_calls,
                underruns = report.underruns,
                "done"
            );
        }

        Command::Probe { file, prefix_len } => {
            let wave = WaveFile::open(&file, prefix_len)
                .with_context(|| format!("Failed to probe {}", file.display()))?;
            info!(format = %wave.format(), "resolved");

            let stream = PreparsedStream::from(wave.format());
            let json = serde_json::to_string(&stream).context("Failed to encode stream")?;
            println!("{json}");
        }
    }

    Ok(())
}
