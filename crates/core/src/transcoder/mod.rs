//! Transcoder module: the seam between the pipeline and ffmpeg.
//!
//! [`Transcoder`] describes the four external passes the pipeline needs
//! (probe, loudness measurement, mezzanine, rung encode) plus hardware
//! detection. [`FfmpegTranscoder`] implements them by spawning ffmpeg and
//! ffprobe; `testing::MockTranscoder` stands in for them in tests.
//!
//! # Example
//!
//! ```ignore
//! use clipfit_core::transcoder::{FfmpegTranscoder, Transcoder, TranscoderConfig};
//!
//! let transcoder = FfmpegTranscoder::new(TranscoderConfig::default());
//! transcoder.validate().await?;
//!
//! let asset = transcoder.probe(Path::new("/uploads/clip.mov")).await?;
//! println!("{:?}: {} seconds", asset.kind, asset.duration_secs);
//! ```

pub mod args;
mod capabilities;
mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use capabilities::EncoderCapabilities;
pub use config::{HardwareMode, TranscoderConfig};
pub use error::TranscoderError;
pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;
pub use types::{MezzanineJob, RungJob};
