//! Jobs handed to a [`Transcoder`](super::Transcoder).

use serde::Serialize;
use std::path::PathBuf;

use crate::ladder::{BitrateBudget, EncodingRung};
use crate::media::{MediaEffects, MediaKind};

/// Builds the loudness-corrected intermediate.
#[derive(Debug, Clone, Serialize)]
pub struct MezzanineJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub kind: MediaKind,
    /// Gain correction in dB, already clamped.
    pub gain_db: f64,
    pub effects: MediaEffects,
    /// Source sample rate, needed for pitch shifting.
    pub sample_rate: u32,
    /// False for video without an audio stream.
    pub has_audio: bool,
}

/// Encodes the intermediate at one ladder rung.
#[derive(Debug, Clone, Serialize)]
pub struct RungJob {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub kind: MediaKind,
    pub rung: EncodingRung,
    pub budget: BitrateBudget,
    /// Downscale target; `None` keeps the source height.
    pub scale_to_height: Option<u32>,
    /// Output duration limit in seconds.
    pub trim_secs: Option<u32>,
    /// Use the hardware encoder instead of libx264.
    pub hardware: bool,
}
