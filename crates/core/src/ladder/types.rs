//! Results of walking the ladder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use super::budget::BitrateBudget;
use super::rung::EncodingRung;
use crate::loudness::AudioLevelProfile;
use crate::media::{EffectsError, MediaEffects};
use crate::transcoder::TranscoderError;

/// Why a rung's encode produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EncodeErrorKind {
    ProcessFailed { exit_code: Option<i32> },
    Timeout,
    EmptyOutput,
    ToolMissing,
    Io,
}

impl From<&TranscoderError> for EncodeErrorKind {
    fn from(e: &TranscoderError) -> Self {
        match e {
            TranscoderError::ProcessFailed { exit_code, .. } => Self::ProcessFailed {
                exit_code: *exit_code,
            },
            TranscoderError::Timeout { .. } => Self::Timeout,
            TranscoderError::EmptyOutput { .. } => Self::EmptyOutput,
            TranscoderError::FfmpegNotFound { .. } | TranscoderError::FfprobeNotFound { .. } => {
                Self::ToolMissing
            }
            TranscoderError::InputNotFound { .. }
            | TranscoderError::ProbeFailed { .. }
            | TranscoderError::Io(_) => Self::Io,
        }
    }
}

/// Outcome of encoding one rung.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeAttemptResult {
    pub rung: EncodingRung,
    pub budget: BitrateBudget,
    pub hardware: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trimmed_to_secs: Option<u32>,
    pub output_path: PathBuf,
    /// Size of the output; 0 when the encode failed.
    pub byte_size: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<EncodeErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// The accepted output of a normalization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedArtifact {
    /// Final location under the output directory.
    pub path: PathBuf,
    pub byte_size: u64,
    /// "mp3" or "mp4".
    pub output_extension: String,
    /// Rung whose settings produced the file.
    pub rung: EncodingRung,
    /// Source copied through unchanged because it already qualified.
    pub passthrough: bool,
    pub hardware: bool,
    /// Applied gain; `None` when no mezzanine was built.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain_db: Option<f64>,
    pub levels: AudioLevelProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trimmed_to_secs: Option<u32>,
    /// Delivered mezzanine when `keep_mezzanine` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mezzanine_path: Option<PathBuf>,
    /// Every rung tried, in order.
    pub attempts: Vec<EncodeAttemptResult>,
}

/// A normalized artifact together with its size verdict.
///
/// Callers have to match on this to reach the artifact, so an oversized
/// result is never mistaken for one that fits.
#[must_use = "an oversized artifact must be handled explicitly"]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "fit", content = "artifact", rename_all = "snake_case")]
pub enum Delivery {
    /// Within the size ceiling.
    Fits(NormalizedArtifact),
    /// Best effort from the final rung; still larger than the ceiling.
    Oversized(NormalizedArtifact),
}

impl Delivery {
    pub fn is_oversized(&self) -> bool {
        matches!(self, Self::Oversized(_))
    }

    pub fn artifact(&self) -> &NormalizedArtifact {
        match self {
            Self::Fits(a) | Self::Oversized(a) => a,
        }
    }

    pub fn into_artifact(self) -> NormalizedArtifact {
        match self {
            Self::Fits(a) | Self::Oversized(a) => a,
        }
    }
}

/// One file to normalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeRequest {
    pub source_path: PathBuf,
    /// Directory the accepted artifact is written into.
    pub output_dir: PathBuf,
    #[serde(default)]
    pub effects: MediaEffects,
    /// Catalog record to update on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_key: Option<String>,
}

impl NormalizeRequest {
    pub fn new(source_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            output_dir: output_dir.into(),
            effects: MediaEffects::default(),
            asset_key: None,
        }
    }

    pub fn with_effects(mut self, effects: MediaEffects) -> Self {
        self.effects = effects;
        self
    }

    pub fn with_asset_key(mut self, key: impl Into<String>) -> Self {
        self.asset_key = Some(key.into());
        self
    }
}

/// Fatal normalization failures.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Input absent or empty; nothing was attempted.
    #[error("Source missing or empty: {path}")]
    SourceMissing { path: PathBuf },

    /// The source could not be read as media.
    #[error("Failed to probe {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    /// Requested effects are out of range.
    #[error("Invalid effects: {0}")]
    InvalidEffects(#[from] EffectsError),

    /// Effects were requested but the mezzanine that applies them failed.
    #[error("Effects could not be applied: {reason}")]
    EffectsUnavailable { reason: String },

    /// The delivery name resolves to the source file itself.
    #[error("Output {path} would overwrite the source")]
    OutputConflict { path: PathBuf },

    /// Every rung's encode failed outright.
    #[error("All {} ladder rungs failed to encode", attempts.len())]
    AllRungsExhausted { attempts: Vec<EncodeAttemptResult> },

    /// Filesystem error outside of an encode.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NormalizeError {
    /// Short machine-friendly label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SourceMissing { .. } => "source_missing",
            Self::ProbeFailed { .. } => "probe_failed",
            Self::InvalidEffects(_) => "invalid_effects",
            Self::EffectsUnavailable { .. } => "effects_unavailable",
            Self::OutputConflict { .. } => "output_conflict",
            Self::AllRungsExhausted { .. } => "all_rungs_exhausted",
            Self::Io(_) => "io",
        }
    }
}

/// Where a ladder walk currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "rung", rename_all = "snake_case")]
pub enum LadderState {
    Idle,
    Analyzing,
    Normalizing,
    Attempting(usize),
    Accepted,
    Failed,
}

impl LadderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(&self, next: &LadderState) -> bool {
        use LadderState::*;
        match (self, next) {
            (_, Failed) => !self.is_terminal(),
            (Idle, Analyzing) | (Idle, Accepted) => true,
            (Analyzing, Normalizing) | (Analyzing, Accepted) => true,
            (Normalizing, Attempting(0)) => true,
            (Attempting(a), Attempting(b)) => *b == a + 1,
            (Attempting(_), Accepted) => true,
            _ => false,
        }
    }
}
