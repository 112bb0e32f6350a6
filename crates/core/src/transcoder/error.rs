//! Error types for the transcoder module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while driving ffmpeg/ffprobe.
#[derive(Debug, Error)]
pub enum TranscoderError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The process ran but exited unsuccessfully.
    #[error("Process failed: {reason}")]
    ProcessFailed {
        reason: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    /// The process was killed after running too long.
    #[error("Process timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// The process exited cleanly but produced nothing usable.
    #[error("Output missing or empty: {path}")]
    EmptyOutput { path: PathBuf },

    /// Failed to probe media file.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// I/O error while running a process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscoderError {
    /// Creates a process failure with the captured stderr tail.
    pub fn process_failed(
        reason: impl Into<String>,
        exit_code: Option<i32>,
        stderr: Option<String>,
    ) -> Self {
        Self::ProcessFailed {
            reason: reason.into(),
            exit_code,
            stderr,
        }
    }

    /// Creates a new probe failed error.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Short machine-friendly label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FfmpegNotFound { .. } | Self::FfprobeNotFound { .. } => "tool_missing",
            Self::InputNotFound { .. } => "input_missing",
            Self::ProcessFailed { .. } => "process_failed",
            Self::Timeout { .. } => "timeout",
            Self::EmptyOutput { .. } => "empty_output",
            Self::ProbeFailed { .. } => "probe_failed",
            Self::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(
            TranscoderError::EmptyOutput {
                path: PathBuf::from("/tmp/x.mp4")
            }
            .kind(),
            "empty_output"
        );
        assert_eq!(TranscoderError::probe_failed("bad json").kind(), "probe_failed");
    }
}
