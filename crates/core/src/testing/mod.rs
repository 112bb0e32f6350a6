//! Testing utilities and mock implementations.
//!
//! Mocks for the external seams of the pipeline, so the ladder can be
//! exercised end to end without ffmpeg or a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipfit_core::testing::{fixtures, MockPublisher, MockTranscoder};
//!
//! let transcoder = MockTranscoder::new();
//! transcoder
//!     .set_probe_result(&source, fixtures::video_asset(&source, 600.0, 1080))
//!     .await;
//! transcoder.set_rung_size(0, 12_000_000).await;
//! ```

mod mock_publisher;
mod mock_transcoder;

pub use mock_publisher::MockPublisher;
pub use mock_transcoder::{MockTranscoder, RecordedCall};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::media::{MediaAsset, MediaKind};

    /// A video source with H.264 in an MP4-family container.
    pub fn video_asset(path: &Path, duration_secs: f64, height: u32) -> MediaAsset {
        MediaAsset {
            source_path: path.to_path_buf(),
            kind: MediaKind::Video,
            duration_secs,
            width: Some(height * 16 / 9),
            height: Some(height),
            size_bytes: 0,
            format: "mov".to_string(),
            audio_codec: Some("aac".to_string()),
            audio_sample_rate: Some(48_000),
            video_codec: Some("h264".to_string()),
        }
    }

    /// An audio-only source.
    pub fn audio_asset(path: &Path, duration_secs: f64, format: &str, codec: &str) -> MediaAsset {
        MediaAsset {
            source_path: path.to_path_buf(),
            kind: MediaKind::Audio,
            duration_secs,
            width: None,
            height: None,
            size_bytes: 0,
            format: format.to_string(),
            audio_codec: Some(codec.to_string()),
            audio_sample_rate: Some(44_100),
            video_codec: None,
        }
    }
}
