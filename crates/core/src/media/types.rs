//! Types describing a probed source file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether a source carries a picture track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Extension of the delivery container for this kind.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video => "mp4",
        }
    }

    /// Extension of the loudness-corrected intermediate for this kind.
    pub fn mezzanine_extension(&self) -> &'static str {
        match self {
            Self::Audio => "flac",
            Self::Video => "mkv",
        }
    }
}

/// A source file as seen by ffprobe. Immutable once probed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Path of the submitted file.
    pub source_path: PathBuf,
    /// Audio-only or video.
    pub kind: MediaKind,
    /// Duration in seconds (0.0 when the container does not report one).
    pub duration_secs: f64,
    /// Picture width, video only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Picture height, video only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// File size in bytes.
    pub size_bytes: u64,
    /// First container name reported by ffprobe (e.g. "mov", "mp3").
    pub format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
}

impl MediaAsset {
    /// Whether the source already uses the codec/container pairing we deliver.
    pub fn uses_delivery_format(&self) -> bool {
        match self.kind {
            MediaKind::Audio => {
                self.format == "mp3" && self.audio_codec.as_deref() == Some("mp3")
            }
            MediaKind::Video => {
                self.format == "mov"
                    && self.video_codec.as_deref() == Some("h264")
                    && matches!(self.audio_codec.as_deref(), Some("aac") | None)
            }
        }
    }

    /// Whether the picture is taller than `target_height`.
    pub fn exceeds_height(&self, target_height: u32) -> bool {
        self.height.map(|h| h > target_height).unwrap_or(false)
    }

    /// File name without extension, used to name delivered artifacts.
    pub fn stem(&self) -> String {
        self.source_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_asset() -> MediaAsset {
        MediaAsset {
            source_path: PathBuf::from("/in/clip.mp4"),
            kind: MediaKind::Video,
            duration_secs: 30.0,
            width: Some(1920),
            height: Some(1080),
            size_bytes: 1024,
            format: "mov".to_string(),
            audio_codec: Some("aac".to_string()),
            audio_sample_rate: Some(48000),
            video_codec: Some("h264".to_string()),
        }
    }

    #[test]
    fn test_extensions() {
        assert_eq!(MediaKind::Audio.output_extension(), "mp3");
        assert_eq!(MediaKind::Video.output_extension(), "mp4");
        assert_eq!(MediaKind::Audio.mezzanine_extension(), "flac");
        assert_eq!(MediaKind::Video.mezzanine_extension(), "mkv");
    }

    #[test]
    fn test_delivery_format_video() {
        let asset = video_asset();
        assert!(asset.uses_delivery_format());

        let hevc = MediaAsset {
            video_codec: Some("hevc".to_string()),
            ..video_asset()
        };
        assert!(!hevc.uses_delivery_format());
    }

    #[test]
    fn test_exceeds_height() {
        let asset = video_asset();
        assert!(asset.exceeds_height(720));
        assert!(!asset.exceeds_height(1080));

        let audio = MediaAsset {
            kind: MediaKind::Audio,
            height: None,
            width: None,
            ..video_asset()
        };
        assert!(!audio.exceeds_height(360));
    }

    #[test]
    fn test_stem() {
        assert_eq!(video_asset().stem(), "clip");
    }
}
