//! Hardware encoder capability detection.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::args;
use super::config::TranscoderConfig;

/// H.264 hardware encoders listed by `ffmpeg -encoders`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    /// NVIDIA NVENC H.264 available
    pub h264_nvenc: bool,
    /// Intel Quick Sync H.264 available
    pub h264_qsv: bool,
    /// AMD AMF H.264 available
    pub h264_amf: bool,
    /// VA-API H.264 available (Linux)
    pub h264_vaapi: bool,
}

impl EncoderCapabilities {
    /// Parses the output of `ffmpeg -encoders`.
    pub fn from_listing(listing: &str) -> Self {
        Self {
            h264_nvenc: listing.contains("h264_nvenc"),
            h264_qsv: listing.contains("h264_qsv"),
            h264_amf: listing.contains("h264_amf"),
            h264_vaapi: listing.contains("h264_vaapi"),
        }
    }

    /// Lists compiled-in encoders. Any failure yields no capabilities.
    pub async fn detect(config: &TranscoderConfig) -> Self {
        let output = Command::new(&config.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => Self::from_listing(&String::from_utf8_lossy(&o.stdout)),
            _ => Self::default(),
        }
    }

    /// Whether the named encoder is compiled in.
    pub fn supports(&self, encoder: &str) -> bool {
        match encoder {
            "h264_nvenc" => self.h264_nvenc,
            "h264_qsv" => self.h264_qsv,
            "h264_amf" => self.h264_amf,
            "h264_vaapi" => self.h264_vaapi,
            _ => false,
        }
    }

    /// Check if any hardware encoder is available.
    pub fn has_hardware_encoder(&self) -> bool {
        self.h264_nvenc || self.h264_qsv || self.h264_amf || self.h264_vaapi
    }
}

/// Runs a one-frame encode with `encoder`; a compiled-in encoder without a
/// usable device fails here.
pub async fn test_encode(config: &TranscoderConfig, encoder: &str) -> bool {
    let status = Command::new(&config.ffmpeg_path)
        .args(args::hardware_probe_args(encoder))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await;

    match status {
        Ok(s) => s.success(),
        Err(e) => {
            debug!(encoder, error = %e, "Hardware test encode could not start");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
Encoders:
 V..... = Video
 ------
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC / MPEG-4 part 10 (codec h264)
 V....D h264_nvenc           NVIDIA NVENC H.264 encoder (codec h264)
 V....D h264_vaapi           H.264/AVC (VAAPI) (codec h264)
 A....D aac                  AAC (Advanced Audio Coding)
"#;

    #[test]
    fn test_default_capabilities() {
        let caps = EncoderCapabilities::default();
        assert!(!caps.h264_nvenc);
        assert!(!caps.has_hardware_encoder());
    }

    #[test]
    fn test_from_listing() {
        let caps = EncoderCapabilities::from_listing(LISTING);
        assert!(caps.h264_nvenc);
        assert!(caps.h264_vaapi);
        assert!(!caps.h264_qsv);
        assert!(caps.has_hardware_encoder());
        assert!(caps.supports("h264_nvenc"));
        assert!(!caps.supports("h264_qsv"));
        assert!(!caps.supports("libx264"));
    }

    #[tokio::test]
    async fn test_detect_with_missing_binary() {
        let config = TranscoderConfig {
            ffmpeg_path: "/nonexistent/ffmpeg".into(),
            ..Default::default()
        };
        let caps = EncoderCapabilities::detect(&config).await;
        assert_eq!(caps, EncoderCapabilities::default());
        assert!(!test_encode(&config, "h264_nvenc").await);
    }
}
