//! Configuration for the ffmpeg-backed transcoder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether hardware encoding may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareMode {
    /// Probe once and use the hardware encoder when it works.
    #[default]
    Auto,
    /// Always encode in software.
    Disabled,
}

/// Configuration for the FFmpeg-based transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Timeout for a single ffmpeg run in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Hardware encoding policy.
    #[serde(default)]
    pub hardware: HardwareMode,

    /// Name of the ffmpeg hardware encoder to probe for and use.
    #[serde(default = "default_hardware_encoder")]
    pub hardware_encoder: String,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_timeout() -> u64 {
    3600 // 1 hour
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_hardware_encoder() -> String {
    "h264_nvenc".to_string()
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_timeout(),
            ffmpeg_log_level: default_log_level(),
            hardware: HardwareMode::default(),
            hardware_encoder: default_hardware_encoder(),
        }
    }
}

impl TranscoderConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Sets the hardware policy.
    pub fn with_hardware(mut self, hardware: HardwareMode) -> Self {
        self.hardware = hardware;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TranscoderConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
        assert_eq!(config.timeout_secs, 3600);
        assert_eq!(config.hardware, HardwareMode::Auto);
        assert_eq!(config.hardware_encoder, "h264_nvenc");
    }

    #[test]
    fn test_config_builder() {
        let config = TranscoderConfig::with_paths(
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffprobe"),
        )
        .with_timeout(600)
        .with_hardware(HardwareMode::Disabled);

        assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/local/bin/ffmpeg"));
        assert_eq!(config.timeout_secs, 600);
        assert_eq!(config.hardware, HardwareMode::Disabled);
    }

    #[test]
    fn test_hardware_mode_deserialize() {
        let config: TranscoderConfig = toml::from_str(r#"hardware = "disabled""#).unwrap();
        assert_eq!(config.hardware, HardwareMode::Disabled);
    }
}
