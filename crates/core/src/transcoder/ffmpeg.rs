//! FFmpeg-based transcoder implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use super::args;
use super::capabilities::{self, EncoderCapabilities};
use super::config::{HardwareMode, TranscoderConfig};
use super::error::TranscoderError;
use super::traits::Transcoder;
use super::types::{MezzanineJob, RungJob};
use crate::media::{MediaAsset, MediaKind};

/// Lines of stderr kept for error reports and volume parsing.
const STDERR_TAIL_LINES: usize = 200;

/// FFmpeg-based transcoder implementation.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Creates a transcoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(TranscoderConfig::default())
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Parses ffprobe JSON output into a [`MediaAsset`].
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaAsset, TranscoderError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            sample_rate: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            #[serde(default)]
            disposition: ProbeDisposition,
        }

        #[derive(Deserialize, Default)]
        struct ProbeDisposition {
            #[serde(default)]
            attached_pic: u8,
        }

        let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| {
            TranscoderError::probe_failed(format!("Failed to parse ffprobe output: {}", e))
        })?;

        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

        // Cover art in audio files shows up as a single-frame video stream.
        let video_stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type == "video" && s.disposition.attached_pic == 0);

        if audio_stream.is_none() && video_stream.is_none() {
            return Err(TranscoderError::probe_failed(
                "no audio or video stream found",
            ));
        }

        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0)
            .unwrap_or(0.0);

        let size_bytes = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let format = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown")
            .to_string();

        Ok(MediaAsset {
            source_path: path.to_path_buf(),
            kind: if video_stream.is_some() {
                MediaKind::Video
            } else {
                MediaKind::Audio
            },
            duration_secs,
            width: video_stream.and_then(|s| s.width),
            height: video_stream.and_then(|s| s.height),
            size_bytes,
            format,
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
            audio_sample_rate: audio_stream
                .and_then(|s| s.sample_rate.as_ref())
                .and_then(|r| r.parse::<u32>().ok()),
            video_codec: video_stream.and_then(|s| s.codec_name.clone()),
        })
    }

    /// Runs ffmpeg to completion, returning the tail of its stderr.
    async fn run_ffmpeg(&self, args: &[String]) -> Result<String, TranscoderError> {
        debug!(args = ?args, "Running ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscoderError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    TranscoderError::Io(e)
                }
            })?;

        let stderr = child.stderr.take().ok_or_else(|| {
            TranscoderError::Io(std::io::Error::other("stderr was not captured"))
        })?;
        let mut reader = BufReader::new(stderr).lines();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = reader.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }

            let status = child.wait().await?;
            let text = tail.into_iter().collect::<Vec<_>>().join("\n");
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, text))
        })
        .await;

        match result {
            Ok(Ok((status, stderr_text))) => {
                if status.success() {
                    Ok(stderr_text)
                } else {
                    Err(TranscoderError::process_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        status.code(),
                        if stderr_text.is_empty() {
                            None
                        } else {
                            Some(stderr_text)
                        },
                    ))
                }
            }
            Ok(Err(e)) => Err(TranscoderError::Io(e)),
            Err(_) => {
                // kill_on_drop also covers this, but reap the child explicitly
                let _ = child.kill().await;
                Err(TranscoderError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaAsset, TranscoderError> {
        if !path.exists() {
            return Err(TranscoderError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscoderError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    TranscoderError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(TranscoderError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    async fn detect_hardware_encoder(&self) -> bool {
        if self.config.hardware == HardwareMode::Disabled {
            return false;
        }

        let encoder = self.config.hardware_encoder.as_str();
        let caps = EncoderCapabilities::detect(&self.config).await;
        if !caps.supports(encoder) {
            debug!(encoder, "Hardware encoder not compiled into ffmpeg");
            return false;
        }

        let works = capabilities::test_encode(&self.config, encoder).await;
        info!(encoder, available = works, "Hardware encoder probed");
        works
    }

    async fn measure_volume(&self, path: &Path) -> Result<String, TranscoderError> {
        self.run_ffmpeg(&args::volumedetect_args(path)).await
    }

    async fn build_mezzanine(&self, job: &MezzanineJob) -> Result<(), TranscoderError> {
        self.run_ffmpeg(&args::mezzanine_args(&self.config, job))
            .await
            .map(|_| ())
    }

    async fn encode(&self, job: &RungJob) -> Result<(), TranscoderError> {
        self.run_ffmpeg(&args::rung_args(&self.config, job))
            .await
            .map(|_| ())
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(TranscoderError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(TranscoderError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(TranscoderError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(TranscoderError::Io(e));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output_audio() {
        let json = r#"{
            "format": {
                "filename": "test.flac",
                "format_name": "flac",
                "duration": "180.5",
                "size": "30000000"
            },
            "streams": [
                {
                    "codec_type": "audio",
                    "codec_name": "flac",
                    "sample_rate": "44100",
                    "channels": 2
                }
            ]
        }"#;

        let asset = FfmpegTranscoder::parse_probe_output(Path::new("test.flac"), json).unwrap();
        assert_eq!(asset.kind, MediaKind::Audio);
        assert_eq!(asset.format, "flac");
        assert!((asset.duration_secs - 180.5).abs() < 0.01);
        assert_eq!(asset.size_bytes, 30000000);
        assert_eq!(asset.audio_codec, Some("flac".to_string()));
        assert_eq!(asset.audio_sample_rate, Some(44100));
        assert_eq!(asset.height, None);
    }

    #[test]
    fn test_parse_probe_output_video() {
        let json = r#"{
            "format": {
                "filename": "test.mkv",
                "format_name": "matroska,webm",
                "duration": "600.0",
                "size": "52428800"
            },
            "streams": [
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "24000/1001"
                },
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "sample_rate": "48000",
                    "channels": 6
                }
            ]
        }"#;

        let asset = FfmpegTranscoder::parse_probe_output(Path::new("test.mkv"), json).unwrap();
        assert_eq!(asset.kind, MediaKind::Video);
        assert_eq!(asset.format, "matroska");
        assert_eq!(asset.video_codec, Some("h264".to_string()));
        assert_eq!(asset.width, Some(1920));
        assert_eq!(asset.height, Some(1080));
        assert_eq!(asset.audio_codec, Some("aac".to_string()));
    }

    #[test]
    fn test_cover_art_is_not_video() {
        let json = r#"{
            "format": { "format_name": "mp3", "duration": "200.0", "size": "4000000" },
            "streams": [
                { "codec_type": "audio", "codec_name": "mp3", "sample_rate": "44100" },
                { "codec_type": "video", "codec_name": "mjpeg", "width": 500, "height": 500,
                  "disposition": { "attached_pic": 1 } }
            ]
        }"#;

        let asset = FfmpegTranscoder::parse_probe_output(Path::new("song.mp3"), json).unwrap();
        assert_eq!(asset.kind, MediaKind::Audio);
        assert_eq!(asset.height, None);
        assert!(asset.uses_delivery_format());
    }

    #[test]
    fn test_no_streams_is_probe_failure() {
        let json = r#"{ "format": { "format_name": "data" }, "streams": [] }"#;
        let result = FfmpegTranscoder::parse_probe_output(Path::new("x.bin"), json);
        assert!(matches!(result, Err(TranscoderError::ProbeFailed { .. })));
    }

    #[test]
    fn test_garbage_is_probe_failure() {
        let result = FfmpegTranscoder::parse_probe_output(Path::new("x"), "not json");
        assert!(matches!(result, Err(TranscoderError::ProbeFailed { .. })));
    }

    #[tokio::test]
    async fn test_probe_missing_input() {
        let transcoder = FfmpegTranscoder::with_defaults();
        let result = transcoder.probe(Path::new("/nonexistent/input.mp4")).await;
        assert!(matches!(result, Err(TranscoderError::InputNotFound { .. })));
    }

    #[tokio::test]
    async fn test_hardware_disabled_skips_probe() {
        let transcoder = FfmpegTranscoder::new(TranscoderConfig {
            hardware: HardwareMode::Disabled,
            ffmpeg_path: "/nonexistent/ffmpeg".into(),
            ..Default::default()
        });
        assert!(!transcoder.detect_hardware_encoder().await);
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_reports_not_found() {
        let transcoder = FfmpegTranscoder::new(TranscoderConfig {
            ffmpeg_path: "/nonexistent/ffmpeg".into(),
            ..Default::default()
        });
        let result = transcoder.measure_volume(Path::new("/tmp/whatever.wav")).await;
        assert!(matches!(result, Err(TranscoderError::FfmpegNotFound { .. })));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg and ffprobe on PATH"]
    async fn test_validate_with_real_ffmpeg() {
        let transcoder = FfmpegTranscoder::with_defaults();
        transcoder.validate().await.unwrap();
    }
}
