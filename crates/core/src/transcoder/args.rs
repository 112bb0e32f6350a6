//! Builds ffmpeg argument lists.

use std::path::Path;

use super::config::TranscoderConfig;
use super::types::{MezzanineJob, RungJob};
use crate::media::MediaKind;

/// Fixed audio codec for video deliveries.
pub const VIDEO_AUDIO_CODEC: &str = "aac";
/// Fixed audio codec for audio-only deliveries.
pub const AUDIO_ONLY_CODEC: &str = "libmp3lame";
/// Software video encoder.
pub const SOFTWARE_VIDEO_CODEC: &str = "libx264";

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn tail_args(config: &TranscoderConfig, args: &mut Vec<String>, output_path: &Path) {
    args.extend([
        "-loglevel".to_string(),
        config.ffmpeg_log_level.clone(),
    ]);
    args.push(path_arg(output_path));
}

/// Loudness measurement pass; the report is written to stderr.
pub fn volumedetect_args(input_path: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-nostats".to_string(),
        "-i".to_string(),
        path_arg(input_path),
        "-vn".to_string(),
        "-sn".to_string(),
        "-dn".to_string(),
        "-af".to_string(),
        "volumedetect".to_string(),
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ]
}

/// One-frame test encode proving the hardware encoder actually works.
pub fn hardware_probe_args(encoder: &str) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-nostdin".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        "color=c=black:s=256x256:d=0.1".to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
        "-c:v".to_string(),
        encoder.to_string(),
        "-f".to_string(),
        "null".to_string(),
        "-".to_string(),
    ]
}

/// Audio filter chain for the mezzanine: gain first, then effects.
pub fn mezzanine_filters(job: &MezzanineJob) -> String {
    let mut filters = vec![format!("volume={:.2}dB", job.gain_db)];
    filters.extend(job.effects.audio_filters(job.sample_rate));
    filters.join(",")
}

/// Mezzanine pass: audio re-encoded to FLAC with light compression, video
/// copied unless an effect needs to rewrite it.
pub fn mezzanine_args(config: &TranscoderConfig, job: &MezzanineJob) -> Vec<String> {
    let mut args = vec!["-y".to_string(), "-nostdin".to_string()];

    if let Some(start) = job.effects.start_position_secs {
        args.extend(["-ss".to_string(), format!("{:.3}", start)]);
    }
    args.extend(["-i".to_string(), path_arg(&job.input_path)]);
    if let Some(clip) = job.effects.clip_duration_secs {
        args.extend(["-t".to_string(), format!("{:.3}", clip)]);
    }

    match job.kind {
        MediaKind::Video => {
            args.extend(["-map".to_string(), "0:v:0".to_string()]);
            if job.has_audio {
                args.extend(["-map".to_string(), "0:a:0".to_string()]);
            }
            if job.effects.touches_video() {
                if job.effects.reverse {
                    args.extend(["-vf".to_string(), "reverse".to_string()]);
                }
                args.extend([
                    "-c:v".to_string(),
                    SOFTWARE_VIDEO_CODEC.to_string(),
                    "-preset".to_string(),
                    "veryfast".to_string(),
                    "-crf".to_string(),
                    "12".to_string(),
                ]);
            } else {
                args.extend(["-c:v".to_string(), "copy".to_string()]);
            }
        }
        MediaKind::Audio => {
            args.extend([
                "-vn".to_string(),
                "-map".to_string(),
                "0:a:0".to_string(),
            ]);
        }
    }

    if job.has_audio {
        args.extend([
            "-af".to_string(),
            mezzanine_filters(job),
            "-c:a".to_string(),
            "flac".to_string(),
            "-compression_level".to_string(),
            "0".to_string(),
        ]);
    }

    tail_args(config, &mut args, &job.output_path);
    args
}

/// Delivery encode for one rung.
pub fn rung_args(config: &TranscoderConfig, job: &RungJob) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-nostdin".to_string(),
        "-i".to_string(),
        path_arg(&job.input_path),
    ];

    match job.kind {
        MediaKind::Video => {
            args.extend([
                "-map".to_string(),
                "0:v:0".to_string(),
                "-map".to_string(),
                "0:a:0?".to_string(),
            ]);

            if job.hardware {
                args.extend(hardware_video_args(&config.hardware_encoder, job));
            } else {
                args.extend([
                    "-c:v".to_string(),
                    SOFTWARE_VIDEO_CODEC.to_string(),
                    "-preset".to_string(),
                    job.rung.preset.software_name().to_string(),
                    "-crf".to_string(),
                    job.rung.quality.to_string(),
                ]);
            }

            if let (Some(maxrate), Some(bufsize)) = (
                job.budget.video_maxrate_kbps(),
                job.budget.video_bufsize_kbps(),
            ) {
                args.extend([
                    "-maxrate".to_string(),
                    format!("{}k", maxrate),
                    "-bufsize".to_string(),
                    format!("{}k", bufsize),
                ]);
            }

            if let Some(height) = job.scale_to_height {
                args.extend(["-vf".to_string(), format!("scale=-2:{}", height)]);
            }

            args.extend([
                "-pix_fmt".to_string(),
                "yuv420p".to_string(),
                "-c:a".to_string(),
                VIDEO_AUDIO_CODEC.to_string(),
                "-b:a".to_string(),
                format!("{}k", job.budget.audio_kbps),
                "-ac".to_string(),
                "2".to_string(),
            ]);
        }
        MediaKind::Audio => {
            args.extend([
                "-vn".to_string(),
                "-map".to_string(),
                "0:a:0".to_string(),
                "-c:a".to_string(),
                AUDIO_ONLY_CODEC.to_string(),
                "-b:a".to_string(),
                format!("{}k", job.budget.audio_kbps),
            ]);
        }
    }

    if let Some(limit) = job.trim_secs {
        args.extend(["-t".to_string(), limit.to_string()]);
    }

    if job.kind == MediaKind::Video {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }

    tail_args(config, &mut args, &job.output_path);
    args
}

/// Constant-quality hardware encode with adaptive quantization.
fn hardware_video_args(encoder: &str, job: &RungJob) -> Vec<String> {
    let quality = job.rung.quality.to_string();
    if encoder.ends_with("_qsv") {
        vec![
            "-c:v".to_string(),
            encoder.to_string(),
            "-preset".to_string(),
            job.rung.preset.software_name().to_string(),
            "-global_quality".to_string(),
            quality,
            "-look_ahead".to_string(),
            "1".to_string(),
        ]
    } else {
        vec![
            "-c:v".to_string(),
            encoder.to_string(),
            "-preset".to_string(),
            job.rung.preset.hardware_name().to_string(),
            "-rc".to_string(),
            "vbr".to_string(),
            "-cq".to_string(),
            quality,
            "-b:v".to_string(),
            "0".to_string(),
            "-spatial-aq".to_string(),
            "1".to_string(),
            "-temporal-aq".to_string(),
            "1".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::{BitrateBudget, Ladder};
    use crate::media::MediaEffects;
    use std::path::PathBuf;

    fn video_job(hardware: bool) -> RungJob {
        let ladder = Ladder::reference(240);
        RungJob {
            input_path: PathBuf::from("/tmp/mezz.mkv"),
            output_path: PathBuf::from("/tmp/rung-0.mp4"),
            kind: MediaKind::Video,
            rung: ladder.rungs()[0].clone(),
            budget: BitrateBudget {
                video_kbps: Some(1100),
                audio_kbps: 128,
            },
            scale_to_height: Some(720),
            trim_secs: None,
            hardware,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
    }

    #[test]
    fn test_software_video_args() {
        let args = rung_args(&TranscoderConfig::default(), &video_job(false));
        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&args, "-crf"), Some("23"));
        assert_eq!(value_after(&args, "-preset"), Some("medium"));
        assert_eq!(value_after(&args, "-maxrate"), Some("1650k"));
        assert_eq!(value_after(&args, "-bufsize"), Some("2200k"));
        assert_eq!(value_after(&args, "-vf"), Some("scale=-2:720"));
        assert_eq!(value_after(&args, "-c:a"), Some("aac"));
        assert_eq!(value_after(&args, "-b:a"), Some("128k"));
        assert_eq!(value_after(&args, "-movflags"), Some("+faststart"));
        assert!(!args.contains(&"-t".to_string()));
        assert_eq!(args.last().map(|s| s.as_str()), Some("/tmp/rung-0.mp4"));
    }

    #[test]
    fn test_hardware_video_args() {
        let args = rung_args(&TranscoderConfig::default(), &video_job(true));
        assert_eq!(value_after(&args, "-c:v"), Some("h264_nvenc"));
        assert_eq!(value_after(&args, "-cq"), Some("23"));
        assert_eq!(value_after(&args, "-preset"), Some("p5"));
        assert_eq!(value_after(&args, "-spatial-aq"), Some("1"));
        assert_eq!(value_after(&args, "-maxrate"), Some("1650k"));
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_no_scale_when_source_is_small() {
        let mut job = video_job(false);
        job.scale_to_height = None;
        let args = rung_args(&TranscoderConfig::default(), &job);
        assert!(!args.contains(&"-vf".to_string()));
    }

    #[test]
    fn test_audio_only_args_with_trim() {
        let ladder = Ladder::reference(240);
        let job = RungJob {
            input_path: PathBuf::from("/tmp/mezz.flac"),
            output_path: PathBuf::from("/tmp/rung-5.mp3"),
            kind: MediaKind::Audio,
            rung: ladder.rungs()[5].clone(),
            budget: BitrateBudget {
                video_kbps: None,
                audio_kbps: 64,
            },
            scale_to_height: None,
            trim_secs: Some(240),
            hardware: true,
        };
        let args = rung_args(&TranscoderConfig::default(), &job);
        assert_eq!(value_after(&args, "-c:a"), Some("libmp3lame"));
        assert_eq!(value_after(&args, "-b:a"), Some("64k"));
        assert_eq!(value_after(&args, "-t"), Some("240"));
        assert!(args.contains(&"-vn".to_string()));
        assert!(!args.contains(&"-c:v".to_string()));
        assert!(!args.contains(&"-movflags".to_string()));
    }

    #[test]
    fn test_mezzanine_video_copies_picture() {
        let job = MezzanineJob {
            input_path: PathBuf::from("/in/clip.mov"),
            output_path: PathBuf::from("/tmp/mezz.mkv"),
            kind: MediaKind::Video,
            gain_db: 5.0,
            effects: MediaEffects::default(),
            sample_rate: 48000,
            has_audio: true,
        };
        let args = mezzanine_args(&TranscoderConfig::default(), &job);
        assert_eq!(value_after(&args, "-c:v"), Some("copy"));
        assert_eq!(value_after(&args, "-af"), Some("volume=5.00dB"));
        assert_eq!(value_after(&args, "-c:a"), Some("flac"));
    }

    #[test]
    fn test_mezzanine_effects() {
        let job = MezzanineJob {
            input_path: PathBuf::from("/in/clip.mov"),
            output_path: PathBuf::from("/tmp/mezz.mkv"),
            kind: MediaKind::Video,
            gain_db: -2.5,
            effects: "reverse,start=3,clip=10".parse().unwrap(),
            sample_rate: 48000,
            has_audio: true,
        };
        let args = mezzanine_args(&TranscoderConfig::default(), &job);
        assert_eq!(value_after(&args, "-ss"), Some("3.000"));
        assert_eq!(value_after(&args, "-t"), Some("10.000"));
        assert_eq!(value_after(&args, "-vf"), Some("reverse"));
        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert_eq!(value_after(&args, "-af"), Some("volume=-2.50dB,areverse"));
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
    }

    #[test]
    fn test_mezzanine_start_reencodes_picture() {
        let job = MezzanineJob {
            input_path: PathBuf::from("/in/clip.mov"),
            output_path: PathBuf::from("/tmp/mezz.mkv"),
            kind: MediaKind::Video,
            gain_db: 0.0,
            effects: "start=5".parse().unwrap(),
            sample_rate: 48000,
            has_audio: true,
        };
        let args = mezzanine_args(&TranscoderConfig::default(), &job);
        assert_eq!(value_after(&args, "-ss"), Some("5.000"));
        assert_eq!(value_after(&args, "-c:v"), Some("libx264"));
        assert!(!args.contains(&"-vf".to_string()));
    }

    #[test]
    fn test_mezzanine_silent_video() {
        let job = MezzanineJob {
            input_path: PathBuf::from("/in/silent.mp4"),
            output_path: PathBuf::from("/tmp/mezz.mkv"),
            kind: MediaKind::Video,
            gain_db: 0.0,
            effects: MediaEffects::default(),
            sample_rate: 48000,
            has_audio: false,
        };
        let args = mezzanine_args(&TranscoderConfig::default(), &job);
        assert!(!args.contains(&"-af".to_string()));
        assert!(!args.contains(&"0:a:0".to_string()));
    }

    #[test]
    fn test_volumedetect_args() {
        let args = volumedetect_args(Path::new("/in/a.wav"));
        assert_eq!(value_after(&args, "-af"), Some("volumedetect"));
        assert_eq!(args.last().map(|s| s.as_str()), Some("-"));
    }

    #[test]
    fn test_hardware_probe_args() {
        let args = hardware_probe_args("h264_nvenc");
        assert_eq!(value_after(&args, "-c:v"), Some("h264_nvenc"));
        assert_eq!(value_after(&args, "-f"), Some("lavfi"));
    }
}
