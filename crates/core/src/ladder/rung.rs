//! Quality ladder rungs.

use serde::{Deserialize, Serialize};

/// Encoder effort preset, mapped onto x264 and NVENC names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderPreset {
    Slow,
    Medium,
    Fast,
    Faster,
    VeryFast,
}

impl EncoderPreset {
    /// libx264 preset name.
    pub fn software_name(&self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::Medium => "medium",
            Self::Fast => "fast",
            Self::Faster => "faster",
            Self::VeryFast => "veryfast",
        }
    }

    /// NVENC preset name (p1 fastest .. p7 slowest).
    pub fn hardware_name(&self) -> &'static str {
        match self {
            Self::Slow => "p6",
            Self::Medium => "p5",
            Self::Fast => "p4",
            Self::Faster => "p3",
            Self::VeryFast => "p2",
        }
    }
}

/// A rung as written in configuration; index and trim are assigned by [`Ladder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RungSpec {
    /// Maximum output height for video; sources are never upscaled.
    pub target_height: u32,
    /// CRF (software) or CQ (hardware) value; higher means smaller.
    pub quality: u8,
    /// Audio bitrate, for both the audio track of a video and audio-only output.
    pub audio_bitrate_kbps: u32,
    /// Upper bound on the computed video bitrate.
    pub max_video_kbps: u32,
    pub preset: EncoderPreset,
}

/// One tier of the descending quality ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingRung {
    pub index: usize,
    pub target_height: u32,
    pub quality: u8,
    pub audio_bitrate_kbps: u32,
    pub max_video_kbps: u32,
    pub preset: EncoderPreset,
    /// Duration ceiling; only ever set on the final rung.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_to_secs: Option<u32>,
}

/// Ordered sequence of rungs, best quality first.
#[derive(Debug, Clone, PartialEq)]
pub struct Ladder {
    rungs: Vec<EncodingRung>,
}

/// The reference ladder: 720p/high down to 360p/extremely-low, then the same
/// settings again with the duration ceiling applied.
pub fn reference_specs() -> Vec<RungSpec> {
    use EncoderPreset::*;

    let rung = |target_height, quality, audio_bitrate_kbps, max_video_kbps, preset| RungSpec {
        target_height,
        quality,
        audio_bitrate_kbps,
        max_video_kbps,
        preset,
    };

    vec![
        rung(720, 23, 128, 4000, Medium),
        rung(720, 26, 112, 2500, Medium),
        rung(360, 28, 96, 1200, Fast),
        rung(360, 31, 80, 800, Fast),
        rung(360, 34, 64, 500, Faster),
        rung(360, 34, 64, 500, Faster),
    ]
}

/// Checks that a rung list only ever moves towards smaller output.
pub fn validate_specs(specs: &[RungSpec]) -> Result<(), String> {
    if specs.is_empty() {
        return Err("ladder must contain at least one rung".to_string());
    }

    for (i, spec) in specs.iter().enumerate() {
        if spec.target_height == 0 || spec.audio_bitrate_kbps == 0 || spec.max_video_kbps == 0 {
            return Err(format!("rung {} has a zero height or bitrate", i));
        }
    }

    for (i, pair) in specs.windows(2).enumerate() {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.target_height > prev.target_height {
            return Err(format!("rung {} raises target_height", i + 1));
        }
        if next.quality < prev.quality {
            return Err(format!("rung {} lowers the quality parameter", i + 1));
        }
        if next.audio_bitrate_kbps > prev.audio_bitrate_kbps {
            return Err(format!("rung {} raises audio_bitrate_kbps", i + 1));
        }
        if next.max_video_kbps > prev.max_video_kbps {
            return Err(format!("rung {} raises max_video_kbps", i + 1));
        }
    }

    Ok(())
}

impl Ladder {
    /// Builds a ladder from specs, putting the duration ceiling on the last rung.
    pub fn from_specs(specs: &[RungSpec], duration_ceiling_secs: u32) -> Self {
        let last = specs.len().saturating_sub(1);
        let rungs = specs
            .iter()
            .enumerate()
            .map(|(index, spec)| EncodingRung {
                index,
                target_height: spec.target_height,
                quality: spec.quality,
                audio_bitrate_kbps: spec.audio_bitrate_kbps,
                max_video_kbps: spec.max_video_kbps,
                preset: spec.preset,
                trim_to_secs: (index == last).then_some(duration_ceiling_secs),
            })
            .collect();
        Self { rungs }
    }

    /// The reference six-rung ladder.
    pub fn reference(duration_ceiling_secs: u32) -> Self {
        Self::from_specs(&reference_specs(), duration_ceiling_secs)
    }

    pub fn rungs(&self) -> &[EncodingRung] {
        &self.rungs
    }

    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    pub fn first(&self) -> Option<&EncodingRung> {
        self.rungs.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_ladder_shape() {
        let ladder = Ladder::reference(240);
        assert_eq!(ladder.len(), 6);

        let heights: Vec<u32> = ladder.rungs().iter().map(|r| r.target_height).collect();
        assert_eq!(heights, vec![720, 720, 360, 360, 360, 360]);

        for rung in &ladder.rungs()[..5] {
            assert_eq!(rung.trim_to_secs, None);
        }
        assert_eq!(ladder.rungs()[5].trim_to_secs, Some(240));
    }

    #[test]
    fn test_reference_specs_are_valid() {
        assert!(validate_specs(&reference_specs()).is_ok());
    }

    #[test]
    fn test_indices_are_sequential() {
        let ladder = Ladder::reference(120);
        for (i, rung) in ladder.rungs().iter().enumerate() {
            assert_eq!(rung.index, i);
        }
    }

    #[test]
    fn test_validate_rejects_rising_audio() {
        let mut specs = reference_specs();
        specs[2].audio_bitrate_kbps = 256;
        let err = validate_specs(&specs).unwrap_err();
        assert!(err.contains("rung 2"));
    }

    #[test]
    fn test_validate_rejects_lower_quality_param() {
        let mut specs = reference_specs();
        specs[1].quality = 20;
        assert!(validate_specs(&specs).is_err());
    }

    #[test]
    fn test_validate_rejects_empty() {
        assert!(validate_specs(&[]).is_err());
    }

    #[test]
    fn test_single_rung_ladder_trims() {
        let specs = vec![reference_specs().remove(0)];
        let ladder = Ladder::from_specs(&specs, 90);
        assert_eq!(ladder.rungs()[0].trim_to_secs, Some(90));
    }

    #[test]
    fn test_preset_names() {
        assert_eq!(EncoderPreset::Medium.software_name(), "medium");
        assert_eq!(EncoderPreset::Medium.hardware_name(), "p5");
        assert_eq!(EncoderPreset::VeryFast.software_name(), "veryfast");
    }
}
