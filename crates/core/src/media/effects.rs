//! Typed audio effects applied while building the mezzanine.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Largest pitch shift accepted, in semitones (one octave either way).
pub const MAX_PITCH_SEMITONES: f64 = 12.0;

/// Errors produced when parsing or validating effects.
#[derive(Debug, Error, PartialEq)]
pub enum EffectsError {
    #[error("Unknown effect option: {0}")]
    UnknownOption(String),

    #[error("Effect option `{key}` needs a value")]
    MissingValue { key: String },

    #[error("Invalid value for `{key}`: {value}")]
    InvalidValue { key: String, value: String },
}

/// Effects requested for an asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaEffects {
    /// Linear gain multiplier applied on top of loudness correction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amplify: Option<f64>,
    /// Play the content backwards.
    #[serde(default)]
    pub reverse: bool,
    /// Pitch shift in semitones, tempo preserved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_semitones: Option<f64>,
    /// Keep only this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_duration_secs: Option<f64>,
    /// Skip this many seconds from the start.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_position_secs: Option<f64>,
}

impl MediaEffects {
    /// True when no effect is requested.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), EffectsError> {
        if let Some(amplify) = self.amplify {
            if !(amplify.is_finite() && amplify > 0.0) {
                return Err(invalid("amplify", amplify));
            }
        }
        if let Some(pitch) = self.pitch_semitones {
            if !(pitch.is_finite() && pitch.abs() <= MAX_PITCH_SEMITONES) {
                return Err(invalid("pitch", pitch));
            }
        }
        if let Some(clip) = self.clip_duration_secs {
            if !(clip.is_finite() && clip > 0.0) {
                return Err(invalid("clip", clip));
            }
        }
        if let Some(start) = self.start_position_secs {
            if !(start.is_finite() && start >= 0.0) {
                return Err(invalid("start", start));
            }
        }
        Ok(())
    }

    /// Duration left after `start` and `clip` are applied to a source of `source_secs`.
    pub fn effective_duration(&self, source_secs: f64) -> f64 {
        let after_start = (source_secs - self.start_position_secs.unwrap_or(0.0)).max(0.0);
        match self.clip_duration_secs {
            Some(clip) => after_start.min(clip),
            None => after_start,
        }
    }

    /// Whether the video stream has to be re-encoded to honour these effects.
    ///
    /// A seek with a stream copy snaps the picture to the previous keyframe
    /// while the audio is cut exactly, so `start` forces a re-encode too.
    pub fn touches_video(&self) -> bool {
        self.reverse || self.start_position_secs.is_some()
    }

    /// Audio filters for these effects, in application order.
    ///
    /// `sample_rate` is needed for the pitch shift, which resamples and then
    /// restores tempo.
    pub fn audio_filters(&self, sample_rate: u32) -> Vec<String> {
        let mut filters = Vec::new();
        if let Some(amplify) = self.amplify {
            filters.push(format!("volume={}", amplify));
        }
        if let Some(pitch) = self.pitch_semitones.filter(|p| *p != 0.0) {
            let factor = 2f64.powf(pitch / 12.0);
            filters.push(format!(
                "asetrate={}*{:.6},aresample={},atempo={:.6}",
                sample_rate,
                factor,
                sample_rate,
                1.0 / factor
            ));
        }
        if self.reverse {
            filters.push("areverse".to_string());
        }
        filters
    }
}

fn invalid(key: &str, value: f64) -> EffectsError {
    EffectsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_number(key: &str, value: Option<&str>) -> Result<f64, EffectsError> {
    let value = value.ok_or_else(|| EffectsError::MissingValue {
        key: key.to_string(),
    })?;
    value.trim().parse::<f64>().map_err(|_| EffectsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parses the legacy `amplify=2,reverse,pitch=-3,clip=10,start=5` form.
impl FromStr for MediaEffects {
    type Err = EffectsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut effects = MediaEffects::default();

        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = match part.split_once('=') {
                Some((k, v)) => (k.trim().to_lowercase(), Some(v)),
                None => (part.to_lowercase(), None),
            };

            match key.as_str() {
                "amplify" | "volume" => effects.amplify = Some(parse_number(&key, value)?),
                "reverse" => {
                    effects.reverse = match value.map(|v| v.trim().to_lowercase()) {
                        None => true,
                        Some(v) if v == "true" || v == "1" => true,
                        Some(v) if v == "false" || v == "0" => false,
                        Some(v) => {
                            return Err(EffectsError::InvalidValue {
                                key,
                                value: v,
                            })
                        }
                    }
                }
                "pitch" => effects.pitch_semitones = Some(parse_number(&key, value)?),
                "clip" | "duration" => {
                    effects.clip_duration_secs = Some(parse_number(&key, value)?)
                }
                "start" | "offset" => {
                    effects.start_position_secs = Some(parse_number(&key, value)?)
                }
                _ => return Err(EffectsError::UnknownOption(key)),
            }
        }

        effects.validate()?;
        Ok(effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_options() {
        let effects: MediaEffects = "amplify=2,reverse,pitch=-3,clip=10,start=5".parse().unwrap();
        assert_eq!(effects.amplify, Some(2.0));
        assert!(effects.reverse);
        assert_eq!(effects.pitch_semitones, Some(-3.0));
        assert_eq!(effects.clip_duration_secs, Some(10.0));
        assert_eq!(effects.start_position_secs, Some(5.0));
    }

    #[test]
    fn test_parse_empty() {
        let effects: MediaEffects = "".parse().unwrap();
        assert!(effects.is_empty());
    }

    #[test]
    fn test_parse_unknown_option() {
        let result = "amplify=2,echo=3".parse::<MediaEffects>();
        assert_eq!(result, Err(EffectsError::UnknownOption("echo".to_string())));
    }

    #[test]
    fn test_parse_missing_value() {
        let result = "pitch".parse::<MediaEffects>();
        assert!(matches!(result, Err(EffectsError::MissingValue { .. })));
    }

    #[test]
    fn test_pitch_out_of_range() {
        let result = "pitch=13".parse::<MediaEffects>();
        assert!(matches!(result, Err(EffectsError::InvalidValue { .. })));
    }

    #[test]
    fn test_negative_amplify_rejected() {
        let result = "amplify=-1".parse::<MediaEffects>();
        assert!(matches!(result, Err(EffectsError::InvalidValue { .. })));
    }

    #[test]
    fn test_effective_duration() {
        let effects = MediaEffects {
            start_position_secs: Some(10.0),
            clip_duration_secs: Some(30.0),
            ..Default::default()
        };
        assert_eq!(effects.effective_duration(120.0), 30.0);
        assert_eq!(effects.effective_duration(25.0), 15.0);
        assert_eq!(effects.effective_duration(5.0), 0.0);
        assert_eq!(MediaEffects::default().effective_duration(42.0), 42.0);
    }

    #[test]
    fn test_audio_filters_order() {
        let effects = MediaEffects {
            amplify: Some(1.5),
            reverse: true,
            pitch_semitones: Some(12.0),
            ..Default::default()
        };
        let filters = effects.audio_filters(48000);
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[0], "volume=1.5");
        assert!(filters[1].starts_with("asetrate=48000*2.000000"));
        assert!(filters[1].ends_with("atempo=0.500000"));
        assert_eq!(filters[2], "areverse");
    }

    #[test]
    fn test_start_and_reverse_touch_video() {
        assert!(!MediaEffects::default().touches_video());
        assert!(!"amplify=2,clip=5".parse::<MediaEffects>().unwrap().touches_video());
        assert!("reverse".parse::<MediaEffects>().unwrap().touches_video());
        assert!("start=1.5".parse::<MediaEffects>().unwrap().touches_video());
    }

    #[test]
    fn test_zero_pitch_adds_no_filter() {
        let effects = MediaEffects {
            pitch_semitones: Some(0.0),
            ..Default::default()
        };
        assert!(effects.audio_filters(44100).is_empty());
    }
}
