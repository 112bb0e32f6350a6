//! Audio level analysis from ffmpeg's `volumedetect` report.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::transcoder::Transcoder;

/// Peak used when the report cannot be read.
pub const FALLBACK_PEAK_DB: f64 = -10.0;
/// Mean used when the report cannot be read.
pub const FALLBACK_MEAN_DB: f64 = -25.0;

/// Measured loudness of a source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioLevelProfile {
    pub peak_db: f64,
    pub mean_db: f64,
    /// True when the measurement failed and fallback levels are in use.
    pub degraded: bool,
}

impl AudioLevelProfile {
    /// Conservative levels used when analysis fails.
    pub fn fallback() -> Self {
        Self {
            peak_db: FALLBACK_PEAK_DB,
            mean_db: FALLBACK_MEAN_DB,
            degraded: true,
        }
    }
}

fn parse_db(report: &str, key: &str) -> Option<f64> {
    let re = Regex::new(&format!(r"{}:\s*(-?\d+(?:\.\d+)?)\s*dB", key)).ok()?;
    re.captures_iter(report)
        .last()
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Extracts `max_volume` and `mean_volume` from a volumedetect report.
///
/// Returns `None` unless both values are present and finite.
pub fn parse_volume_report(report: &str) -> Option<AudioLevelProfile> {
    let peak_db = parse_db(report, "max_volume")?;
    let mean_db = parse_db(report, "mean_volume")?;
    Some(AudioLevelProfile {
        peak_db,
        mean_db,
        degraded: false,
    })
}

/// Measures `path`, falling back to conservative levels on any failure.
pub async fn analyze_level<T: Transcoder + ?Sized>(transcoder: &T, path: &Path) -> AudioLevelProfile {
    match transcoder.measure_volume(path).await {
        Ok(report) => match parse_volume_report(&report) {
            Some(profile) => {
                debug!(
                    path = %path.display(),
                    peak_db = profile.peak_db,
                    mean_db = profile.mean_db,
                    "Measured audio levels"
                );
                profile
            }
            None => {
                warn!(path = %path.display(), "Unparsable loudness report, using fallback levels");
                AudioLevelProfile::fallback()
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Loudness analysis failed, using fallback levels");
            AudioLevelProfile::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
[Parsed_volumedetect_0 @ 0x55d5c1e0a440] n_samples: 26460000
[Parsed_volumedetect_0 @ 0x55d5c1e0a440] mean_volume: -21.4 dB
[Parsed_volumedetect_0 @ 0x55d5c1e0a440] max_volume: -8.0 dB
[Parsed_volumedetect_0 @ 0x55d5c1e0a440] histogram_8db: 12";

    #[test]
    fn test_parse_report() {
        let profile = parse_volume_report(REPORT).unwrap();
        assert_eq!(profile.peak_db, -8.0);
        assert_eq!(profile.mean_db, -21.4);
        assert!(!profile.degraded);
    }

    #[test]
    fn test_parse_positive_and_zero_peak() {
        let report = "mean_volume: -12.0 dB\nmax_volume: 0.0 dB";
        assert_eq!(parse_volume_report(report).unwrap().peak_db, 0.0);
    }

    #[test]
    fn test_parse_inf_is_rejected() {
        let report = "mean_volume: -inf dB\nmax_volume: -inf dB";
        assert!(parse_volume_report(report).is_none());
    }

    #[test]
    fn test_parse_missing_mean() {
        assert!(parse_volume_report("max_volume: -3.0 dB").is_none());
        assert!(parse_volume_report("").is_none());
    }

    #[test]
    fn test_fallback_levels() {
        let profile = AudioLevelProfile::fallback();
        assert_eq!(profile.peak_db, -10.0);
        assert_eq!(profile.mean_db, -25.0);
        assert!(profile.degraded);
    }
}
