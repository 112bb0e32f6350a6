//! Volume normalizer: writes the loudness-corrected mezzanine.

use std::path::{Path, PathBuf};
use tracing::info;

use super::analyzer::AudioLevelProfile;
use super::gain::{compute_gain, DEFAULT_MAX_GAIN_DB, DEFAULT_TARGET_PEAK_DB};
use crate::media::{MediaAsset, MediaEffects};
use crate::transcoder::{MezzanineJob, Transcoder, TranscoderError};

/// Sample rate assumed when the probe did not report one.
const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Where the normalizer should bring the peak level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessTarget {
    pub target_peak_db: f64,
    pub max_gain_db: f64,
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        Self {
            target_peak_db: DEFAULT_TARGET_PEAK_DB,
            max_gain_db: DEFAULT_MAX_GAIN_DB,
        }
    }
}

impl LoudnessTarget {
    /// Gain to apply for `profile`.
    pub fn gain_for(&self, profile: &AudioLevelProfile) -> f64 {
        compute_gain(self.target_peak_db, profile.peak_db, self.max_gain_db)
    }
}

/// A mezzanine written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Mezzanine {
    pub path: PathBuf,
    pub gain_db: f64,
}

/// Builds the mezzanine for `asset` inside `dir`.
///
/// The result is the single input for every ladder rung. A missing or empty
/// output is reported as [`TranscoderError::EmptyOutput`] and removed.
pub async fn build_mezzanine<T: Transcoder + ?Sized>(
    transcoder: &T,
    asset: &MediaAsset,
    profile: &AudioLevelProfile,
    effects: &MediaEffects,
    target: &LoudnessTarget,
    dir: &Path,
) -> Result<Mezzanine, TranscoderError> {
    let gain_db = target.gain_for(profile);
    let output_path = dir.join(format!("mezzanine.{}", asset.kind.mezzanine_extension()));

    let job = MezzanineJob {
        input_path: asset.source_path.clone(),
        output_path: output_path.clone(),
        kind: asset.kind,
        gain_db,
        effects: effects.clone(),
        sample_rate: asset.audio_sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
        has_audio: asset.audio_codec.is_some(),
    };

    if let Err(e) = transcoder.build_mezzanine(&job).await {
        let _ = tokio::fs::remove_file(&output_path).await;
        return Err(e);
    }

    match tokio::fs::metadata(&output_path).await {
        Ok(meta) if meta.len() > 0 => {
            info!(
                path = %output_path.display(),
                gain_db,
                bytes = meta.len(),
                "Mezzanine written"
            );
            Ok(Mezzanine {
                path: output_path,
                gain_db,
            })
        }
        _ => {
            let _ = tokio::fs::remove_file(&output_path).await;
            Err(TranscoderError::EmptyOutput { path: output_path })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_for_profile() {
        let target = LoudnessTarget::default();
        let quiet = AudioLevelProfile {
            peak_db: -60.0,
            mean_db: -70.0,
            degraded: false,
        };
        assert_eq!(target.gain_for(&quiet), 20.0);

        let normal = AudioLevelProfile {
            peak_db: -8.0,
            mean_db: -20.0,
            degraded: false,
        };
        assert_eq!(target.gain_for(&normal), 5.0);
    }

    #[test]
    fn test_fallback_profile_gain() {
        let target = LoudnessTarget::default();
        assert_eq!(target.gain_for(&AudioLevelProfile::fallback()), 7.0);
    }
}
