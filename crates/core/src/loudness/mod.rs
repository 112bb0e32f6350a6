//! Loudness: level analysis and the gain-corrected mezzanine.

mod analyzer;
mod gain;
mod mezzanine;

pub use analyzer::{
    analyze_level, parse_volume_report, AudioLevelProfile, FALLBACK_MEAN_DB, FALLBACK_PEAK_DB,
};
pub use gain::{compute_gain, DEFAULT_MAX_GAIN_DB, DEFAULT_TARGET_PEAK_DB};
pub use mezzanine::{build_mezzanine, LoudnessTarget, Mezzanine};
