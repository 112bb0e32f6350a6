use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ladder::{Ladder, RungSpec, DEFAULT_DURATION_CEILING_SECS};
use crate::loudness::{LoudnessTarget, DEFAULT_MAX_GAIN_DB, DEFAULT_TARGET_PEAK_DB};
use crate::transcoder::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub encoder: TranscoderConfig,
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Normalization settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct NormalizerConfig {
    /// Hard byte limit for a delivered artifact.
    #[serde(default = "default_size_ceiling")]
    pub size_ceiling_bytes: u64,

    /// Longest output the final rung may produce.
    #[serde(default = "default_duration_ceiling")]
    pub duration_ceiling_secs: u32,

    #[serde(default = "default_target_peak")]
    pub target_peak_db: f64,

    #[serde(default = "default_max_gain")]
    pub max_gain_db: f64,

    /// Floor for the computed video bitrate.
    #[serde(default = "default_min_video_kbps")]
    pub min_video_kbps: u32,

    /// Root for per-run scratch directories.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Deliver the mezzanine next to the artifact.
    #[serde(default)]
    pub keep_mezzanine: bool,

    /// Peak distance from target still treated as already normalized.
    #[serde(default = "default_passthrough_tolerance")]
    pub passthrough_tolerance_db: f64,

    /// Replaces the reference ladder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ladder: Option<Vec<RungSpec>>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            size_ceiling_bytes: default_size_ceiling(),
            duration_ceiling_secs: default_duration_ceiling(),
            target_peak_db: default_target_peak(),
            max_gain_db: default_max_gain(),
            min_video_kbps: default_min_video_kbps(),
            temp_dir: default_temp_dir(),
            keep_mezzanine: false,
            passthrough_tolerance_db: default_passthrough_tolerance(),
            ladder: None,
        }
    }
}

impl NormalizerConfig {
    /// The ladder to walk: the override if present, the reference otherwise.
    pub fn build_ladder(&self) -> Ladder {
        match &self.ladder {
            Some(specs) if !specs.is_empty() => {
                Ladder::from_specs(specs, self.duration_ceiling_secs)
            }
            _ => Ladder::reference(self.duration_ceiling_secs),
        }
    }

    pub fn loudness_target(&self) -> LoudnessTarget {
        LoudnessTarget {
            target_peak_db: self.target_peak_db,
            max_gain_db: self.max_gain_db,
        }
    }
}

fn default_size_ceiling() -> u64 {
    9 * 1024 * 1024
}

fn default_duration_ceiling() -> u32 {
    DEFAULT_DURATION_CEILING_SECS
}

fn default_target_peak() -> f64 {
    DEFAULT_TARGET_PEAK_DB
}

fn default_max_gain() -> f64 {
    DEFAULT_MAX_GAIN_DB
}

fn default_min_video_kbps() -> u32 {
    64
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("clipfit")
}

fn default_passthrough_tolerance() -> f64 {
    1.0
}

/// Artifact cache settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_entries(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_cache_entries() -> usize {
    256
}

/// Catalog database settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// SQLite file; publishing is disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}
