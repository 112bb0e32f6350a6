use serde::{Deserialize, Serialize};

use crate::ladder::{EncodeErrorKind, LadderState};

/// Progress events emitted while normalizing one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizeEvent {
    Started {
        source: String,
    },
    StateChanged {
        from: LadderState,
        to: LadderState,
    },
    CacheHit {
        path: String,
        oversized: bool,
    },
    Probed {
        kind: String,
        duration_secs: f64,
        width: Option<u32>,
        height: Option<u32>,
        size_bytes: u64,
    },
    HardwareDetected {
        available: bool,
    },
    LevelsAnalyzed {
        peak_db: f64,
        mean_db: f64,
        degraded: bool,
    },
    MezzanineBuilt {
        gain_db: f64,
    },
    /// The mezzanine could not be written; rungs encode from the source.
    MezzanineSkipped {
        reason: String,
    },
    Passthrough {
        size_bytes: u64,
    },
    RungStarted {
        rung: usize,
        target_height: u32,
        quality: u8,
        video_kbps: Option<u32>,
        audio_kbps: u32,
        trim_secs: Option<u32>,
        hardware: bool,
    },
    RungRejected {
        rung: usize,
        byte_size: u64,
        ceiling_bytes: u64,
    },
    RungFailed {
        rung: usize,
        error_kind: Option<EncodeErrorKind>,
        message: Option<String>,
    },
    Accepted {
        path: String,
        byte_size: u64,
        rung: usize,
        oversized: bool,
        passthrough: bool,
    },
    Failed {
        kind: String,
        reason: String,
    },
    Published {
        asset_key: String,
    },
    PublishFailed {
        asset_key: String,
        reason: String,
    },
}
