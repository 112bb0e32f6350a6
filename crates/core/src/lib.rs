//! Media normalization that fits audio and video under an attachment size
//! ceiling.
//!
//! A source is probed, its loudness measured and corrected into a
//! mezzanine, then encoded down a descending quality ladder until an output
//! fits. See [`ladder::LadderController`] for the entry point.

pub mod cache;
pub mod config;
pub mod events;
pub mod ladder;
pub mod loudness;
pub mod media;
pub mod publisher;
pub mod testing;
pub mod transcoder;

pub use cache::ArtifactCache;
pub use config::{
    load_config, load_config_from_str, load_default_config, validate_config, CacheConfig,
    CatalogConfig, Config, ConfigError, NormalizerConfig,
};
pub use events::{create_event_channel, EventEnvelope, EventHandle, NormalizeEvent};
pub use ladder::{
    Delivery, EncodeAttemptResult, LadderController, LadderState, NormalizeError,
    NormalizeRequest, NormalizedArtifact,
};
pub use loudness::AudioLevelProfile;
pub use media::{MediaAsset, MediaEffects, MediaKind};
pub use publisher::{CatalogPublisher, CatalogRecord, PublishError, SqliteCatalog};
pub use transcoder::{FfmpegTranscoder, HardwareMode, Transcoder, TranscoderConfig, TranscoderError};
