//! Trait definitions for the transcoder module.

use async_trait::async_trait;
use std::path::Path;

use super::error::TranscoderError;
use super::types::{MezzanineJob, RungJob};
use crate::media::MediaAsset;

/// The external encoding toolchain, one process per call.
///
/// Every method runs to completion before returning; callers never overlap
/// two calls for the same asset.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Probes a media file to describe it.
    async fn probe(&self, path: &Path) -> Result<MediaAsset, TranscoderError>;

    /// Whether a working hardware encoder is present. Never fails: any
    /// probing error means "no".
    async fn detect_hardware_encoder(&self) -> bool;

    /// Runs a loudness-measurement pass and returns its textual report.
    async fn measure_volume(&self, path: &Path) -> Result<String, TranscoderError>;

    /// Writes the loudness-corrected intermediate.
    async fn build_mezzanine(&self, job: &MezzanineJob) -> Result<(), TranscoderError>;

    /// Encodes one ladder rung. Output checks are left to the caller.
    async fn encode(&self, job: &RungJob) -> Result<(), TranscoderError>;

    /// Validates that the transcoder is properly configured and ready.
    async fn validate(&self) -> Result<(), TranscoderError>;
}
