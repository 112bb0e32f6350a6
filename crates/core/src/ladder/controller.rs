//! Quality ladder controller: drives one source from probe to delivery.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::budget::plan;
use super::executor;
use super::rung::Ladder;
use super::scratch::ScratchDir;
use super::trim::trim_limit;
use super::types::{
    Delivery, EncodeAttemptResult, LadderState, NormalizeError, NormalizeRequest,
    NormalizedArtifact,
};
use super::validator::{self, Verdict};
use crate::cache::{self, ArtifactCache};
use crate::config::NormalizerConfig;
use crate::events::{EventHandle, NormalizeEvent};
use crate::loudness::{analyze_level, build_mezzanine, AudioLevelProfile, Mezzanine};
use crate::media::{MediaAsset, MediaEffects, MediaKind};
use crate::publisher::CatalogPublisher;
use crate::transcoder::{RungJob, Transcoder, TranscoderError};

/// Everything that changes the bytes of a delivered artifact.
#[derive(Serialize)]
struct OutputSettings<'a> {
    source: &'a Path,
    normalizer: &'a NormalizerConfig,
    effects: &'a MediaEffects,
    output_dir: &'a Path,
    transcoder: &'a str,
}

/// Per-run bookkeeping for the state machine.
struct Walk<'a> {
    source: String,
    state: LadderState,
    events: Option<&'a EventHandle>,
}

impl<'a> Walk<'a> {
    async fn enter(&mut self, next: LadderState) {
        debug_assert!(
            self.state.can_transition_to(&next),
            "illegal ladder transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(source = %self.source, from = ?self.state, to = ?next, "Ladder state");
        let from = self.state;
        self.state = next;
        self.emit(NormalizeEvent::StateChanged { from, to: next })
            .await;
    }

    async fn emit(&self, event: NormalizeEvent) {
        if let Some(events) = self.events {
            events.emit(&self.source, event).await;
        }
    }
}

/// Normalizes sources into size-capped delivery artifacts.
///
/// One controller is meant to live for the whole process: the hardware
/// encoder probe runs once and is reused by every call to
/// [`normalize`](Self::normalize).
pub struct LadderController<T: Transcoder> {
    transcoder: Arc<T>,
    config: NormalizerConfig,
    ladder: Ladder,
    hardware: OnceCell<bool>,
    events: Option<EventHandle>,
    cache: Option<Arc<ArtifactCache>>,
    publisher: Option<Arc<dyn CatalogPublisher>>,
}

impl<T: Transcoder> LadderController<T> {
    pub fn new(config: NormalizerConfig, transcoder: T) -> Self {
        let ladder = config.build_ladder();
        Self {
            transcoder: Arc::new(transcoder),
            config,
            ladder,
            hardware: OnceCell::new(),
            events: None,
            cache: None,
            publisher: None,
        }
    }

    /// Sets the handle progress events are sent to.
    pub fn with_events(mut self, events: EventHandle) -> Self {
        self.events = Some(events);
        self
    }

    /// Reuses delivered artifacts for identical inputs.
    pub fn with_cache(mut self, cache: Arc<ArtifactCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Records results for requests that carry an asset key.
    pub fn with_publisher(mut self, publisher: Arc<dyn CatalogPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    pub fn transcoder(&self) -> &T {
        &self.transcoder
    }

    /// Whether a hardware video encoder works, probed on first use.
    pub async fn hardware_available(&self) -> bool {
        *self
            .hardware
            .get_or_init(|| async { self.transcoder.detect_hardware_encoder().await })
            .await
    }

    /// Normalizes one source.
    ///
    /// Returns the delivered artifact, flagged as oversized when even the
    /// final rung could not get under the ceiling. Scratch files are removed
    /// on every path, and nothing is left in the output directory on error.
    pub async fn normalize(&self, request: NormalizeRequest) -> Result<Delivery, NormalizeError> {
        let mut walk = Walk {
            source: request.source_path.display().to_string(),
            state: LadderState::Idle,
            events: self.events.as_ref(),
        };
        walk.emit(NormalizeEvent::Started {
            source: walk.source.clone(),
        })
        .await;

        let result = self.run(&request, &mut walk).await;

        match &result {
            Ok(delivery) => {
                if let Some(key) = &request.asset_key {
                    self.publish(&walk, key, delivery).await;
                }
            }
            Err(e) => {
                warn!(source = %walk.source, error = %e, "Normalization failed");
                if !walk.state.is_terminal() {
                    walk.enter(LadderState::Failed).await;
                }
                walk.emit(NormalizeEvent::Failed {
                    kind: e.kind().to_string(),
                    reason: e.to_string(),
                })
                .await;
            }
        }

        result
    }

    async fn run(
        &self,
        request: &NormalizeRequest,
        walk: &mut Walk<'_>,
    ) -> Result<Delivery, NormalizeError> {
        check_source(&request.source_path).await?;
        request.effects.validate()?;

        let key = self.artifact_key(request).await?;
        if let Some(cache) = &self.cache {
            if let Some(delivery) = cache.get(&key) {
                info!(
                    source = %walk.source,
                    path = %delivery.artifact().path.display(),
                    "Reusing cached artifact"
                );
                walk.emit(NormalizeEvent::CacheHit {
                    path: delivery.artifact().path.display().to_string(),
                    oversized: delivery.is_oversized(),
                })
                .await;
                walk.enter(LadderState::Accepted).await;
                return Ok(delivery);
            }
        }

        walk.enter(LadderState::Analyzing).await;
        let asset = self.probe(&request.source_path).await?;
        walk.emit(NormalizeEvent::Probed {
            kind: format!("{:?}", asset.kind).to_lowercase(),
            duration_secs: asset.duration_secs,
            width: asset.width,
            height: asset.height,
            size_bytes: asset.size_bytes,
        })
        .await;

        if matches!(asset.kind, MediaKind::Video) {
            let available = self.hardware_available().await;
            walk.emit(NormalizeEvent::HardwareDetected { available })
                .await;
        }

        let levels = analyze_level(self.transcoder.as_ref(), &asset.source_path).await;
        walk.emit(NormalizeEvent::LevelsAnalyzed {
            peak_db: levels.peak_db,
            mean_db: levels.mean_db,
            degraded: levels.degraded,
        })
        .await;

        let dest = output_path(&request.output_dir, &asset, &cache::tag(&key));
        let delivery = if self.qualifies_for_passthrough(&asset, &levels, &request.effects) {
            self.pass_through(&asset, &levels, dest, walk).await?
        } else {
            self.walk_ladder(&asset, &levels, request, dest, walk)
                .await?
        };

        if let Some(cache) = &self.cache {
            cache.insert(key, delivery.clone());
        }
        Ok(delivery)
    }

    async fn probe(&self, path: &Path) -> Result<MediaAsset, NormalizeError> {
        match self.transcoder.probe(path).await {
            Ok(asset) => {
                info!(
                    path = %path.display(),
                    kind = ?asset.kind,
                    duration_secs = asset.duration_secs,
                    height = ?asset.height,
                    "Probed source"
                );
                Ok(asset)
            }
            Err(TranscoderError::InputNotFound { path }) => {
                Err(NormalizeError::SourceMissing { path })
            }
            Err(e) => Err(NormalizeError::ProbeFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }),
        }
    }

    fn qualifies_for_passthrough(
        &self,
        asset: &MediaAsset,
        levels: &AudioLevelProfile,
        effects: &MediaEffects,
    ) -> bool {
        let Some(first) = self.ladder.first() else {
            return false;
        };
        let gain = self.config.loudness_target().gain_for(levels);

        effects.is_empty()
            && !levels.degraded
            && asset.uses_delivery_format()
            && asset.size_bytes > 0
            && asset.size_bytes <= self.config.size_ceiling_bytes
            && !asset.exceeds_height(first.target_height)
            && gain.abs() <= self.config.passthrough_tolerance_db
    }

    async fn pass_through(
        &self,
        asset: &MediaAsset,
        levels: &AudioLevelProfile,
        dest: PathBuf,
        walk: &mut Walk<'_>,
    ) -> Result<Delivery, NormalizeError> {
        let rung = self
            .ladder
            .first()
            .cloned()
            .ok_or_else(|| std::io::Error::other("ladder has no rungs"))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !same_file(&dest, &asset.source_path).await {
            tokio::fs::copy(&asset.source_path, &dest).await?;
        }
        let byte_size = tokio::fs::metadata(&dest).await?.len();

        info!(
            source = %walk.source,
            path = %dest.display(),
            byte_size,
            "Source already normalized, delivered unchanged"
        );
        walk.emit(NormalizeEvent::Passthrough {
            size_bytes: byte_size,
        })
        .await;

        let artifact = NormalizedArtifact {
            path: dest,
            byte_size,
            output_extension: asset.kind.output_extension().to_string(),
            rung,
            passthrough: true,
            hardware: false,
            gain_db: None,
            levels: *levels,
            trimmed_to_secs: None,
            mezzanine_path: None,
            attempts: vec![],
        };
        self.accept(walk, Delivery::Fits(artifact)).await
    }

    async fn walk_ladder(
        &self,
        asset: &MediaAsset,
        levels: &AudioLevelProfile,
        request: &NormalizeRequest,
        dest: PathBuf,
        walk: &mut Walk<'_>,
    ) -> Result<Delivery, NormalizeError> {
        if same_file(&dest, &asset.source_path).await {
            return Err(NormalizeError::OutputConflict { path: dest });
        }

        walk.enter(LadderState::Normalizing).await;

        // The source may have vanished while it was being analyzed.
        check_source(&asset.source_path).await?;

        let scratch = ScratchDir::create(&self.config.temp_dir).await?;
        let result = self
            .walk_in(asset, levels, request, dest, &scratch, walk)
            .await;
        scratch.cleanup().await;
        result
    }

    async fn walk_in(
        &self,
        asset: &MediaAsset,
        levels: &AudioLevelProfile,
        request: &NormalizeRequest,
        dest: PathBuf,
        scratch: &ScratchDir,
        walk: &mut Walk<'_>,
    ) -> Result<Delivery, NormalizeError> {
        // Already probed in `run`; audio never uses the hardware path.
        let hardware =
            matches!(asset.kind, MediaKind::Video) && self.hardware_available().await;
        let mezzanine = match build_mezzanine(
            self.transcoder.as_ref(),
            asset,
            levels,
            &request.effects,
            &self.config.loudness_target(),
            scratch.path(),
        )
        .await
        {
            Ok(m) => {
                walk.emit(NormalizeEvent::MezzanineBuilt { gain_db: m.gain_db })
                    .await;
                Some(m)
            }
            Err(e) => {
                check_source(&asset.source_path).await?;
                if !request.effects.is_empty() {
                    return Err(NormalizeError::EffectsUnavailable {
                        reason: format!("mezzanine failed: {}", e),
                    });
                }
                warn!(
                    source = %walk.source,
                    error = %e,
                    "Mezzanine failed, encoding from the source"
                );
                walk.emit(NormalizeEvent::MezzanineSkipped {
                    reason: e.to_string(),
                })
                .await;
                None
            }
        };

        let (input_path, duration) = match &mezzanine {
            Some(m) => (
                m.path.clone(),
                request.effects.effective_duration(asset.duration_secs),
            ),
            None => (asset.source_path.clone(), asset.duration_secs),
        };

        let budgets = plan(
            duration,
            self.config.size_ceiling_bytes,
            &self.ladder,
            asset.kind,
            self.config.min_video_kbps,
        );

        let ceiling = self.config.size_ceiling_bytes;
        let mut attempts: Vec<EncodeAttemptResult> = Vec::with_capacity(self.ladder.len());
        let mut accepted: Option<EncodeAttemptResult> = None;
        let mut fallback: Option<EncodeAttemptResult> = None;

        for (rung, budget) in self.ladder.rungs().iter().zip(budgets) {
            walk.enter(LadderState::Attempting(rung.index)).await;

            let job = RungJob {
                input_path: input_path.clone(),
                output_path: scratch
                    .path()
                    .join(format!("rung-{}.{}", rung.index, asset.kind.output_extension())),
                kind: asset.kind,
                rung: rung.clone(),
                budget,
                scale_to_height: asset
                    .exceeds_height(rung.target_height)
                    .then_some(rung.target_height),
                trim_secs: trim_limit(rung, duration),
                hardware,
            };

            info!(
                source = %walk.source,
                rung = rung.index,
                target_height = rung.target_height,
                quality = rung.quality,
                video_kbps = ?budget.video_kbps,
                audio_kbps = budget.audio_kbps,
                trim_secs = ?job.trim_secs,
                "Encoding rung"
            );
            walk.emit(NormalizeEvent::RungStarted {
                rung: rung.index,
                target_height: rung.target_height,
                quality: rung.quality,
                video_kbps: budget.video_kbps,
                audio_kbps: budget.audio_kbps,
                trim_secs: job.trim_secs,
                hardware: job.hardware,
            })
            .await;

            let attempt = executor::execute(self.transcoder.as_ref(), job).await;
            attempts.push(attempt.clone());

            if !attempt.success {
                walk.emit(NormalizeEvent::RungFailed {
                    rung: rung.index,
                    error_kind: attempt.error_kind.clone(),
                    message: attempt.error_message.clone(),
                })
                .await;
                continue;
            }

            match validator::validate(&attempt.output_path, ceiling).await {
                Verdict::Accept { byte_size } => {
                    info!(source = %walk.source, rung = rung.index, byte_size, "Rung fits");
                    accepted = Some(attempt);
                    break;
                }
                Verdict::Oversized { byte_size } => {
                    info!(
                        source = %walk.source,
                        rung = rung.index,
                        byte_size,
                        ceiling,
                        "Rung over the ceiling"
                    );
                    walk.emit(NormalizeEvent::RungRejected {
                        rung: rung.index,
                        byte_size,
                        ceiling_bytes: ceiling,
                    })
                    .await;
                    // Only the newest oversized output is kept as a fallback.
                    if let Some(previous) = fallback.replace(attempt) {
                        validator::discard(&previous.output_path).await;
                    }
                }
                Verdict::Invalid => {}
            }
        }

        let (winner, oversized) = match (accepted, fallback) {
            (Some(winner), previous) => {
                if let Some(previous) = previous {
                    validator::discard(&previous.output_path).await;
                }
                (winner, false)
            }
            (None, Some(best_effort)) => (best_effort, true),
            (None, None) => return Err(NormalizeError::AllRungsExhausted { attempts }),
        };

        let artifact = self
            .deliver(asset, levels, dest, mezzanine, winner, attempts)
            .await?;

        let delivery = if oversized {
            warn!(
                source = %walk.source,
                byte_size = artifact.byte_size,
                ceiling,
                "Every rung exceeded the ceiling, delivering the final attempt"
            );
            Delivery::Oversized(artifact)
        } else {
            Delivery::Fits(artifact)
        };
        self.accept(walk, delivery).await
    }

    /// Moves the winning rung (and optionally the mezzanine) to `dest`.
    async fn deliver(
        &self,
        asset: &MediaAsset,
        levels: &AudioLevelProfile,
        dest: PathBuf,
        mezzanine: Option<Mezzanine>,
        winner: EncodeAttemptResult,
        attempts: Vec<EncodeAttemptResult>,
    ) -> Result<NormalizedArtifact, NormalizeError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        move_file(&winner.output_path, &dest).await?;

        let gain_db = mezzanine.as_ref().map(|m| m.gain_db);
        let mezzanine_path = match mezzanine {
            Some(m) if self.config.keep_mezzanine => {
                let kept = dest.with_extension(format!(
                    "mezzanine.{}",
                    asset.kind.mezzanine_extension()
                ));
                if let Err(e) = move_file(&m.path, &kept).await {
                    let _ = tokio::fs::remove_file(&dest).await;
                    return Err(e.into());
                }
                Some(kept)
            }
            _ => None,
        };

        Ok(NormalizedArtifact {
            path: dest,
            byte_size: winner.byte_size,
            output_extension: asset.kind.output_extension().to_string(),
            rung: winner.rung.clone(),
            passthrough: false,
            hardware: winner.hardware,
            gain_db,
            levels: *levels,
            trimmed_to_secs: winner.trimmed_to_secs,
            mezzanine_path,
            attempts,
        })
    }

    async fn accept(
        &self,
        walk: &mut Walk<'_>,
        delivery: Delivery,
    ) -> Result<Delivery, NormalizeError> {
        walk.enter(LadderState::Accepted).await;
        let artifact = delivery.artifact();
        info!(
            source = %walk.source,
            path = %artifact.path.display(),
            byte_size = artifact.byte_size,
            rung = artifact.rung.index,
            oversized = delivery.is_oversized(),
            "Artifact delivered"
        );
        walk.emit(NormalizeEvent::Accepted {
            path: artifact.path.display().to_string(),
            byte_size: artifact.byte_size,
            rung: artifact.rung.index,
            oversized: delivery.is_oversized(),
            passthrough: artifact.passthrough,
        })
        .await;
        Ok(delivery)
    }

    async fn publish(&self, walk: &Walk<'_>, asset_key: &str, delivery: &Delivery) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        match publisher.publish(asset_key, delivery).await {
            Ok(()) => {
                debug!(asset_key, "Published artifact");
                walk.emit(NormalizeEvent::Published {
                    asset_key: asset_key.to_string(),
                })
                .await;
            }
            Err(e) => {
                warn!(asset_key, error = %e, "Failed to publish artifact");
                walk.emit(NormalizeEvent::PublishFailed {
                    asset_key: asset_key.to_string(),
                    reason: e.to_string(),
                })
                .await;
            }
        }
    }

    /// Identifies the artifact this request would produce: source path and
    /// bytes plus every setting that shapes the output. Keys the cache and
    /// names the file.
    async fn artifact_key(&self, request: &NormalizeRequest) -> Result<String, NormalizeError> {
        let settings = OutputSettings {
            source: &request.source_path,
            normalizer: &self.config,
            effects: &request.effects,
            output_dir: &request.output_dir,
            transcoder: self.transcoder.name(),
        };
        cache::content_key(&request.source_path, &cache::fingerprint(&settings))
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => NormalizeError::SourceMissing {
                    path: request.source_path.clone(),
                },
                _ => NormalizeError::Io(e),
            })
    }
}

/// Fails with `SourceMissing` unless `path` is a non-empty file.
async fn check_source(path: &Path) -> Result<(), NormalizeError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(NormalizeError::SourceMissing {
            path: path.to_path_buf(),
        }),
    }
}

/// `<stem>-<tag>.<ext>`: sources sharing a stem never share an artifact.
fn output_path(output_dir: &Path, asset: &MediaAsset, tag: &str) -> PathBuf {
    output_dir.join(format!(
        "{}-{}.{}",
        asset.stem(),
        tag,
        asset.kind.output_extension()
    ))
}

/// Whether both paths exist and name the same file.
async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Renames `from` to `to`, copying across filesystems when needed.
async fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    let _ = tokio::fs::remove_file(from).await;
    Ok(())
}
