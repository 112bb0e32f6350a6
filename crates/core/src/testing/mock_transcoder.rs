//! Mock transcoder for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::media::{MediaAsset, MediaKind};
use crate::transcoder::{MezzanineJob, RungJob, Transcoder, TranscoderError};

/// Size written for rungs without a scripted size.
const DEFAULT_RUNG_BYTES: u64 = 1024 * 1024;
/// Size written for a mezzanine.
const MEZZANINE_BYTES: u64 = 4096;

/// A recorded call for test assertions.
#[derive(Debug, Clone)]
pub enum RecordedCall {
    Probe(PathBuf),
    DetectHardware,
    MeasureVolume(PathBuf),
    Mezzanine(MezzanineJob),
    Encode(RungJob),
}

/// Mock implementation of the Transcoder trait.
///
/// Provides controllable behavior for testing:
/// - Scripted probe results and volume reports
/// - Per-rung output sizes and failures
/// - A hardware encoder flag
/// - Recorded calls for assertions
///
/// Outputs are real (sparse) files of the scripted size, so size checks
/// behave as they would against ffmpeg. Clones share state.
///
/// # Example
///
/// ```rust,ignore
/// use clipfit_core::testing::MockTranscoder;
///
/// let transcoder = MockTranscoder::new();
/// transcoder.set_probe_result("/in/clip.mov", asset).await;
/// transcoder.set_rung_size(0, 12_000_000).await;
/// transcoder.set_rung_size(1, 8_000_000).await;
///
/// // ... run the controller ...
///
/// assert_eq!(transcoder.encoded_jobs().await.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockTranscoder {
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    probe_results: Arc<RwLock<HashMap<PathBuf, MediaAsset>>>,
    /// `None` makes loudness measurement fail.
    volume_report: Arc<RwLock<Option<String>>>,
    rung_sizes: Arc<RwLock<HashMap<usize, u64>>>,
    failing_rungs: Arc<RwLock<HashSet<usize>>>,
    mezzanine_fails: Arc<RwLock<bool>>,
    hardware: Arc<RwLock<bool>>,
    remove_source_on_measure: Arc<RwLock<bool>>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder.
    pub fn new() -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            volume_report: Arc::new(RwLock::new(Some(Self::volume_report(-8.0, -20.0)))),
            rung_sizes: Arc::new(RwLock::new(HashMap::new())),
            failing_rungs: Arc::new(RwLock::new(HashSet::new())),
            mezzanine_fails: Arc::new(RwLock::new(false)),
            hardware: Arc::new(RwLock::new(false)),
            remove_source_on_measure: Arc::new(RwLock::new(false)),
        }
    }

    /// A volumedetect report with the given levels.
    pub fn volume_report(peak_db: f64, mean_db: f64) -> String {
        format!(
            "[Parsed_volumedetect_0 @ 0x1] n_samples: 1000\n\
             [Parsed_volumedetect_0 @ 0x1] mean_volume: {:.1} dB\n\
             [Parsed_volumedetect_0 @ 0x1] max_volume: {:.1} dB\n",
            mean_db, peak_db
        )
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, asset: MediaAsset) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), asset);
    }

    /// Set the report returned by loudness measurement; `None` fails it.
    pub async fn set_volume_report(&self, report: Option<String>) {
        *self.volume_report.write().await = report;
    }

    /// Set the output size for rung `index`.
    pub async fn set_rung_size(&self, index: usize, bytes: u64) {
        self.rung_sizes.write().await.insert(index, bytes);
    }

    /// Make rung `index` fail after writing a partial file.
    pub async fn fail_rung(&self, index: usize) {
        self.failing_rungs.write().await.insert(index);
    }

    pub async fn set_mezzanine_fails(&self, fails: bool) {
        *self.mezzanine_fails.write().await = fails;
    }

    pub async fn set_hardware(&self, available: bool) {
        *self.hardware.write().await = available;
    }

    /// Delete the source while its loudness is being measured.
    pub async fn set_remove_source_on_measure(&self, remove: bool) {
        *self.remove_source_on_measure.write().await = remove;
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    /// Rung jobs in submission order.
    pub async fn encoded_jobs(&self) -> Vec<RungJob> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Encode(job) => Some(job.clone()),
                _ => None,
            })
            .collect()
    }

    /// Mezzanine jobs in submission order.
    pub async fn mezzanine_jobs(&self) -> Vec<MezzanineJob> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|c| match c {
                RecordedCall::Mezzanine(job) => Some(job.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of hardware probes performed.
    pub async fn hardware_probe_count(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, RecordedCall::DetectHardware))
            .count()
    }

    /// Clear recorded calls.
    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    async fn record(&self, call: RecordedCall) {
        self.calls.write().await.push(call);
    }

    fn default_asset(path: &Path) -> MediaAsset {
        MediaAsset {
            source_path: path.to_path_buf(),
            kind: MediaKind::Audio,
            duration_secs: 60.0,
            width: None,
            height: None,
            size_bytes: 0,
            format: "wav".to_string(),
            audio_codec: Some("pcm_s16le".to_string()),
            audio_sample_rate: Some(44_100),
            video_codec: None,
        }
    }

    async fn write_sized(path: &Path, bytes: u64) -> Result<(), TranscoderError> {
        let file = tokio::fs::File::create(path).await?;
        file.set_len(bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaAsset, TranscoderError> {
        self.record(RecordedCall::Probe(path.to_path_buf())).await;

        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|_| TranscoderError::InputNotFound {
                path: path.to_path_buf(),
            })?;

        let mut asset = self
            .probe_results
            .read()
            .await
            .get(path)
            .cloned()
            .unwrap_or_else(|| Self::default_asset(path));
        asset.source_path = path.to_path_buf();
        asset.size_bytes = meta.len();
        Ok(asset)
    }

    async fn detect_hardware_encoder(&self) -> bool {
        self.record(RecordedCall::DetectHardware).await;
        *self.hardware.read().await
    }

    async fn measure_volume(&self, path: &Path) -> Result<String, TranscoderError> {
        self.record(RecordedCall::MeasureVolume(path.to_path_buf()))
            .await;

        if *self.remove_source_on_measure.read().await {
            let _ = tokio::fs::remove_file(path).await;
        }

        self.volume_report
            .read()
            .await
            .clone()
            .ok_or_else(|| TranscoderError::process_failed("volumedetect failed", Some(1), None))
    }

    async fn build_mezzanine(&self, job: &MezzanineJob) -> Result<(), TranscoderError> {
        self.record(RecordedCall::Mezzanine(job.clone())).await;

        if !job.input_path.exists() {
            return Err(TranscoderError::InputNotFound {
                path: job.input_path.clone(),
            });
        }
        if *self.mezzanine_fails.read().await {
            return Err(TranscoderError::process_failed(
                "mezzanine failed",
                Some(1),
                Some("Conversion failed!".to_string()),
            ));
        }
        Self::write_sized(&job.output_path, MEZZANINE_BYTES).await
    }

    async fn encode(&self, job: &RungJob) -> Result<(), TranscoderError> {
        self.record(RecordedCall::Encode(job.clone())).await;

        let index = job.rung.index;
        if self.failing_rungs.read().await.contains(&index) {
            // ffmpeg leaves a truncated file behind when it dies.
            Self::write_sized(&job.output_path, 512).await?;
            return Err(TranscoderError::process_failed(
                format!("encode of rung {} failed", index),
                Some(1),
                Some("Error while encoding".to_string()),
            ));
        }

        let bytes = self
            .rung_sizes
            .read()
            .await
            .get(&index)
            .copied()
            .unwrap_or(DEFAULT_RUNG_BYTES);
        Self::write_sized(&job.output_path, bytes).await
    }

    async fn validate(&self) -> Result<(), TranscoderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::{BitrateBudget, Ladder};
    use tempfile::TempDir;

    fn rung_job(dir: &Path, index: usize) -> RungJob {
        RungJob {
            input_path: dir.join("in.flac"),
            output_path: dir.join(format!("rung-{}.mp3", index)),
            kind: MediaKind::Audio,
            rung: Ladder::reference(240).rungs()[index].clone(),
            budget: BitrateBudget {
                video_kbps: None,
                audio_kbps: 128,
            },
            scale_to_height: None,
            trim_secs: None,
            hardware: false,
        }
    }

    #[tokio::test]
    async fn test_encode_writes_scripted_size() {
        let dir = TempDir::new().unwrap();
        let mock = MockTranscoder::new();
        mock.set_rung_size(1, 12_345).await;

        mock.encode(&rung_job(dir.path(), 1)).await.unwrap();
        let len = std::fs::metadata(dir.path().join("rung-1.mp3")).unwrap().len();
        assert_eq!(len, 12_345);
        assert_eq!(mock.encoded_jobs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_rung_leaves_partial_file() {
        let dir = TempDir::new().unwrap();
        let mock = MockTranscoder::new();
        mock.fail_rung(0).await;

        let result = mock.encode(&rung_job(dir.path(), 0)).await;
        assert!(matches!(result, Err(TranscoderError::ProcessFailed { .. })));
        assert!(dir.path().join("rung-0.mp3").exists());
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let mock = MockTranscoder::new();
        let result = mock.probe(Path::new("/nonexistent/in.wav")).await;
        assert!(matches!(result, Err(TranscoderError::InputNotFound { .. })));
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let mock = MockTranscoder::new();
        let clone = mock.clone();
        clone.set_hardware(true).await;
        assert!(mock.detect_hardware_encoder().await);
        assert_eq!(clone.hardware_probe_count().await, 1);
    }
}
