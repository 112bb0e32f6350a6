//! Sequential batch normalization.

use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info, warn};

use clipfit_core::{Delivery, LadderController, NormalizeRequest, Transcoder};

/// Result for one file of a batch.
#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub source: PathBuf,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Fits {
        path: PathBuf,
        byte_size: u64,
        rung: usize,
    },
    Oversized {
        path: PathBuf,
        byte_size: u64,
        rung: usize,
    },
    Failed {
        kind: String,
        reason: String,
    },
}

/// Summary of a whole batch.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    pub fn oversized(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Oversized { .. }))
    }

    pub fn fitted(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Fits { .. }))
    }

    fn count(&self, pred: impl Fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

/// Runs requests one at a time through a single controller.
///
/// Files never overlap: each gets the encoder to itself, and the hardware
/// probe done for the first file is reused by the rest.
pub struct BatchRunner<T: Transcoder> {
    controller: LadderController<T>,
}

impl<T: Transcoder> BatchRunner<T> {
    pub fn new(controller: LadderController<T>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &LadderController<T> {
        &self.controller
    }

    pub async fn run(&self, requests: Vec<NormalizeRequest>) -> BatchReport {
        let total = requests.len();
        let mut report = BatchReport::default();

        for (i, request) in requests.into_iter().enumerate() {
            let source = request.source_path.clone();
            info!("[{}/{}] Normalizing {}", i + 1, total, source.display());

            let status = match self.controller.normalize(request).await {
                Ok(Delivery::Fits(artifact)) => OutcomeStatus::Fits {
                    path: artifact.path,
                    byte_size: artifact.byte_size,
                    rung: artifact.rung.index,
                },
                Ok(Delivery::Oversized(artifact)) => {
                    warn!(
                        "{} is still {} bytes after the last rung",
                        source.display(),
                        artifact.byte_size
                    );
                    OutcomeStatus::Oversized {
                        path: artifact.path,
                        byte_size: artifact.byte_size,
                        rung: artifact.rung.index,
                    }
                }
                Err(e) => {
                    error!("Failed to normalize {}: {}", source.display(), e);
                    OutcomeStatus::Failed {
                        kind: e.kind().to_string(),
                        reason: e.to_string(),
                    }
                }
            };

            report.outcomes.push(FileOutcome { source, status });
        }

        report
    }
}
