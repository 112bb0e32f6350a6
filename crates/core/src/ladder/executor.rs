//! Encode executor: runs one rung and checks what it produced.

use tracing::warn;

use super::types::{EncodeAttemptResult, EncodeErrorKind};
use crate::transcoder::{RungJob, Transcoder};

/// Encodes `job` and reports the outcome.
///
/// A failed process or a missing/empty output counts as a failure, and any
/// partial file is deleted. Never returns an error: failures are data.
pub async fn execute<T: Transcoder + ?Sized>(transcoder: &T, job: RungJob) -> EncodeAttemptResult {
    let mut attempt = EncodeAttemptResult {
        rung: job.rung.clone(),
        budget: job.budget,
        hardware: job.hardware,
        trimmed_to_secs: job.trim_secs,
        output_path: job.output_path.clone(),
        byte_size: 0,
        success: false,
        error_kind: None,
        error_message: None,
    };

    if let Err(e) = transcoder.encode(&job).await {
        warn!(rung = job.rung.index, error = %e, "Rung encode failed");
        attempt.error_kind = Some(EncodeErrorKind::from(&e));
        attempt.error_message = Some(e.to_string());
        let _ = tokio::fs::remove_file(&job.output_path).await;
        return attempt;
    }

    match tokio::fs::metadata(&job.output_path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => {
            attempt.byte_size = meta.len();
            attempt.success = true;
        }
        _ => {
            warn!(rung = job.rung.index, "Rung encode produced no output");
            attempt.error_kind = Some(EncodeErrorKind::EmptyOutput);
            attempt.error_message = Some(format!(
                "Output missing or empty: {}",
                job.output_path.display()
            ));
            let _ = tokio::fs::remove_file(&job.output_path).await;
        }
    }

    attempt
}
