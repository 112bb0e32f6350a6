//! Result publisher: records the delivered artifact against its asset.

mod sqlite;

pub use sqlite::SqliteCatalog;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::ladder::Delivery;

/// Stored outcome for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub asset_key: String,
    pub normalized_path: PathBuf,
    pub byte_size: u64,
    /// Larger than the ceiling; delivered as best effort.
    pub oversized: bool,
    pub rung_index: usize,
    pub updated_at: DateTime<Utc>,
}

impl CatalogRecord {
    pub fn from_delivery(asset_key: &str, delivery: &Delivery) -> Self {
        let artifact = delivery.artifact();
        Self {
            asset_key: asset_key.to_string(),
            normalized_path: artifact.path.clone(),
            byte_size: artifact.byte_size,
            oversized: delivery.is_oversized(),
            rung_index: artifact.rung.index,
            updated_at: Utc::now(),
        }
    }
}

/// Errors for publish operations.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Asset not found: {0}")]
    NotFound(String),
}

/// Write-back target for normalized artifacts.
#[async_trait]
pub trait CatalogPublisher: Send + Sync {
    /// Records `delivery` for `asset_key`, replacing any earlier record.
    async fn publish(&self, asset_key: &str, delivery: &Delivery) -> Result<(), PublishError>;

    /// Returns the current record for `asset_key`.
    async fn lookup(&self, asset_key: &str) -> Result<CatalogRecord, PublishError>;
}
