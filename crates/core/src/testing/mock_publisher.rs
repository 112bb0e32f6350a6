//! Mock catalog publisher for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::ladder::Delivery;
use crate::publisher::{CatalogPublisher, CatalogRecord, PublishError};

/// Mock implementation of the CatalogPublisher trait.
///
/// Records every publish and can be told to fail. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockPublisher {
    published: Arc<RwLock<Vec<CatalogRecord>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent publishes fail.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Get all published records, oldest first.
    pub async fn published(&self) -> Vec<CatalogRecord> {
        self.published.read().await.clone()
    }
}

#[async_trait]
impl CatalogPublisher for MockPublisher {
    async fn publish(&self, asset_key: &str, delivery: &Delivery) -> Result<(), PublishError> {
        if *self.fail.read().await {
            return Err(PublishError::Database("mock publish failure".to_string()));
        }
        self.published
            .write()
            .await
            .push(CatalogRecord::from_delivery(asset_key, delivery));
        Ok(())
    }

    async fn lookup(&self, asset_key: &str) -> Result<CatalogRecord, PublishError> {
        self.published
            .read()
            .await
            .iter()
            .rev()
            .find(|r| r.asset_key == asset_key)
            .cloned()
            .ok_or_else(|| PublishError::NotFound(asset_key.to_string()))
    }
}
