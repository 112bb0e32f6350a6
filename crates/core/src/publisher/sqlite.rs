//! SQLite-backed catalog of normalized assets.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{CatalogPublisher, CatalogRecord, PublishError};
use crate::ladder::Delivery;

/// SQLite-backed catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Opens the database at `path`, creating the file and table if needed.
    pub fn new(path: &Path) -> Result<Self, PublishError> {
        let conn = Connection::open(path).map_err(|e| PublishError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory catalog (useful for testing).
    pub fn in_memory() -> Result<Self, PublishError> {
        let conn =
            Connection::open_in_memory().map_err(|e| PublishError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PublishError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS normalized_assets (
                asset_key TEXT PRIMARY KEY,
                normalized_path TEXT NOT NULL,
                byte_size INTEGER NOT NULL,
                oversized INTEGER NOT NULL DEFAULT 0,
                rung_index INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| PublishError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PublishError> {
        self.conn
            .lock()
            .map_err(|e| PublishError::Database(format!("connection lock poisoned: {}", e)))
    }

    fn upsert(&self, record: &CatalogRecord) -> Result<(), PublishError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO normalized_assets
                (asset_key, normalized_path, byte_size, oversized, rung_index, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(asset_key) DO UPDATE SET
                normalized_path = excluded.normalized_path,
                byte_size = excluded.byte_size,
                oversized = excluded.oversized,
                rung_index = excluded.rung_index,
                updated_at = excluded.updated_at",
            params![
                record.asset_key,
                record.normalized_path.to_string_lossy(),
                record.byte_size as i64,
                record.oversized,
                record.rung_index as i64,
                record.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| PublishError::Database(e.to_string()))?;
        Ok(())
    }

    fn select(&self, asset_key: &str) -> Result<CatalogRecord, PublishError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT asset_key, normalized_path, byte_size, oversized, rung_index, updated_at
             FROM normalized_assets WHERE asset_key = ?",
            params![asset_key],
            |row| {
                let path: String = row.get(1)?;
                let byte_size: i64 = row.get(2)?;
                let rung_index: i64 = row.get(4)?;
                let updated_at_str: String = row.get(5)?;
                let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());

                Ok(CatalogRecord {
                    asset_key: row.get(0)?,
                    normalized_path: PathBuf::from(path),
                    byte_size: byte_size.max(0) as u64,
                    oversized: row.get(3)?,
                    rung_index: rung_index.max(0) as usize,
                    updated_at,
                })
            },
        )
        .optional()
        .map_err(|e| PublishError::Database(e.to_string()))?
        .ok_or_else(|| PublishError::NotFound(asset_key.to_string()))
    }

    /// Number of assets recorded.
    pub fn count(&self) -> Result<u64, PublishError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM normalized_assets", [], |row| row.get(0))
            .map_err(|e| PublishError::Database(e.to_string()))?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl CatalogPublisher for SqliteCatalog {
    async fn publish(&self, asset_key: &str, delivery: &Delivery) -> Result<(), PublishError> {
        self.upsert(&CatalogRecord::from_delivery(asset_key, delivery))
    }

    async fn lookup(&self, asset_key: &str) -> Result<CatalogRecord, PublishError> {
        self.select(asset_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::{Ladder, NormalizedArtifact};
    use crate::loudness::AudioLevelProfile;

    fn artifact(path: &str, size: u64, rung: usize) -> NormalizedArtifact {
        NormalizedArtifact {
            path: PathBuf::from(path),
            byte_size: size,
            output_extension: "mp4".to_string(),
            rung: Ladder::reference(240).rungs()[rung].clone(),
            passthrough: false,
            hardware: false,
            gain_db: Some(5.0),
            levels: AudioLevelProfile::fallback(),
            trimmed_to_secs: None,
            mezzanine_path: None,
            attempts: vec![],
        }
    }

    #[tokio::test]
    async fn test_publish_and_lookup() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let delivery = Delivery::Fits(artifact("/out/clip.mp4", 8_500_000, 2));

        catalog.publish("clip-1", &delivery).await.unwrap();

        let record = catalog.lookup("clip-1").await.unwrap();
        assert_eq!(record.normalized_path, PathBuf::from("/out/clip.mp4"));
        assert_eq!(record.byte_size, 8_500_000);
        assert_eq!(record.rung_index, 2);
        assert!(!record.oversized);
    }

    #[tokio::test]
    async fn test_republish_replaces_row() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        catalog
            .publish("clip-1", &Delivery::Fits(artifact("/out/a.mp4", 100, 0)))
            .await
            .unwrap();
        catalog
            .publish("clip-1", &Delivery::Oversized(artifact("/out/b.mp4", 200, 5)))
            .await
            .unwrap();

        assert_eq!(catalog.count().unwrap(), 1);
        let record = catalog.lookup("clip-1").await.unwrap();
        assert_eq!(record.normalized_path, PathBuf::from("/out/b.mp4"));
        assert!(record.oversized);
        assert_eq!(record.rung_index, 5);
    }

    #[tokio::test]
    async fn test_lookup_missing() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let result = catalog.lookup("nope").await;
        assert!(matches!(result, Err(PublishError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = dir.path().join("catalog.db");
        {
            let catalog = SqliteCatalog::new(&db).unwrap();
            catalog
                .publish("k", &Delivery::Fits(artifact("/out/k.mp3", 10, 1)))
                .await
                .unwrap();
        }
        let catalog = SqliteCatalog::new(&db).unwrap();
        assert_eq!(catalog.lookup("k").await.unwrap().byte_size, 10);
    }
}
