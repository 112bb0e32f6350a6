//! In-memory cache of delivered artifacts.
//!
//! Keys combine a SHA-256 of the source bytes with a fingerprint of every
//! setting that influences the output, so an edited file or a changed
//! config never returns a stale artifact.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::CacheConfig;
use crate::ladder::Delivery;

struct CacheEntry {
    delivery: Delivery,
    inserted_at: Instant,
}

/// TTL and capacity bounded map from cache key to delivered artifact.
pub struct ArtifactCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl ArtifactCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.max_entries)
    }

    /// Returns the cached delivery when it is fresh and its file still exists.
    ///
    /// Expired entries and entries whose artifact vanished are dropped.
    pub fn get(&self, key: &str) -> Option<Delivery> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;

        if entry.inserted_at.elapsed() > self.ttl {
            debug!(key, "Cache entry expired");
            entries.remove(key);
            return None;
        }
        if !entry.delivery.artifact().path.is_file() {
            debug!(key, "Cached artifact is gone");
            entries.remove(key);
            return None;
        }

        Some(entry.delivery.clone())
    }

    /// Stores `delivery`, evicting expired entries and then the oldest one
    /// when the cache is full.
    pub fn insert(&self, key: String, delivery: Delivery) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let ttl = self.ttl;
            entries.retain(|_, e| e.inserted_at.elapsed() <= ttl);

            if entries.len() >= self.max_entries {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    debug!(key = %oldest, "Evicting oldest cache entry");
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                delivery,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

/// Hex SHA-256 of any serializable settings value.
pub fn fingerprint<S: Serialize>(settings: &S) -> String {
    let bytes = serde_json::to_vec(settings).unwrap_or_default();
    format!("{:x}", Sha256::digest(&bytes))
}

/// Cache key for `path` under the given settings fingerprint.
///
/// Hashing runs on the blocking pool; the file is streamed, not loaded.
pub async fn content_key(path: &Path, fingerprint: &str) -> std::io::Result<String> {
    let path: PathBuf = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || hash_file(&path))
        .await
        .map_err(std::io::Error::other)??;
    Ok(format!("{}:{}", digest, fingerprint))
}

/// Short file-name-safe tag derived from a cache key.
pub fn tag(key: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(key.as_bytes()));
    digest[..12].to_string()
}

fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
