//! Two-tier cache: an in-process map (tier-1) backed by a filesystem
//! directory (tier-2). Tier-1 is authoritative on hit; a tier-2 hit promotes
//! into tier-1; writes go to both. Live endpoints never call through here
//! (see `ApiClient`).

use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
struct Entry {
    value: serde_json::Value,
    expires_at_ms: i64,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Maps a cache key to a filesystem-safe path segment: ASCII-safe
/// characters pass through, everything else (including the full key, to
/// avoid collisions between keys that differ only in an encoded segment) is
/// folded through a SHA-256 digest appended to a truncated, sanitized
/// prefix.
fn key_to_filename(key: &str) -> String {
    let safe_prefix: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();

    format!("{safe_prefix}-{}.json", &hex[..16])
}

#[derive(Debug, Serialize, serde::Deserialize)]
struct PersistedEntry {
    value: serde_json::Value,
    expires_at_ms: i64,
}

/// A TTL'd, keyed store with an in-memory tier and a filesystem tier.
pub struct CacheStore {
    tier1: Mutex<HashMap<String, Entry>>,
    tier2_dir: PathBuf,
}

impl CacheStore {
    /// `tier2_dir` is created lazily on first write.
    pub fn new(tier2_dir: PathBuf) -> Self {
        Self {
            tier1: Mutex::new(HashMap::new()),
            tier2_dir,
        }
    }

    /// A `CacheStore` rooted at the platform cache directory, e.g.
    /// `~/.cache/tra` on Linux.
    pub fn with_default_dir() -> Self {
        let dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("tra");
        Self::new(dir)
    }

    fn tier2_path(&self, key: &str) -> PathBuf {
        self.tier2_dir.join(key_to_filename(key))
    }

    /// Reads tier-1 first; on miss, attempts tier-2 and promotes into
    /// tier-1 on hit. Expired entries in either tier are treated as a miss
    /// and evicted.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(entry) = self.get_tier1_if_fresh(key) {
            return serde_json::from_value(entry.value).ok();
        }

        let path = self.tier2_path(key);
        let contents = tokio::fs::read(&path).await.ok()?;
        let persisted: PersistedEntry = serde_json::from_slice(&contents).ok()?;

        if persisted.expires_at_ms <= now_ms() {
            let _ = tokio::fs::remove_file(&path).await;
            return None;
        }

        let mut tier1 = self.tier1.lock().unwrap_or_else(|e| e.into_inner());
        tier1.insert(
            key.to_string(),
            Entry {
                value: persisted.value.clone(),
                expires_at_ms: persisted.expires_at_ms,
            },
        );
        drop(tier1);

        serde_json::from_value(persisted.value).ok()
    }

    fn get_tier1_if_fresh(&self, key: &str) -> Option<Entry> {
        let mut tier1 = self.tier1.lock().unwrap_or_else(|e| e.into_inner());
        match tier1.get(key) {
            Some(entry) if entry.expires_at_ms > now_ms() => Some(entry.clone()),
            Some(_) => {
                tier1.remove(key);
                None
            }
            None => None,
        }
    }

    /// Writes to both tiers. `ttl` is required: callers decide per-endpoint
    /// TTLs (see the endpoint TTL table); there is no default.
    pub async fn put<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> std::io::Result<()> {
        let value = serde_json::to_value(value).expect("cache value must serialize");
        let expires_at_ms = now_ms() + ttl.as_millis() as i64;

        {
            let mut tier1 = self.tier1.lock().unwrap_or_else(|e| e.into_inner());
            tier1.insert(
                key.to_string(),
                Entry {
                    value: value.clone(),
                    expires_at_ms,
                },
            );
        }

        self.write_tier2(key, &value, expires_at_ms).await
    }

    async fn write_tier2(
        &self,
        key: &str,
        value: &serde_json::Value,
        expires_at_ms: i64,
    ) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.tier2_dir).await?;
        let path = self.tier2_path(key);
        let tmp_path = path.with_extension("json.tmp");

        let persisted = PersistedEntry {
            value: value.clone(),
            expires_at_ms,
        };
        let bytes = serde_json::to_vec(&persisted).expect("cache entry must serialize");

        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }

    pub fn invalidate(&self, key: &str) {
        let mut tier1 = self.tier1.lock().unwrap_or_else(|e| e.into_inner());
        tier1.remove(key);
    }

    #[cfg(test)]
    pub(crate) fn tier2_dir(&self) -> &Path {
        &self.tier2_dir
    }
}
