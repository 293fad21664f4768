//! Per-URL response cache with time-boxed reads.
//!
//! Entries are keyed by the CRC-32 of the URL. The key is only a filename;
//! a collision costs a cache miss, never wrong data, because each entry
//! stores the URL it was written for and reads compare it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::crc32::cache_key;

/// Largest age bound chrono can represent in minutes.
const MAX_AGE_MINUTES: i64 = i64::MAX / 60_000;

/// Entries kept by the in-memory backend before the oldest is evicted.
pub const MEMORY_CAPACITY: usize = 512;

/// Distinguishes temp files of concurrent writers within one process.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// A stored response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub url: String,
    pub payload: Value,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.stored_at
    }
}

#[derive(Debug)]
enum Backend {
    Memory {
        entries: Mutex<HashMap<String, CacheEntry>>,
        capacity: usize,
    },
    Disk(PathBuf),
}

/// Response cache. Concurrent writes to one key are last-write-wins.
#[derive(Debug)]
pub struct ResponseCache {
    backend: Backend,
}

impl ResponseCache {
    pub fn in_memory() -> Self {
        Self::in_memory_with_capacity(MEMORY_CAPACITY)
    }

    /// Memory cache holding at most `capacity` entries (minimum one).
    pub fn in_memory_with_capacity(capacity: usize) -> Self {
        Self {
            backend: Backend::Memory {
                entries: Mutex::new(HashMap::new()),
                capacity: capacity.max(1),
            },
        }
    }

    /// Cache stored as `<dir>/<key>.json`. The directory is created lazily.
    pub fn on_disk(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Disk(dir.into()),
        }
    }

    /// Returns the payload for `url` if present and no older than
    /// `max_age_minutes`. `None` as the age bound accepts any age.
    pub async fn read(&self, url: &str, max_age_minutes: Option<u64>) -> Option<Value> {
        self.read_at(url, max_age_minutes, Utc::now()).await
    }

    async fn read_at(
        &self,
        url: &str,
        max_age_minutes: Option<u64>,
        now: DateTime<Utc>,
    ) -> Option<Value> {
        let entry = self.load(url).await?;
        if entry.url != url {
            debug!("cache key collision for {}", url);
            return None;
        }
        if let Some(max_age) = max_age_minutes {
            let minutes = i64::try_from(max_age).unwrap_or(i64::MAX).min(MAX_AGE_MINUTES);
            let max_age = Duration::minutes(minutes);
            if entry.age(now) > max_age {
                return None;
            }
        }
        Some(entry.payload)
    }

    pub async fn write(&self, url: &str, payload: &Value) {
        self.write_at(url, payload, Utc::now()).await;
    }

    pub(crate) async fn write_at(&self, url: &str, payload: &Value, now: DateTime<Utc>) {
        let entry = CacheEntry {
            key: cache_key(url),
            url: url.to_string(),
            payload: payload.clone(),
            stored_at: now,
        };

        match &self.backend {
            Backend::Memory { entries, capacity } => {
                if let Ok(mut map) = entries.lock() {
                    if !map.contains_key(&entry.key) && map.len() >= *capacity {
                        evict_oldest(&mut map);
                    }
                    map.insert(entry.key.clone(), entry);
                }
            }
            Backend::Disk(dir) => {
                if let Err(e) = write_file(dir, &entry).await {
                    warn!("cache write failed for {}: {}", url, e);
                }
            }
        }
    }

    async fn load(&self, url: &str) -> Option<CacheEntry> {
        let key = cache_key(url);
        match &self.backend {
            Backend::Memory { entries, .. } => {
                let entry = entries.lock().ok()?.get(&key).cloned();
                entry
            }
            Backend::Disk(dir) => {
                let text = tokio::fs::read_to_string(entry_path(dir, &key)).await.ok()?;
                serde_json::from_str(&text).ok()
            }
        }
    }
}

fn evict_oldest(map: &mut HashMap<String, CacheEntry>) {
    let oldest = map
        .values()
        .min_by_key(|e| e.stored_at)
        .map(|e| e.key.clone());
    if let Some(key) = oldest {
        debug!("evicting cache entry for {}", map[&key].url);
        map.remove(&key);
    }
}

fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

/// Writes to a temp file and renames it over the entry so readers never
/// see a partial file.
async fn write_file(dir: &Path, entry: &CacheEntry) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let path = entry_path(dir, &entry.key);
    let seq = WRITE_SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp = dir.join(format!("{}.{}.{}.tmp", entry.key, std::process::id(), seq));
    let text = serde_json::to_vec(entry)?;
    tokio::fs::write(&tmp, text).await?;
    tokio::fs::rename(&tmp, &path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URL: &str = "https://api.weather.gov/gridpoints/TOP/31,80/forecast";

    #[tokio::test]
    async fn test_memory_read_write() {
        let cache = ResponseCache::in_memory();
        assert!(cache.read(URL, Some(10)).await.is_none());
        cache.write(URL, &json!({"a": 1})).await;
        assert_eq!(cache.read(URL, Some(10)).await, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_expired_entry_only_readable_without_bound() {
        let cache = ResponseCache::in_memory();
        let written = Utc::now() - Duration::minutes(30);
        cache.write_at(URL, &json!({"old": true}), written).await;

        let now = Utc::now();
        assert!(cache.read_at(URL, Some(10), now).await.is_none());
        assert_eq!(cache.read_at(URL, None, now).await, Some(json!({"old": true})));
    }

    #[tokio::test]
    async fn test_zero_ttl_rejects_aged_entries() {
        let cache = ResponseCache::in_memory();
        let written = Utc::now() - Duration::seconds(5);
        cache.write_at(URL, &json!(1), written).await;
        assert!(cache.read(URL, Some(0)).await.is_none());
    }

    #[tokio::test]
    async fn test_disk_round_trip_uses_hex_filename() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::on_disk(dir.path().join("cache"));
        cache.write(URL, &json!({"periods": []})).await;

        let path = dir.path().join("cache").join(format!("{}.json", cache_key(URL)));
        assert!(path.exists());
        assert_eq!(cache.read(URL, Some(10)).await, Some(json!({"periods": []})));

        // A second cache over the same directory sees the entry.
        let reopened = ResponseCache::on_disk(dir.path().join("cache"));
        assert!(reopened.read(URL, Some(10)).await.is_some());
    }

    #[tokio::test]
    async fn test_disk_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::on_disk(dir.path());
        cache.write(URL, &json!(1)).await;
        cache.write(URL, &json!(2)).await;
        assert_eq!(cache.read(URL, None).await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_memory_evicts_oldest_at_capacity() {
        let cache = ResponseCache::in_memory_with_capacity(2);
        let now = Utc::now();
        cache.write_at("https://a", &json!("a"), now - Duration::minutes(3)).await;
        cache.write_at("https://b", &json!("b"), now - Duration::minutes(2)).await;
        // Rewriting an existing key does not evict.
        cache.write_at("https://b", &json!("b2"), now - Duration::minutes(1)).await;
        assert!(cache.read("https://a", None).await.is_some());

        cache.write_at("https://c", &json!("c"), now).await;
        assert!(cache.read("https://a", None).await.is_none());
        assert_eq!(cache.read("https://b", None).await, Some(json!("b2")));
        assert_eq!(cache.read("https://c", None).await, Some(json!("c")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_disk_writes_to_one_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                tokio::spawn(async move {
                    let entry = CacheEntry {
                        key: cache_key(URL),
                        url: URL.to_string(),
                        payload: json!({ "writer": i }),
                        stored_at: Utc::now(),
                    };
                    write_file(&path, &entry).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let names: Vec<String> = std::fs::read_dir(&path)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", cache_key(URL))]);

        let cache = ResponseCache::on_disk(&path);
        assert!(cache.read(URL, None).await.is_some());
    }

    #[tokio::test]
    async fn test_missing_disk_dir_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::on_disk(dir.path().join("absent"));
        assert!(cache.read(URL, None).await.is_none());
    }
}
