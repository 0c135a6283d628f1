//! Two-tier TTS cache
//!
//! Tier 1 is a bounded in-memory LRU of encoded audio. Tier 2 is a disk
//! directory of content-addressed files, also readable by the static
//! audio-serving endpoint the carrier fetches from.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::TtsError;

/// Content address for one synthesized utterance
///
/// Hashes only the synthesis inputs, so identical phrases are shared
/// across leads and calls.
pub fn audio_key(text: &str, voice: &str, format: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
    hasher.update(voice.as_bytes());
    hasher.update([0u8]);
    hasher.update(format.as_bytes());
    hex::encode(hasher.finalize())
}

struct MemoryLru {
    entries: HashMap<String, Arc<Vec<u8>>>,
    /// Keys ordered oldest-use first
    order: VecDeque<String>,
    capacity: usize,
}

impl MemoryLru {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&mut self, key: &str) -> Option<Arc<Vec<u8>>> {
        let value = self.entries.get(key).cloned()?;
        self.touch(key);
        Some(value)
    }

    fn insert(&mut self, key: String, value: Arc<Vec<u8>>) {
        if self.entries.insert(key.clone(), value).is_some() {
            self.touch(&key);
            return;
        }
        self.order.push_back(key);
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
            self.order.push_back(key.to_string());
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Cache statistics, exposed for the operator metrics endpoint
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TtsCacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub memory_entries: usize,
}

/// The two-tier store
pub struct TtsCache {
    memory: Mutex<MemoryLru>,
    stats: Mutex<TtsCacheStats>,
    cache_dir: PathBuf,
}

impl TtsCache {
    /// Open the cache, creating the disk directory if needed
    pub fn new(cache_dir: impl Into<PathBuf>, memory_capacity: usize) -> Result<Self, TtsError> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)
            .map_err(|e| TtsError::CacheIo(format!("create {}: {e}", cache_dir.display())))?;
        Ok(Self {
            memory: Mutex::new(MemoryLru::new(memory_capacity)),
            stats: Mutex::new(TtsCacheStats::default()),
            cache_dir,
        })
    }

    /// Filename of a cached entry, `<key>.<format>`
    pub fn filename(key: &str, format: &str) -> String {
        format!("{key}.{format}")
    }

    /// Absolute path of a cached entry on disk
    pub fn disk_path(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    /// Directory the audio-serving endpoint reads from
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Fetch from memory, falling back to disk (which refills memory)
    pub async fn get(&self, key: &str, format: &str) -> Option<Arc<Vec<u8>>> {
        if let Some(bytes) = self.memory.lock().get(key) {
            self.stats.lock().memory_hits += 1;
            tracing::debug!(target: "cache", tier = "tts_memory", key, "hit");
            return Some(bytes);
        }

        let path = self.disk_path(&Self::filename(key, format));
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let bytes = Arc::new(bytes);
                self.memory.lock().insert(key.to_string(), bytes.clone());
                self.stats.lock().disk_hits += 1;
                tracing::debug!(target: "cache", tier = "tts_disk", key, "hit");
                Some(bytes)
            }
            Err(_) => {
                self.stats.lock().misses += 1;
                None
            }
        }
    }

    /// Whether the entry exists in either tier, without reading bytes
    pub fn contains(&self, key: &str, format: &str) -> bool {
        if self.memory.lock().entries.contains_key(key) {
            return true;
        }
        self.disk_path(&Self::filename(key, format)).exists()
    }

    /// Populate both tiers
    pub async fn put(&self, key: &str, format: &str, bytes: Arc<Vec<u8>>) -> Result<(), TtsError> {
        let path = self.disk_path(&Self::filename(key, format));
        tokio::fs::write(&path, bytes.as_slice())
            .await
            .map_err(|e| TtsError::CacheIo(format!("write {}: {e}", path.display())))?;
        self.memory.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    pub fn stats(&self) -> TtsCacheStats {
        let mut stats = self.stats.lock().clone();
        stats.memory_entries = self.memory.lock().len();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_key_ignores_lead_and_varies_on_inputs() {
        let a = audio_key("hello", "alloy", "mp3");
        let b = audio_key("hello", "alloy", "mp3");
        assert_eq!(a, b);
        assert_ne!(a, audio_key("hello", "echo", "mp3"));
        assert_ne!(a, audio_key("hello", "alloy", "wav"));
        assert_ne!(a, audio_key("hi", "alloy", "mp3"));
    }

    #[test]
    fn test_lru_evicts_oldest_use() {
        let mut lru = MemoryLru::new(2);
        lru.insert("a".into(), Arc::new(vec![1]));
        lru.insert("b".into(), Arc::new(vec![2]));
        // Touch "a" so "b" becomes the LRU entry.
        assert!(lru.get("a").is_some());
        lru.insert("c".into(), Arc::new(vec![3]));
        assert!(lru.get("b").is_none());
        assert!(lru.get("a").is_some());
        assert!(lru.get("c").is_some());
    }

    #[test]
    fn test_lru_reinsert_updates_value() {
        let mut lru = MemoryLru::new(2);
        lru.insert("a".into(), Arc::new(vec![1]));
        lru.insert("a".into(), Arc::new(vec![9]));
        assert_eq!(lru.get("a").unwrap().as_slice(), &[9]);
        assert_eq!(lru.len(), 1);
    }

    #[tokio::test]
    async fn test_disk_roundtrip_refills_memory() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TtsCache::new(dir.path(), 2).unwrap();
        let key = audio_key("welcome", "alloy", "mp3");

        cache
            .put(&key, "mp3", Arc::new(vec![1, 2, 3]))
            .await
            .unwrap();

        // Fresh cache over the same dir: memory is cold, disk hits.
        let cache2 = TtsCache::new(dir.path(), 2).unwrap();
        let bytes = cache2.get(&key, "mp3").await.unwrap();
        assert_eq!(bytes.as_slice(), &[1, 2, 3]);
        assert_eq!(cache2.stats().disk_hits, 1);

        // Second read is a memory hit.
        let _ = cache2.get(&key, "mp3").await.unwrap();
        assert_eq!(cache2.stats().memory_hits, 1);
    }

    #[tokio::test]
    async fn test_miss_counted() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TtsCache::new(dir.path(), 2).unwrap();
        assert!(cache.get("missing", "mp3").await.is_none());
        assert_eq!(cache.stats().misses, 1);
    }
}
