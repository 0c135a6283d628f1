//! Bounded TTL response cache
//!
//! Keyed by (state, lead, normalized-utterance hash) so a repeated
//! utterance in the same state skips the LLM entirely. The hash is a
//! 4-byte FNV-1a; collisions are tolerable because the key also carries
//! the lead id and state.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use uuid::Uuid;

use salesline_core::SalesState;

/// Lowercase, trim, collapse internal whitespace. Idempotent.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 4-byte FNV-1a
pub fn fnv1a32(s: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in s.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Cache key for one (state, lead, utterance) triple
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub state_id: u8,
    pub lead_id: Uuid,
    pub text_hash: u32,
}

impl CacheKey {
    pub fn new(state: SalesState, lead_id: Uuid, user_text: &str) -> Self {
        Self {
            state_id: state.id(),
            lead_id,
            text_hash: fnv1a32(&normalize(user_text)),
        }
    }
}

struct CacheEntry {
    reply: String,
    expires_at: Instant,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ResponseCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub evictions: u64,
}

struct CacheInner {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Insertion order for oldest-first eviction
    order: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Bounded mapping from key to (reply, expiry)
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Look up an unexpired reply
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                let reply = entry.reply.clone();
                inner.hits += 1;
                tracing::debug!(target: "cache", tier = "response", state_id = key.state_id, "hit");
                Some(reply)
            }
            Some(_) => {
                // Expired: drop it eagerly.
                inner.entries.remove(key);
                if let Some(pos) = inner.order.iter().position(|k| k == key) {
                    inner.order.remove(pos);
                }
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a reply, evicting oldest insertions on overflow
    pub fn set(&self, key: CacheKey, reply: impl Into<String>) {
        let mut inner = self.inner.lock();
        let entry = CacheEntry {
            reply: reply.into(),
            expires_at: Instant::now() + self.ttl,
        };
        if inner.entries.insert(key, entry).is_none() {
            inner.order.push_back(key);
        }
        while inner.entries.len() > self.max_entries {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                inner.evictions += 1;
            } else {
                break;
            }
        }
    }

    pub fn stats(&self) -> ResponseCacheStats {
        let inner = self.inner.lock();
        ResponseCacheStats {
            hits: inner.hits,
            misses: inner.misses,
            entries: inner.entries.len(),
            evictions: inner.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(state: SalesState, lead: Uuid, text: &str) -> CacheKey {
        CacheKey::new(state, lead, text)
    }

    #[test]
    fn test_normalize_idempotent() {
        let cases = ["  Hello   WORLD  ", "a\tb\nc", "", "already normal"];
        for s in cases {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  Sure,   GO \t ahead \n"), "sure, go ahead");
    }

    #[test]
    fn test_fnv1a32_known_values() {
        // FNV-1a reference vectors.
        assert_eq!(fnv1a32(""), 0x811c_9dc5);
        assert_eq!(fnv1a32("a"), 0xe40c_292c);
    }

    #[test]
    fn test_key_equivalent_utterances_collide_on_purpose() {
        let lead = Uuid::new_v4();
        let a = key(SalesState::DiscoveryOpen, lead, "  Sure,  go AHEAD ");
        let b = key(SalesState::DiscoveryOpen, lead, "sure, go ahead");
        assert_eq!(a, b);
    }

    #[test]
    fn test_hit_within_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(60), 10);
        let lead = Uuid::new_v4();
        let k = key(SalesState::DiscoveryOpen, lead, "hello");
        cache.set(k, "How do you handle this today?");
        assert_eq!(
            cache.get(&k).as_deref(),
            Some("How do you handle this today?")
        );
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_expired_entry_not_returned() {
        let cache = ResponseCache::new(Duration::from_millis(0), 10);
        let k = key(SalesState::DiscoveryOpen, Uuid::new_v4(), "hello");
        cache.set(k, "reply");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&k), None);
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_eviction_oldest_insertion_first() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        let lead = Uuid::new_v4();
        let k1 = key(SalesState::Greeting, lead, "one");
        let k2 = key(SalesState::Greeting, lead, "two");
        let k3 = key(SalesState::Greeting, lead, "three");
        cache.set(k1, "r1");
        cache.set(k2, "r2");
        cache.set(k3, "r3");
        assert_eq!(cache.get(&k1), None);
        assert_eq!(cache.get(&k2).as_deref(), Some("r2"));
        assert_eq!(cache.get(&k3).as_deref(), Some("r3"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_overwrite_does_not_grow() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        let k = key(SalesState::Greeting, Uuid::new_v4(), "one");
        cache.set(k, "a");
        cache.set(k, "b");
        assert_eq!(cache.stats().entries, 1);
        assert_eq!(cache.get(&k).as_deref(), Some("b"));
    }

    #[test]
    fn test_different_leads_do_not_share() {
        let cache = ResponseCache::new(Duration::from_secs(60), 10);
        let k1 = key(SalesState::DiscoveryOpen, Uuid::new_v4(), "hello");
        let k2 = key(SalesState::DiscoveryOpen, Uuid::new_v4(), "hello");
        cache.set(k1, "for lead one");
        assert_eq!(cache.get(&k2), None);
    }
}
