//! Write-through lyric cache keyed by normalized (title, artist).
//!
//! Entries never expire for the lifetime of the cache. Misses are not
//! cached, and concurrent lookups of the same key are not coalesced: two
//! overlapping misses both reach the provider.

use crate::error::Failure;
use crate::lyrics::LyricRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Remote lyric search provider.
#[async_trait]
pub trait LyricSearch: Send + Sync {
    async fn search(&self, title: &str, artist: &str) -> Result<Option<LyricRecord>, Failure>;
}

/// Case-insensitive, whitespace-trimmed identity of a track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    title: String,
    artist: String,
}

impl CacheKey {
    pub fn new(title: &str, artist: &str) -> Self {
        Self {
            title: title.trim().to_lowercase(),
            artist: artist.trim().to_lowercase(),
        }
    }
}

pub struct LyricCache<S> {
    provider: S,
    entries: Mutex<HashMap<CacheKey, Arc<LyricRecord>>>,
}

impl<S: LyricSearch> LyricCache<S> {
    pub fn new(provider: S) -> Self {
        Self {
            provider,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up lyrics, hitting the provider at most once per miss. Provider
    /// failures are logged and reported as `None`.
    pub async fn search(&self, title: &str, artist: &str) -> Option<Arc<LyricRecord>> {
        if title.trim().is_empty() || artist.trim().is_empty() {
            return None;
        }

        let key = CacheKey::new(title, artist);
        if let Some(hit) = self.get(&key) {
            debug!("lyrics cache hit: {} by {}", title, artist);
            return Some(hit);
        }

        info!("Searching lyrics for: {} by {}", title, artist);
        match self.provider.search(title, artist).await {
            Ok(Some(record)) => {
                let record = Arc::new(record);
                self.insert(key, Arc::clone(&record));
                Some(record)
            }
            Ok(None) => {
                info!("No lyrics found for: {} by {}", title, artist);
                None
            }
            Err(e) => {
                warn!("Lyric search failed for {} by {}: {}", title, artist, e);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn get(&self, key: &CacheKey) -> Option<Arc<LyricRecord>> {
        self.lock().get(key).cloned()
    }

    fn insert(&self, key: CacheKey, record: Arc<LyricRecord>) {
        self.lock().insert(key, record);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Arc<LyricRecord>>> {
        // Entries are inserted whole, so a poisoned map is still consistent.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
