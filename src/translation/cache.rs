/*!
 * Line translation cache.
 *
 * Successful direct translations are remembered per normalized source text
 * and target language, so repeated cues and reruns hit the backend once.
 * The cache holds at most `capacity` entries; the oldest insertion is evicted
 * first.
 */

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::debug;
use parking_lot::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source_text: String,
    target_language: String,
}

impl CacheKey {
    fn new(source_text: &str, target_language: &str) -> Self {
        Self {
            source_text: source_text.to_string(),
            target_language: target_language.trim().to_lowercase(),
        }
    }
}

/// Hit/miss counters snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub hit_rate: f64,
}

/// Entries used when no capacity is given
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

#[derive(Debug, Default)]
struct CacheEntries {
    map: HashMap<CacheKey, String>,
    // Insertion order, oldest first
    order: VecDeque<CacheKey>,
}

/// Shared translation cache; clones see the same entries
#[derive(Debug, Clone)]
pub struct TranslationCache {
    entries: Arc<RwLock<CacheEntries>>,
    hits: Arc<AtomicUsize>,
    misses: Arc<AtomicUsize>,
    capacity: usize,
    enabled: bool,
}

impl TranslationCache {
    pub fn new(enabled: bool) -> Self {
        Self::with_capacity(enabled, DEFAULT_CACHE_CAPACITY)
    }

    /// Cache holding at most `capacity` entries (at least 1)
    pub fn with_capacity(enabled: bool, capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(CacheEntries::default())),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            capacity: capacity.max(1),
            enabled,
        }
    }

    /// A cache that never stores anything
    pub fn disabled() -> Self {
        Self::new(false)
    }

    pub fn get(&self, source_text: &str, target_language: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let key = CacheKey::new(source_text, target_language);
        match self.entries.read().map.get(&key) {
            Some(translation) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for '{}' ({})", truncate_text(source_text, 30), key.target_language);
                Some(translation.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn store(&self, source_text: &str, target_language: &str, translation: &str) {
        if !self.enabled {
            return;
        }

        let key = CacheKey::new(source_text, target_language);
        let mut entries = self.entries.write();
        if entries.map.insert(key.clone(), translation.to_string()).is_some() {
            return;
        }
        entries.order.push_back(key);

        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.map.remove(&oldest);
                debug!("Evicted '{}' from the translation cache", truncate_text(&oldest.source_text, 30));
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
        }
    }

    pub fn clear(&self) {
        {
            let mut entries = self.entries.write();
            entries.map.clear();
            entries.order.clear();
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Translation cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Truncate text on a char boundary for log output
fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}
