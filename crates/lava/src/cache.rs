// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiled template caching.
//!
//! Templates are keyed by their raw source (before rewriting), so rendering
//! the same text twice compiles it once.
//!
//! - [`MemoryCache`]: in-memory LRU cache
//! - [`NoOpCache`]: never stores anything, used when the capacity is zero
//!
//! Implement [`TemplateCache`] for other strategies.

use crate::error::{LavaError, Result};
use crate::template::Template;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Storage for compiled templates. Implementations must be thread-safe.
pub trait TemplateCache: Send + Sync + std::fmt::Debug {
    /// Looks up a compiled template.
    fn get(&self, source: &str) -> Result<Option<Arc<Template>>>;
    /// Stores a compiled template under its raw source.
    fn set(&self, source: &str, template: Arc<Template>) -> Result<()>;
    /// Drops every entry.
    fn clear(&self) -> Result<()>;
    /// Number of cached templates.
    fn len(&self) -> usize;
    /// Returns true when nothing is cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory LRU cache.
///
/// The least recently used template is evicted once `capacity` entries are
/// stored.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    cache: Arc<Mutex<LruCache<String, Arc<Template>>>>,
}

impl MemoryCache {
    /// Creates a cache holding up to `capacity` templates.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, Arc<Template>>>> {
        self.cache
            .lock()
            .map_err(|_| LavaError::CacheError("Failed to acquire cache lock".to_string()))
    }
}

impl TemplateCache for MemoryCache {
    fn get(&self, source: &str) -> Result<Option<Arc<Template>>> {
        Ok(self.lock()?.get(source).cloned())
    }

    fn set(&self, source: &str, template: Arc<Template>) -> Result<()> {
        self.lock()?.put(source.to_string(), template);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    fn len(&self) -> usize {
        self.lock().map(|cache| cache.len()).unwrap_or(0)
    }
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCache;

impl TemplateCache for NoOpCache {
    fn get(&self, _source: &str) -> Result<Option<Arc<Template>>> {
        Ok(None)
    }

    fn set(&self, _source: &str, _template: Arc<Template>) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> usize {
        0
    }
}

/// Builds the cache for a configured capacity; zero disables caching.
pub fn cache_for_capacity(capacity: usize) -> Box<dyn TemplateCache> {
    match NonZeroUsize::new(capacity) {
        Some(capacity) => Box::new(MemoryCache::new(capacity)),
        None => Box::new(NoOpCache),
    }
}
