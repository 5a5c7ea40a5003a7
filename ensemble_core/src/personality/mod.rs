//! Trait Provider - resolves characters to personality vectors.
//!
//! Lookups go cache first, then backend. A missing sheet resolves to the
//! default vector (and is cached as such); a failing backend also resolves to
//! the default vector but is retried on the next lookup.

mod backend;

pub use backend::*;

use cast_rules::{CharacterId, TraitVector};
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::TraitCacheConfig;
use crate::error::EngineError;

/// Resolved trait vectors keyed by character.
pub type TraitTable = HashMap<CharacterId, Arc<TraitVector>>;

/// Cached access to a [`TraitBackend`].
#[derive(Clone)]
pub struct TraitProvider {
    backend: Arc<dyn TraitBackend>,
    cache: Cache<CharacterId, Arc<TraitVector>>,
    fallback: Arc<TraitVector>,
}

impl std::fmt::Debug for TraitProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraitProvider")
            .field("backend", &"Arc<dyn TraitBackend>")
            .field("cache", &"Cache<CharacterId, Arc<TraitVector>>")
            .field("fallback", &self.fallback)
            .finish()
    }
}

impl TraitProvider {
    /// Create a provider over `backend` with the neutral default vector.
    pub fn new(backend: Arc<dyn TraitBackend>, config: &TraitCacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Self {
            backend,
            cache,
            fallback: Arc::new(TraitVector::neutral()),
        }
    }

    /// Replace the default vector used when no data exists.
    pub fn with_fallback(mut self, fallback: TraitVector) -> Self {
        self.fallback = Arc::new(fallback);
        self
    }

    /// The vector used when no data exists.
    pub fn fallback(&self) -> Arc<TraitVector> {
        Arc::clone(&self.fallback)
    }

    /// Resolve one character. Never fails.
    pub async fn resolve(&self, id: CharacterId) -> Arc<TraitVector> {
        if let Some(hit) = self.cache.get(&id).await {
            return hit;
        }

        match self.backend.fetch_traits(id).await {
            Ok(Some(traits)) => {
                let traits = Arc::new(traits);
                self.cache.insert(id, Arc::clone(&traits)).await;
                traits
            }
            Ok(None) => {
                debug!(character = %id, "No trait sheet, using defaults");
                self.cache.insert(id, Arc::clone(&self.fallback)).await;
                Arc::clone(&self.fallback)
            }
            Err(e) => {
                let err = EngineError::TraitResolution {
                    character: id,
                    reason: e.to_string(),
                };
                warn!(error = %err, "Falling back to default traits");
                Arc::clone(&self.fallback)
            }
        }
    }

    /// Resolve several characters.
    pub async fn resolve_all(&self, ids: &[CharacterId]) -> TraitTable {
        let mut table = HashMap::with_capacity(ids.len());
        for id in ids {
            table.insert(*id, self.resolve(*id).await);
        }
        table
    }

    /// Drop one cached vector so the next lookup hits the backend.
    pub async fn invalidate(&self, id: CharacterId) {
        self.cache.invalidate(&id).await;
    }

    /// Drop every cached vector.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }
}
