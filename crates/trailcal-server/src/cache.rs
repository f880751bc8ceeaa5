//! Content cache: canonical key to standardized event.
//!
//! Entries are written once per distinct canonical content and never
//! updated. Read failures of any kind are reported as a miss so the caller
//! recomputes instead of failing.

use std::sync::Arc;

use tracing::{debug, warn};
use trailcal_core::{CalendarObject, EVENT_TAG, parse_as, serialize};

use crate::store::{KvStore, MAX_BATCH_KEYS, StoreResult};

/// Cache of standardized events, backed by a [`KvStore`].
#[derive(Clone)]
pub struct ContentCache {
    store: Arc<dyn KvStore>,
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache").finish_non_exhaustive()
    }
}

impl ContentCache {
    /// Creates a cache over the given store.
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Looks up one key.
    pub async fn get(&self, key: &str) -> Option<CalendarObject> {
        match self.store.get(key).await {
            Ok(Some(text)) => decode(key, &text),
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Looks up many keys. The result is aligned with `keys`; lookups are
    /// split into batches the store accepts.
    pub async fn get_many(&self, keys: &[String]) -> Vec<Option<CalendarObject>> {
        let mut results = Vec::with_capacity(keys.len());

        for chunk in keys.chunks(MAX_BATCH_KEYS) {
            match self.store.batch_get(chunk.to_vec()).await {
                Ok(mut found) => results.extend(
                    chunk
                        .iter()
                        .map(|key| found.remove(key).and_then(|text| decode(key, &text))),
                ),
                Err(e) => {
                    warn!(keys = chunk.len(), error = %e, "Batch cache read failed, treating as misses");
                    results.extend(chunk.iter().map(|_| None));
                }
            }
        }

        debug!(
            requested = keys.len(),
            hits = results.iter().filter(|r| r.is_some()).count(),
            "Batch cache lookup"
        );
        results
    }

    /// Stores a standardized event under `key`.
    pub async fn put(&self, key: &str, event: &CalendarObject) -> StoreResult<()> {
        self.store.put(key, serialize(event)).await
    }
}

fn decode(key: &str, text: &str) -> Option<CalendarObject> {
    parse_as(text, EVENT_TAG)
        .map_err(|e| warn!(key = %key, error = %e, "Discarding undecodable cache entry"))
        .ok()
}
