//! Result Cache — persists the last ranked snapshot and the presentation mode.
//!
//! A snapshot is encoded in full before it is handed to the store as one
//! value, so a reader sees either the previous snapshot or the new one.
//! Anything that fails to decode is treated as an empty cache.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::screening::ranker::RankedCandidate;
use crate::store::{KvStore, StoreError};

pub const RESULTS_KEY: &str = "srs:lastResults:v1";
pub const VIEW_MODE_KEY: &str = "srs:viewMode:v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub captured_at: DateTime<Utc>,
    pub results: Vec<RankedCandidate>,
}

/// How the presentation layer lays out the ranked list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Table,
    Card,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Table => "table",
            ViewMode::Card => "card",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "table" => Some(ViewMode::Table),
            "card" => Some(ViewMode::Card),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn KvStore>,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, snapshot: &ResultSnapshot) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(snapshot)?;
        self.store.set(RESULTS_KEY, &encoded).await?;
        debug!("Cached snapshot with {} results", snapshot.results.len());
        Ok(())
    }

    /// Most recently saved snapshot. Store failures and undecodable values
    /// both read as `None`.
    pub async fn load(&self) -> Option<ResultSnapshot> {
        let raw = match self.store.get(RESULTS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Result cache unavailable, starting empty: {e}");
                return None;
            }
        };

        match serde_json::from_str::<ResultSnapshot>(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Discarding corrupt result cache: {e}");
                None
            }
        }
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.delete(RESULTS_KEY).await?;
        Ok(())
    }

    pub async fn load_view_mode(&self) -> Option<ViewMode> {
        match self.store.get(VIEW_MODE_KEY).await {
            Ok(raw) => raw.as_deref().and_then(ViewMode::parse),
            Err(e) => {
                warn!("View mode unavailable: {e}");
                None
            }
        }
    }

    pub async fn save_view_mode(&self, mode: ViewMode) -> Result<(), CacheError> {
        self.store.set(VIEW_MODE_KEY, mode.as_str()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::aggregator::fold;
    use crate::screening::classifier::TierThresholds;
    use crate::screening::ranker::rank;
    use crate::screening::test_support::{event, flagged};
    use crate::store::MemoryStore;

    fn snapshot() -> ResultSnapshot {
        ResultSnapshot {
            captured_at: Utc::now(),
            results: rank(
                fold(vec![
                    event("a", Some(8.2)),
                    flagged("b", Some(6.7), Some(false)),
                    event("c", Some(f64::NAN)),
                ]),
                &TierThresholds::default(),
            ),
        }
    }

    #[tokio::test]
    async fn test_load_returns_last_saved() {
        let cache = ResultCache::new(Arc::new(MemoryStore::new()));
        assert!(cache.load().await.is_none());

        let first = snapshot();
        cache.save(&first).await.unwrap();
        let second = ResultSnapshot {
            captured_at: Utc::now(),
            results: first.results[..1].to_vec(),
        };
        cache.save(&second).await.unwrap();

        assert_eq!(cache.load().await, Some(second));
    }

    #[tokio::test]
    async fn test_clear_empties_cache() {
        let cache = ResultCache::new(Arc::new(MemoryStore::new()));
        cache.save(&snapshot()).await.unwrap();
        cache.clear().await.unwrap();
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_reads_as_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(RESULTS_KEY, "{\"results\": [oops").await.unwrap();
        let cache = ResultCache::new(store);
        assert!(cache.load().await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_keeps_order_and_tiers() {
        let cache = ResultCache::new(Arc::new(MemoryStore::new()));
        let saved = snapshot();
        cache.save(&saved).await.unwrap();

        let loaded = cache.load().await.unwrap();
        let tiers: Vec<_> = loaded.results.iter().map(|r| r.tier).collect();
        let expected: Vec<_> = saved.results.iter().map(|r| r.tier).collect();
        assert_eq!(tiers, expected);
        assert_eq!(loaded.results[0].record.identity.as_str(), "id:a");
    }

    #[tokio::test]
    async fn test_view_mode_round_trip_and_garbage() {
        let store = Arc::new(MemoryStore::new());
        let cache = ResultCache::new(store.clone());
        assert_eq!(cache.load_view_mode().await, None);

        cache.save_view_mode(ViewMode::Card).await.unwrap();
        assert_eq!(cache.load_view_mode().await, Some(ViewMode::Card));

        store.set(VIEW_MODE_KEY, "grid").await.unwrap();
        assert_eq!(cache.load_view_mode().await, None);
    }
}
