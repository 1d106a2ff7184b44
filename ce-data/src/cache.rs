//! Per-process TTL cache over the two directory datasets.
//!
//! Each slot is refreshed independently and replaced wholesale. The slot lock
//! is released before the remote fetch, so two callers that find the same
//! slot expired will both fetch; the last writer wins.

use crate::dataset::{Dataset, DatasetKind};
use crate::directory::{DirectoryGateway, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

pub const DEFAULT_PRIMARY_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_UNAVAILABLE_TTL: Duration = Duration::from_secs(1800);

/// What to do when a slot is due for refresh and the fetch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshFailurePolicy {
    ServeStaleIfPresent,
    PropagateError,
}

#[derive(Debug, Clone, Copy)]
pub struct SlotPolicy {
    pub ttl: Duration,
    pub on_refresh_failure: RefreshFailurePolicy,
}

impl SlotPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            on_refresh_failure: RefreshFailurePolicy::ServeStaleIfPresent,
        }
    }

    pub fn with_refresh_failure(mut self, policy: RefreshFailurePolicy) -> Self {
        self.on_refresh_failure = policy;
        self
    }
}

#[derive(Debug)]
pub struct DatasetSnapshot {
    pub dataset: Dataset,
    pub fetched_at: DateTime<Utc>,
    loaded: Instant,
}

impl DatasetSnapshot {
    fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            fetched_at: Utc::now(),
            loaded: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.loaded.elapsed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Fetched by this call.
    Fresh,
    /// Served from a snapshot still inside its TTL.
    Cached,
    /// Served from an expired snapshot because the refresh failed.
    Stale,
}

#[derive(Debug, Clone)]
pub struct CachedDataset {
    pub snapshot: Arc<DatasetSnapshot>,
    pub freshness: Freshness,
}

impl CachedDataset {
    pub fn dataset(&self) -> &Dataset {
        &self.snapshot.dataset
    }

    pub fn from_cache(&self) -> bool {
        self.freshness != Freshness::Fresh
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotStatus {
    pub dataset: DatasetKind,
    pub loaded: bool,
    pub rows: usize,
    pub columns: usize,
    pub fetched_at: Option<DateTime<Utc>>,
    pub age_seconds: Option<u64>,
    pub ttl_seconds: u64,
    pub expired: bool,
    pub on_refresh_failure: RefreshFailurePolicy,
}

struct Slot {
    kind: DatasetKind,
    policy: SlotPolicy,
    current: RwLock<Option<Arc<DatasetSnapshot>>>,
}

impl Slot {
    fn new(kind: DatasetKind, policy: SlotPolicy) -> Self {
        Self {
            kind,
            policy,
            current: RwLock::new(None),
        }
    }

    async fn status(&self) -> SlotStatus {
        let current = self.current.read().await.clone();
        let age = current.as_ref().map(|s| s.age());
        SlotStatus {
            dataset: self.kind,
            loaded: current.is_some(),
            rows: current.as_ref().map_or(0, |s| s.dataset.rows.len()),
            columns: current.as_ref().map_or(0, |s| s.dataset.columns.len()),
            fetched_at: current.as_ref().map(|s| s.fetched_at),
            age_seconds: age.map(|a| a.as_secs()),
            ttl_seconds: self.policy.ttl.as_secs(),
            expired: age.is_none_or(|a| a >= self.policy.ttl),
            on_refresh_failure: self.policy.on_refresh_failure,
        }
    }
}

pub struct DirectoryCache {
    gateway: Arc<dyn DirectoryGateway>,
    primary: Slot,
    unavailable: Slot,
}

impl DirectoryCache {
    pub fn new(
        gateway: Arc<dyn DirectoryGateway>,
        primary: SlotPolicy,
        unavailable: SlotPolicy,
    ) -> Self {
        Self {
            gateway,
            primary: Slot::new(DatasetKind::Primary, primary),
            unavailable: Slot::new(DatasetKind::Unavailable, unavailable),
        }
    }

    pub fn with_default_ttls(gateway: Arc<dyn DirectoryGateway>) -> Self {
        Self::new(
            gateway,
            SlotPolicy::new(DEFAULT_PRIMARY_TTL),
            SlotPolicy::new(DEFAULT_UNAVAILABLE_TTL),
        )
    }

    fn slot(&self, kind: DatasetKind) -> &Slot {
        match kind {
            DatasetKind::Primary => &self.primary,
            DatasetKind::Unavailable => &self.unavailable,
        }
    }

    /// Return the dataset for `kind`, fetching it when the slot is empty or
    /// past its TTL.
    #[tracing::instrument(level = "debug", skip(self), fields(dataset = %kind))]
    pub async fn dataset(&self, kind: DatasetKind) -> Result<CachedDataset> {
        let slot = self.slot(kind);
        let existing = slot.current.read().await.clone();
        if let Some(snapshot) = &existing
            && snapshot.age() < slot.policy.ttl
        {
            return Ok(CachedDataset {
                snapshot: Arc::clone(snapshot),
                freshness: Freshness::Cached,
            });
        }

        match self.gateway.fetch(kind).await {
            Ok(dataset) => {
                let snapshot = Arc::new(DatasetSnapshot::new(dataset));
                *slot.current.write().await = Some(Arc::clone(&snapshot));
                tracing::debug!(rows = snapshot.dataset.rows.len(), "directory cache refreshed");
                Ok(CachedDataset {
                    snapshot,
                    freshness: Freshness::Fresh,
                })
            }
            Err(error) => match (slot.policy.on_refresh_failure, existing) {
                (RefreshFailurePolicy::ServeStaleIfPresent, Some(snapshot)) => {
                    tracing::warn!(
                        %error,
                        age_seconds = snapshot.age().as_secs(),
                        "directory refresh failed; serving stale snapshot"
                    );
                    Ok(CachedDataset {
                        snapshot,
                        freshness: Freshness::Stale,
                    })
                }
                _ => Err(error),
            },
        }
    }

    pub async fn status(&self) -> Vec<SlotStatus> {
        vec![self.primary.status().await, self.unavailable.status().await]
    }
}

#[cfg(test)]
mod tests {
    use super::{DirectoryCache, Freshness, RefreshFailurePolicy, SlotPolicy};
    use crate::dataset::{Dataset, DatasetKind, Row};
    use crate::directory::{DirectoryGateway, Result};
    use crate::error::DirectoryError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingDirectory {
        fetches: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl DirectoryGateway for CountingDirectory {
        async fn fetch(&self, _kind: DatasetKind) -> Result<Dataset> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.load(Ordering::SeqCst) {
                return Err(DirectoryError::Timeout("fixture".to_string()));
            }
            let rows = (0..n)
                .map(|i| [("nit", i64::try_from(i).unwrap_or_default())].into_iter().collect::<Row>())
                .collect();
            Ok(Dataset::new(Vec::new(), rows))
        }
    }

    fn cache(gateway: Arc<CountingDirectory>, policy: RefreshFailurePolicy) -> DirectoryCache {
        DirectoryCache::new(
            gateway,
            SlotPolicy::new(Duration::from_secs(60)).with_refresh_failure(policy),
            SlotPolicy::new(Duration::from_secs(30)).with_refresh_failure(policy),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_is_reused_until_ttl_elapses() {
        let gateway = Arc::new(CountingDirectory::default());
        let cache = cache(gateway.clone(), RefreshFailurePolicy::ServeStaleIfPresent);

        let first = cache.dataset(DatasetKind::Primary).await.expect("first");
        assert_eq!(first.freshness, Freshness::Fresh);
        let second = cache.dataset(DatasetKind::Primary).await.expect("second");
        assert_eq!(second.freshness, Freshness::Cached);
        assert!(Arc::ptr_eq(&first.snapshot, &second.snapshot));
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let third = cache.dataset(DatasetKind::Primary).await.expect("third");
        assert_eq!(third.freshness, Freshness::Fresh);
        assert_eq!(third.dataset().len(), 2);
        assert_eq!(gateway.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slots_expire_independently() {
        let gateway = Arc::new(CountingDirectory::default());
        let cache = cache(gateway.clone(), RefreshFailurePolicy::ServeStaleIfPresent);

        cache.dataset(DatasetKind::Primary).await.expect("primary");
        cache.dataset(DatasetKind::Unavailable).await.expect("unavailable");
        tokio::time::advance(Duration::from_secs(31)).await;

        let primary = cache.dataset(DatasetKind::Primary).await.expect("primary");
        let unavailable = cache.dataset(DatasetKind::Unavailable).await.expect("unavailable");
        assert_eq!(primary.freshness, Freshness::Cached);
        assert_eq!(unavailable.freshness, Freshness::Fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_serves_stale_snapshot() {
        let gateway = Arc::new(CountingDirectory::default());
        let cache = cache(gateway.clone(), RefreshFailurePolicy::ServeStaleIfPresent);

        let first = cache.dataset(DatasetKind::Primary).await.expect("first");
        gateway.failing.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(61)).await;

        let stale = cache.dataset(DatasetKind::Primary).await.expect("stale");
        assert_eq!(stale.freshness, Freshness::Stale);
        assert!(Arc::ptr_eq(&first.snapshot, &stale.snapshot));

        let status = cache.status().await;
        assert!(status[0].loaded);
        assert!(status[0].expired);
    }

    #[tokio::test(start_paused = true)]
    async fn propagate_policy_surfaces_refresh_error() {
        let gateway = Arc::new(CountingDirectory::default());
        let cache = cache(gateway.clone(), RefreshFailurePolicy::PropagateError);

        cache.dataset(DatasetKind::Primary).await.expect("first");
        gateway.failing.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(61)).await;

        let err = cache.dataset(DatasetKind::Primary).await.expect_err("must fail");
        assert!(matches!(err, DirectoryError::Timeout(_)));
    }

    #[tokio::test]
    async fn empty_slot_surfaces_error_under_either_policy() {
        let gateway = Arc::new(CountingDirectory::default());
        gateway.failing.store(true, Ordering::SeqCst);
        let cache = cache(gateway.clone(), RefreshFailurePolicy::ServeStaleIfPresent);

        assert!(cache.dataset(DatasetKind::Unavailable).await.is_err());
        let status = cache.status().await;
        assert!(!status[1].loaded);
        assert_eq!(status[1].rows, 0);
    }
}
