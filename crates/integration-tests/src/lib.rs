//! around/crates/integration-tests/src/lib.rs
//!
//! Shared fixtures for the integration suites: instrumented store wrappers
//! and a fully wired in-memory application.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use domains::{GeoIndex, Location, ObjectStore, Post, StoreError};
use services::{
    BlocklistFilter, CacheKeyMode, CachedSearch, CredentialGate, GeoSearch, PipelineMetrics,
    PostIngestion, Timeouts,
};
use storage_adapters::{
    MemoryArchive, MemoryCache, MemoryCredentialStore, MemoryGeoIndex, MemoryObjectStore,
};
use tokio::sync::Semaphore;

pub const MEDIA_BASE: &str = "http://media.test";
pub const CACHE_TTL: Duration = Duration::from_secs(30);

/// Geo index that counts radius queries.
#[derive(Default)]
pub struct CountingIndex {
    pub inner: MemoryGeoIndex,
    queries: AtomicUsize,
}

impl CountingIndex {
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoIndex for CountingIndex {
    async fn index(&self, post: &Post) -> Result<(), StoreError> {
        self.inner.index(post).await
    }

    async fn within(&self, center: Location, radius_km: f64) -> Result<Vec<serde_json::Value>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.within(center, radius_km).await
    }
}

/// Geo index whose writes block until [`GatedIndex::open`] is called, so a
/// test can observe the window between acceptance and searchability.
pub struct GatedIndex {
    pub inner: MemoryGeoIndex,
    gate: Semaphore,
}

impl Default for GatedIndex {
    fn default() -> Self {
        Self {
            inner: MemoryGeoIndex::new(),
            gate: Semaphore::new(0),
        }
    }
}

impl GatedIndex {
    pub fn open(&self) {
        self.gate.add_permits(64);
    }
}

#[async_trait]
impl GeoIndex for GatedIndex {
    async fn index(&self, post: &Post) -> Result<(), StoreError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StoreError::unavailable(e.to_string()))?;
        self.inner.index(post).await
    }

    async fn within(&self, center: Location, radius_km: f64) -> Result<Vec<serde_json::Value>, StoreError> {
        self.inner.within(center, radius_km).await
    }
}

/// Object store that rejects every upload.
pub struct FailingObjectStore;

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn put(&self, key: &str, _data: Bytes, _content_type: &mime::Mime) -> Result<String, StoreError> {
        Err(StoreError::unavailable(format!("bucket unreachable for {key}")))
    }
}

/// Every service wired to in-memory stores, with handles on the stores.
pub struct Harness {
    pub credentials: Arc<MemoryCredentialStore>,
    pub objects: Arc<MemoryObjectStore>,
    pub archive: Arc<MemoryArchive>,
    pub cache: Arc<MemoryCache>,
    pub metrics: PipelineMetrics,
    pub gate: Arc<CredentialGate>,
    pub ingestion: Arc<PostIngestion>,
    pub search: Arc<CachedSearch>,
}

pub struct HarnessBuilder {
    index: Arc<dyn GeoIndex>,
    objects_override: Option<Arc<dyn ObjectStore>>,
    blocked_terms: Vec<String>,
    key_mode: CacheKeyMode,
}

impl HarnessBuilder {
    pub fn new(index: Arc<dyn GeoIndex>) -> Self {
        Self {
            index,
            objects_override: None,
            blocked_terms: Vec::new(),
            key_mode: CacheKeyMode::Raw,
        }
    }

    pub fn object_store(mut self, objects: Arc<dyn ObjectStore>) -> Self {
        self.objects_override = Some(objects);
        self
    }

    pub fn blocked_terms(mut self, terms: &[&str]) -> Self {
        self.blocked_terms = terms.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn key_mode(mut self, key_mode: CacheKeyMode) -> Self {
        self.key_mode = key_mode;
        self
    }

    pub fn build(self) -> Harness {
        let timeouts = Timeouts::default();
        let metrics = PipelineMetrics::new();
        let credentials = Arc::new(MemoryCredentialStore::new());
        let objects = Arc::new(MemoryObjectStore::new(MEDIA_BASE));
        let archive = Arc::new(MemoryArchive::new());
        let cache = Arc::new(MemoryCache::new());

        let object_store: Arc<dyn ObjectStore> = match self.objects_override {
            Some(store) => store,
            None => objects.clone(),
        };

        let ingestion = PostIngestion::new(object_store, self.index.clone(), timeouts, metrics.clone())
            .with_archive(archive.clone());
        let geo = GeoSearch::new(
            self.index,
            Arc::new(BlocklistFilter::new(self.blocked_terms)),
            timeouts.collaborator,
        );
        let search = CachedSearch::new(geo, cache.clone(), CACHE_TTL, timeouts.collaborator, metrics.clone())
            .with_key_mode(self.key_mode);

        Harness {
            gate: Arc::new(CredentialGate::new(credentials.clone(), timeouts.collaborator)),
            credentials,
            objects,
            archive,
            cache,
            metrics,
            ingestion: Arc::new(ingestion),
            search: Arc::new(search),
        }
    }
}
