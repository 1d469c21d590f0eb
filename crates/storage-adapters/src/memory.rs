//! # In-memory adapters
//!
//! Process-local implementations of every store port, backed by `DashMap`.
//! Used for local development (`--features` without any backend) and by
//! the integration tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use domains::{
    ArchiveRecord, ArchiveStore, Credential, CredentialStore, GeoIndex, Location, ObjectStore,
    Post, SearchCache, StoreError,
};
use tokio::time::Instant;
use tracing::debug;

/// Mean Earth radius used for great-circle distances, in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Credential store whose insert is atomic per username (`DashMap::entry`).
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: DashMap<String, Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.entries.get(username).map(|c| c.value().clone()))
    }

    async fn insert_if_absent(&self, credential: &Credential) -> Result<bool, StoreError> {
        match self.entries.entry(credential.username.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(credential.clone());
                Ok(true)
            }
        }
    }
}

/// Object store that keeps uploads in memory and hands out URLs under a prefix.
#[derive(Debug)]
pub struct MemoryObjectStore {
    url_prefix: String,
    objects: DashMap<String, (Bytes, mime::Mime)>,
}

impl MemoryObjectStore {
    pub fn new(url_prefix: impl Into<String>) -> Self {
        Self {
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            objects: DashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<(Bytes, mime::Mime)> {
        self.objects.get(key).map(|o| o.value().clone())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &mime::Mime,
    ) -> Result<String, StoreError> {
        self.objects
            .insert(key.to_string(), (data, content_type.clone()));
        Ok(format!("{}/{}", self.url_prefix, key))
    }
}

/// Geo index that answers radius queries with a haversine scan.
#[derive(Debug, Default)]
pub struct MemoryGeoIndex {
    documents: DashMap<String, serde_json::Value>,
}

impl MemoryGeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Stores a raw document as-is, bypassing `Post` serialization.
    pub fn insert_raw(&self, id: impl Into<String>, document: serde_json::Value) {
        self.documents.insert(id.into(), document);
    }
}

#[async_trait]
impl GeoIndex for MemoryGeoIndex {
    async fn index(&self, post: &Post) -> Result<(), StoreError> {
        let document = serde_json::to_value(post)?;
        self.documents.insert(post.id.clone(), document);
        Ok(())
    }

    async fn within(
        &self,
        center: Location,
        radius_km: f64,
    ) -> Result<Vec<serde_json::Value>, StoreError> {
        Ok(self
            .documents
            .iter()
            .filter(|doc| {
                document_location(doc.value())
                    .is_some_and(|loc| haversine_km(center, loc) <= radius_km)
            })
            .map(|doc| doc.value().clone())
            .collect())
    }
}

fn document_location(document: &serde_json::Value) -> Option<Location> {
    let location = document.get("location")?;
    Some(Location::new(
        location.get("lat")?.as_f64()?,
        location.get("lon")?.as_f64()?,
    ))
}

/// Great-circle distance between two points.
pub fn haversine_km(a: Location, b: Location) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Archive that keeps one record per row key.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    rows: DashMap<String, ArchiveRecord>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, row_key: &str) -> Option<ArchiveRecord> {
        self.rows.get(row_key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchive {
    async fn archive(&self, record: &ArchiveRecord) -> Result<(), StoreError> {
        self.rows.insert(record.row_key.clone(), record.clone());
        Ok(())
    }
}

/// How often `set` sweeps expired entries out of a [`MemoryCache`].
pub const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Expiring cache. Expiry follows the tokio clock, so paused-time tests can
/// advance past a TTL.
///
/// Expired entries are dropped when read, and `set` sweeps the whole map at
/// most once per [`CACHE_SWEEP_INTERVAL`], so keys that are never read again
/// do not accumulate.
#[derive(Debug)]
pub struct MemoryCache {
    entries: DashMap<String, (Bytes, Instant)>,
    last_sweep: Mutex<Instant>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep_if_due(&self, now: Instant) {
        // Another caller holding the lock is already sweeping.
        let Ok(mut last_sweep) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last_sweep) < CACHE_SWEEP_INTERVAL {
            return;
        }
        *last_sweep = now;
        drop(last_sweep);

        let before = self.entries.len();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, remaining = self.entries.len(), "swept expired cache entries");
        }
    }
}

#[async_trait]
impl SearchCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            let (value, expires_at) = entry.value();
            if *expires_at > now {
                return Ok(Some(value.clone()));
            }
        }
        self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError> {
        let now = Instant::now();
        self.sweep_if_due(now);
        self.entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }
}
