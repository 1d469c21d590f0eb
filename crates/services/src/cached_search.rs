//! # Cache-Aside Search
//!
//! Serves search results from the ephemeral cache when possible and falls
//! back to [`GeoSearch`] otherwise. Entries are never invalidated; a post can
//! stay invisible for up to one TTL after it became searchable.
//!
//! By default the cache key is built from the raw query strings, so `37.70`
//! and `37.7` miss each other's entries. [`CacheKeyMode::Normalized`] keys on
//! the parsed numbers instead.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use domains::{CacheKey, DomainError, Location, Result, SearchCache, SearchQuery};
use tracing::{debug, warn};

use crate::geo_search::GeoSearch;
use crate::metrics::{LookupOutcome, PipelineMetrics, Sink};
use crate::timeouts::bounded;

/// How cache keys are derived from a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheKeyMode {
    #[default]
    Raw,
    Normalized,
}

pub struct CachedSearch {
    search: GeoSearch,
    cache: Arc<dyn SearchCache>,
    ttl: Duration,
    timeout: Duration,
    key_mode: CacheKeyMode,
    metrics: PipelineMetrics,
}

impl CachedSearch {
    pub fn new(
        search: GeoSearch,
        cache: Arc<dyn SearchCache>,
        ttl: Duration,
        timeout: Duration,
        metrics: PipelineMetrics,
    ) -> Self {
        Self {
            search,
            cache,
            ttl,
            timeout,
            key_mode: CacheKeyMode::Raw,
            metrics,
        }
    }

    pub fn with_key_mode(mut self, key_mode: CacheKeyMode) -> Self {
        self.key_mode = key_mode;
        self
    }

    /// Returns the serialized JSON array of posts around `(lat, lon)`.
    ///
    /// A blank `range` counts as omitted.
    pub async fn search_cached(&self, lat: &str, lon: &str, range: Option<&str>) -> Result<Bytes> {
        let range = range.filter(|r| !r.trim().is_empty());
        let query = parse_query(lat, lon, range)?;
        let key = match self.key_mode {
            CacheKeyMode::Raw => CacheKey::raw(lat, lon, range),
            CacheKeyMode::Normalized => CacheKey::normalized(&query),
        };

        match bounded(self.timeout, self.cache.get(key.as_str())).await {
            Ok(Some(bytes)) => {
                debug!(key = %key, "search cache hit");
                self.metrics.record_lookup(LookupOutcome::Hit);
                return Ok(bytes);
            }
            Ok(None) => {
                debug!(key = %key, "search cache miss");
                self.metrics.record_lookup(LookupOutcome::Miss);
            }
            Err(err) => {
                warn!(key = %key, error = %err, "search cache unavailable, treating as miss");
                self.metrics.record_lookup(LookupOutcome::Error);
            }
        }

        let posts = self.search.search(&query).await?;
        let body = Bytes::from(
            serde_json::to_vec(&posts).map_err(|err| DomainError::Internal(err.to_string()))?,
        );

        match bounded(self.timeout, self.cache.set(key.as_str(), body.clone(), self.ttl)).await {
            Ok(()) => self.metrics.record_write(Sink::Cache, true),
            Err(err) => {
                warn!(key = %key, error = %err, "search cache write failed");
                self.metrics.record_write(Sink::Cache, false);
            }
        }

        Ok(body)
    }
}

fn parse_query(lat: &str, lon: &str, range: Option<&str>) -> Result<SearchQuery> {
    let lat = parse_number("lat", lat)?;
    let lon = parse_number("lon", lon)?;
    let radius = range.map(|r| parse_number("range", r)).transpose()?;
    Ok(SearchQuery::new(Location::new(lat, lon), radius))
}

fn parse_number(field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            DomainError::Validation(format!("{field} must be a finite number, got {raw:?}"))
        })
}
