//! # Elasticsearch geo index
//!
//! Posts are indexed with `location` mapped as `geo_point`; radius queries
//! are a `geo_distance` filter with no explicit sort, so hits come back in
//! the engine's default order.

use std::time::Duration;

use async_trait::async_trait;
use domains::{GeoIndex, Location, Post, StoreError};
use elasticsearch::{
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    params::Refresh,
    Elasticsearch, IndexParts, SearchParts,
};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::info;
use url::Url;

pub struct EsGeoIndex {
    client: Elasticsearch,
    index: String,
    max_hits: u32,
    mapping_ready: OnceCell<()>,
}

fn es_error(err: elasticsearch::Error) -> StoreError {
    StoreError::unavailable(format!("elasticsearch: {err}"))
}

impl EsGeoIndex {
    /// Builds the transport; no request is sent until the first call.
    pub fn new(
        url: &str,
        index: &str,
        max_hits: u32,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let parsed = Url::parse(url)
            .map_err(|e| StoreError::rejected(format!("invalid elasticsearch url {url:?}: {e}")))?;
        let pool = SingleNodeConnectionPool::new(parsed);
        let transport = TransportBuilder::new(pool)
            .timeout(request_timeout)
            .build()
            .map_err(|e| StoreError::rejected(format!("elasticsearch transport: {e}")))?;

        Ok(Self {
            client: Elasticsearch::new(transport),
            index: index.to_string(),
            max_hits,
            mapping_ready: OnceCell::new(),
        })
    }

    /// Creates the index with its `geo_point` mapping, once per process.
    pub async fn ensure_index(&self) -> Result<(), StoreError> {
        self.mapping_ready
            .get_or_try_init(|| self.create_index_if_missing())
            .await
            .map(|_| ())
    }

    async fn create_index_if_missing(&self) -> Result<(), StoreError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index.as_str()]))
            .send()
            .await
            .map_err(es_error)?;

        if exists.status_code().is_success() {
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(&self.index))
            .body(index_mapping())
            .send()
            .await
            .map_err(es_error)?;

        let status = response.status_code();
        if status.is_success() {
            info!(index = %self.index, "created geo index");
            return Ok(());
        }

        let body: Value = response.json().await.map_err(es_error)?;
        // Another instance created it between our exists check and create.
        if body["error"]["type"] == "resource_already_exists_exception" {
            return Ok(());
        }
        Err(StoreError::rejected(format!(
            "create index {} returned {}: {}",
            self.index,
            status.as_u16(),
            body
        )))
    }
}

fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "id": { "type": "keyword" },
                "user": { "type": "keyword" },
                "message": { "type": "text" },
                "location": { "type": "geo_point" },
                "url": { "type": "keyword", "index": false }
            }
        }
    })
}

fn radius_query(center: Location, radius_km: f64, size: u32) -> Value {
    json!({
        "size": size,
        "query": {
            "bool": {
                "must": { "match_all": {} },
                "filter": {
                    "geo_distance": {
                        "distance": format!("{radius_km}km"),
                        "location": { "lat": center.lat, "lon": center.lon }
                    }
                }
            }
        }
    })
}

fn hit_sources(body: Value) -> Vec<Value> {
    match body {
        Value::Object(mut root) => match root.remove("hits") {
            Some(Value::Object(mut hits)) => match hits.remove("hits") {
                Some(Value::Array(items)) => items
                    .into_iter()
                    .filter_map(|mut hit| hit.get_mut("_source").map(Value::take))
                    .collect(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[async_trait]
impl GeoIndex for EsGeoIndex {
    async fn index(&self, post: &Post) -> Result<(), StoreError> {
        self.ensure_index().await?;

        let response = self
            .client
            .index(IndexParts::IndexId(&self.index, &post.id))
            .body(post)
            .refresh(Refresh::True)
            .send()
            .await
            .map_err(es_error)?;

        let status = response.status_code();
        if status.is_success() {
            return Ok(());
        }
        let detail = response.text().await.unwrap_or_default();
        Err(StoreError::rejected(format!(
            "index {} returned {}: {}",
            post.id,
            status.as_u16(),
            detail
        )))
    }

    async fn within(&self, center: Location, radius_km: f64) -> Result<Vec<Value>, StoreError> {
        let response = self
            .client
            .search(SearchParts::Index(&[self.index.as_str()]))
            .body(radius_query(center, radius_km, self.max_hits))
            .send()
            .await
            .map_err(es_error)?;

        let status = response.status_code();
        // Nothing has been indexed yet.
        if status.as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StoreError::rejected(format!(
                "search returned {}: {}",
                status.as_u16(),
                detail
            )));
        }

        let body: Value = response.json().await.map_err(es_error)?;
        Ok(hit_sources(body))
    }
}
