//! # Geo Search
//!
//! Issues one radius query, decodes the hits and applies the moderation
//! predicate. Hits that fail to decode are dropped, so a result is a
//! best-effort subset of what the engine matched.

use std::sync::Arc;
use std::time::Duration;

use domains::{ContentFilter, DomainError, GeoIndex, Post, Result, SearchQuery};
use tracing::debug;

use crate::timeouts::bounded;

pub struct GeoSearch {
    index: Arc<dyn GeoIndex>,
    filter: Arc<dyn ContentFilter>,
    timeout: Duration,
}

impl GeoSearch {
    pub fn new(index: Arc<dyn GeoIndex>, filter: Arc<dyn ContentFilter>, timeout: Duration) -> Self {
        Self {
            index,
            filter,
            timeout,
        }
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<Post>> {
        let hits = bounded(self.timeout, self.index.within(query.center, query.radius_km))
            .await
            .map_err(|err| DomainError::unavailable("geo index", err))?;

        let total = hits.len();
        let posts: Vec<Post> = hits
            .into_iter()
            .filter_map(|hit| match serde_json::from_value::<Post>(hit) {
                Ok(post) => Some(post),
                Err(err) => {
                    debug!(error = %err, "dropping undecodable hit");
                    None
                }
            })
            .filter(|post| !self.filter.is_filtered(&post.message))
            .collect();

        debug!(
            lat = query.center.lat,
            lon = query.center.lon,
            radius_km = query.radius_km,
            hits = total,
            returned = posts.len(),
            "geo search"
        );
        Ok(posts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::{Location, MockContentFilter, MockGeoIndex, StoreError};
    use serde_json::json;

    fn hit(id: &str, message: &str) -> serde_json::Value {
        json!({
            "id": id,
            "user": "alice",
            "message": message,
            "location": { "lat": 37.7, "lon": -122.4 },
            "url": format!("https://media.example/{id}")
        })
    }

    fn passthrough() -> MockContentFilter {
        let mut filter = MockContentFilter::new();
        filter.expect_is_filtered().returning(|_| false);
        filter
    }

    fn query() -> SearchQuery {
        SearchQuery::new(Location::new(37.7, -122.4), Some(1.0))
    }

    #[tokio::test]
    async fn forwards_center_and_radius() {
        let mut index = MockGeoIndex::new();
        index
            .expect_within()
            .withf(|center, radius| *center == Location::new(37.7, -122.4) && *radius == 1.0)
            .times(1)
            .returning(|_, _| Ok(vec![]));
        let search = GeoSearch::new(Arc::new(index), Arc::new(passthrough()), Duration::from_secs(1));
        assert!(search.search(&query()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn undecodable_hits_are_dropped() {
        let mut index = MockGeoIndex::new();
        index.expect_within().returning(|_, _| {
            Ok(vec![
                hit("a", "first"),
                json!({ "id": "broken", "location": "nowhere" }),
                hit("b", "second"),
            ])
        });
        let search = GeoSearch::new(Arc::new(index), Arc::new(passthrough()), Duration::from_secs(1));

        let posts = search.search(&query()).await.unwrap();
        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn filtered_posts_are_excluded() {
        let mut index = MockGeoIndex::new();
        index
            .expect_within()
            .returning(|_, _| Ok(vec![hit("a", "nice view"), hit("b", "spam offer"), hit("c", "lunch")]));
        let mut filter = MockContentFilter::new();
        filter
            .expect_is_filtered()
            .returning(|message| message.contains("spam"));
        let search = GeoSearch::new(Arc::new(index), Arc::new(filter), Duration::from_secs(1));

        let posts = search.search(&query()).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert!(posts.iter().all(|p| !p.message.contains("spam")));
    }

    #[tokio::test]
    async fn engine_order_is_preserved() {
        let mut index = MockGeoIndex::new();
        index
            .expect_within()
            .returning(|_, _| Ok(vec![hit("z", "1"), hit("a", "2"), hit("m", "3")]));
        let search = GeoSearch::new(Arc::new(index), Arc::new(passthrough()), Duration::from_secs(1));

        let ids: Vec<_> = search
            .search(&query())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[tokio::test]
    async fn engine_failure_surfaces() {
        let mut index = MockGeoIndex::new();
        index
            .expect_within()
            .returning(|_, _| Err(StoreError::unavailable("es down")));
        let search = GeoSearch::new(Arc::new(index), Arc::new(passthrough()), Duration::from_secs(1));

        let err = search.search(&query()).await.unwrap_err();
        assert!(matches!(err, DomainError::Unavailable { collaborator: "geo index", .. }));
    }
}
