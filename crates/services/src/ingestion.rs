//! # Post Ingestion
//!
//! Sequences one "create post" request across the three stores:
//!
//! 1. the object-store upload, awaited on the request task because its URL
//!    is embedded in the indexed document;
//! 2. the index write and the archive write, spawned as detached tasks.
//!
//! The caller is told that the media is stored and the post accepted, not
//! that the post is searchable. A crash between steps can leave media stored
//! but never indexed, or indexed but never archived.

use std::sync::Arc;

use domains::{
    ArchiveStore, AuthenticatedUser, DomainError, GeoIndex, ObjectStore, Post, PostDraft, Result,
};
use tracing::{info, warn};

use crate::fanout::{self, Dispatched};
use crate::metrics::{PipelineMetrics, Sink};
use crate::timeouts::{bounded, Timeouts};

/// A post that passed the synchronous portion of ingestion.
#[derive(Debug)]
pub struct Ingested {
    pub post: Post,
    pub dispatched: Dispatched,
}

pub struct PostIngestion {
    objects: Arc<dyn ObjectStore>,
    index: Arc<dyn GeoIndex>,
    archive: Option<Arc<dyn ArchiveStore>>,
    timeouts: Timeouts,
    metrics: PipelineMetrics,
}

impl PostIngestion {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        index: Arc<dyn GeoIndex>,
        timeouts: Timeouts,
        metrics: PipelineMetrics,
    ) -> Self {
        Self {
            objects,
            index,
            archive: None,
            timeouts,
            metrics,
        }
    }

    /// Enables best-effort archival of every ingested post.
    pub fn with_archive(mut self, archive: Arc<dyn ArchiveStore>) -> Self {
        self.archive = Some(archive);
        self
    }

    /// Rejects requests that carry no authenticated identity.
    pub fn authorize<'a>(&self, user: Option<&'a AuthenticatedUser>) -> Result<&'a AuthenticatedUser> {
        user.ok_or_else(|| DomainError::Unauthorized("missing authenticated identity".into()))
    }

    pub async fn ingest(
        &self,
        user: Option<&AuthenticatedUser>,
        draft: PostDraft,
    ) -> Result<Ingested> {
        let user = self.authorize(user)?;

        let mut post = Post {
            id: Post::new_id(),
            user: user.username().to_string(),
            message: draft.message,
            location: draft.location,
            url: None,
        };

        if let Some(media) = draft.media {
            let upload = self.objects.put(&post.id, media.data, &media.content_type);
            match bounded(self.timeouts.upload, upload).await {
                Ok(url) => {
                    self.metrics.record_write(Sink::Media, true);
                    post.url = Some(url);
                }
                Err(err) => {
                    self.metrics.record_write(Sink::Media, false);
                    warn!(post_id = %post.id, error = %err, "media upload failed, post discarded");
                    return Err(DomainError::unavailable("object store", err));
                }
            }
        }

        let dispatched = fanout::dispatch(
            &post,
            &self.index,
            self.archive.as_ref(),
            self.timeouts.collaborator,
            &self.metrics,
        );
        info!(post_id = %post.id, user = %post.user, media = post.url.is_some(), "post accepted");

        Ok(Ingested { post, dispatched })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::WriteOutcome;
    use bytes::Bytes;
    use domains::{
        Location, MediaUpload, MockArchiveStore, MockGeoIndex, MockObjectStore, StoreError,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn alice() -> AuthenticatedUser {
        AuthenticatedUser("alice".into())
    }

    fn draft(media: Option<MediaUpload>) -> PostDraft {
        PostDraft {
            message: "hello".into(),
            location: Location::new(37.7, -122.4),
            media,
        }
    }

    fn jpeg() -> MediaUpload {
        MediaUpload {
            data: Bytes::from_static(b"\xff\xd8\xff"),
            content_type: mime::IMAGE_JPEG,
        }
    }

    #[tokio::test]
    async fn unauthenticated_request_is_rejected_before_any_write() {
        let mut objects = MockObjectStore::new();
        objects.expect_put().never();
        let mut index = MockGeoIndex::new();
        index.expect_index().never();
        let ingestion = PostIngestion::new(
            Arc::new(objects),
            Arc::new(index),
            Timeouts::default(),
            PipelineMetrics::new(),
        );

        let err = ingestion.ingest(None, draft(Some(jpeg()))).await.unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn media_url_is_attached_before_indexing() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_put()
            .times(1)
            .returning(|key, _, _| Ok(format!("https://media.example/{key}")));
        let mut index = MockGeoIndex::new();
        index
            .expect_index()
            .withf(|post| post.url.as_deref().is_some_and(|u| u.ends_with(&post.id)))
            .times(1)
            .returning(|_| Ok(()));
        let ingestion = PostIngestion::new(
            Arc::new(objects),
            Arc::new(index),
            Timeouts::default(),
            PipelineMetrics::new(),
        );

        let user = alice();
        let ingested = ingestion.ingest(Some(&user), draft(Some(jpeg()))).await.unwrap();
        assert!(!ingested.post.url.as_deref().unwrap_or_default().is_empty());
        assert_eq!(ingested.post.user, "alice");
        ingested.dispatched.settle().await;
    }

    #[tokio::test]
    async fn media_failure_yields_no_post_and_no_fanout() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_put()
            .returning(|_, _, _| Err(StoreError::unavailable("bucket unreachable")));
        let mut index = MockGeoIndex::new();
        index.expect_index().never();
        let mut archive = MockArchiveStore::new();
        archive.expect_archive().never();
        let metrics = PipelineMetrics::new();
        let ingestion = PostIngestion::new(
            Arc::new(objects),
            Arc::new(index),
            Timeouts::default(),
            metrics.clone(),
        )
        .with_archive(Arc::new(archive));

        let user = alice();
        let err = ingestion
            .ingest(Some(&user), draft(Some(jpeg())))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Unavailable { collaborator: "object store", .. }
        ));
        assert_eq!(metrics.writes(Sink::Media, WriteOutcome::Failed), 1);
    }

    #[tokio::test]
    async fn post_without_media_skips_object_store() {
        let mut objects = MockObjectStore::new();
        objects.expect_put().never();
        let mut index = MockGeoIndex::new();
        index.expect_index().times(1).returning(|_| Ok(()));
        let ingestion = PostIngestion::new(
            Arc::new(objects),
            Arc::new(index),
            Timeouts::default(),
            PipelineMetrics::new(),
        );

        let user = alice();
        let ingested = ingestion.ingest(Some(&user), draft(None)).await.unwrap();
        assert_eq!(ingested.post.url, None);
        assert!(!ingested.dispatched.has_archive_write());
        ingested.dispatched.settle().await;
    }

    #[tokio::test]
    async fn detached_write_failures_do_not_fail_ingestion() {
        let mut objects = MockObjectStore::new();
        objects
            .expect_put()
            .returning(|_, _, _| Ok("https://media.example/x".into()));
        let mut index = MockGeoIndex::new();
        index
            .expect_index()
            .returning(|_| Err(StoreError::unavailable("es down")));
        let mut archive = MockArchiveStore::new();
        archive
            .expect_archive()
            .returning(|_| Err(StoreError::unavailable("clickhouse down")));
        let metrics = PipelineMetrics::new();
        let ingestion = PostIngestion::new(
            Arc::new(objects),
            Arc::new(index),
            Timeouts::default(),
            metrics.clone(),
        )
        .with_archive(Arc::new(archive));

        let user = alice();
        let ingested = ingestion.ingest(Some(&user), draft(Some(jpeg()))).await.unwrap();
        ingested.dispatched.settle().await;

        assert_eq!(metrics.writes(Sink::Index, WriteOutcome::Failed), 1);
        assert_eq!(metrics.writes(Sink::Archive, WriteOutcome::Failed), 1);
    }

    #[tokio::test]
    async fn archive_receives_post_columns() {
        let mut objects = MockObjectStore::new();
        objects.expect_put().never();
        let mut index = MockGeoIndex::new();
        index.expect_index().returning(|_| Ok(()));
        let mut archive = MockArchiveStore::new();
        archive
            .expect_archive()
            .withf(|r| r.user == "alice" && r.message == "hello" && r.lat == 37.7 && r.lon == -122.4)
            .times(1)
            .returning(|_| Ok(()));
        let ingestion = PostIngestion::new(
            Arc::new(objects),
            Arc::new(index),
            Timeouts::default(),
            PipelineMetrics::new(),
        )
        .with_archive(Arc::new(archive));

        let user = alice();
        let ingested = ingestion.ingest(Some(&user), draft(None)).await.unwrap();
        assert!(ingested.dispatched.has_archive_write());
        ingested.dispatched.settle().await;
    }

    #[tokio::test]
    async fn every_ingestion_gets_a_fresh_id() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut objects = MockObjectStore::new();
        objects.expect_put().never();
        let mut index = MockGeoIndex::new();
        index.expect_index().returning(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let ingestion = PostIngestion::new(
            Arc::new(objects),
            Arc::new(index),
            Timeouts::default(),
            PipelineMetrics::new(),
        );

        let user = alice();
        let a = ingestion.ingest(Some(&user), draft(None)).await.unwrap();
        let b = ingestion.ingest(Some(&user), draft(None)).await.unwrap();
        assert_ne!(a.post.id, b.post.id);
        a.dispatched.settle().await;
        b.dispatched.settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
