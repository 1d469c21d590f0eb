//! # Write Fan-Out
//!
//! Detached writes to the geo index and the archive. Each write runs on its
//! own spawned task that outlives the request; its outcome is reported only
//! through logs and [`PipelineMetrics`]. There is no retry and no ordering
//! between the two sinks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domains::{ArchiveRecord, ArchiveStore, GeoIndex, Post};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::metrics::{PipelineMetrics, Sink};
use crate::timeouts::bounded;

/// Handles of the detached writes launched for one post.
///
/// Dropping this value detaches the tasks; they keep running. Awaiting
/// [`Dispatched::settle`] only waits for them to finish and never reveals
/// whether a write succeeded.
#[derive(Debug)]
pub struct Dispatched {
    index: JoinHandle<()>,
    archive: Option<JoinHandle<()>>,
}

impl Dispatched {
    pub fn has_archive_write(&self) -> bool {
        self.archive.is_some()
    }

    /// Waits until every detached write has run to completion or failure.
    pub async fn settle(self) {
        let _ = self.index.await;
        if let Some(archive) = self.archive {
            let _ = archive.await;
        }
    }
}

/// Spawns the index write and, when an archive is configured, the archive write.
pub(crate) fn dispatch(
    post: &Post,
    index: &Arc<dyn GeoIndex>,
    archive: Option<&Arc<dyn ArchiveStore>>,
    timeout: Duration,
    metrics: &PipelineMetrics,
) -> Dispatched {
    let index = spawn_index_write(post.clone(), Arc::clone(index), timeout, metrics.clone());
    let archive = archive.map(|store| {
        let record = ArchiveRecord::from_post(post, Utc::now());
        spawn_archive_write(record, Arc::clone(store), timeout, metrics.clone())
    });
    Dispatched { index, archive }
}

fn spawn_index_write(
    post: Post,
    index: Arc<dyn GeoIndex>,
    timeout: Duration,
    metrics: PipelineMetrics,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match bounded(timeout, index.index(&post)).await {
            Ok(()) => {
                debug!(post_id = %post.id, sink = "index", "post indexed");
                metrics.record_write(Sink::Index, true);
            }
            Err(err) => {
                warn!(post_id = %post.id, sink = "index", error = %err, "index write dropped");
                metrics.record_write(Sink::Index, false);
            }
        }
    })
}

fn spawn_archive_write(
    record: ArchiveRecord,
    archive: Arc<dyn ArchiveStore>,
    timeout: Duration,
    metrics: PipelineMetrics,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match bounded(timeout, archive.archive(&record)).await {
            Ok(()) => {
                debug!(post_id = %record.row_key, sink = "archive", "post archived");
                metrics.record_write(Sink::Archive, true);
            }
            Err(err) => {
                warn!(post_id = %record.row_key, sink = "archive", error = %err, "archive write dropped");
                metrics.record_write(Sink::Archive, false);
            }
        }
    })
}
