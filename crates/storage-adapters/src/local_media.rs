//! # Local media store
//!
//! Filesystem implementation of `ObjectStore`. Objects are written under a
//! sharded directory derived from the SHA-256 of their key
//! (`ab/cd/<key>.<ext>`) and served by whatever fronts `url_prefix`.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use domains::{ObjectStore, StoreError};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::debug;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/media")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "http://localhost:8080/media")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: PathBuf, url_prefix: impl Into<String>) -> Self {
        Self {
            root_path: root,
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Relative location of an object: "ab/cd/<key>[.ext]".
    fn relative_path(key: &str, content_type: &mime::Mime) -> String {
        let hash = hex::encode(Sha256::digest(key.as_bytes()));
        let file_name = match file_extension(content_type) {
            Some(ext) => format!("{key}.{ext}"),
            None => key.to_string(),
        };
        format!("{}/{}/{}", &hash[0..2], &hash[2..4], file_name)
    }
}

fn file_extension(content_type: &mime::Mime) -> Option<&str> {
    if content_type.type_() == mime::IMAGE || content_type.type_() == mime::VIDEO {
        Some(content_type.subtype().as_str())
    } else {
        None
    }
}

#[async_trait]
impl ObjectStore for LocalMediaStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &mime::Mime,
    ) -> Result<String, StoreError> {
        let relative = Self::relative_path(key, content_type);
        let target = self.root_path.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::unavailable(format!("create {}: {e}", parent.display())))?;
        }
        fs::write(&target, &data)
            .await
            .map_err(|e| StoreError::unavailable(format!("write {}: {e}", target.display())))?;

        debug!(key, bytes = data.len(), path = %target.display(), "media stored locally");
        Ok(format!("{}/{}", self.url_prefix, relative))
    }
}
