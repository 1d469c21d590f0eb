//! # Ports
//!
//! Every external collaborator sits behind one of these traits. Adapters in
//! `storage-adapters` and `auth-adapters` implement them; services only ever
//! see `Arc<dyn Port>`.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::errors::{StoreError, TokenError};
use crate::models::{ArchiveRecord, AuthenticatedUser, Credential, Location, Post};

/// Keyed username -> password lookup with a conditional insert.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find(&self, username: &str) -> Result<Option<Credential>, StoreError>;

    /// Inserts only when no entry exists for the username.
    /// Returns `false` when an entry was already present.
    async fn insert_if_absent(&self, credential: &Credential) -> Result<bool, StoreError>;
}

/// Blob storage that hands back a publicly dereferenceable URL.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &mime::Mime,
    ) -> Result<String, StoreError>;
}

/// Geo-indexed search engine.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GeoIndex: Send + Sync {
    /// Indexes one post under its id. Replaces an existing document with the same id.
    async fn index(&self, post: &Post) -> Result<(), StoreError>;

    /// Returns the raw source document of every hit within `radius_km` of
    /// `center`, in the engine's default order. Decoding is left to the caller.
    async fn within(
        &self,
        center: Location,
        radius_km: f64,
    ) -> Result<Vec<serde_json::Value>, StoreError>;
}

/// Wide-column sink used for best-effort archival.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn archive(&self, record: &ArchiveRecord) -> Result<(), StoreError>;
}

/// Ephemeral key-value cache with per-entry expiry.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SearchCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), StoreError>;
}

/// Moderation predicate applied to search results.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ContentFilter: Send + Sync {
    /// `true` when the message must be withheld from results.
    fn is_filtered(&self, message: &str) -> bool;
}

/// Issues and verifies opaque bearer tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenService: Send + Sync {
    fn issue(&self, username: &str) -> Result<String, TokenError>;

    fn verify(&self, token: &str) -> Result<AuthenticatedUser, TokenError>;
}
