//! # Domain Models
//!
//! These structs represent the core entities of around.
//! Post identifiers are random UUID v4 strings, unique across restarts.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Radius applied when a search omits `range`, in kilometres.
pub const DEFAULT_RADIUS_KM: f64 = 200.0;

/// Raw `range` value used in cache keys when the caller omits it.
pub const DEFAULT_RANGE_RAW: &str = "200";

/// A point on the globe, in degrees. No range validation is applied here;
/// the geo index is the one that rejects malformed coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// The unit of sharing: a message pinned to a location, optionally with media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    /// Username of the author, taken from the authenticated identity.
    pub user: String,
    pub message: String,
    pub location: Location,
    /// Public URL returned by the object store. Only set once the upload succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Post {
    /// Generates a fresh random 128-bit identifier.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Media attached to an ingestion request.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub data: Bytes,
    pub content_type: mime::Mime,
}

/// Everything a client supplies to create a post.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub message: String,
    pub location: Location,
    pub media: Option<MediaUpload>,
}

/// Center and radius of a geo-distance query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchQuery {
    pub center: Location,
    pub radius_km: f64,
}

impl SearchQuery {
    pub fn new(center: Location, radius_km: Option<f64>) -> Self {
        Self {
            center,
            radius_km: radius_km.unwrap_or(DEFAULT_RADIUS_KM),
        }
    }
}

/// Key under which a serialized result set is cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key built from the raw, unparsed query strings: `"37.70"` and `"37.7"`
    /// produce different keys.
    pub fn raw(lat: &str, lon: &str, range: Option<&str>) -> Self {
        Self(format!(
            "{}:{}:{}",
            lat,
            lon,
            range.unwrap_or(DEFAULT_RANGE_RAW)
        ))
    }

    /// Key built from the parsed numeric query, so textual variants of the
    /// same coordinate share an entry.
    pub fn normalized(query: &SearchQuery) -> Self {
        Self(format!(
            "{}:{}:{}",
            query.center.lat, query.center.lon, query.radius_km
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Username and password as stored by the credential store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Identity attached to a request once its bearer token has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

impl AuthenticatedUser {
    pub fn username(&self) -> &str {
        &self.0
    }
}

/// Row written to the wide-column archive: one column per post field plus
/// the time of the write.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveRecord {
    pub row_key: String,
    pub user: String,
    pub message: String,
    pub lat: f64,
    pub lon: f64,
    pub written_at: DateTime<Utc>,
}

impl ArchiveRecord {
    pub fn from_post(post: &Post, written_at: DateTime<Utc>) -> Self {
        Self {
            row_key: post.id.clone(),
            user: post.user.clone(),
            message: post.message.clone(),
            lat: post.location.lat,
            lon: post.location.lon,
            written_at,
        }
    }
}
