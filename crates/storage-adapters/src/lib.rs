//! around/crates/storage-adapters/src/lib.rs
//!
//! Implementations of the storage ports. The in-memory adapters are always
//! built; each network backend sits behind its own cargo feature.

pub mod memory;

#[cfg(feature = "media-local")]
pub mod local_media;

#[cfg(feature = "media-s3")]
pub mod s3;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis_cache;

#[cfg(feature = "search-elasticsearch")]
pub mod elasticsearch;

#[cfg(feature = "archive-clickhouse")]
pub mod clickhouse;

pub use memory::{
    haversine_km, MemoryArchive, MemoryCache, MemoryCredentialStore, MemoryGeoIndex,
    MemoryObjectStore,
};

#[cfg(feature = "media-local")]
pub use local_media::LocalMediaStore;

#[cfg(feature = "media-s3")]
pub use s3::{S3ObjectStore, S3Options};

#[cfg(feature = "db-postgres")]
pub use postgres::PgCredentialStore;

#[cfg(feature = "redis")]
pub use redis_cache::RedisSearchCache;

#[cfg(feature = "search-elasticsearch")]
pub use self::elasticsearch::EsGeoIndex;

#[cfg(feature = "archive-clickhouse")]
pub use self::clickhouse::ClickHouseArchive;
