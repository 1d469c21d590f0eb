//! around/crates/services/src/lib.rs
//!
//! Application services: the credential gate, post ingestion with its
//! detached write fan-out, and the cache-aside geo search.

pub mod cached_search;
pub mod credential_gate;
pub mod fanout;
pub mod geo_search;
pub mod ingestion;
pub mod metrics;
pub mod moderation;
pub mod timeouts;

pub use cached_search::{CacheKeyMode, CachedSearch};
pub use credential_gate::CredentialGate;
pub use fanout::Dispatched;
pub use geo_search::GeoSearch;
pub use ingestion::{Ingested, PostIngestion};
pub use metrics::PipelineMetrics;
pub use moderation::BlocklistFilter;
pub use timeouts::Timeouts;
