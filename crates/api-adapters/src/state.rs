//! Shared application state handed to every handler.

use std::sync::Arc;

use domains::TokenService;
use prometheus_client::registry::Registry;
use services::{CachedSearch, CredentialGate, PostIngestion};

/// Built once at startup; every field is immutable afterwards.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<CredentialGate>,
    pub ingestion: Arc<PostIngestion>,
    pub search: Arc<CachedSearch>,
    pub tokens: Arc<dyn TokenService>,
    pub registry: Arc<Registry>,
    pub max_upload_bytes: usize,
}
