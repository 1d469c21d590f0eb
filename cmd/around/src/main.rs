//! # around
//!
//! Assembles the service from settings and compile-time features, then
//! serves HTTP until Ctrl-C or SIGTERM. A backend that is not configured (or
//! not compiled in) falls back to its in-memory adapter.

use std::sync::Arc;
use std::time::Duration;

use api_adapters::{build_router, AppState};
use auth_adapters::JwtTokenService;
use configs::{
    ArchiveSettings, CacheSettings, CredentialSettings, LogFormat, LogSettings, MediaBackend,
    MediaSettings, SearchSettings, Settings,
};
use domains::{ArchiveStore, CredentialStore, GeoIndex, ObjectStore, SearchCache};
use prometheus_client::registry::Registry;
use secrecy::ExposeSecret;
use services::{
    BlocklistFilter, CacheKeyMode, CachedSearch, CredentialGate, GeoSearch, PipelineMetrics,
    PostIngestion, Timeouts,
};
use storage_adapters::{
    MemoryArchive, MemoryCache, MemoryCredentialStore, MemoryGeoIndex, MemoryObjectStore,
};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_tracing(&settings.log);

    // Both ring and aws-lc-rs end up linked; pick one process-wide.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let timeouts = Timeouts {
        collaborator: settings.timeouts.collaborator(),
        upload: settings.timeouts.upload(),
    };
    let metrics = PipelineMetrics::new();
    let mut registry = Registry::default();
    metrics.register(&mut registry);

    let credentials = credential_store(&settings.credentials, timeouts.collaborator).await?;
    let objects = object_store(&settings.media).await?;
    let index = geo_index(&settings.search, timeouts.collaborator).await?;
    let cache = search_cache(&settings.cache).await?;

    let mut ingestion = PostIngestion::new(objects, index.clone(), timeouts, metrics.clone());
    if let Some(archive) = archive_store(&settings.archive).await {
        ingestion = ingestion.with_archive(archive);
    }

    let filter = BlocklistFilter::new(&settings.moderation.blocked_terms);
    let key_mode = if settings.cache.normalize_keys {
        CacheKeyMode::Normalized
    } else {
        CacheKeyMode::Raw
    };
    let search = CachedSearch::new(
        GeoSearch::new(index, Arc::new(filter), timeouts.collaborator),
        cache,
        settings.cache.ttl(),
        timeouts.collaborator,
        metrics,
    )
    .with_key_mode(key_mode);

    let tokens = JwtTokenService::new(
        settings.auth.jwt_secret.expose_secret().as_bytes(),
        chrono::Duration::hours(settings.auth.token_ttl_hours),
    )?;

    let state = AppState {
        gate: Arc::new(CredentialGate::new(credentials, timeouts.collaborator)),
        ingestion: Arc::new(ingestion),
        search: Arc::new(search),
        tokens: Arc::new(tokens),
        registry: Arc::new(registry),
        max_upload_bytes: settings.server.max_upload_bytes,
    };

    let addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "around listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("around stopped");
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

async fn credential_store(
    settings: &CredentialSettings,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn CredentialStore>> {
    match &settings.database_url {
        #[cfg(feature = "db-postgres")]
        Some(url) => {
            let store = storage_adapters::PgCredentialStore::connect_lazy(
                url.expose_secret(),
                settings.max_connections,
                timeout,
            )?;
            if let Err(err) = store.ensure_schema().await {
                warn!(error = %err, "credentials table not ensured; will retry on first use");
            }
            info!("credentials: postgres");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "db-postgres"))]
        Some(_) => {
            let _ = timeout;
            warn!("credentials.database_url set but db-postgres is not compiled in");
            Ok(Arc::new(MemoryCredentialStore::new()))
        }
        None => {
            let _ = timeout;
            info!("credentials: in-memory");
            Ok(Arc::new(MemoryCredentialStore::new()))
        }
    }
}

async fn object_store(settings: &MediaSettings) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match settings.backend {
        #[cfg(feature = "media-local")]
        MediaBackend::Local => {
            info!(root = %settings.local_root, "media: local filesystem");
            Ok(Arc::new(storage_adapters::LocalMediaStore::new(
                settings.local_root.clone().into(),
                settings.public_base_url.clone(),
            )))
        }
        #[cfg(feature = "media-s3")]
        MediaBackend::S3 => {
            let options = storage_adapters::S3Options {
                bucket: settings.bucket.clone().unwrap_or_default(),
                region: settings.region.clone(),
                endpoint: settings.endpoint.clone(),
                public_base_url: settings.public_base_url.clone(),
            };
            info!(bucket = %options.bucket, "media: s3");
            Ok(Arc::new(storage_adapters::S3ObjectStore::new(options).await))
        }
        #[allow(unreachable_patterns)]
        MediaBackend::Local | MediaBackend::S3 => {
            warn!(backend = ?settings.backend, "media backend not compiled in; using in-memory");
            Ok(Arc::new(MemoryObjectStore::new(settings.public_base_url.clone())))
        }
        MediaBackend::Memory => {
            info!("media: in-memory");
            Ok(Arc::new(MemoryObjectStore::new(settings.public_base_url.clone())))
        }
    }
}

async fn geo_index(settings: &SearchSettings, timeout: Duration) -> anyhow::Result<Arc<dyn GeoIndex>> {
    match &settings.elasticsearch_url {
        #[cfg(feature = "search-elasticsearch")]
        Some(url) => {
            let index = storage_adapters::EsGeoIndex::new(url, &settings.index, settings.max_hits, timeout)?;
            if let Err(err) = index.ensure_index().await {
                warn!(error = %err, index = %settings.index, "geo index mapping not ensured; will retry on first write");
            }
            info!(index = %settings.index, "geo index: elasticsearch");
            Ok(Arc::new(index))
        }
        #[cfg(not(feature = "search-elasticsearch"))]
        Some(_) => {
            let _ = timeout;
            warn!("search.elasticsearch_url set but search-elasticsearch is not compiled in");
            Ok(Arc::new(MemoryGeoIndex::new()))
        }
        None => {
            let _ = timeout;
            info!("geo index: in-memory");
            Ok(Arc::new(MemoryGeoIndex::new()))
        }
    }
}

async fn archive_store(settings: &ArchiveSettings) -> Option<Arc<dyn ArchiveStore>> {
    if !settings.enabled {
        info!("archive: disabled");
        return None;
    }
    match &settings.clickhouse_url {
        #[cfg(feature = "archive-clickhouse")]
        Some(url) => {
            let mut archive =
                storage_adapters::ClickHouseArchive::new(url, &settings.database, &settings.table);
            if let (Some(user), Some(password)) = (&settings.user, &settings.password) {
                archive = archive.with_credentials(user, password);
            }
            if let Err(err) = archive.ensure_schema().await {
                warn!(error = %err, table = %settings.table, "archive table not ensured");
            }
            info!(table = %settings.table, "archive: clickhouse");
            Some(Arc::new(archive))
        }
        #[cfg(not(feature = "archive-clickhouse"))]
        Some(_) => {
            warn!("archive.clickhouse_url set but archive-clickhouse is not compiled in");
            Some(Arc::new(MemoryArchive::new()))
        }
        None => {
            info!("archive: in-memory");
            Some(Arc::new(MemoryArchive::new()))
        }
    }
}

async fn search_cache(settings: &CacheSettings) -> anyhow::Result<Arc<dyn SearchCache>> {
    match &settings.redis_url {
        #[cfg(feature = "redis")]
        Some(url) => {
            let cache = storage_adapters::RedisSearchCache::new(url)?;
            if let Err(err) = cache.health_check().await {
                warn!(error = %err, "redis not reachable; searches miss the cache until it is");
            }
            info!(ttl_secs = settings.ttl_secs, "search cache: redis");
            Ok(Arc::new(cache))
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            warn!("cache.redis_url set but redis is not compiled in");
            Ok(Arc::new(MemoryCache::new()))
        }
        None => {
            info!(ttl_secs = settings.ttl_secs, "search cache: in-memory");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}
