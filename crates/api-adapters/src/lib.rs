//! around/crates/api-adapters/src/lib.rs
//!
//! HTTP surface of the service (feature `web-axum`).

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;
#[cfg(feature = "web-axum")]
pub mod state;

#[cfg(feature = "web-axum")]
pub use router::build_router;
#[cfg(feature = "web-axum")]
pub use state::AppState;

#[cfg(feature = "web-axum")]
mod router {
    use axum::extract::DefaultBodyLimit;
    use axum::routing::{get, post};
    use axum::Router;
    use tower::ServiceBuilder;
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
    use tower_http::trace::TraceLayer;

    use crate::{handlers, middleware, state::AppState};

    /// Routes, with `/post` behind the bearer middleware.
    pub fn build_router(state: AppState) -> Router {
        let trace_layer =
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            });

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let authenticated = Router::new()
            .route("/post", post(handlers::create_post))
            .route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::bearer_auth,
            ));

        Router::new()
            .merge(authenticated)
            .route("/search", get(handlers::search))
            .route("/signup", post(handlers::signup))
            .route("/login", post(handlers::login))
            .route("/healthz", get(handlers::healthz))
            .route("/metrics", get(handlers::metrics))
            .layer(DefaultBodyLimit::max(state.max_upload_bytes))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(trace_layer)
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(cors),
            )
            .with_state(state)
    }
}
