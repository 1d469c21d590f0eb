//! # Handlers
//!
//! Thin translation between HTTP and the services: decode the request, call
//! one service operation, encode the result.

use axum::extract::{Multipart, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use bytes::Bytes;
use domains::{Location, MediaUpload, Post, PostDraft};
use prometheus_client::encoding::text::encode;
use serde::Deserialize;
use services::Ingested;
use tracing::{debug, info, warn};

use crate::error::{ApiError, FormError};
use crate::middleware::MaybeUser;
use crate::state::AppState;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// `POST /post`: multipart `message`, `lat`, `lon` and an optional `image`.
pub async fn create_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    multipart: Multipart,
) -> Result<Json<Post>, ApiError> {
    state.ingestion.authorize(user.as_ref())?;
    let draft = read_post_form(multipart).await?;

    let Ingested { post, dispatched } = state.ingestion.ingest(user.as_ref(), draft).await?;
    // Index and archive writes keep running after the response is sent.
    debug!(post_id = %post.id, archive = dispatched.has_archive_write(), "fan-out detached");
    drop(dispatched);

    Ok(Json(post))
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostDraft, FormError> {
    let mut message = None;
    let mut lat = None;
    let mut lon = None;
    let mut media = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FormError::Multipart(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "message" => message = Some(field_text(field).await?),
            "lat" => lat = Some(field_text(field).await?),
            "lon" => lon = Some(field_text(field).await?),
            "image" => {
                let declared = field.content_type().and_then(|ct| ct.parse::<mime::Mime>().ok());
                let guessed = field
                    .file_name()
                    .map(|name| mime_guess::from_path(name).first_or_octet_stream());
                let content_type = declared
                    .or(guessed)
                    .unwrap_or(mime::APPLICATION_OCTET_STREAM);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| FormError::Multipart(e.body_text()))?;
                // Browsers send an empty part when no file was chosen.
                if !data.is_empty() {
                    media = Some(MediaUpload { data, content_type });
                }
            }
            other => debug!(field = other, "ignoring unknown form field"),
        }
    }

    let lat = lat.ok_or(FormError::Missing("lat"))?;
    let lon = lon.ok_or(FormError::Missing("lon"))?;
    Ok(PostDraft {
        message: message.unwrap_or_default(),
        location: Location::new(parse_coordinate("lat", &lat)?, parse_coordinate("lon", &lon)?),
        media,
    })
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> Result<String, FormError> {
    field
        .text()
        .await
        .map_err(|e| FormError::Multipart(e.body_text()))
}

fn parse_coordinate(field: &'static str, value: &str) -> Result<f64, FormError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| FormError::NotANumber {
            field,
            value: value.to_string(),
        })
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub range: Option<String>,
}

/// `GET /search?lat=&lon=&range=`: JSON array of posts, possibly from cache.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let lat = params
        .lat
        .ok_or_else(|| ApiError::from(FormError::Missing("lat")))?;
    let lon = params
        .lon
        .ok_or_else(|| ApiError::from(FormError::Missing("lon")))?;

    let body: Bytes = state
        .search
        .search_cached(&lat, &lon, params.range.as_deref())
        .await?;
    Ok(([(CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())], body))
}

#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    pub username: String,
    pub password: String,
}

fn parse_credentials(body: &[u8]) -> Result<CredentialsBody, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("cannot decode credentials: {e}")))
}

/// `POST /signup`: JSON `{username, password}`.
pub async fn signup(State(state): State<AppState>, body: Bytes) -> Result<&'static str, ApiError> {
    let creds = parse_credentials(&body)?;
    if state.gate.register(&creds.username, &creds.password).await {
        info!(username = %creds.username, "user registered");
        Ok("Signup succeeded")
    } else {
        Err(ApiError::internal("failed to save user"))
    }
}

/// `POST /login`: JSON `{username, password}`; answers with a bearer token.
pub async fn login(State(state): State<AppState>, body: Bytes) -> Result<String, ApiError> {
    let creds = parse_credentials(&body)?;
    if !state.gate.authenticate(&creds.username, &creds.password).await {
        return Err(ApiError::forbidden("invalid username or password"));
    }
    state.tokens.issue(&creds.username).map_err(|e| {
        warn!(username = %creds.username, error = %e, "token issuance failed");
        ApiError::internal("failed to issue token")
    })
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let mut body = String::new();
    encode(&mut body, &state.registry)
        .map_err(|e| ApiError::internal(format!("metrics encoding failed: {e}")))?;
    Ok(([(CONTENT_TYPE, OPENMETRICS_CONTENT_TYPE)], body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_must_be_finite_numbers() {
        assert_eq!(parse_coordinate("lat", " 37.7 ").unwrap(), 37.7);
        assert!(parse_coordinate("lat", "north").is_err());
        assert!(parse_coordinate("lon", "NaN").is_err());
        assert!(parse_coordinate("lon", "").is_err());
    }

    #[test]
    fn credentials_body_requires_both_fields() {
        assert!(parse_credentials(br#"{"username":"a","password":"b"}"#).is_ok());
        assert!(parse_credentials(br#"{"username":"a"}"#).is_err());
        assert!(parse_credentials(b"not json").is_err());
    }
}
