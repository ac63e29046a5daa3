// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Application state, access-key extractor, route handlers, and router
//! construction.
//!
//! This module is `pub` so that integration tests can build a test router directly
//! without starting the full binary.

use crate::error::{ErrorBody, OrchestratorError};
use crate::models::analysis::{AnalysisResponse, AnalyzeBody, HealthResponse, NormalizedAnalysis};
use crate::models::version::VersionResponse;
use crate::services::access_key::ACCESS_KEY_HEADER;
use crate::services::archive::{stream_archive, ARCHIVE_FILENAME};
use crate::services::orchestrator::{validate_request, Orchestrator};
use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, FromRequestParts, Query, State},
    http::{header, request::Parts, HeaderName, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Gateway version extracted from `Cargo.toml` at compile time.
/// The patch segment can be overridden via `SEO_GATEWAY_PATCH_VERSION` (see `build.rs`).
pub const VERSION: &str = env!("SEO_GATEWAY_VERSION");

/// Route the frontend posts analyses to.
pub const ANALYZE_PATH: &str = "/avalie";

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Shared application state injected into every route handler via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }
}

// ---------------------------------------------------------------------------
// Access-key extractor
// ---------------------------------------------------------------------------

/// Axum extractor that passes only when the request carries the configured
/// shared key in `x-wce-key`, or when no key is configured.
///
/// Runs before the body is read, so an unauthorized caller gets a 401 whatever
/// it sent.
pub struct Authorized;

impl FromRequestParts<AppState> for Authorized {
    type Rejection = OrchestratorError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(ACCESS_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        state.orchestrator.authorize(provided)?;
        Ok(Authorized)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeQuery {
    pub zip: Option<String>,
}

impl AnalyzeQuery {
    pub fn wants_archive(&self) -> bool {
        matches!(self.zip.as_deref(), Some("1") | Some("true"))
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /avalie - Analyze a URL through the engine.
#[utoipa::path(
    post,
    path = "/avalie",
    tag = "analysis",
    request_body = AnalyzeBody,
    params(
        ("zip" = Option<String>, Query, description = "`1` or `true` returns a ZIP archive instead of JSON"),
        ("x-wce-key" = Option<String>, Header, description = "Shared access key, required when configured")
    ),
    responses(
        (status = 200, description = "Normalized analysis, or `application/zip` when zip is requested", body = AnalysisResponse),
        (status = 400, description = "Missing or invalid URL", body = ErrorBody),
        (status = 401, description = "Invalid access key", body = ErrorBody),
        (status = 502, description = "Engine failed or answered in an unexpected format", body = ErrorBody),
        (status = 504, description = "Engine did not answer in time", body = ErrorBody)
    )
)]
pub async fn analyze_handler(
    _auth: Authorized,
    State(state): State<AppState>,
    query: Result<Query<AnalyzeQuery>, QueryRejection>,
    body: Bytes,
) -> Result<Response, OrchestratorError> {
    // Ambiguous or undecodable query strings (e.g. a repeated `zip`) fall back to JSON
    let query = query.map(|Query(q)| q).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Ignoring unparseable query string");
        AnalyzeQuery::default()
    });
    let request = validate_request(&parse_body(&body))?;
    let analysis = state.orchestrator.analyze(&request).await?;

    if query.wants_archive() {
        return archive_response(analysis).await;
    }

    Ok(Json(AnalysisResponse::from(analysis)).into_response())
}

/// GET /health - Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "analysis",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /version - Build version.
#[utoipa::path(
    get,
    path = "/version",
    tag = "analysis",
    responses((status = 200, description = "Gateway version", body = VersionResponse))
)]
pub async fn version_handler() -> Json<VersionResponse> {
    Json(VersionResponse {
        service: "seo-gateway".to_string(),
        version: VERSION.to_string(),
    })
}

/// Empty or malformed bodies behave like `{}` so they fail URL validation
/// with the usual error shape.
fn parse_body(body: &Bytes) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Ignoring malformed request body");
        Value::Null
    })
}

async fn archive_response(analysis: NormalizedAnalysis) -> Result<Response, OrchestratorError> {
    let body = stream_archive(analysis).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{ARCHIVE_FILENAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(analyze_handler, health_handler, version_handler),
    components(schemas(AnalyzeBody, AnalysisResponse, ErrorBody, HealthResponse, VersionResponse)),
    tags((name = "analysis", description = "SEO analysis gateway"))
)]
pub struct ApiDoc;

/// Allow-list CORS. `*` reflects any origin; otherwise only listed origins
/// get `Access-Control-Allow-Origin`, echoed back exactly.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(ACCESS_KEY_HEADER),
        ]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::mirror_request());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _parts: &Parts| {
            let is_allowed = allowed.contains(origin);
            if !is_allowed {
                tracing::warn!(origin = ?origin, "CORS blocked origin");
            }
            is_allowed
        },
    ))
}

/// Build the Axum application router.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.orchestrator.config().allowed_origins);

    Router::new()
        .route(ANALYZE_PATH, post(analyze_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
