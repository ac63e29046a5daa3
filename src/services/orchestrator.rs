// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Request pipeline between the HTTP handler and the engine:
//! authorize, validate, call (with fallback), map failures, normalize.

use crate::config::ProxyConfig;
use crate::error::OrchestratorError;
use crate::models::analysis::{
    is_truthy, AnalysisRequest, CrawlerTunables, EngineRequest, NormalizedAnalysis,
};
use crate::models::engine::UpstreamResult;
use crate::services::classifier::friendly_message;
use crate::services::engine::{Engine, EngineClient, EngineError};
use crate::services::fallback::{AttemptSource, FallbackPolicy};
use crate::services::logging::truncate_for_log;
use axum::http::StatusCode;
use serde_json::Value;
use std::sync::Arc;

const LOGGED_URL_CHARS: usize = 200;

pub struct Orchestrator<E = EngineClient> {
    config: Arc<ProxyConfig>,
    policy: FallbackPolicy<E>,
}

impl Orchestrator<EngineClient> {
    /// Orchestrator talking to the engine over HTTP.
    pub fn from_config(config: Arc<ProxyConfig>) -> Result<Self, EngineError> {
        let engine = EngineClient::new(&config)?;
        Ok(Self::new(config, engine))
    }
}

impl<E: Engine> Orchestrator<E> {
    pub fn new(config: Arc<ProxyConfig>, engine: E) -> Self {
        Self {
            config,
            policy: FallbackPolicy::new(engine),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn authorize(&self, provided_key: Option<&str>) -> Result<(), OrchestratorError> {
        if self.config.access_key.verify(provided_key) {
            Ok(())
        } else {
            Err(OrchestratorError::Unauthorized)
        }
    }

    /// Run one validated request against the engine.
    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
    ) -> Result<NormalizedAnalysis, OrchestratorError> {
        tracing::info!(
            url = %truncate_for_log(&request.url, LOGGED_URL_CHARS),
            use_crawler = request.use_crawler,
            engine = %self.config.engine_url,
            "Forwarding URL to engine"
        );

        let outcome = self.policy.run(&EngineRequest::primary(request)).await?;
        let result = outcome.result;

        if !result.ok {
            return Err(upstream_failure(&result, &request.url));
        }

        let payload = match result.parsed {
            Some(Value::Object(payload)) => payload,
            _ => return Err(OrchestratorError::Malformed { raw: result.raw }),
        };

        let analysis = NormalizedAnalysis::from_payload(payload, &request.url);
        tracing::info!(
            url = %truncate_for_log(&request.url, LOGGED_URL_CHARS),
            files = analysis.files.len(),
            fallback = outcome.source == AttemptSource::Fallback,
            mode = analysis.mode.as_deref().unwrap_or("default"),
            "URL analyzed"
        );
        Ok(analysis)
    }
}

/// Validate a loosely parsed request body.
///
/// Only the `http(s)://` prefix is checked; anything past it is left for the
/// engine to reject.
pub fn validate_request(body: &Value) -> Result<AnalysisRequest, OrchestratorError> {
    let url = match body.get("url") {
        Some(Value::String(url)) => url.trim(),
        _ => "",
    };

    if url.is_empty() {
        return Err(OrchestratorError::MissingUrl);
    }
    if !is_http_url(url) {
        return Err(OrchestratorError::InvalidUrl);
    }

    Ok(AnalysisRequest {
        url: url.to_string(),
        use_crawler: is_truthy(body.get("useCrawler")),
        tunables: CrawlerTunables::from_body(body),
    })
}

fn is_http_url(url: &str) -> bool {
    let lower = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Map a non-2xx engine result to the client-facing error.
fn upstream_failure(result: &UpstreamResult, url: &str) -> OrchestratorError {
    let status = if (400..500).contains(&result.status_code) {
        StatusCode::from_u16(result.status_code).unwrap_or(StatusCode::BAD_GATEWAY)
    } else {
        StatusCode::BAD_GATEWAY
    };

    let debug_message = result.message().unwrap_or_else(|| {
        format!(
            "Engine retornou {} {}",
            result.status_code, result.status_text
        )
    });

    OrchestratorError::Upstream {
        status,
        message: friendly_message(&debug_message, url),
        engine_status: result.status_code,
        engine_response: result.diagnostic_body(),
        debug_message,
    }
}
