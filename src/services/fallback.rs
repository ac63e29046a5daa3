// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Two-attempt call policy: crawl first, fall back to a plain summary when the
//! site appears to block the crawler.

use crate::models::analysis::EngineRequest;
use crate::models::engine::UpstreamResult;
use crate::services::classifier::looks_blocked;
use crate::services::engine::{Engine, EngineError};
use serde_json::Value;

pub const FALLBACK_MODE: &str = "crawler_fallback_summary";

pub const FALLBACK_WARNING: &str = "Site protegido por anti-bot ou em manutencao. Nao foi possivel realizar analise completa com crawler; exibindo somente resumo.";

/// Which attempt produced the effective result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptSource {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyOutcome {
    pub result: UpstreamResult,
    pub source: AttemptSource,
}

pub struct FallbackPolicy<E> {
    engine: E,
}

impl<E: Engine> FallbackPolicy<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run the primary call and, when eligible, one fallback call.
    ///
    /// The primary call's transport errors are returned as is. A fallback that
    /// fails in any way leaves the primary failure as the outcome.
    pub async fn run(&self, request: &EngineRequest) -> Result<PolicyOutcome, EngineError> {
        let primary = self.engine.analyze(request).await?;

        if !Self::should_fall_back(request, &primary) {
            return Ok(PolicyOutcome {
                result: primary,
                source: AttemptSource::Primary,
            });
        }

        tracing::warn!(
            url = %request.url,
            engine_status = primary.status_code,
            "Crawler failed; retrying engine without crawler"
        );

        match self.engine.analyze(&request.without_crawler()).await {
            Ok(fallback) => match adopt(fallback) {
                Some(result) => Ok(PolicyOutcome {
                    result,
                    source: AttemptSource::Fallback,
                }),
                None => {
                    tracing::warn!(
                        url = %request.url,
                        "Fallback unusable; keeping crawler failure"
                    );
                    Ok(Self::keep(primary))
                }
            },
            Err(e) => {
                tracing::warn!(
                    url = %request.url,
                    error = %e,
                    "Fallback call failed; keeping crawler failure"
                );
                Ok(Self::keep(primary))
            }
        }
    }

    fn should_fall_back(request: &EngineRequest, primary: &UpstreamResult) -> bool {
        request.use_crawler
            && !primary.ok
            && looks_blocked(primary.status_code, &primary.failure_text())
    }

    fn keep(primary: UpstreamResult) -> PolicyOutcome {
        PolicyOutcome {
            result: primary,
            source: AttemptSource::Primary,
        }
    }
}

/// Accept a fallback result only when it is a 2xx JSON object, stamping the
/// warning and mode the client uses to flag a partial analysis.
fn adopt(mut fallback: UpstreamResult) -> Option<UpstreamResult> {
    if !fallback.ok {
        return None;
    }
    let Some(Value::Object(payload)) = fallback.parsed.as_mut() else {
        return None;
    };

    for (field, default) in [("warning", FALLBACK_WARNING), ("mode", FALLBACK_MODE)] {
        let present = match payload.get(field) {
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Null) | Some(Value::Bool(false)) | None => false,
            Some(_) => true,
        };
        if !present {
            payload.insert(field.to_string(), Value::String(default.to_string()));
        }
    }

    Some(fallback)
}
