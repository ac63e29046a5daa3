// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Request and response shapes of the analysis endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Fields checked in order when picking the text content of an analysis.
const CONTENT_FIELDS: [&str; 4] = ["optimizedContent", "content", "summary", "message"];

/// Body of `POST /avalie` as documented in the OpenAPI schema.
///
/// The handler never deserializes into this type directly: the body is read as
/// loose JSON so that malformed tunables are dropped instead of rejected.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    /// Page to analyze, must start with http:// or https://
    pub url: Option<String>,
    /// Ask the engine for a multi-page crawl
    pub use_crawler: Option<bool>,
    pub max_pages: Option<u64>,
    pub max_tasks: Option<u64>,
    pub timeout: Option<u64>,
    pub delay: Option<f64>,
}

/// Optional crawler knobs forwarded to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerTunables {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tasks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<f64>,
}

impl CrawlerTunables {
    /// Pick the tunables out of a loose request body.
    /// Each value is checked on its own; anything that is not positive is dropped.
    pub fn from_body(body: &Value) -> Self {
        Self {
            max_pages: positive_int(body.get("maxPages")),
            max_tasks: positive_int(body.get("maxTasks")),
            timeout: positive_int(body.get("timeout")),
            delay: positive_number(body.get("delay")),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A validated analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub url: String,
    pub use_crawler: bool,
    pub tunables: CrawlerTunables,
}

/// Body sent to the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRequest {
    pub url: String,
    pub use_crawler: bool,
    #[serde(flatten)]
    pub tunables: CrawlerTunables,
}

impl EngineRequest {
    /// Tunables only travel along when the crawler is requested.
    pub fn primary(request: &AnalysisRequest) -> Self {
        let tunables = if request.use_crawler {
            request.tunables.clone()
        } else {
            CrawlerTunables::default()
        };
        Self {
            url: request.url.clone(),
            use_crawler: request.use_crawler,
            tunables,
        }
    }

    /// Same target, single-page summary, no tunables.
    pub fn without_crawler(&self) -> Self {
        Self {
            url: self.url.clone(),
            use_crawler: false,
            tunables: CrawlerTunables::default(),
        }
    }
}

/// Engine output reduced to the fields the gateway understands.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedAnalysis {
    pub analyzed_url: String,
    pub content: String,
    pub files: Vec<Value>,
    pub warning: Option<String>,
    pub mode: Option<String>,
    /// The full engine object, returned to the client as `engineResponse`.
    pub payload: Map<String, Value>,
}

impl NormalizedAnalysis {
    pub fn from_payload(payload: Map<String, Value>, requested_url: &str) -> Self {
        let content = CONTENT_FIELDS
            .iter()
            .find_map(|field| non_empty_str(payload.get(*field)))
            .unwrap_or_default()
            .to_string();

        let files = match payload.get("files") {
            Some(Value::Array(files)) => files.clone(),
            _ => Vec::new(),
        };

        let analyzed_url = non_empty_str(payload.get("analyzedUrl"))
            .unwrap_or(requested_url)
            .to_string();

        Self {
            analyzed_url,
            content,
            files,
            warning: non_empty_str(payload.get("warning")).map(str::to_string),
            mode: non_empty_str(payload.get("mode")).map(str::to_string),
            payload,
        }
    }
}

/// One downloadable piece of engine output.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedArtifact {
    pub filename: String,
    pub mime_type: Option<String>,
    pub data: Value,
}

impl NamedArtifact {
    pub const DEFAULT_FILENAME: &'static str = "file.json";

    /// Read an element of the engine's `files` array. Entries without `data`
    /// carry themselves as data.
    pub fn from_value(entry: &Value) -> Self {
        let filename = match entry.get("filename") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => Self::DEFAULT_FILENAME.to_string(),
        };

        let data = match entry.get("data") {
            Some(Value::Null) | None => entry.clone(),
            Some(data) => data.clone(),
        };

        Self {
            filename,
            mime_type: non_empty_str(entry.get("mimeType")).map(str::to_string),
            data,
        }
    }
}

/// Success body of `POST /avalie`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub status: String,
    pub analyzed_url: String,
    pub content: String,
    #[schema(value_type = Vec<Object>)]
    pub files: Vec<Value>,
    #[schema(value_type = Object)]
    pub engine_response: Value,
}

impl From<NormalizedAnalysis> for AnalysisResponse {
    fn from(analysis: NormalizedAnalysis) -> Self {
        Self {
            status: "success".to_string(),
            analyzed_url: analysis.analyzed_url,
            content: analysis.content,
            files: analysis.files,
            engine_response: Value::Object(analysis.payload),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Loose truthiness used for flags coming from browser clients:
/// `null`, `false`, `0`, `""` and missing values are false.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn positive_int(value: Option<&Value>) -> Option<u64> {
    let n = as_number(value)?;
    (n.is_finite() && n > 0.0 && n.fract() == 0.0 && n <= u64::MAX as f64).then_some(n as u64)
}

fn positive_number(value: Option<&Value>) -> Option<f64> {
    let n = as_number(value)?;
    (n.is_finite() && n > 0.0).then_some(n)
}
