// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::engine::UpstreamResult;
use serde_json::Value;

/// Consume an engine response body and decode it as far as possible.
///
/// Only a failure to read the body is an error; a body that is not JSON is
/// kept as raw text.
pub async fn read_payload(response: reqwest::Response) -> Result<UpstreamResult, reqwest::Error> {
    let status = response.status();
    let raw = response.text().await?;
    let parsed = parse_payload(&raw);

    Ok(UpstreamResult {
        ok: status.is_success(),
        status_code: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        raw,
        parsed,
    })
}

/// `None` for empty text, invalid JSON or a literal `null`.
pub fn parse_payload(raw: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, bytes = raw.len(), "Engine returned non-JSON payload");
            None
        }
    }
}
