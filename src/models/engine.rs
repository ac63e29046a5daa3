// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use serde_json::{Map, Value};

/// A completed engine call.
///
/// `ok` only reflects the HTTP status; a 2xx response may still carry an
/// unusable body. `parsed` is `None` when `raw` is empty or not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResult {
    pub ok: bool,
    pub status_code: u16,
    pub status_text: String,
    pub raw: String,
    pub parsed: Option<Value>,
}

impl UpstreamResult {
    /// The parsed body when it is a JSON object.
    pub fn object(&self) -> Option<&Map<String, Value>> {
        self.parsed.as_ref().and_then(Value::as_object)
    }

    /// The engine's own `message` field, if it sent a non-empty one.
    pub fn message(&self) -> Option<String> {
        match self.object()?.get("message")? {
            Value::Null | Value::Bool(false) => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Text used to judge a failure: the engine message, else the raw body.
    pub fn failure_text(&self) -> String {
        self.message().unwrap_or_else(|| self.raw.clone())
    }

    /// What the client sees as `engineResponse` for a failed call.
    pub fn diagnostic_body(&self) -> Value {
        self.parsed
            .clone()
            .unwrap_or_else(|| Value::String(self.raw.clone()))
    }
}
