// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! The single error type of a gateway request and its JSON rendering.

use crate::services::archive::ArchiveError;
use crate::services::engine::EngineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

/// Terminal failure of an analysis request. The `Display` text is the
/// user-facing message; technical detail lives in the variant fields.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Chave de acesso invalida")]
    Unauthorized,

    #[error("Informe uma URL antes de continuar")]
    MissingUrl,

    #[error("URL invalida. Use enderecos iniciando com http:// ou https://")]
    InvalidUrl,

    /// The engine answered with a non-2xx status.
    #[error("{message}")]
    Upstream {
        status: StatusCode,
        message: String,
        engine_status: u16,
        engine_response: Value,
        debug_message: String,
    },

    /// 2xx with a body that is not a JSON object.
    #[error("Engine respondeu com formato inesperado")]
    Malformed { raw: String },

    #[error("Tempo de resposta esgotado ao contatar a engine")]
    Timeout { details: String },

    #[error("Nao foi possivel contatar a engine SEO")]
    Unreachable { details: String },

    #[error("Falha ao gerar o arquivo compactado")]
    Archive { details: String },
}

/// Error body shared by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub engine_response: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl OrchestratorError {
    pub fn status(&self) -> StatusCode {
        match self {
            OrchestratorError::Unauthorized => StatusCode::UNAUTHORIZED,
            OrchestratorError::MissingUrl | OrchestratorError::InvalidUrl => {
                StatusCode::BAD_REQUEST
            }
            OrchestratorError::Upstream { status, .. } => *status,
            OrchestratorError::Malformed { .. } | OrchestratorError::Unreachable { .. } => {
                StatusCode::BAD_GATEWAY
            }
            OrchestratorError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            OrchestratorError::Archive { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            status: "error".to_string(),
            message: self.to_string(),
            engine_status: None,
            engine_response: None,
            debug_message: None,
            details: None,
        };

        match self {
            OrchestratorError::Upstream {
                engine_status,
                engine_response,
                debug_message,
                ..
            } => {
                body.engine_status = Some(*engine_status);
                body.engine_response = Some(engine_response.clone());
                body.debug_message = Some(debug_message.clone());
            }
            OrchestratorError::Malformed { raw } => {
                body.engine_response = Some(Value::String(raw.clone()));
            }
            OrchestratorError::Timeout { details }
            | OrchestratorError::Unreachable { details }
            | OrchestratorError::Archive { details } => {
                body.details = Some(details.clone());
            }
            OrchestratorError::Unauthorized
            | OrchestratorError::MissingUrl
            | OrchestratorError::InvalidUrl => {}
        }

        body
    }
}

impl From<EngineError> for OrchestratorError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Timeout(_) => OrchestratorError::Timeout {
                details: err.to_string(),
            },
            EngineError::Transport(_) => OrchestratorError::Unreachable {
                details: err.to_string(),
            },
        }
    }
}

impl From<ArchiveError> for OrchestratorError {
    fn from(err: ArchiveError) -> Self {
        OrchestratorError::Archive {
            details: err.to_string(),
        }
    }
}

impl IntoResponse for OrchestratorError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = ?self, "Request failed");
        } else {
            tracing::info!(status = status.as_u16(), message = %self, "Request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            OrchestratorError::Unauthorized.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            OrchestratorError::MissingUrl.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OrchestratorError::InvalidUrl.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OrchestratorError::Malformed { raw: String::new() }.status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            OrchestratorError::Timeout {
                details: String::new()
            }
            .status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            OrchestratorError::Archive {
                details: String::new()
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_upstream_body_carries_diagnostics() {
        let err = OrchestratorError::Upstream {
            status: StatusCode::NOT_FOUND,
            message: "Pagina nao encontrada".to_string(),
            engine_status: 404,
            engine_response: json!({"message": "Pagina nao encontrada"}),
            debug_message: "Pagina nao encontrada".to_string(),
        };
        let body = serde_json::to_value(err.body()).unwrap();
        assert_eq!(
            body,
            json!({
                "status": "error",
                "message": "Pagina nao encontrada",
                "engineStatus": 404,
                "engineResponse": {"message": "Pagina nao encontrada"},
                "debugMessage": "Pagina nao encontrada"
            })
        );
    }

    #[test]
    fn test_simple_errors_have_no_diagnostics() {
        let body = serde_json::to_value(OrchestratorError::MissingUrl.body()).unwrap();
        assert_eq!(
            body,
            json!({"status": "error", "message": "Informe uma URL antes de continuar"})
        );
    }

    #[test]
    fn test_engine_timeout_maps_to_gateway_timeout() {
        let err: OrchestratorError = EngineError::Timeout(Duration::from_millis(10)).into();
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = err.body();
        assert_eq!(body.message, "Tempo de resposta esgotado ao contatar a engine");
        assert!(body.details.is_some());
    }

    #[test]
    fn test_into_response_status() {
        let response = OrchestratorError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
