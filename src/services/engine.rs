// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! HTTP client for the analysis engine.

use crate::config::ProxyConfig;
use crate::models::analysis::EngineRequest;
use crate::models::engine::UpstreamResult;
use crate::services::payload::read_payload;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The call did not finish before its deadline and was dropped.
    #[error("engine call exceeded {0:?}")]
    Timeout(Duration),

    #[error("engine request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Something that can run one analysis call.
///
/// Each call owns its own deadline; a second call never inherits what is
/// left of the first one's budget.
pub trait Engine: Send + Sync {
    fn analyze(
        &self,
        request: &EngineRequest,
    ) -> impl Future<Output = Result<UpstreamResult, EngineError>> + Send;
}

#[derive(Debug, Clone)]
pub struct EngineClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl EngineClient {
    pub fn new(config: &ProxyConfig) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            endpoint: config.engine_url.clone(),
            timeout: config.engine_timeout,
        })
    }
}

impl Engine for EngineClient {
    async fn analyze(&self, request: &EngineRequest) -> Result<UpstreamResult, EngineError> {
        let call = async {
            let response = self.http.post(&self.endpoint).json(request).send().await?;
            Ok::<_, EngineError>(read_payload(response).await?)
        };

        // Dropping `call` on expiry aborts the in-flight request
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| EngineError::Timeout(self.timeout))?
    }
}
