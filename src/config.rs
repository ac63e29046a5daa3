// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Startup configuration.
//!
//! Everything is read once in `main` and frozen into a [`ProxyConfig`] that is
//! handed to the orchestrator. Request handlers never look at the environment.

use crate::services::access_key::AccessKey;
use clap::{Parser, ValueEnum};
use std::time::Duration;

pub const DEFAULT_ENGINE_URL: &str = "http://localhost:5000/analyze";
pub const DEFAULT_ENGINE_TIMEOUT_MS: u64 = 180_000;
pub const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Command line, with every flag also settable from the environment.
#[derive(Debug, Parser)]
#[command(name = "seo-gateway", version, about = "Gateway in front of the SEO analysis engine")]
pub struct Cli {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Full URL of the engine's analyze endpoint
    #[arg(long, env = "ENGINE_URL", default_value = DEFAULT_ENGINE_URL)]
    pub engine_url: String,

    /// Deadline for each engine call, in milliseconds
    #[arg(long, env = "ENGINE_TIMEOUT_MS", default_value_t = DEFAULT_ENGINE_TIMEOUT_MS)]
    pub engine_timeout_ms: u64,

    /// Value clients must send in `x-wce-key`; blank disables the check
    #[arg(long, env = "WCE_SHARED_KEY", default_value = "", hide_env_values = true)]
    pub shared_key: String,

    /// Comma separated list of allowed origins, `*` for any
    #[arg(long, env = "CORS_ORIGIN", default_value = "*")]
    pub cors_origin: String,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub engine_url: String,
    pub engine_timeout: Duration,
    pub access_key: AccessKey,
    pub allowed_origins: Vec<String>,
    pub log_format: LogFormat,
}

impl ProxyConfig {
    /// Defaults for everything except the engine address.
    pub fn new(engine_url: impl Into<String>) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            engine_url: engine_url.into(),
            engine_timeout: Duration::from_millis(DEFAULT_ENGINE_TIMEOUT_MS),
            access_key: AccessKey::disabled(),
            allowed_origins: vec!["*".to_string()],
            log_format: LogFormat::Text,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.engine_timeout = timeout;
        self
    }

    pub fn with_access_key(mut self, key: &str) -> Self {
        self.access_key = AccessKey::new(key);
        self
    }

    pub fn with_allowed_origins(mut self, origins: &str) -> Self {
        self.allowed_origins = parse_origins(origins);
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl From<Cli> for ProxyConfig {
    fn from(cli: Cli) -> Self {
        // A zero deadline would fail every call
        let timeout_ms = if cli.engine_timeout_ms == 0 {
            DEFAULT_ENGINE_TIMEOUT_MS
        } else {
            cli.engine_timeout_ms
        };

        Self {
            host: cli.host,
            port: cli.port,
            engine_url: cli.engine_url,
            engine_timeout: Duration::from_millis(timeout_ms),
            access_key: AccessKey::new(&cli.shared_key),
            allowed_origins: parse_origins(&cli.cors_origin),
            log_format: cli.log_format,
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
