// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::Context;
use clap::Parser;
use seo_gateway::app::{create_router, AppState, VERSION};
use seo_gateway::config::{Cli, ProxyConfig};
use seo_gateway::services::logging::init_tracing;
use seo_gateway::services::orchestrator::Orchestrator;
use std::sync::Arc;
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    let config = ProxyConfig::from(Cli::parse());
    init_tracing(config.log_format);

    let config = Arc::new(config);
    let orchestrator =
        Orchestrator::from_config(config.clone()).context("Failed to build engine client")?;
    let app = create_router(AppState::new(orchestrator));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!(
        version = VERSION,
        addr = %addr,
        engine = %config.engine_url,
        timeout_ms = config.engine_timeout.as_millis() as u64,
        access_key = ?config.access_key,
        origins = ?config.allowed_origins,
        "seo-gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Shutting down seo-gateway");
    Ok(())
}
