//! `teamflow-mailer` - HTTP front for transactional email.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use teamflow_mailer::{EmailGateway, ProcessEnv, config, router};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "teamflow_mailer=info,teamflow_smtp=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = config::bind_addr(&ProcessEnv);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(%addr, "Starting TeamFlow mailer");
    axum::serve(listener, router(Arc::new(EmailGateway::from_env())))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("TeamFlow mailer stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
