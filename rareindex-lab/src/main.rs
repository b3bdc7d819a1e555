//! RareIndex lab service (rareindex) - Main entry point
//!
//! Serves the variant forms, record views, uploads and statistics over HTTP.
//! New variants are handed to the background annotation queue.

use anyhow::{Context, Result};
use clap::Parser;
use rareindex_common::config::RareIndexConfig;
use rareindex_lab::bootstrap::{init_tracing, Environment};
use rareindex_lab::db::users::ensure_fallback_user;
use rareindex_lab::services::annotation::providers;
use rareindex_lab::services::{AnnotationQueue, AnnotationService, PreviewService};
use rareindex_lab::{build_router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rareindex")]
#[command(about = "RareIndex laboratory information service")]
#[command(version)]
struct Args {
    /// Root folder holding the database and media
    #[arg(short, long, env = "RAREINDEX_ROOT")]
    root_folder: Option<PathBuf>,

    /// Bind address, overrides the configured one
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = RareIndexConfig::load();
    init_tracing(&config);

    info!(
        "Starting RareIndex lab service (rareindex) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let env = Environment::open(config, args.root_folder.as_deref()).await?;
    let default_user = match ensure_fallback_user(&env.pool, Some(env.config.default_user.as_str())).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Configured default user unavailable ({}), using first superuser", e);
            ensure_fallback_user(&env.pool, None).await?
        }
    };
    info!("Default acting user: {}", default_user.username);

    let previews = Arc::new(PreviewService::from_config(
        env.pool.clone(),
        env.media_dir.clone(),
        &env.config.preview,
    ));
    let mut state = AppState::new(env.pool.clone(), previews, default_user.id)
        .with_upload_limit(env.config.upload_limit_bytes());

    let mut worker = None;
    if env.config.annotation.enabled {
        let providers = providers::from_config(&env.config.annotation)
            .context("Failed to build annotation clients")?;
        let service = Arc::new(AnnotationService::new(env.pool.clone(), providers));
        let (queue, handle) = AnnotationQueue::start(service, env.config.annotation.queue_capacity);
        state = state.with_annotations(queue);
        worker = Some(handle);
    } else {
        info!("Annotation disabled by configuration");
    }

    let bind = args.bind.unwrap_or_else(|| env.config.bind.clone());
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("rareindex listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last queue handle; the worker drains and exits
    if let Some(handle) = worker {
        if let Err(e) = handle.await {
            warn!("Annotation worker ended abnormally: {}", e);
        }
    }
    info!("rareindex stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
