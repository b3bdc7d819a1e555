//! rareindex-lab library
//!
//! HTTP service and management commands for the RareIndex laboratory
//! information system. The binaries are thin shells around this crate so
//! integration tests can build the router against an in-memory database.

pub mod api;
pub mod bootstrap;
pub mod db;
pub mod error;
pub mod import;
pub mod services;

pub use crate::error::{ApiError, ApiResult, FormErrors};

use axum::Router;
use chrono::{DateTime, Utc};
use services::{AnnotationQueue, PreviewService};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// `None` when annotation is disabled in the configuration
    pub annotations: Option<AnnotationQueue>,
    pub previews: Arc<PreviewService>,
    /// Root for uploaded documents and generated previews
    pub media_dir: PathBuf,
    /// Acting user when a request names none
    pub default_user_id: i64,
    /// Body limit for document uploads
    pub upload_limit_bytes: usize,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, previews: Arc<PreviewService>, default_user_id: i64) -> Self {
        let media_dir = previews.media_dir().to_path_buf();
        Self {
            db,
            annotations: None,
            previews,
            media_dir,
            default_user_id,
            upload_limit_bytes: api::documents::DEFAULT_UPLOAD_LIMIT_BYTES,
            startup_time: Utc::now(),
        }
    }

    pub fn with_upload_limit(mut self, limit_bytes: usize) -> Self {
        self.upload_limit_bytes = limit_bytes;
        self
    }

    pub fn with_annotations(mut self, queue: AnnotationQueue) -> Self {
        self.annotations = Some(queue);
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::variant_routes())
        .merge(api::record_routes())
        .merge(api::document_routes(state.upload_limit_bytes))
        .merge(api::stats_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
