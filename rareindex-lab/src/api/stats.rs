//! Aggregate statistics

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::services::diagnostics::{self, DiagnosticYield};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct YieldQuery {
    /// Restrict to pipelines of this type name
    pub pipeline_type: Option<String>,
}

/// GET /stats/diagnostic-yield
pub async fn diagnostic_yield(
    State(state): State<AppState>,
    Query(query): Query<YieldQuery>,
) -> ApiResult<Json<DiagnosticYield>> {
    let pipeline_type = query.pipeline_type.as_deref().map(str::trim).filter(|v| !v.is_empty());
    Ok(Json(diagnostics::diagnostic_yield(&state.db, pipeline_type).await?))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/stats/diagnostic-yield", get(diagnostic_yield))
}
