//! Document uploads: analysis reports and request forms
//!
//! Uploaded files land under the media directory; the stored path is
//! relative to it. A preview is attempted right after the row is committed.
//! Preview failures never fail the upload. A file whose row cannot be
//! written is removed again.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use rareindex_common::models::HistoryAction;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::{info, warn};

use super::auth::ActingUser;
use crate::db::documents::{self, DocumentTable, NewReport};
use crate::db::{hierarchy, history, individuals, variants};
use crate::error::{ApiError, ApiResult, FormErrors};
use crate::AppState;

pub const REPORT_DIR: &str = "reports";
pub const REQUEST_FORM_DIR: &str = "request_forms";

/// Upload body limit when none is configured (64 MiB)
pub const DEFAULT_UPLOAD_LIMIT_BYTES: usize = 64 * 1024 * 1024;

/// Response for a stored upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: i64,
    pub file_path: String,
    pub preview_path: Option<String>,
}

/// Text fields plus the single uploaded file of a multipart body
#[derive(Debug, Default)]
pub struct UploadForm {
    pub fields: Vec<(String, String)>,
    pub file: Option<(String, Vec<u8>)>,
}

fn upload_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(format!("Malformed upload: {}", e))
    }
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map_err(upload_error)?;
                form.file = Some((file_name, bytes.to_vec()));
            } else {
                let text = field.text().await.map_err(upload_error)?;
                form.fields.push((name, text));
            }
        }
        Ok(form)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Every value of a repeated field
    pub fn all(&self, name: &str) -> impl Iterator<Item = &str> + '_ {
        let name = name.to_string();
        self.fields
            .iter()
            .filter(move |(k, _)| *k == name)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// Keep the base name only, with anything outside `[A-Za-z0-9._-]` replaced
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Write the upload under `<media>/<dir>/`, suffixing the stem on collision
async fn store_upload(media_dir: &Path, dir: &str, file_name: &str, bytes: &[u8]) -> ApiResult<String> {
    let target_dir = media_dir.join(dir);
    tokio::fs::create_dir_all(&target_dir).await?;

    let name = sanitize_file_name(file_name);
    let mut stored = name.clone();
    if target_dir.join(&stored).exists() {
        let path = Path::new(&name);
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        stored = match path.extension() {
            Some(ext) => format!("{}_{}.{}", stem, &suffix[..8], ext.to_string_lossy()),
            None => format!("{}_{}", stem, &suffix[..8]),
        };
    }
    tokio::fs::write(target_dir.join(&stored), bytes).await?;
    Ok(format!("{}/{}", dir, stored))
}

/// Remove an upload whose row was never committed
async fn discard_upload(media_dir: &Path, file_path: &str) {
    match tokio::fs::remove_file(media_dir.join(file_path)).await {
        Ok(()) => warn!(file = %file_path, "Removed upload after failed save"),
        Err(e) => warn!(file = %file_path, error = %e, "Could not remove orphaned upload"),
    }
}

fn parse_required(form: &UploadForm, name: &str, errors: &mut FormErrors) -> Option<i64> {
    match form.get(name) {
        None => {
            errors.add(name, "This field is required.");
            None
        }
        Some(raw) => match raw.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.add(name, "Enter a whole number.");
                None
            }
        },
    }
}

async fn save_report(state: &AppState, report: &NewReport, variant_ids: &[i64], user_id: i64) -> ApiResult<i64> {
    let mut tx = state.db.begin().await?;
    let report_id = documents::create_report(&mut *tx, report).await?;
    for variant_id in variant_ids {
        documents::link_report_variant(&mut *tx, report_id, *variant_id).await?;
    }
    history::record(
        &mut *tx,
        DocumentTable::AnalysisReport.table(),
        report_id,
        HistoryAction::Created,
        Some(user_id),
        &json!({
            "pipeline_id": report.pipeline_id,
            "analysis_id": report.analysis_id,
            "file_path": report.file_path,
            "variants": variant_ids,
        }),
    )
    .await?;
    tx.commit().await?;
    Ok(report_id)
}

async fn save_request_form(
    state: &AppState,
    individual_id: i64,
    description: Option<&str>,
    file_path: &str,
    user_id: i64,
) -> ApiResult<i64> {
    let mut tx = state.db.begin().await?;
    let form_id =
        documents::create_request_form(&mut *tx, individual_id, description, Some(file_path), Some(user_id)).await?;
    history::record(
        &mut *tx,
        DocumentTable::RequestForm.table(),
        form_id,
        HistoryAction::Created,
        Some(user_id),
        &json!({ "individual_id": individual_id, "file_path": file_path }),
    )
    .await?;
    tx.commit().await?;
    Ok(form_id)
}

/// POST /reports
///
/// Fields: `pipeline` (required), `analysis`, `description`, repeated
/// `variant`, and the `file` itself.
pub async fn upload_report(
    State(state): State<AppState>,
    user: ActingUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let form = UploadForm::read(multipart).await?;
    let mut errors = FormErrors::new();

    let pipeline_id = parse_required(&form, "pipeline", &mut errors);
    let analysis_id = form.get("analysis").and_then(|v| v.parse::<i64>().ok());
    if form.get("analysis").is_some() && analysis_id.is_none() {
        errors.add("analysis", "Enter a whole number.");
    }
    let mut variant_ids = Vec::new();
    for raw in form.all("variant") {
        match raw.parse::<i64>() {
            Ok(vid) if variants::load_variant(&state.db, vid).await?.is_some() => variant_ids.push(vid),
            _ => errors.add(
                "variant",
                format!("Select a valid choice. {} is not one of the available choices.", raw),
            ),
        }
    }
    if form.file.is_none() {
        errors.add("file", "This field is required.");
    }
    if let Some(pid) = pipeline_id {
        if hierarchy::get_pipeline(&state.db, pid).await?.is_none() {
            errors.add("pipeline", "Select a valid choice. That choice is not one of the available choices.");
        }
    }
    errors.into_result()?;
    let (Some(pipeline_id), Some((file_name, bytes))) = (pipeline_id, form.file.as_ref()) else {
        return Err(ApiError::Internal("upload fields lost after validation".to_string()));
    };

    let file_path = store_upload(&state.media_dir, REPORT_DIR, file_name, bytes).await?;
    let report = NewReport {
        pipeline_id,
        analysis_id,
        description: form.get("description").map(str::to_string),
        file_path: Some(file_path.clone()),
        created_by: Some(user.id),
    };
    let report_id = match save_report(&state, &report, &variant_ids, user.id).await {
        Ok(id) => id,
        Err(e) => {
            discard_upload(&state.media_dir, &file_path).await;
            return Err(e);
        }
    };
    info!(report_id, pipeline_id, file = %file_path, "Report uploaded");

    let preview_path = state.previews.generate(DocumentTable::AnalysisReport, report_id).await;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: report_id,
            file_path,
            preview_path,
        }),
    ))
}

/// POST /request-forms
///
/// Fields: `individual` (required), `description`, and the `file`.
pub async fn upload_request_form(
    State(state): State<AppState>,
    user: ActingUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let form = UploadForm::read(multipart).await?;
    let mut errors = FormErrors::new();

    let individual_id = parse_required(&form, "individual", &mut errors);
    if form.file.is_none() {
        errors.add("file", "This field is required.");
    }
    if let Some(iid) = individual_id {
        if individuals::get_individual(&state.db, iid).await?.is_none() {
            errors.add("individual", "Select a valid choice. That choice is not one of the available choices.");
        }
    }
    errors.into_result()?;
    let (Some(individual_id), Some((file_name, bytes))) = (individual_id, form.file.as_ref()) else {
        return Err(ApiError::Internal("upload fields lost after validation".to_string()));
    };

    let file_path = store_upload(&state.media_dir, REQUEST_FORM_DIR, file_name, bytes).await?;
    let saved = save_request_form(&state, individual_id, form.get("description"), &file_path, user.id).await;
    let form_id = match saved {
        Ok(id) => id,
        Err(e) => {
            discard_upload(&state.media_dir, &file_path).await;
            return Err(e);
        }
    };
    info!(form_id, individual_id, file = %file_path, "Request form uploaded");

    let preview_path = state.previews.generate(DocumentTable::RequestForm, form_id).await;
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: form_id,
            file_path,
            preview_path,
        }),
    ))
}

/// Upload routes; `limit_bytes` replaces axum's 2 MB default body limit
pub fn document_routes(limit_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/reports", post(upload_report))
        .route("/request-forms", post(upload_request_form))
        .layer(DefaultBodyLimit::max(limit_bytes))
}
