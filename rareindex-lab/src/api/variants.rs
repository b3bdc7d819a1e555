//! Variant create/update views, detail and classification
//!
//! `GET|POST /variant/create` is keyed by query parameters
//! (`analysis_id` or `analysis`, `type` or `variant_type`). Fragment requests
//! carry `HX-Request`; a successful fragment post answers with the compact
//! variant card and an `HX-Trigger` header, a full-page post redirects to the
//! analysis.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use rareindex_common::models::{
    AcmgClassification, Annotation, Classification, Gene, HistoryAction, Inheritance, NewVariant,
    Variant, VariantType,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;
use std::collections::HashMap;
use tracing::info;

use super::auth::ActingUser;
use super::forms::{form_fields, parse_variant_form};
use crate::db::hierarchy::{self, AnalysisLineage, ChoiceOption};
use crate::db::history::{self, HistoryEntry};
use crate::db::{curation, genes, individuals, variants};
use crate::error::{ApiError, ApiResult, FormErrors};
use crate::AppState;

pub const HX_REQUEST: &str = "hx-request";
pub const HX_TRIGGER: &str = "hx-trigger";

/// Query parameters of the create view; both spellings of each key are accepted
#[derive(Debug, Default, Deserialize)]
pub struct CreateQuery {
    pub analysis_id: Option<String>,
    pub analysis: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub variant_type: Option<String>,
    pub individual: Option<String>,
    pub test: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl CreateQuery {
    pub fn analysis(&self) -> Option<&str> {
        non_empty(&self.analysis_id).or_else(|| non_empty(&self.analysis))
    }

    pub fn variant_type(&self) -> Option<&str> {
        non_empty(&self.kind).or_else(|| non_empty(&self.variant_type))
    }
}

#[derive(Debug, Serialize)]
pub struct TypeChoice {
    pub value: String,
    pub label: &'static str,
}

/// Context picker: individuals, then tests of the chosen individual, then
/// analyses of the chosen test
#[derive(Debug, Serialize)]
pub struct VariantContext {
    pub individuals: Vec<ChoiceOption>,
    pub tests: Vec<ChoiceOption>,
    pub analyses: Vec<ChoiceOption>,
    pub variant_types: Vec<TypeChoice>,
    pub selected: SelectedContext,
}

#[derive(Debug, Default, Serialize)]
pub struct SelectedContext {
    pub individual: Option<i64>,
    pub test: Option<i64>,
    pub analysis: Option<i64>,
    pub variant_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VariantFormDescriptor {
    pub analysis: AnalysisLineage,
    pub variant_type: VariantType,
    pub fields: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct VariantDetailResponse {
    pub variant: Variant,
    pub variant_type: VariantType,
    pub display: String,
    pub hgvs_name: String,
    pub genes: Vec<Gene>,
    pub classifications: Vec<Classification>,
    pub annotations: Vec<Annotation>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Serialize)]
pub struct VariantUpdateForm {
    pub variant: Variant,
    /// Analyses the variant may move to
    pub analyses: Vec<ChoiceOption>,
}

fn parse_id(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|v| v.parse().ok())
}

fn is_fragment_request(headers: &HeaderMap) -> bool {
    headers.contains_key(HX_REQUEST)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Compact card swapped into the analysis page
pub fn compact_card(variant: &Variant) -> String {
    format!(
        r#"<div class="variant-card" id="variant-{id}"><span class="variant-type">{kind}</span> <a href="/variants/{id}">{name}</a> <span class="zygosity">{zygosity}</span></div>"#,
        id = variant.id,
        kind = variant.variant_type(),
        name = escape_html(&variant.to_string()),
        zygosity = variant.zygosity,
    )
}

fn fragment(variant: &Variant, trigger: &'static str) -> Response {
    let mut response = Html(compact_card(variant)).into_response();
    response
        .headers_mut()
        .insert(HX_TRIGGER, HeaderValue::from_static(trigger));
    response
}

async fn lineage_for(state: &AppState, raw: Option<&str>) -> ApiResult<AnalysisLineage> {
    let id = parse_id(raw).ok_or_else(|| ApiError::NotFound("Analysis not found".to_string()))?;
    hierarchy::analysis_lineage(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Analysis {} not found", id)))
}

fn requested_type(query: &CreateQuery) -> ApiResult<VariantType> {
    query
        .variant_type()
        .and_then(VariantType::parse)
        .ok_or_else(|| ApiError::BadRequest("Invalid Variant Type.".to_string()))
}

async fn load(state: &AppState, id: i64) -> ApiResult<Variant> {
    variants::load_variant(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Variant {} not found", id)))
}

/// Reload the variant on `conn` and append its history row there
///
/// Called inside the write transaction so the change and its snapshot
/// commit together.
async fn snapshot(
    conn: &mut SqliteConnection,
    id: i64,
    action: HistoryAction,
    user: &ActingUser,
) -> ApiResult<Variant> {
    let variant = variants::load_variant(&mut *conn, id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("variant {} vanished inside its transaction", id)))?;
    let value = serde_json::to_value(&variant).map_err(|e| ApiError::Internal(e.to_string()))?;
    history::record(&mut *conn, "variants", id, action, Some(user.id), &value).await?;
    Ok(variant)
}

/// GET /variant/create
pub async fn variant_create_form(
    State(state): State<AppState>,
    Query(query): Query<CreateQuery>,
) -> ApiResult<Response> {
    if query.analysis().is_none() || query.variant_type().is_none() {
        let selected = SelectedContext {
            individual: parse_id(non_empty(&query.individual)),
            test: parse_id(non_empty(&query.test)),
            analysis: parse_id(query.analysis()),
            variant_type: query.variant_type().map(str::to_string),
        };
        let tests = match selected.individual {
            Some(id) => hierarchy::tests_for_individual(&state.db, id).await?,
            None => Vec::new(),
        };
        let analyses = match selected.test {
            Some(id) => hierarchy::analyses_for_test(&state.db, id).await?,
            None => Vec::new(),
        };
        let context = VariantContext {
            individuals: individuals::individual_choices(&state.db).await?,
            tests,
            analyses,
            variant_types: VariantType::ALL
                .iter()
                .map(|t| TypeChoice {
                    value: t.as_str().to_ascii_lowercase(),
                    label: t.as_str(),
                })
                .collect(),
            selected,
        };
        return Ok(Json(context).into_response());
    }

    let analysis = lineage_for(&state, query.analysis()).await?;
    let variant_type = requested_type(&query)?;
    Ok(Json(VariantFormDescriptor {
        analysis,
        variant_type,
        fields: form_fields(variant_type),
    })
    .into_response())
}

/// POST /variant/create
pub async fn variant_create(
    State(state): State<AppState>,
    user: ActingUser,
    headers: HeaderMap,
    Query(query): Query<CreateQuery>,
    Form(data): Form<HashMap<String, String>>,
) -> ApiResult<Response> {
    let analysis = lineage_for(&state, query.analysis()).await?;
    let variant_type = requested_type(&query)?;
    let form = parse_variant_form(variant_type, &data).map_err(ApiError::Validation)?;

    let new = NewVariant {
        individual_id: analysis.individual_id,
        pipeline_id: Some(analysis.pipeline_id),
        analysis_id: Some(analysis.analysis_id),
        status_id: None,
        locus: form.locus,
        notes: form.notes,
        created_by: Some(user.id),
        detail: form.detail,
    };
    let mut tx = state.db.begin().await?;
    let variant_id = variants::insert_variant(&mut *tx, &new).await?;
    let variant = snapshot(&mut *tx, variant_id, HistoryAction::Created, &user).await?;
    tx.commit().await?;
    info!(
        variant_id,
        analysis_id = analysis.analysis_id,
        user = %user.username,
        variant = %variant,
        "Variant created"
    );

    if let Some(queue) = &state.annotations {
        queue.enqueue(variant_id);
    }

    if is_fragment_request(&headers) {
        return Ok(fragment(&variant, "variant-added"));
    }
    Ok(Redirect::to(&format!("/analyses/{}", analysis.analysis_id)).into_response())
}

/// GET /variant/{id}/update
pub async fn variant_update_form(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<VariantUpdateForm>> {
    let variant = load(&state, id).await?;
    let analyses = hierarchy::analyses_for_individual(&state.db, variant.individual_id).await?;
    Ok(Json(VariantUpdateForm { variant, analyses }))
}

/// POST /variant/{id}/update
///
/// Only the analysis can change, and only to one of the same individual.
pub async fn variant_update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    user: ActingUser,
    headers: HeaderMap,
    Form(data): Form<HashMap<String, String>>,
) -> ApiResult<Response> {
    let variant = load(&state, id).await?;
    let allowed = hierarchy::analyses_for_individual(&state.db, variant.individual_id).await?;

    let raw = data.get("analysis").map(|v| v.trim()).unwrap_or_default();
    let mut errors = FormErrors::new();
    let target = match raw.parse::<i64>() {
        _ if raw.is_empty() => {
            errors.add("analysis", "This field is required.");
            None
        }
        Ok(aid) if allowed.iter().any(|a| a.id == aid) => Some(aid),
        _ => {
            errors.add(
                "analysis",
                "Select a valid choice. That choice is not one of the available choices.",
            );
            None
        }
    };
    errors.into_result()?;
    let Some(analysis_id) = target else {
        return Err(ApiError::Internal("analysis choice lost after validation".to_string()));
    };

    let lineage = hierarchy::analysis_lineage(&state.db, analysis_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Analysis {} not found", analysis_id)))?;

    let mut tx = state.db.begin().await?;
    variants::reassign_analysis(&mut *tx, id, lineage.analysis_id, lineage.pipeline_id).await?;
    let updated = snapshot(&mut *tx, id, HistoryAction::Updated, &user).await?;
    tx.commit().await?;
    info!(variant_id = id, analysis_id, user = %user.username, "Variant moved to analysis");

    if is_fragment_request(&headers) {
        return Ok(fragment(&updated, "variant-updated"));
    }
    Ok(Redirect::to(&format!("/variants/{}", id)).into_response())
}

/// GET /variants/{id}
pub async fn variant_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<VariantDetailResponse>> {
    let variant = load(&state, id).await?;
    Ok(Json(VariantDetailResponse {
        variant_type: variant.variant_type(),
        display: variant.to_string(),
        hgvs_name: variant.hgvs_name(),
        genes: genes::genes_for_variant(&state.db, id).await?,
        classifications: curation::classifications_for(&state.db, id).await?,
        annotations: curation::annotations_for(&state.db, id).await?,
        history: history::history_for(&state.db, "variants", id).await?,
        variant,
    }))
}

/// POST /variants/{id}/classifications
pub async fn classify_variant(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    user: ActingUser,
    Form(data): Form<HashMap<String, String>>,
) -> ApiResult<impl IntoResponse> {
    load(&state, id).await?;

    let field = |name: &str| data.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());
    let mut errors = FormErrors::new();
    let classification = match field("classification") {
        None => {
            errors.add("classification", "This field is required.");
            None
        }
        Some(raw) => {
            let parsed = AcmgClassification::parse(raw);
            if parsed.is_none() {
                errors.add("classification", format!("Select a valid choice. {} is not one of the available choices.", raw));
            }
            parsed
        }
    };
    let inheritance = match field("inheritance") {
        None => Some(Inheritance::default()),
        Some(raw) => {
            let parsed = Inheritance::parse(raw);
            if parsed.is_none() {
                errors.add("inheritance", format!("Select a valid choice. {} is not one of the available choices.", raw));
            }
            parsed
        }
    };
    errors.into_result()?;
    let (Some(classification), Some(inheritance)) = (classification, inheritance) else {
        return Err(ApiError::Internal("classification choice lost after validation".to_string()));
    };

    let mut tx = state.db.begin().await?;
    let classification_id =
        curation::insert_classification(&mut *tx, id, Some(user.id), classification, inheritance, field("notes")).await?;
    history::record(
        &mut *tx,
        "classifications",
        classification_id,
        HistoryAction::Created,
        Some(user.id),
        &json!({
            "variant_id": id,
            "classification": classification.as_str(),
            "inheritance": inheritance.as_str(),
        }),
    )
    .await?;
    tx.commit().await?;

    info!(variant_id = id, classification = %classification, inheritance = %inheritance, "Variant classified");
    let created = curation::classifications_for(&state.db, id)
        .await?
        .into_iter()
        .find(|c| c.id == classification_id)
        .ok_or_else(|| ApiError::Internal("classification vanished after insert".to_string()))?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub fn variant_routes() -> Router<AppState> {
    Router::new()
        .route("/variant/create", get(variant_create_form).post(variant_create))
        .route("/variant/:id/update", get(variant_update_form).post(variant_update))
        .route("/variants/:id", get(variant_detail))
        .route("/variants/:id/classifications", post(classify_variant))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_query_spellings_are_accepted() {
        let q = CreateQuery {
            analysis: Some("7".into()),
            variant_type: Some("cnv".into()),
            ..CreateQuery::default()
        };
        assert_eq!(q.analysis(), Some("7"));
        assert_eq!(q.variant_type(), Some("cnv"));

        let q = CreateQuery {
            analysis_id: Some("3".into()),
            analysis: Some("7".into()),
            kind: Some(" ".into()),
            variant_type: Some("snv".into()),
            ..CreateQuery::default()
        };
        assert_eq!(q.analysis(), Some("3"));
        assert_eq!(q.variant_type(), Some("snv"));
    }

    #[test]
    fn card_escapes_markup() {
        assert_eq!(escape_html("<b>&\"'"), "&lt;b&gt;&amp;&quot;&#x27;");
    }
}
