//! Read views over families, individuals and analyses, plus individual notes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Form, Json, Router,
};
use rareindex_common::models::{
    Analysis, AnalysisReport, Family, HistoryAction, HpoTerm, Individual, Note, NoteTarget, Variant,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::auth::ActingUser;

use crate::db::families::{self, FamilySummary};
use crate::db::hierarchy::{self, AnalysisLineage, WorkflowRow};
use crate::db::history::{self, HistoryEntry};
use crate::db::individuals::{self, CrossIdentifierView};
use crate::db::{documents, notes, variants};
use crate::error::{ApiError, ApiResult, FormErrors};
use crate::AppState;

/// Parent link in a pedigree
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PedigreeEdge {
    pub child: i64,
    pub parent: i64,
    pub relation: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FamilyDetail {
    pub family: Family,
    pub members: Vec<Individual>,
    pub pedigree: Vec<PedigreeEdge>,
}

#[derive(Debug, Serialize)]
pub struct IndividualDetail {
    pub individual: Individual,
    pub hpo_terms: Vec<HpoTerm>,
    pub identifiers: Vec<CrossIdentifierView>,
    pub workflow: Vec<WorkflowRow>,
    pub variants: Vec<Variant>,
    pub notes: Vec<Note>,
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
pub struct NoteForm {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct AnalysisDetail {
    pub analysis: Analysis,
    pub lineage: AnalysisLineage,
    pub variants: Vec<Variant>,
    pub reports: Vec<AnalysisReport>,
}

/// Mother/father edges between members; parents outside the list are kept
pub fn pedigree_edges(members: &[Individual]) -> Vec<PedigreeEdge> {
    let mut edges = Vec::new();
    for member in members {
        if let Some(mother) = member.mother_id {
            edges.push(PedigreeEdge { child: member.id, parent: mother, relation: "mother" });
        }
        if let Some(father) = member.father_id {
            edges.push(PedigreeEdge { child: member.id, parent: father, relation: "father" });
        }
    }
    edges
}

/// GET /families
pub async fn list_families(State(state): State<AppState>) -> ApiResult<Json<Vec<FamilySummary>>> {
    Ok(Json(families::list_families(&state.db).await?))
}

/// GET /families/{id}
pub async fn family_detail(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<FamilyDetail>> {
    let family = families::get_family(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Family {} not found", id)))?;
    let members = individuals::list_by_family(&state.db, id).await?;
    let pedigree = pedigree_edges(&members);
    Ok(Json(FamilyDetail { family, members, pedigree }))
}

/// GET /individuals/{id}
pub async fn individual_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<IndividualDetail>> {
    let individual = require_individual(&state, id).await?;

    Ok(Json(IndividualDetail {
        hpo_terms: individuals::hpo_terms_for(&state.db, id).await?,
        identifiers: individuals::cross_identifiers_for(&state.db, id).await?,
        workflow: hierarchy::workflow_for_individual(&state.db, id).await?,
        variants: variants::variants_for_individual(&state.db, id).await?,
        notes: notes::notes_for(&state.db, NoteTarget::Individual, id).await?,
        history: history::history_for(&state.db, "individuals", id).await?,
        individual,
    }))
}

async fn require_individual(state: &AppState, id: i64) -> ApiResult<Individual> {
    individuals::get_individual(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Individual {} not found", id)))
}

/// GET /individuals/{id}/notes
pub async fn individual_notes(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Vec<Note>>> {
    require_individual(&state, id).await?;
    Ok(Json(notes::notes_for(&state.db, NoteTarget::Individual, id).await?))
}

/// POST /individuals/{id}/notes
pub async fn add_individual_note(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    user: ActingUser,
    Form(form): Form<NoteForm>,
) -> ApiResult<(StatusCode, Json<Note>)> {
    require_individual(&state, id).await?;
    let content = form.content.trim();
    let mut errors = FormErrors::new();
    if content.is_empty() {
        errors.add("content", "This field is required.");
    }
    errors.into_result()?;

    let mut tx = state.db.begin().await?;
    let note_id = notes::create_note(&mut *tx, NoteTarget::Individual, id, content, Some(user.id)).await?;
    history::record(
        &mut *tx,
        "notes",
        note_id,
        HistoryAction::Created,
        Some(user.id),
        &json!({ "content_type": NoteTarget::Individual.as_str(), "object_id": id, "content": content }),
    )
    .await?;
    let note = notes::get_note(&mut *tx, note_id)
        .await?
        .ok_or_else(|| ApiError::Internal("note vanished after insert".to_string()))?;
    tx.commit().await?;

    info!(individual_id = id, note_id, user = %user.username, "Note added");
    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /analyses/{id}
pub async fn analysis_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<AnalysisDetail>> {
    let not_found = || ApiError::NotFound(format!("Analysis {} not found", id));
    let analysis = hierarchy::get_analysis(&state.db, id).await?.ok_or_else(not_found)?;
    let lineage = hierarchy::analysis_lineage(&state.db, id).await?.ok_or_else(not_found)?;

    Ok(Json(AnalysisDetail {
        analysis,
        lineage,
        variants: variants::variants_for_analysis(&state.db, id).await?,
        reports: documents::reports_for_analysis(&state.db, id).await?,
    }))
}

pub fn record_routes() -> Router<AppState> {
    Router::new()
        .route("/families", get(list_families))
        .route("/families/:id", get(family_detail))
        .route("/individuals/:id", get(individual_detail))
        .route("/individuals/:id/notes", get(individual_notes).post(add_individual_note))
        .route("/analyses/:id", get(analysis_detail))
}
