//! Lab hierarchy: families, individuals, samples, tests, pipelines, analyses

use super::variant::text_choices;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

text_choices!(Sex {
    Male => "male",
    Female => "female",
    Unknown => "unknown",
});

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_superuser: bool,
    pub is_staff: bool,
    pub is_active: bool,
}

/// Workflow status, optionally scoped to one model (`content_type`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Status {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub content_type: Option<String>,
}

/// Row of a name/description lookup table (institutions, sample types, ...)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NamedItem {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PipelineType {
    pub id: i64,
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) if !version.is_empty() => write!(f, "{} v{}", self.name, version),
            _ => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Family {
    pub id: i64,
    pub family_id: String,
    pub description: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Individual {
    pub id: i64,
    pub family_id: i64,
    pub lab_id: Option<String>,
    pub full_name: String,
    pub tc_identity: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: String,
    pub is_index: bool,
    pub is_affected: bool,
    pub is_alive: bool,
    pub icd11_code: Option<String>,
    pub diagnosis: Option<String>,
    pub diagnosis_date: Option<NaiveDate>,
    pub status_id: Option<i64>,
    pub institution_id: Option<i64>,
    pub mother_id: Option<i64>,
    pub father_id: Option<i64>,
    pub created_by: Option<i64>,
    pub created_at: String,
}

impl Individual {
    pub fn sex(&self) -> Sex {
        Sex::parse(&self.sex).unwrap_or_default()
    }

    /// Lab id when set, otherwise the full name
    pub fn label(&self) -> &str {
        self.lab_id.as_deref().unwrap_or(&self.full_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HpoTerm {
    pub id: i64,
    pub term_id: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sample {
    pub id: i64,
    pub individual_id: i64,
    pub sample_type_id: Option<i64>,
    pub status_id: Option<i64>,
    pub receipt_date: Option<NaiveDate>,
    pub isolation_by: Option<i64>,
    pub sample_measurements: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Test {
    pub id: i64,
    pub sample_id: i64,
    pub test_type_id: Option<i64>,
    pub status_id: Option<i64>,
    pub performed_date: Option<NaiveDate>,
    pub performed_by: Option<i64>,
    pub service_send_date: Option<NaiveDate>,
    pub data_receipt_date: Option<NaiveDate>,
    pub council_date: Option<NaiveDate>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Pipeline {
    pub id: i64,
    pub test_id: i64,
    pub type_id: i64,
    pub status_id: Option<i64>,
    pub performed_date: Option<NaiveDate>,
    pub performed_by: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Analysis {
    pub id: i64,
    pub pipeline_id: i64,
    pub type_id: Option<i64>,
    pub status_id: Option<i64>,
    pub performed_date: Option<NaiveDate>,
    pub performed_by: Option<i64>,
    pub created_at: String,
}

/// Uploaded clinical report attached to a pipeline
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalysisReport {
    pub id: i64,
    pub pipeline_id: i64,
    pub analysis_id: Option<i64>,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub preview_path: Option<String>,
    pub created_at: String,
}

/// Uploaded request form attached to an individual
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalysisRequestForm {
    pub id: i64,
    pub individual_id: i64,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub preview_path: Option<String>,
    pub created_at: String,
}

/// Records a note can be attached to, named by table like history rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteTarget {
    Family,
    Individual,
    Sample,
    Test,
    Pipeline,
    Analysis,
    Variant,
}

text_choices!(NoteTarget {
    Family => "families",
    Individual => "individuals",
    Sample => "samples",
    Test => "tests",
    Pipeline => "pipelines",
    Analysis => "analyses",
    Variant => "variants",
});

/// Free-text follow-up note; `content_type` is the target's table
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: i64,
    pub content: String,
    pub content_type: String,
    pub object_id: i64,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}
