//! Individuals, pedigree links, phenotypes and cross identifiers

use super::hierarchy::ChoiceOption;
use anyhow::Result;
use chrono::NaiveDate;
use rareindex_common::models::{HpoTerm, Individual, Sex};
use serde::Serialize;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

const INDIVIDUAL_COLUMNS: &str = r#"
    id, family_id, lab_id, full_name, tc_identity, birth_date, sex, is_index, is_affected,
    is_alive, icd11_code, diagnosis, diagnosis_date, status_id, institution_id,
    mother_id, father_id, created_by, created_at
"#;

/// Individual to be created
#[derive(Debug, Clone, Default)]
pub struct NewIndividual {
    pub family_id: i64,
    pub lab_id: Option<String>,
    pub full_name: String,
    pub tc_identity: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sex: Sex,
    pub is_index: bool,
    pub is_affected: bool,
    pub icd11_code: Option<String>,
    pub diagnosis: Option<String>,
    pub diagnosis_date: Option<NaiveDate>,
    pub status_id: Option<i64>,
    pub institution_id: Option<i64>,
    pub mother_id: Option<i64>,
    pub father_id: Option<i64>,
    pub created_by: Option<i64>,
}

/// External identifier attached to an individual
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CrossIdentifierView {
    pub id: i64,
    pub id_type: String,
    pub id_value: String,
    pub link: Option<String>,
}

pub async fn create_individual(conn: &mut SqliteConnection, new: &NewIndividual) -> Result<i64> {
    let id = sqlx::query_scalar(
        r#"
        INSERT INTO individuals (
            family_id, lab_id, full_name, tc_identity, birth_date, sex, is_index, is_affected,
            icd11_code, diagnosis, diagnosis_date, status_id, institution_id,
            mother_id, father_id, created_by
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(new.family_id)
    .bind(&new.lab_id)
    .bind(&new.full_name)
    .bind(&new.tc_identity)
    .bind(new.birth_date)
    .bind(new.sex.as_str())
    .bind(new.is_index)
    .bind(new.is_affected)
    .bind(&new.icd11_code)
    .bind(&new.diagnosis)
    .bind(new.diagnosis_date)
    .bind(new.status_id)
    .bind(new.institution_id)
    .bind(new.mother_id)
    .bind(new.father_id)
    .bind(new.created_by)
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn get_individual<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<Individual>> {
    Ok(sqlx::query_as(&format!("SELECT {} FROM individuals WHERE id = ?", INDIVIDUAL_COLUMNS))
        .bind(id)
        .fetch_optional(db)
        .await?)
}

pub async fn find_by_lab_id<'e>(db: impl SqliteExecutor<'e>, lab_id: &str) -> Result<Option<Individual>> {
    Ok(sqlx::query_as(&format!("SELECT {} FROM individuals WHERE lab_id = ?", INDIVIDUAL_COLUMNS))
        .bind(lab_id)
        .fetch_optional(db)
        .await?)
}

/// Every individual as a picker option, labelled by lab id when it has one
pub async fn individual_choices(pool: &SqlitePool) -> Result<Vec<ChoiceOption>> {
    Ok(sqlx::query_as(
        r#"
        SELECT id, COALESCE(lab_id || ' ' || full_name, full_name) AS label
        FROM individuals
        ORDER BY lab_id, full_name
        "#,
    )
    .fetch_all(pool)
    .await?)
}

pub async fn list_by_family(pool: &SqlitePool, family_id: i64) -> Result<Vec<Individual>> {
    Ok(sqlx::query_as(&format!(
        "SELECT {} FROM individuals WHERE family_id = ? ORDER BY is_index DESC, id",
        INDIVIDUAL_COLUMNS
    ))
    .bind(family_id)
    .fetch_all(pool)
    .await?)
}

pub async fn set_parents(
    conn: &mut SqliteConnection,
    id: i64,
    mother_id: Option<i64>,
    father_id: Option<i64>,
) -> Result<()> {
    sqlx::query(
        "UPDATE individuals SET mother_id = ?, father_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(mother_id)
    .bind(father_id)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn add_hpo_term<'e>(db: impl SqliteExecutor<'e>, individual_id: i64, hpo_term_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO individual_hpo_terms (individual_id, hpo_term_id) VALUES (?, ?)")
        .bind(individual_id)
        .bind(hpo_term_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn hpo_terms_for(pool: &SqlitePool, individual_id: i64) -> Result<Vec<HpoTerm>> {
    Ok(sqlx::query_as(
        r#"
        SELECT h.id, h.term_id, h.label
        FROM hpo_terms h
        JOIN individual_hpo_terms ih ON ih.hpo_term_id = h.id
        WHERE ih.individual_id = ?
        ORDER BY h.term_id
        "#,
    )
    .bind(individual_id)
    .fetch_all(pool)
    .await?)
}

pub async fn add_cross_identifier(
    conn: &mut SqliteConnection,
    individual_id: i64,
    id_type_id: i64,
    id_value: &str,
    link: Option<&str>,
    created_by: Option<i64>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO cross_identifiers (individual_id, id_type_id, id_value, link, created_by)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(individual_id)
    .bind(id_type_id)
    .bind(id_value)
    .bind(link)
    .bind(created_by)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn cross_identifiers_for(pool: &SqlitePool, individual_id: i64) -> Result<Vec<CrossIdentifierView>> {
    Ok(sqlx::query_as(
        r#"
        SELECT c.id, t.name AS id_type, c.id_value, c.link
        FROM cross_identifiers c
        JOIN identifier_types t ON t.id = c.id_type_id
        WHERE c.individual_id = ?
        ORDER BY t.name
        "#,
    )
    .bind(individual_id)
    .fetch_all(pool)
    .await?)
}
