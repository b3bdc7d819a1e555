//! Variant persistence across the base table and its subtype tables

use anyhow::{anyhow, Result};
use rareindex_common::models::{
    normalize_chromosome, CnvType, NewVariant, SvType, Variant, VariantDetail, Zygosity,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqliteExecutor, SqlitePool};

const SELECT_VARIANT: &str = r#"
    SELECT v.id, v.individual_id, v.pipeline_id, v.analysis_id, v.status_id,
           v.assembly_version, v.chromosome, v.start, v."end", v.zygosity, v.notes,
           v.created_by, v.created_at,
           snv.variant_id AS snv_id, snv.reference, snv.alternate,
           cnv.variant_id AS cnv_id, cnv.cnv_type, cnv.copy_number,
           sv.variant_id AS sv_id, sv.sv_type, sv.breakpoints,
           rep.variant_id AS repeat_id, rep.repeat_unit, rep.repeat_count
    FROM variants v
    LEFT JOIN snvs snv ON snv.variant_id = v.id
    LEFT JOIN cnvs cnv ON cnv.variant_id = v.id
    LEFT JOIN svs sv ON sv.variant_id = v.id
    LEFT JOIN repeats rep ON rep.variant_id = v.id
"#;

/// Insert base and subtype rows; the chromosome is normalized to `chr*`
///
/// Callers wanting atomicity pass a transaction (`&mut *tx`).
pub async fn insert_variant(conn: &mut SqliteConnection, new: &NewVariant) -> Result<i64> {
    let chromosome = normalize_chromosome(&new.locus.chromosome);

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO variants (
            individual_id, pipeline_id, analysis_id, status_id, assembly_version,
            chromosome, start, "end", zygosity, notes, created_by
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(new.individual_id)
    .bind(new.pipeline_id)
    .bind(new.analysis_id)
    .bind(new.status_id)
    .bind(&new.locus.assembly_version)
    .bind(&chromosome)
    .bind(new.locus.start)
    .bind(new.locus.end)
    .bind(new.locus.zygosity.as_str())
    .bind(&new.notes)
    .bind(new.created_by)
    .fetch_one(&mut *conn)
    .await?;

    match &new.detail {
        VariantDetail::Snv { reference, alternate } => {
            sqlx::query("INSERT INTO snvs (variant_id, reference, alternate) VALUES (?, ?, ?)")
                .bind(id)
                .bind(reference)
                .bind(alternate)
                .execute(&mut *conn)
                .await?;
        }
        VariantDetail::Cnv { cnv_type, copy_number } => {
            sqlx::query("INSERT INTO cnvs (variant_id, cnv_type, copy_number) VALUES (?, ?, ?)")
                .bind(id)
                .bind(cnv_type.as_str())
                .bind(*copy_number)
                .execute(&mut *conn)
                .await?;
        }
        VariantDetail::Sv { sv_type, breakpoints } => {
            sqlx::query("INSERT INTO svs (variant_id, sv_type, breakpoints) VALUES (?, ?, ?)")
                .bind(id)
                .bind(sv_type.as_str())
                .bind(breakpoints.as_ref().map(|b| b.to_string()))
                .execute(&mut *conn)
                .await?;
        }
        VariantDetail::Repeat { repeat_unit, repeat_count } => {
            sqlx::query("INSERT INTO repeats (variant_id, repeat_unit, repeat_count) VALUES (?, ?, ?)")
                .bind(id)
                .bind(repeat_unit)
                .bind(*repeat_count)
                .execute(&mut *conn)
                .await?;
        }
    }

    Ok(id)
}

fn detail_from_row(row: &SqliteRow) -> Result<VariantDetail> {
    if row.get::<Option<i64>, _>("snv_id").is_some() {
        return Ok(VariantDetail::Snv {
            reference: row.get("reference"),
            alternate: row.get("alternate"),
        });
    }
    if row.get::<Option<i64>, _>("cnv_id").is_some() {
        let cnv_type: String = row.get("cnv_type");
        return Ok(VariantDetail::Cnv {
            cnv_type: CnvType::parse(&cnv_type).ok_or_else(|| anyhow!("unknown CNV type '{}'", cnv_type))?,
            copy_number: row.get("copy_number"),
        });
    }
    if row.get::<Option<i64>, _>("sv_id").is_some() {
        let sv_type: String = row.get("sv_type");
        let breakpoints: Option<String> = row.get("breakpoints");
        return Ok(VariantDetail::Sv {
            sv_type: SvType::parse(&sv_type).ok_or_else(|| anyhow!("unknown SV type '{}'", sv_type))?,
            breakpoints: breakpoints.and_then(|b| serde_json::from_str(&b).ok()),
        });
    }
    if row.get::<Option<i64>, _>("repeat_id").is_some() {
        return Ok(VariantDetail::Repeat {
            repeat_unit: row.get("repeat_unit"),
            repeat_count: row.get("repeat_count"),
        });
    }

    let id: i64 = row.get("id");
    Err(anyhow!("variant {} has no subtype row", id))
}

fn variant_from_row(row: &SqliteRow) -> Result<Variant> {
    let zygosity: String = row.get("zygosity");
    Ok(Variant {
        id: row.get("id"),
        individual_id: row.get("individual_id"),
        pipeline_id: row.get("pipeline_id"),
        analysis_id: row.get("analysis_id"),
        status_id: row.get("status_id"),
        assembly_version: row.get("assembly_version"),
        chromosome: row.get("chromosome"),
        start: row.get("start"),
        end: row.get("end"),
        zygosity: Zygosity::parse(&zygosity).unwrap_or_default(),
        notes: row.get("notes"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        detail: detail_from_row(row)?,
    })
}

pub async fn load_variant<'e>(db: impl SqliteExecutor<'e>, id: i64) -> Result<Option<Variant>> {
    let row = sqlx::query(&format!("{} WHERE v.id = ?", SELECT_VARIANT))
        .bind(id)
        .fetch_optional(db)
        .await?;

    row.as_ref().map(variant_from_row).transpose()
}

/// Variants found in an analysis, ordered by position; rows without a subtype are skipped
pub async fn variants_for_analysis(pool: &SqlitePool, analysis_id: i64) -> Result<Vec<Variant>> {
    let rows = sqlx::query(&format!(
        "{} WHERE v.analysis_id = ? ORDER BY v.chromosome, v.start",
        SELECT_VARIANT
    ))
    .bind(analysis_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().filter_map(|r| variant_from_row(r).ok()).collect())
}

pub async fn variants_for_individual(pool: &SqlitePool, individual_id: i64) -> Result<Vec<Variant>> {
    let rows = sqlx::query(&format!(
        "{} WHERE v.individual_id = ? ORDER BY v.chromosome, v.start",
        SELECT_VARIANT
    ))
    .bind(individual_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().filter_map(|r| variant_from_row(r).ok()).collect())
}

pub async fn all_variant_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
    Ok(sqlx::query_scalar("SELECT id FROM variants ORDER BY id")
        .fetch_all(pool)
        .await?)
}

/// Move a variant to another analysis (and that analysis' pipeline)
pub async fn reassign_analysis(
    conn: &mut SqliteConnection,
    variant_id: i64,
    analysis_id: i64,
    pipeline_id: i64,
) -> Result<()> {
    sqlx::query(
        "UPDATE variants SET analysis_id = ?, pipeline_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(analysis_id)
    .bind(pipeline_id)
    .bind(variant_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn count_variants(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM variants")
        .fetch_one(pool)
        .await?)
}
