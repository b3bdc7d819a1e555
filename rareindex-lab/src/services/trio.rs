//! Deterministic trio example
//!
//! `FAM_TRIO_EXAMPLE_001`: mother, father and an affected male proband, each
//! with a Whole Blood sample, a WGS test and a completed `rarepipe` pipeline.
//! The proband carries one pathogenic de novo SNV, classified and attached to
//! a report.

use crate::db::documents::{self, NewReport};
use crate::db::hierarchy::{self, StepFields};
use crate::db::individuals::{self, NewIndividual};
use crate::db::lookups::{self, NamedTable};
use crate::db::{curation, families, variants};
use anyhow::Result;
use chrono::Utc;
use rareindex_common::models::{
    AcmgClassification, Inheritance, NewVariant, Sex, VariantDetail, VariantLocus, Zygosity,
};
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{info, warn};

pub const TRIO_FAMILY_ID: &str = "FAM_TRIO_EXAMPLE_001";

/// Directory under the media root that holds report uploads
pub const REPORT_DIR: &str = "reports";

const DUMMY_PDF: &[u8] =
    b"%PDF-1.4\n1 0 obj\n<< /Title (Example Report) >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF";

#[derive(Debug, Clone, Serialize)]
pub struct TrioExample {
    pub family_id: i64,
    pub proband_id: i64,
    pub variant_id: i64,
    pub report_id: i64,
    pub recreated: bool,
}

/// Create the trio, deleting any previous copy first
pub async fn create_trio_example(pool: &SqlitePool, media_dir: &Path, user: i64) -> Result<TrioExample> {
    let user = Some(user);
    let mut tx = pool.begin().await?;

    let recreated = match families::find_family_by_code(&mut *tx, TRIO_FAMILY_ID).await? {
        Some(existing) => {
            warn!(family = TRIO_FAMILY_ID, "Family exists, recreating");
            families::delete_family(&mut *tx, existing.id).await?;
            true
        }
        None => false,
    };

    let institution = lookups::get_or_create_named(&mut *tx, NamedTable::Institution, "Rare Disease Lab", user).await?;
    let registered = lookups::get_or_create_status(&mut *tx, "Registered", Some("Individual"), "gray", user).await?;
    let active = lookups::get_or_create_status(&mut *tx, "Active", Some("Individual"), "green", user).await?;
    let sample_active = lookups::get_or_create_status(&mut *tx, "Active", Some("Sample"), "green", user).await?;
    let test_active = lookups::get_or_create_status(&mut *tx, "Active", Some("Test"), "green", user).await?;
    let completed = lookups::get_or_create_status(&mut *tx, "Completed", Some("Pipeline"), "blue", user).await?;
    let blood = lookups::get_or_create_named(&mut *tx, NamedTable::SampleType, "Whole Blood", user).await?;
    let wgs = lookups::get_or_create_named(&mut *tx, NamedTable::TestType, "WGS", user).await?;
    let initial = lookups::get_or_create_named(&mut *tx, NamedTable::AnalysisType, "Initial", user).await?;
    let rarepipe = lookups::get_or_create_pipeline_type(&mut *tx, "rarepipe", Some("1.0"), user).await?;
    let rareboost = lookups::get_or_create_named(&mut *tx, NamedTable::IdentifierType, "RareBoost", user).await?;

    let family_id = families::create_family(
        &mut *tx,
        TRIO_FAMILY_ID,
        Some("Example trio family for demonstration"),
        user,
    )
    .await?;

    let member = |full_name: &str, sex: Sex, status: i64| NewIndividual {
        family_id,
        full_name: full_name.to_string(),
        sex,
        status_id: Some(status),
        institution_id: Some(institution),
        created_by: user,
        ..NewIndividual::default()
    };

    let mother = individuals::create_individual(&mut *tx, &member("Mother TRIO_001", Sex::Female, registered)).await?;
    let father = individuals::create_individual(&mut *tx, &member("Father TRIO_001", Sex::Male, registered)).await?;
    let proband = individuals::create_individual(
        &mut *tx,
        &NewIndividual {
            mother_id: Some(mother),
            father_id: Some(father),
            is_index: true,
            is_affected: true,
            ..member("Proband TRIO_001", Sex::Male, active)
        },
    )
    .await?;

    for (id, suffix) in [(mother, ".2"), (father, ".3"), (proband, ".1")] {
        let value = format!("{}{}", TRIO_FAMILY_ID, suffix);
        individuals::add_cross_identifier(&mut *tx, id, rareboost, &value, None, user).await?;
    }

    let today = Some(Utc::now().date_naive());
    let mut proband_pipeline = None;
    for individual in [mother, father, proband] {
        let sample = hierarchy::create_sample(
            &mut *tx,
            individual,
            StepFields { type_id: Some(blood), status_id: Some(sample_active), date: today, user_id: user, created_by: user },
        )
        .await?;
        let test = hierarchy::create_test(
            &mut *tx,
            sample,
            StepFields { type_id: Some(wgs), status_id: Some(test_active), date: today, user_id: user, created_by: user },
        )
        .await?;
        let pipeline = hierarchy::create_pipeline(
            &mut *tx,
            test,
            rarepipe,
            StepFields { status_id: Some(completed), date: today, user_id: user, created_by: user, ..StepFields::default() },
        )
        .await?;
        if individual == proband {
            proband_pipeline = Some(pipeline);
        }
    }
    let pipeline = proband_pipeline.ok_or_else(|| anyhow::anyhow!("proband pipeline missing"))?;

    let analysis = hierarchy::create_analysis(
        &mut *tx,
        pipeline,
        StepFields { type_id: Some(initial), created_by: user, ..StepFields::default() },
    )
    .await?;

    let variant_id = variants::insert_variant(
        &mut *tx,
        &NewVariant {
            individual_id: proband,
            pipeline_id: Some(pipeline),
            analysis_id: Some(analysis),
            status_id: None,
            locus: VariantLocus::new("chr1", 123_456, 123_457).with_zygosity(Zygosity::Het),
            notes: None,
            created_by: user,
            detail: VariantDetail::Snv {
                reference: "A".to_string(),
                alternate: "G".to_string(),
            },
        },
    )
    .await?;

    curation::insert_classification(
        &mut *tx,
        variant_id,
        user,
        AcmgClassification::Pathogenic,
        Inheritance::DeNovo,
        Some("Example pathogenic variant"),
    )
    .await?;

    let relative = format!("{}/{}_proband_report.pdf", REPORT_DIR, TRIO_FAMILY_ID);
    let report_id = documents::create_report(
        &mut *tx,
        &NewReport {
            pipeline_id: pipeline,
            analysis_id: Some(analysis),
            description: Some("Example clinical report for Proband".to_string()),
            file_path: Some(relative.clone()),
            created_by: user,
        },
    )
    .await?;
    documents::link_report_variant(&mut *tx, report_id, variant_id).await?;

    let target = media_dir.join(&relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, DUMMY_PDF).await?;

    tx.commit().await?;
    info!(family = TRIO_FAMILY_ID, proband, variant_id, report_id, "Created trio example");

    Ok(TrioExample {
        family_id,
        proband_id: proband,
        variant_id,
        report_id,
        recreated,
    })
}
