//! Randomized demo data
//!
//! Builds `RB_2025_NN` families (mother, father, one or two probands) and
//! the full sample -> test -> pipeline -> analysis -> variant tree under
//! every individual. Everything is written in one transaction.

use crate::db::{families, hierarchy, individuals, lookups, variants};
use crate::db::hierarchy::StepFields;
use crate::db::individuals::NewIndividual;
use crate::db::lookups::NamedTable;
use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use rand::Rng;
use rareindex_common::models::{
    CnvType, NewVariant, Sex, SvType, VariantDetail, VariantLocus, Zygosity,
};
use serde::Serialize;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

/// Phenotype pool drawn from for every individual
pub const HPO_TERMS: [(&str, &str); 30] = [
    ("HP:0001250", "Seizure"),
    ("HP:0001263", "Global developmental delay"),
    ("HP:0001249", "Intellectual disability"),
    ("HP:0000252", "Microcephaly"),
    ("HP:0000256", "Macrocephaly"),
    ("HP:0001252", "Hypotonia"),
    ("HP:0001290", "Generalized hypotonia"),
    ("HP:0002019", "Constipation"),
    ("HP:0000729", "Autistic behavior"),
    ("HP:0000750", "Delayed speech and language development"),
    ("HP:0001508", "Failure to thrive"),
    ("HP:0004322", "Short stature"),
    ("HP:0000486", "Strabismus"),
    ("HP:0000365", "Hearing impairment"),
    ("HP:0001627", "Abnormal heart morphology"),
    ("HP:0000316", "Hypertelorism"),
    ("HP:0000494", "Downslanted palpebral fissures"),
    ("HP:0000175", "Cleft palate"),
    ("HP:0001156", "Brachydactyly"),
    ("HP:0001166", "Arachnodactyly"),
    ("HP:0002353", "EEG abnormality"),
    ("HP:0002079", "Hypoplasia of the corpus callosum"),
    ("HP:0001251", "Ataxia"),
    ("HP:0002072", "Chorea"),
    ("HP:0001332", "Dystonia"),
    ("HP:0000007", "Autosomal recessive inheritance"),
    ("HP:0003198", "Myopathy"),
    ("HP:0003236", "Elevated circulating creatine kinase concentration"),
    ("HP:0000618", "Blindness"),
    ("HP:0000505", "Visual impairment"),
];

const SAMPLE_TYPES: [&str; 4] = ["Blood", "Tissue", "Saliva", "Urine"];
const TEST_TYPES: [&str; 4] = ["WGS", "WES", "RNA-Seq", "Panel"];
const ANALYSIS_TYPES: [&str; 2] = ["Initial", "Reanalysis"];
const PIPELINE_TYPES: [(&str, &str); 3] = [("rarepipe", "1.0"), ("WES", "2.1"), ("sarek", "3.4")];
const PIPELINE_STATUSES: [(&str, &str); 5] = [
    ("In Progress", "yellow"),
    ("Completed", "blue"),
    ("Solved - P/LP", "green"),
    ("Solved - VUS", "teal"),
    ("Unsolved", "red"),
];
const CHROMOSOMES: [&str; 24] = [
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16", "17",
    "18", "19", "20", "21", "22", "X", "Y",
];
const BASES: [&str; 4] = ["A", "C", "G", "T"];
const REPEAT_UNITS: [&str; 4] = ["CAG", "CGG", "GAA", "CTG"];

#[derive(Debug, Clone)]
pub struct SampleDataOptions {
    pub families: usize,
    pub samples_per_individual: usize,
    pub tests_per_sample: usize,
    pub pipelines_per_test: usize,
    pub analyses_per_pipeline: usize,
    pub variants_per_analysis: usize,
    pub created_by: Option<i64>,
}

impl Default for SampleDataOptions {
    fn default() -> Self {
        Self {
            families: 5,
            samples_per_individual: 2,
            tests_per_sample: 2,
            pipelines_per_test: 1,
            analyses_per_pipeline: 2,
            variants_per_analysis: 3,
            created_by: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GenerationSummary {
    pub families: usize,
    pub individuals: usize,
    pub samples: usize,
    pub tests: usize,
    pub pipelines: usize,
    pub analyses: usize,
    pub variants: usize,
}

/// Lookup ids created up front and shared by every family
struct Vocabulary {
    sample_types: Vec<i64>,
    test_types: Vec<i64>,
    analysis_types: Vec<i64>,
    pipeline_types: Vec<i64>,
    pipeline_statuses: Vec<i64>,
    registered: i64,
    active: i64,
    institution: i64,
    rareboost_id: i64,
    biobank_id: i64,
    hpo_terms: Vec<i64>,
}

impl Vocabulary {
    async fn load(conn: &mut SqliteConnection, user: Option<i64>) -> Result<Self> {
        let mut sample_types = Vec::new();
        for name in SAMPLE_TYPES {
            sample_types.push(lookups::get_or_create_named(conn, NamedTable::SampleType, name, user).await?);
        }
        let mut test_types = Vec::new();
        for name in TEST_TYPES {
            test_types.push(lookups::get_or_create_named(conn, NamedTable::TestType, name, user).await?);
        }
        let mut analysis_types = Vec::new();
        for name in ANALYSIS_TYPES {
            analysis_types.push(lookups::get_or_create_named(conn, NamedTable::AnalysisType, name, user).await?);
        }
        let mut pipeline_types = Vec::new();
        for (name, version) in PIPELINE_TYPES {
            pipeline_types.push(lookups::get_or_create_pipeline_type(conn, name, Some(version), user).await?);
        }
        let mut pipeline_statuses = Vec::new();
        for (name, color) in PIPELINE_STATUSES {
            pipeline_statuses.push(lookups::get_or_create_status(conn, name, Some("Pipeline"), color, user).await?);
        }
        let mut hpo_terms = Vec::new();
        for (term_id, label) in HPO_TERMS {
            hpo_terms.push(lookups::get_or_create_hpo_term(conn, term_id, label).await?);
        }

        Ok(Self {
            sample_types,
            test_types,
            analysis_types,
            pipeline_types,
            pipeline_statuses,
            registered: lookups::get_or_create_status(conn, "Registered", Some("Individual"), "gray", user).await?,
            active: lookups::get_or_create_status(conn, "Active", Some("Individual"), "green", user).await?,
            institution: lookups::get_or_create_named(conn, NamedTable::Institution, "Test Hospital", user).await?,
            rareboost_id: lookups::get_or_create_named(conn, NamedTable::IdentifierType, "RareBoost", user).await?,
            biobank_id: lookups::get_or_create_named(conn, NamedTable::IdentifierType, "Biobank", user).await?,
            hpo_terms,
        })
    }
}

fn pick<R: Rng, T: Copy>(rng: &mut R, items: &[T]) -> T {
    items[rng.gen_range(0..items.len())]
}

fn days_ago<R: Rng>(rng: &mut R, min_days: i64, max_days: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(rng.gen_range(min_days..=max_days))
}

/// A random variant of any type on a random autosome or sex chromosome
pub fn random_variant<R: Rng>(
    rng: &mut R,
    individual_id: i64,
    pipeline_id: Option<i64>,
    analysis_id: Option<i64>,
    created_by: Option<i64>,
) -> NewVariant {
    let chromosome = pick(rng, &CHROMOSOMES);
    let start: i64 = rng.gen_range(10_000..50_000_000);

    let (end, detail) = match rng.gen_range(0..4) {
        0 => {
            let reference = pick(rng, &BASES);
            let alternate = loop {
                let base = pick(rng, &BASES);
                if base != reference {
                    break base;
                }
            };
            (
                start,
                VariantDetail::Snv {
                    reference: reference.to_string(),
                    alternate: alternate.to_string(),
                },
            )
        }
        1 => {
            let cnv_type = pick(rng, CnvType::ALL);
            let copy_number = match cnv_type {
                CnvType::Loss => rng.gen_range(0..=1),
                CnvType::Gain => rng.gen_range(3..=4),
            };
            (
                start + rng.gen_range(1_000..500_000),
                VariantDetail::Cnv {
                    cnv_type,
                    copy_number: Some(copy_number),
                },
            )
        }
        2 => {
            let end = start + rng.gen_range(100..100_000);
            (
                end,
                VariantDetail::Sv {
                    sv_type: pick(rng, SvType::ALL),
                    breakpoints: Some(json!([{ "chrom": chromosome, "pos": start }, { "chrom": chromosome, "pos": end }])),
                },
            )
        }
        _ => {
            let unit = pick(rng, &REPEAT_UNITS);
            let count: i64 = rng.gen_range(10..=200);
            (
                start + unit.len() as i64 * count,
                VariantDetail::Repeat {
                    repeat_unit: unit.to_string(),
                    repeat_count: count,
                },
            )
        }
    };

    NewVariant {
        individual_id,
        pipeline_id,
        analysis_id,
        status_id: None,
        locus: VariantLocus::new(chromosome, start, end).with_zygosity(pick(rng, Zygosity::ALL)),
        notes: None,
        created_by,
        detail,
    }
}

/// Generate `options.families` families; existing family codes are skipped
pub async fn generate_sample_data<R: Rng>(
    pool: &SqlitePool,
    options: &SampleDataOptions,
    rng: &mut R,
) -> Result<GenerationSummary> {
    let mut tx = pool.begin().await?;
    let user = options.created_by;
    let vocab = Vocabulary::load(&mut *tx, user).await?;
    let mut summary = GenerationSummary::default();

    for i in 0..options.families {
        let family_code = format!("RB_2025_{:02}", i + 1);
        if families::find_family_by_code(&mut *tx, &family_code).await?.is_some() {
            warn!(family = %family_code, "Family exists, skipping");
            continue;
        }
        let description = format!("Test family {}", family_code);
        let family_id = families::create_family(&mut *tx, &family_code, Some(&description), user).await?;
        summary.families += 1;

        let parent = |full_name: String, lab_id: String, sex: Sex, rng: &mut R| NewIndividual {
            family_id,
            lab_id: Some(lab_id),
            full_name,
            sex,
            birth_date: Some(days_ago(rng, 365 * 20, 365 * 50)),
            status_id: Some(vocab.registered),
            institution_id: Some(vocab.institution),
            created_by: user,
            ..NewIndividual::default()
        };

        let mother_new = parent(format!("Mother {}", family_code), format!("{}.2", family_code), Sex::Female, &mut *rng);
        let mother = individuals::create_individual(&mut *tx, &mother_new).await?;
        let father_new = parent(format!("Father {}", family_code), format!("{}.3", family_code), Sex::Male, &mut *rng);
        let father = individuals::create_individual(&mut *tx, &father_new).await?;

        let mut members = vec![(mother, format!("{}.2", family_code)), (father, format!("{}.3", family_code))];
        let proband_suffixes: Vec<String> = if i % 2 == 0 {
            vec![".1.1".to_string(), ".1.2".to_string()]
        } else {
            vec![".1".to_string()]
        };
        for (n, suffix) in proband_suffixes.iter().enumerate() {
            let role = if proband_suffixes.len() > 1 {
                format!("Proband{}", n + 1)
            } else {
                "Proband".to_string()
            };
            let lab_id = format!("{}{}", family_code, suffix);
            let proband = NewIndividual {
                family_id,
                lab_id: Some(lab_id.clone()),
                full_name: format!("{} {}", role, family_code),
                sex: if rng.gen_bool(0.5) { Sex::Male } else { Sex::Female },
                birth_date: Some(days_ago(rng, 365, 365 * 18)),
                is_index: true,
                is_affected: true,
                status_id: Some(vocab.active),
                institution_id: Some(vocab.institution),
                mother_id: Some(mother),
                father_id: Some(father),
                created_by: user,
                ..NewIndividual::default()
            };
            let id = individuals::create_individual(&mut *tx, &proband).await?;
            members.push((id, lab_id));
        }

        for (individual_id, lab_id) in &members {
            summary.individuals += 1;
            let biobank = lab_id.replacen(&family_code, &format!("RD3.F{:02}", i + 1), 1);
            individuals::add_cross_identifier(&mut *tx, *individual_id, vocab.rareboost_id, lab_id, None, user).await?;
            individuals::add_cross_identifier(&mut *tx, *individual_id, vocab.biobank_id, &biobank, None, user).await?;

            let term_count = rng.gen_range(5..=20).min(vocab.hpo_terms.len());
            for term in rand::seq::index::sample(rng, vocab.hpo_terms.len(), term_count).into_vec() {
                individuals::add_hpo_term(&mut *tx, *individual_id, vocab.hpo_terms[term]).await?;
            }

            generate_workflow(&mut *tx, rng, &vocab, options, *individual_id, &mut summary).await?;
        }

        info!(family = %family_code, members = members.len(), "Generated family");
    }

    tx.commit().await?;
    info!(?summary, "Sample data generated");
    Ok(summary)
}

async fn generate_workflow<R: Rng>(
    conn: &mut SqliteConnection,
    rng: &mut R,
    vocab: &Vocabulary,
    options: &SampleDataOptions,
    individual_id: i64,
    summary: &mut GenerationSummary,
) -> Result<()> {
    let user = options.created_by;

    for _ in 0..options.samples_per_individual {
        let sample_id = hierarchy::create_sample(
            conn,
            individual_id,
            StepFields {
                type_id: Some(pick(rng, &vocab.sample_types)),
                status_id: None,
                date: Some(days_ago(rng, 30, 400)),
                user_id: user,
                created_by: user,
            },
        )
        .await?;
        summary.samples += 1;

        for _ in 0..options.tests_per_sample {
            let test_id = hierarchy::create_test(
                conn,
                sample_id,
                StepFields {
                    type_id: Some(pick(rng, &vocab.test_types)),
                    status_id: None,
                    date: Some(days_ago(rng, 1, 30)),
                    user_id: user,
                    created_by: user,
                },
            )
            .await?;
            summary.tests += 1;

            for _ in 0..options.pipelines_per_test {
                let pipeline_id = hierarchy::create_pipeline(
                    conn,
                    test_id,
                    pick(rng, &vocab.pipeline_types),
                    StepFields {
                        status_id: Some(pick(rng, &vocab.pipeline_statuses)),
                        date: Some(days_ago(rng, 0, 20)),
                        user_id: user,
                        created_by: user,
                        ..StepFields::default()
                    },
                )
                .await?;
                summary.pipelines += 1;

                for _ in 0..options.analyses_per_pipeline {
                    let analysis_id = hierarchy::create_analysis(
                        conn,
                        pipeline_id,
                        StepFields {
                            type_id: Some(pick(rng, &vocab.analysis_types)),
                            status_id: None,
                            date: Some(days_ago(rng, 0, 10)),
                            user_id: user,
                            created_by: user,
                        },
                    )
                    .await?;
                    summary.analyses += 1;

                    for _ in 0..options.variants_per_analysis {
                        let variant = random_variant(rng, individual_id, Some(pipeline_id), Some(analysis_id), user);
                        variants::insert_variant(conn, &variant).await?;
                        summary.variants += 1;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rareindex_common::models::VariantType;

    #[test]
    fn random_variants_are_well_formed() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            let v = random_variant(&mut rng, 1, None, None, None);
            assert!(v.locus.chromosome.starts_with("chr"));
            assert!(v.locus.end >= v.locus.start);
            if let VariantDetail::Snv { reference, alternate } = &v.detail {
                assert_ne!(reference, alternate);
            }
            seen.insert(v.detail.variant_type());
        }
        assert_eq!(seen.len(), VariantType::ALL.len());
    }
}
