//! RareIndex management commands (rareindex-manage)
//!
//! One-shot maintenance tasks run against the same root folder as the
//! service: seeding groups and accounts, demo data, bulk imports, previews
//! and gene linking.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rareindex_common::config::RareIndexConfig;
use rareindex_common::db::ModelApp;
use rareindex_lab::bootstrap::{init_tracing, Environment};
use rareindex_lab::db::users::ensure_fallback_user;
use rareindex_lab::import::{ImportError, ImportOptions, Importer};
use rareindex_lab::services::annotation::AnnotationService;
use rareindex_lab::services::genes::{import_genes, GeneSource};
use rareindex_lab::services::sample_data::{generate_sample_data, SampleDataOptions};
use rareindex_lab::services::{accounts, trio, PreviewService};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rareindex-manage")]
#[command(about = "Management commands for RareIndex")]
#[command(version)]
struct Cli {
    /// Root folder holding the database and media
    #[arg(short, long, global = true, env = "RAREINDEX_ROOT")]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the role groups
    CreateGroups,

    /// Create the role groups and the lab's seed accounts
    CreateOzbekUsers,

    /// Create (or recreate) the FAM_TRIO_EXAMPLE_001 trio
    CreateTrioExample,

    /// Generate PDF previews for documents that have none
    GeneratePreviews,

    /// Generate randomized families with full sample/test/pipeline trees
    GenerateSampleData {
        #[arg(long, default_value_t = 5)]
        families: usize,
        #[arg(long, default_value_t = 2)]
        samples_per_individual: usize,
        #[arg(long, default_value_t = 2)]
        tests_per_sample: usize,
        #[arg(long, default_value_t = 1)]
        pipelines_per_test: usize,
        #[arg(long, default_value_t = 2)]
        analyses_per_pipeline: usize,
        #[arg(long, default_value_t = 3)]
        variants_per_analysis: usize,
        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Import `<ModelName>.tsv` files in dependency order
    Import {
        directory: PathBuf,
        /// Only import models of this app (core, lab, variant)
        #[arg(long)]
        app: Option<String>,
        /// Username recorded in audit fields
        #[arg(long)]
        user: Option<String>,
    },

    /// Import the HGNC gene catalog
    ImportGenes {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Relink genes for every variant from stored annotations
    LinkImportedGenes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = RareIndexConfig::load();
    init_tracing(&config);

    info!(
        "rareindex-manage v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let env = Environment::open(config, cli.root_folder.as_deref()).await?;
    let pool = env.pool.clone();

    match cli.command {
        Command::CreateGroups => {
            let created = accounts::create_groups(&pool).await?;
            info!("Created {} group(s)", created);
        }

        Command::CreateOzbekUsers => {
            let created = accounts::create_seed_users(&pool).await?;
            if created.is_empty() {
                info!("All seed accounts already exist");
            } else {
                info!("Created users: {}", created.join(", "));
            }
        }

        Command::CreateTrioExample => {
            let user = ensure_fallback_user(&pool, None).await?;
            let trio = trio::create_trio_example(&pool, &env.media_dir, user.id).await?;
            info!(
                "Created trio family {} (proband {}, variant {}, report {})",
                trio::TRIO_FAMILY_ID,
                trio.proband_id,
                trio.variant_id,
                trio.report_id
            );
        }

        Command::GeneratePreviews => {
            let service = PreviewService::from_config(pool.clone(), env.media_dir.clone(), &env.config.preview);
            let summary = service.generate_missing().await?;
            info!("Generated {} preview(s), {} failed", summary.generated, summary.failed);
        }

        Command::GenerateSampleData {
            families,
            samples_per_individual,
            tests_per_sample,
            pipelines_per_test,
            analyses_per_pipeline,
            variants_per_analysis,
            seed,
        } => {
            let user = ensure_fallback_user(&pool, None).await?;
            let options = SampleDataOptions {
                families,
                samples_per_individual,
                tests_per_sample,
                pipelines_per_test,
                analyses_per_pipeline,
                variants_per_analysis,
                created_by: Some(user.id),
            };
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let summary = generate_sample_data(&pool, &options, &mut rng).await?;
            info!(
                "Generated {} families, {} individuals, {} variants",
                summary.families, summary.individuals, summary.variants
            );
        }

        Command::Import { directory, app, user } => {
            let app = match app {
                Some(name) => Some(ModelApp::parse(&name).ok_or(ImportError::UnknownApp(name))?),
                None => None,
            };
            let options = ImportOptions { directory, app, user };
            let summary = Importer::new(pool.clone()).run(&options).await?;

            for file in &summary.files {
                match &file.error {
                    Some(e) => warn!("{}: failed ({})", file.model, e),
                    None => info!(
                        "{}: {} created, {} skipped, {} links resolved, {} unresolved",
                        file.model, file.created, file.skipped, file.deferred_resolved, file.deferred_unresolved
                    ),
                }
            }
            info!(
                "Import finished: {} created, {} skipped, {} file(s) rolled back",
                summary.total_created(),
                summary.total_skipped(),
                summary.rolled_back_files()
            );
        }

        Command::ImportGenes { url, file } => {
            let source = GeneSource::from_options(url, file)?;
            let summary = import_genes(&pool, &source).await.context("Gene import failed")?;
            info!(
                "Genes: {} created, {} updated, {} withdrawn skipped",
                summary.created, summary.updated, summary.withdrawn
            );
        }

        Command::LinkImportedGenes => {
            let service = AnnotationService::new(pool.clone(), Vec::new());
            let total = service.link_all().await?;
            info!("Relinked genes for {} variant(s)", total);
        }
    }

    pool.close().await;
    Ok(())
}
