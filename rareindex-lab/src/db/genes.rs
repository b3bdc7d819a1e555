//! HGNC gene catalog and variant-gene links

use anyhow::Result;
use rareindex_common::models::Gene;
use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

const GENE_COLUMNS: &str = r#"
    id, hgnc_id, symbol, name, alias_symbol, alias_name, prev_symbol, prev_name,
    ensembl_gene_id, entrez_id, omim_id, location, locus_type, locus_group,
    gene_family, uniprot_ids, pubmed_id, refseq_accession
"#;

/// Insert a gene or refresh every field of the existing `hgnc_id` row
///
/// Returns `true` when a new row was created.
pub async fn upsert_gene(conn: &mut SqliteConnection, gene: &Gene) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM genes WHERE hgnc_id = ?)")
        .bind(&gene.hgnc_id)
        .fetch_one(&mut *conn)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO genes (
            hgnc_id, symbol, name, alias_symbol, alias_name, prev_symbol, prev_name,
            ensembl_gene_id, entrez_id, omim_id, location, locus_type, locus_group,
            gene_family, uniprot_ids, pubmed_id, refseq_accession
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(hgnc_id) DO UPDATE SET
            symbol = excluded.symbol,
            name = excluded.name,
            alias_symbol = excluded.alias_symbol,
            alias_name = excluded.alias_name,
            prev_symbol = excluded.prev_symbol,
            prev_name = excluded.prev_name,
            ensembl_gene_id = excluded.ensembl_gene_id,
            entrez_id = excluded.entrez_id,
            omim_id = excluded.omim_id,
            location = excluded.location,
            locus_type = excluded.locus_type,
            locus_group = excluded.locus_group,
            gene_family = excluded.gene_family,
            uniprot_ids = excluded.uniprot_ids,
            pubmed_id = excluded.pubmed_id,
            refseq_accession = excluded.refseq_accession,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&gene.hgnc_id)
    .bind(&gene.symbol)
    .bind(&gene.name)
    .bind(&gene.alias_symbol)
    .bind(&gene.alias_name)
    .bind(&gene.prev_symbol)
    .bind(&gene.prev_name)
    .bind(&gene.ensembl_gene_id)
    .bind(&gene.entrez_id)
    .bind(&gene.omim_id)
    .bind(&gene.location)
    .bind(&gene.locus_type)
    .bind(&gene.locus_group)
    .bind(&gene.gene_family)
    .bind(&gene.uniprot_ids)
    .bind(&gene.pubmed_id)
    .bind(&gene.refseq_accession)
    .execute(&mut *conn)
    .await?;

    Ok(!exists)
}

pub async fn find_gene_by_symbol<'e>(db: impl SqliteExecutor<'e>, symbol: &str) -> Result<Option<Gene>> {
    Ok(sqlx::query_as(&format!(
        "SELECT {} FROM genes WHERE symbol = ? ORDER BY id LIMIT 1",
        GENE_COLUMNS
    ))
    .bind(symbol)
    .fetch_optional(db)
    .await?)
}

pub async fn link_gene<'e>(db: impl SqliteExecutor<'e>, variant_id: i64, gene_id: i64) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO variant_genes (variant_id, gene_id) VALUES (?, ?)")
        .bind(variant_id)
        .bind(gene_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn genes_for_variant(pool: &SqlitePool, variant_id: i64) -> Result<Vec<Gene>> {
    Ok(sqlx::query_as(&format!(
        r#"
        SELECT {} FROM genes
        WHERE id IN (SELECT gene_id FROM variant_genes WHERE variant_id = ?)
        ORDER BY symbol
        "#,
        GENE_COLUMNS
    ))
    .bind(variant_id)
    .fetch_all(pool)
    .await?)
}

pub async fn count_genes(pool: &SqlitePool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM genes")
        .fetch_one(pool)
        .await?)
}
