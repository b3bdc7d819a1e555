//! Variant curation: ACMG classifications, external annotations, genes, audit history

use super::variant::text_choices;
use serde::{Deserialize, Serialize};
use std::fmt;

/// ACMG/AMP five-tier classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcmgClassification {
    Pathogenic,
    LikelyPathogenic,
    Vus,
    LikelyBenign,
    Benign,
}

text_choices!(AcmgClassification {
    Pathogenic => "pathogenic",
    LikelyPathogenic => "likely_pathogenic",
    Vus => "vus",
    LikelyBenign => "likely_benign",
    Benign => "benign",
});

impl AcmgClassification {
    pub fn label(&self) -> &'static str {
        match self {
            AcmgClassification::Pathogenic => "Pathogenic",
            AcmgClassification::LikelyPathogenic => "Likely Pathogenic",
            AcmgClassification::Vus => "VUS",
            AcmgClassification::LikelyBenign => "Likely Benign",
            AcmgClassification::Benign => "Benign",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Inheritance {
    Ad,
    Ar,
    XLinked,
    Mitochondrial,
    DeNovo,
    #[default]
    Unknown,
}

text_choices!(Inheritance {
    Ad => "ad",
    Ar => "ar",
    XLinked => "x_linked",
    Mitochondrial => "mitochondrial",
    DeNovo => "de_novo",
    Unknown => "unknown",
});

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Classification {
    pub id: i64,
    pub variant_id: i64,
    pub user_id: Option<i64>,
    pub classification: String,
    pub inheritance: String,
    pub notes: Option<String>,
    pub created_at: String,
}

/// Raw provider payload keyed by (variant, source, source_version)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Annotation {
    pub id: i64,
    pub variant_id: i64,
    pub source: String,
    pub source_version: String,
    pub data: sqlx::types::Json<serde_json::Value>,
    pub created_at: String,
}

/// HGNC catalog entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Gene {
    pub id: i64,
    pub hgnc_id: String,
    pub symbol: String,
    pub name: Option<String>,
    pub alias_symbol: Option<String>,
    pub alias_name: Option<String>,
    pub prev_symbol: Option<String>,
    pub prev_name: Option<String>,
    pub ensembl_gene_id: Option<String>,
    pub entrez_id: Option<String>,
    pub omim_id: Option<String>,
    pub location: Option<String>,
    pub locus_type: Option<String>,
    pub locus_group: Option<String>,
    pub gene_family: Option<String>,
    pub uniprot_ids: Option<String>,
    pub pubmed_id: Option<String>,
    pub refseq_accession: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Created,
    Updated,
    Deleted,
}

text_choices!(HistoryAction {
    Created => "created",
    Updated => "updated",
    Deleted => "deleted",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_codes() {
        assert_eq!(
            AcmgClassification::parse("likely_pathogenic"),
            Some(AcmgClassification::LikelyPathogenic)
        );
        assert_eq!(AcmgClassification::Vus.label(), "VUS");
        assert_eq!(Inheritance::parse("de_novo"), Some(Inheritance::DeNovo));
        assert_eq!(Inheritance::default().as_str(), "unknown");
    }
}
