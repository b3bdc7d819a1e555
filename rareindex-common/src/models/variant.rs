//! Genetic variants
//!
//! A variant is stored as a base row in `variants` plus exactly one row in a
//! subtype table (`snvs`, `cnvs`, `svs`, `repeats`). In Rust the subtype is
//! the [`VariantDetail`] enum carried by [`Variant`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix bare chromosome names with `chr` (`1` -> `chr1`, `chrX` unchanged)
pub fn normalize_chromosome(chromosome: &str) -> String {
    let trimmed = chromosome.trim();
    if trimmed.starts_with("chr") || trimmed.is_empty() {
        trimmed.to_string()
    } else {
        format!("chr{}", trimmed)
    }
}

/// Chromosome without the `chr` prefix, as external services expect it
pub fn bare_chromosome(chromosome: &str) -> &str {
    chromosome.strip_prefix("chr").unwrap_or(chromosome)
}

/// Variant subtype discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantType {
    #[serde(rename = "SNV")]
    Snv,
    #[serde(rename = "CNV")]
    Cnv,
    #[serde(rename = "SV")]
    Sv,
    Repeat,
}

impl VariantType {
    pub const ALL: [VariantType; 4] = [
        VariantType::Snv,
        VariantType::Cnv,
        VariantType::Sv,
        VariantType::Repeat,
    ];

    /// Case-insensitive parse of `snv`, `cnv`, `sv`, `repeat`
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "snv" => Some(VariantType::Snv),
            "cnv" => Some(VariantType::Cnv),
            "sv" => Some(VariantType::Sv),
            "repeat" => Some(VariantType::Repeat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VariantType::Snv => "SNV",
            VariantType::Cnv => "CNV",
            VariantType::Sv => "SV",
            VariantType::Repeat => "Repeat",
        }
    }

    /// Subtype table name
    pub fn table(&self) -> &'static str {
        match self {
            VariantType::Snv => "snvs",
            VariantType::Cnv => "cnvs",
            VariantType::Sv => "svs",
            VariantType::Repeat => "repeats",
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implements `as_str`/`parse`/`Display` for a text-backed choice enum
macro_rules! text_choices {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use text_choices;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Zygosity {
    Het,
    Hom,
    Hemi,
    #[default]
    Unknown,
}

text_choices!(Zygosity {
    Het => "het",
    Hom => "hom",
    Hemi => "hemi",
    Unknown => "unknown",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CnvType {
    Loss,
    Gain,
}

text_choices!(CnvType {
    Loss => "loss",
    Gain => "gain",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SvType {
    Inversion,
    Translocation,
    Insertion,
    Deletion,
    Duplication,
}

text_choices!(SvType {
    Inversion => "inversion",
    Translocation => "translocation",
    Insertion => "insertion",
    Deletion => "deletion",
    Duplication => "duplication",
});

/// Subtype-specific fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VariantDetail {
    #[serde(rename = "SNV")]
    Snv { reference: String, alternate: String },
    #[serde(rename = "CNV")]
    Cnv {
        cnv_type: CnvType,
        copy_number: Option<i64>,
    },
    #[serde(rename = "SV")]
    Sv {
        sv_type: SvType,
        breakpoints: Option<serde_json::Value>,
    },
    Repeat { repeat_unit: String, repeat_count: i64 },
}

impl VariantDetail {
    pub fn variant_type(&self) -> VariantType {
        match self {
            VariantDetail::Snv { .. } => VariantType::Snv,
            VariantDetail::Cnv { .. } => VariantType::Cnv,
            VariantDetail::Sv { .. } => VariantType::Sv,
            VariantDetail::Repeat { .. } => VariantType::Repeat,
        }
    }
}

/// Locus and linkage fields shared by every variant type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantLocus {
    pub assembly_version: String,
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub zygosity: Zygosity,
}

impl VariantLocus {
    /// Locus on hg38 with a normalized chromosome
    pub fn new(chromosome: &str, start: i64, end: i64) -> Self {
        Self {
            assembly_version: "hg38".to_string(),
            chromosome: normalize_chromosome(chromosome),
            start,
            end,
            zygosity: Zygosity::Unknown,
        }
    }

    pub fn with_zygosity(mut self, zygosity: Zygosity) -> Self {
        self.zygosity = zygosity;
        self
    }
}

/// Variant ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewVariant {
    pub individual_id: i64,
    pub pipeline_id: Option<i64>,
    pub analysis_id: Option<i64>,
    pub status_id: Option<i64>,
    pub locus: VariantLocus,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub detail: VariantDetail,
}

/// A stored variant with its subtype detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: i64,
    pub individual_id: i64,
    pub pipeline_id: Option<i64>,
    pub analysis_id: Option<i64>,
    pub status_id: Option<i64>,
    pub assembly_version: String,
    pub chromosome: String,
    pub start: i64,
    pub end: i64,
    pub zygosity: Zygosity,
    pub notes: Option<String>,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub detail: VariantDetail,
}

impl Variant {
    /// `"SNV" | "CNV" | "SV" | "Repeat"`
    pub fn variant_type(&self) -> VariantType {
        self.detail.variant_type()
    }

    /// Compact HGVS-like name: `chr1:100A>T` for SNVs, the display string otherwise
    pub fn hgvs_name(&self) -> String {
        match &self.detail {
            VariantDetail::Snv { reference, alternate } => {
                format!("{}:{}{}>{}", self.chromosome, self.start, reference, alternate)
            }
            _ => self.to_string(),
        }
    }

    /// `(reference, alternate)` for SNVs
    pub fn alleles(&self) -> Option<(&str, &str)> {
        match &self.detail {
            VariantDetail::Snv { reference, alternate } => Some((reference, alternate)),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            VariantDetail::Snv { reference, alternate } => {
                write!(f, "{}:{} {}>{}", self.chromosome, self.start, reference, alternate)
            }
            VariantDetail::Cnv { cnv_type, .. } => {
                write!(f, "{}:{}-{} {}", self.chromosome, self.start, self.end, cnv_type)
            }
            VariantDetail::Sv { sv_type, .. } => {
                write!(f, "{}:{}-{} {}", self.chromosome, self.start, self.end, sv_type)
            }
            VariantDetail::Repeat { repeat_unit, repeat_count } => {
                write!(f, "{}:{} ({})x{}", self.chromosome, self.start, repeat_unit, repeat_count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(chromosome: &str, start: i64, end: i64, detail: VariantDetail) -> Variant {
        let locus = VariantLocus::new(chromosome, start, end);
        Variant {
            id: 1,
            individual_id: 1,
            pipeline_id: None,
            analysis_id: None,
            status_id: None,
            assembly_version: locus.assembly_version,
            chromosome: locus.chromosome,
            start,
            end,
            zygosity: Zygosity::Het,
            notes: None,
            created_by: None,
            created_at: String::new(),
            detail,
        }
    }

    #[test]
    fn chromosome_gets_chr_prefix() {
        assert_eq!(normalize_chromosome("1"), "chr1");
        assert_eq!(normalize_chromosome(" X "), "chrX");
        assert_eq!(normalize_chromosome("chr7"), "chr7");
        assert_eq!(bare_chromosome("chr7"), "7");
        assert_eq!(bare_chromosome("MT"), "MT");
    }

    #[test]
    fn snv_display_and_hgvs() {
        let snv = variant(
            "1",
            100,
            100,
            VariantDetail::Snv {
                reference: "A".into(),
                alternate: "T".into(),
            },
        );
        assert_eq!(snv.chromosome, "chr1");
        assert_eq!(snv.variant_type().as_str(), "SNV");
        assert_eq!(snv.to_string(), "chr1:100 A>T");
        assert_eq!(snv.hgvs_name(), "chr1:100A>T");
    }

    #[test]
    fn non_snv_display_formats() {
        let cnv = variant(
            "chr1",
            100,
            200,
            VariantDetail::Cnv {
                cnv_type: CnvType::Loss,
                copy_number: Some(1),
            },
        );
        assert_eq!(cnv.to_string(), "chr1:100-200 loss");
        assert_eq!(cnv.hgvs_name(), "chr1:100-200 loss");
        assert_eq!(cnv.variant_type(), VariantType::Cnv);

        let sv = variant(
            "chr1",
            100,
            200,
            VariantDetail::Sv {
                sv_type: SvType::Inversion,
                breakpoints: None,
            },
        );
        assert_eq!(sv.to_string(), "chr1:100-200 inversion");
        assert_eq!(sv.variant_type(), VariantType::Sv);

        let repeat = variant(
            "4",
            3074877,
            3074877,
            VariantDetail::Repeat {
                repeat_unit: "CAG".into(),
                repeat_count: 40,
            },
        );
        assert_eq!(repeat.to_string(), "chr4:3074877 (CAG)x40");
        assert_eq!(repeat.variant_type().as_str(), "Repeat");
    }

    #[test]
    fn variant_type_parse_is_case_insensitive() {
        assert_eq!(VariantType::parse("snv"), Some(VariantType::Snv));
        assert_eq!(VariantType::parse("Repeat"), Some(VariantType::Repeat));
        assert_eq!(VariantType::parse("indel"), None);
    }

    #[test]
    fn choice_enums_round_trip_text() {
        for z in Zygosity::ALL {
            assert_eq!(Zygosity::parse(z.as_str()), Some(*z));
        }
        assert_eq!(SvType::parse("Deletion"), Some(SvType::Deletion));
        assert_eq!(CnvType::parse("duplication"), None);
    }
}
