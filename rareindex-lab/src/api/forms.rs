//! Variant form validation
//!
//! Form posts arrive as flat string maps. Each variant type accepts the
//! shared locus fields plus its own detail fields; every problem is
//! collected into [`FormErrors`] rather than stopping at the first.

use crate::error::FormErrors;
use rareindex_common::models::{
    CnvType, SvType, VariantDetail, VariantLocus, VariantType, Zygosity,
};
use std::collections::HashMap;

const MAX_ASSEMBLY: usize = 10;
const MAX_CHROMOSOME: usize = 10;
const MAX_ALLELE: usize = 255;
const MAX_REPEAT_UNIT: usize = 50;

/// Field names shown for each variant type, in display order
pub fn form_fields(variant_type: VariantType) -> &'static [&'static str] {
    match variant_type {
        VariantType::Snv => &["assembly_version", "chromosome", "start", "end", "zygosity", "reference", "alternate"],
        VariantType::Cnv => &["assembly_version", "chromosome", "start", "end", "zygosity", "cnv_type", "copy_number"],
        VariantType::Sv => &["assembly_version", "chromosome", "start", "end", "zygosity", "sv_type", "breakpoints"],
        VariantType::Repeat => &["assembly_version", "chromosome", "start", "end", "zygosity", "repeat_unit", "repeat_count"],
    }
}

/// Validated form content
#[derive(Debug, Clone, PartialEq)]
pub struct VariantForm {
    pub locus: VariantLocus,
    pub detail: VariantDetail,
    pub notes: Option<String>,
}

struct FieldReader<'a> {
    data: &'a HashMap<String, String>,
    errors: FormErrors,
}

impl<'a> FieldReader<'a> {
    fn optional(&self, name: &str) -> Option<&'a str> {
        self.data.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    fn text(&mut self, name: &str, max_len: usize) -> Option<String> {
        match self.optional(name) {
            None => {
                self.errors.add(name, "This field is required.");
                None
            }
            Some(v) if v.chars().count() > max_len => {
                self.errors.add(name, format!("Ensure this value has at most {} characters.", max_len));
                None
            }
            Some(v) => Some(v.to_string()),
        }
    }

    fn optional_integer(&mut self, name: &str) -> Option<i64> {
        let raw = self.optional(name)?;
        match raw.parse::<i64>() {
            Ok(n) => Some(n),
            Err(_) => {
                self.errors.add(name, "Enter a whole number.");
                None
            }
        }
    }

    fn integer(&mut self, name: &str) -> Option<i64> {
        if self.optional(name).is_none() {
            self.errors.add(name, "This field is required.");
            return None;
        }
        self.optional_integer(name)
    }

    fn choice<T>(&mut self, name: &str, parse: fn(&str) -> Option<T>, required: bool) -> Option<T> {
        let Some(raw) = self.optional(name) else {
            if required {
                self.errors.add(name, "This field is required.");
            }
            return None;
        };
        let parsed = parse(raw);
        if parsed.is_none() {
            self.errors.add(name, format!("Select a valid choice. {} is not one of the available choices.", raw));
        }
        parsed
    }
}

/// Validate a posted form for one variant type
pub fn parse_variant_form(
    variant_type: VariantType,
    data: &HashMap<String, String>,
) -> Result<VariantForm, FormErrors> {
    let mut f = FieldReader {
        data,
        errors: FormErrors::new(),
    };

    let assembly = match f.optional("assembly_version") {
        Some(_) => f.text("assembly_version", MAX_ASSEMBLY),
        None => Some("hg38".to_string()),
    };
    let chromosome = f.text("chromosome", MAX_CHROMOSOME);
    let start = f.integer("start");
    let end = f.integer("end");
    let zygosity = f.choice("zygosity", Zygosity::parse, false).unwrap_or_default();
    if let (Some(s), Some(e)) = (start, end) {
        if e < s {
            f.errors.add("end", "End must not be before start.");
        }
    }

    let detail = match variant_type {
        VariantType::Snv => {
            let reference = f.text("reference", MAX_ALLELE);
            let alternate = f.text("alternate", MAX_ALLELE);
            match (reference, alternate) {
                (Some(reference), Some(alternate)) => Some(VariantDetail::Snv { reference, alternate }),
                _ => None,
            }
        }
        VariantType::Cnv => {
            let cnv_type = f.choice("cnv_type", CnvType::parse, true);
            let copy_number = f.optional_integer("copy_number");
            cnv_type.map(|cnv_type| VariantDetail::Cnv { cnv_type, copy_number })
        }
        VariantType::Sv => {
            let sv_type = f.choice("sv_type", SvType::parse, true);
            let breakpoints = match f.optional("breakpoints") {
                None => None,
                Some(raw) => match serde_json::from_str::<serde_json::Value>(raw) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        f.errors.add("breakpoints", "Enter a valid JSON.");
                        None
                    }
                },
            };
            sv_type.map(|sv_type| VariantDetail::Sv { sv_type, breakpoints })
        }
        VariantType::Repeat => {
            let repeat_unit = f.text("repeat_unit", MAX_REPEAT_UNIT);
            let repeat_count = f.integer("repeat_count");
            match (repeat_unit, repeat_count) {
                (Some(repeat_unit), Some(repeat_count)) => Some(VariantDetail::Repeat { repeat_unit, repeat_count }),
                _ => None,
            }
        }
    };

    let notes = f.optional("notes").map(str::to_string);
    match (f.errors.is_empty(), assembly, chromosome, start, end, detail) {
        (true, Some(assembly), Some(chromosome), Some(start), Some(end), Some(detail)) => {
            let mut locus = VariantLocus::new(&chromosome, start, end).with_zygosity(zygosity);
            locus.assembly_version = assembly;
            Ok(VariantForm { locus, detail, notes })
        }
        _ => Err(f.errors),
    }
}
