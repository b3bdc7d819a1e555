//! Domain models

mod curation;
mod lab;
mod variant;

pub use curation::*;
pub use lab::*;
pub use variant::{
    bare_chromosome, normalize_chromosome, CnvType, NewVariant, SvType, Variant, VariantDetail,
    VariantLocus, VariantType, Zygosity,
};
