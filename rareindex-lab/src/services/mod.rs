//! Business services shared by the HTTP handlers and the management commands

pub mod accounts;
pub mod annotation;
pub mod diagnostics;
pub mod genes;
pub mod preview;
pub mod sample_data;
pub mod trio;

pub use annotation::{AnnotationQueue, AnnotationService};
pub use preview::{PandocConverter, PreviewService};
