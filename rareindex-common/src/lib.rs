//! # RareIndex Common Library
//!
//! Shared code for the RareIndex lab service and its management commands:
//! - Database schema, model registry and initialization
//! - Domain models (families, individuals, variants, genes, ...)
//! - Configuration loading
//! - Password hashing for seeded accounts

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod password;

pub use error::{Error, Result};
