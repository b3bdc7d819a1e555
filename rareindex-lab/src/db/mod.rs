//! Database queries for the lab service
//!
//! Single-statement helpers accept any `SqliteExecutor` (pool or
//! transaction); multi-statement writes take `&mut SqliteConnection` so
//! callers decide the transaction boundary.

pub mod curation;
pub mod documents;
pub mod families;
pub mod genes;
pub mod hierarchy;
pub mod history;
pub mod individuals;
pub mod lookups;
pub mod notes;
pub mod users;
pub mod variants;
