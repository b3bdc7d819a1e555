//! HTTP API handlers for the lab service
//!
//! Handlers answer with JSON (or a small HTML fragment for `HX-Request`
//! posts); rendering full pages is left to the front end.

pub mod auth;
pub mod documents;
pub mod forms;
pub mod health;
pub mod records;
pub mod stats;
pub mod variants;

pub use auth::ActingUser;
pub use documents::document_routes;
pub use health::health_routes;
pub use records::record_routes;
pub use stats::stats_routes;
pub use variants::variant_routes;
