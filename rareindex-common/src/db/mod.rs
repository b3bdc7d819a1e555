//! Database schema, initialization and migrations

pub mod init;
pub mod migrations;
pub mod schema_sync;
pub mod table_schemas;

pub use init::*;
pub use migrations::{get_schema_version, run_migrations};
pub use schema_sync::*;
pub use table_schemas::*;
