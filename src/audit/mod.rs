//! Audit module
//!
//! Append-only control table recording every logged job transition and
//! pipeline start.

mod logger;
mod models;
mod schema;
mod store;

pub use logger::{build_log_query_url, AuditLogger, JobTransition};
pub use models::*;
pub use schema::CONTROL_VERSIONED_SCHEMAS;
pub use store::{AuditStore, SqliteAuditStore};
