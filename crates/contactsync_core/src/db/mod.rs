//! Local state database: connection setup and schema migrations.
//!
//! The database only holds per-account run snapshots. Callers get a
//! connection back only after every pending migration has been applied.

mod error;
pub mod migrations;
mod open;

pub use error::{DbError, DbResult};
pub use open::{open_db, open_db_in_memory};
