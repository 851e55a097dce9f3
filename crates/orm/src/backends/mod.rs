//! Database Backends
//!
//! The [`Connection`] collaborator contract plus the MySQL implementation.

pub mod core;
pub mod format;
pub mod mysql;

pub use self::core::{Connection, QueryResult, Record};
pub use format::expand_placeholders;
pub use mysql::MySqlConnection;
