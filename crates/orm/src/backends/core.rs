//! Core Database Backend Traits
//!
//! The ORM consumes a single collaborator: something that runs one SQL
//! statement with `?` placeholders and reports rows, the generated insert id
//! and the affected-row count. Pooling, TLS and connection policy live behind
//! this trait.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::DbError;
use crate::security;

/// One result row, column name -> value
pub type Record = Map<String, Value>;

/// Outcome of a single statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Rows returned by a SELECT; empty for other statements
    pub rows: Vec<Record>,
    /// Auto-increment id generated by an INSERT, when the table has one
    pub insert_id: Option<u64>,
    pub affected_rows: u64,
}

impl QueryResult {
    pub fn from_rows(rows: Vec<Record>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn from_write(affected_rows: u64, insert_id: Option<u64>) -> Self {
        Self {
            rows: Vec::new(),
            insert_id,
            affected_rows,
        }
    }
}

/// Abstract database connection trait
///
/// Implementations expand placeholders whose parameter is an array into a
/// comma-separated list and an object into `` `col` = ? `` pairs, the way
/// the mysql client does.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Run one statement
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult, DbError>;

    /// Quote an identifier for this dialect
    fn escape_identifier(&self, name: &str) -> String {
        security::escape_identifier(name)
    }
}
