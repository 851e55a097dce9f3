//! MySQL Backend Implementation
//!
//! [`Connection`] over a `sqlx` MySQL pool. Statements are expanded with
//! [`expand_placeholders`] before binding, rows come back as JSON maps and
//! driver failures are classified into [`DbErrorKind`].

use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::mysql::{MySql, MySqlArguments, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::config::OrmConfig;
use crate::error::{DbError, DbErrorKind, ModelError, ModelResult};

use super::core::{Connection, QueryResult, Record};
use super::format::expand_placeholders;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// MySQL connection pool implementation
#[derive(Debug, Clone)]
pub struct MySqlConnection {
    pool: MySqlPool,
}

impl MySqlConnection {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Build the pool described by `config`.
    pub async fn connect(config: &OrmConfig) -> ModelResult<Self> {
        config.validate()?;

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(|e| ModelError::Connection(format!("Failed to create MySQL pool: {}", e)))?;

        tracing::debug!(
            "MySQL pool ready (max {} connections)",
            config.max_connections
        );

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult, DbError> {
        let (sql, flat) = expand_placeholders(sql, params)
            .map_err(|e| DbError::new(DbErrorKind::Other("ER_BAD_PARAMETERS".to_string()), e.to_string()))?;

        let mut query = sqlx::query(&sql);
        for param in &flat {
            query = bind_value(query, param);
        }

        if returns_rows(&sql) {
            let rows = query.fetch_all(&self.pool).await.map_err(|e| DbError::from(&e))?;
            let records = rows
                .iter()
                .map(row_to_record)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(QueryResult::from_rows(records))
        } else {
            let result = query.execute(&self.pool).await.map_err(|e| DbError::from(&e))?;
            let insert_id = Some(result.last_insert_id()).filter(|id| *id != 0);
            Ok(QueryResult::from_write(result.rows_affected(), insert_id))
        }
    }
}

fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start().split_whitespace().next().unwrap_or("");
    ["SELECT", "SHOW", "DESCRIBE", "EXPLAIN", "WITH"]
        .iter()
        .any(|kw| head.eq_ignore_ascii_case(kw))
}

/// Bind a JSON value to a sqlx query
fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        composite => query.bind(composite.to_string()),
    }
}

fn row_to_record(row: &MySqlRow) -> Result<Record, DbError> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        record.insert(column.name().to_string(), column_value(row, index)?);
    }
    Ok(record)
}

/// Convert a MySQL column value to JSON
fn column_value(row: &MySqlRow, index: usize) -> Result<Value, DbError> {
    let raw = row.try_get_raw(index).map_err(|e| DbError::from(&e))?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();
    drop(raw);

    let decode = |e: sqlx::Error| DbError::from(&e);

    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(index).map_err(decode)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Value::from(row.try_get::<i64, _>(index).map_err(decode)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => Value::from(row.try_get::<u64, _>(index).map_err(decode)?),
        "FLOAT" | "DOUBLE" => {
            let f = row.try_get::<f64, _>(index).map_err(decode)?;
            Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
        }
        "DATETIME" => {
            let dt = row.try_get::<chrono::NaiveDateTime, _>(index).map_err(decode)?;
            Value::String(dt.format(DATETIME_FORMAT).to_string())
        }
        "TIMESTAMP" => {
            let dt = row
                .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
                .map_err(decode)?;
            Value::String(dt.format(DATETIME_FORMAT).to_string())
        }
        "DATE" => Value::String(row.try_get::<chrono::NaiveDate, _>(index).map_err(decode)?.to_string()),
        "TIME" => Value::String(row.try_get::<chrono::NaiveTime, _>(index).map_err(decode)?.to_string()),
        "JSON" => row.try_get::<Value, _>(index).map_err(decode)?,
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" => {
            bytes_value(row.try_get::<Vec<u8>, _>(index).map_err(decode)?)
        }
        // Strings, DECIMAL, ENUM and SET arrive as text
        _ => Value::String(row.try_get_unchecked::<String, _>(index).map_err(decode)?),
    };

    Ok(value)
}

/// Binary columns: text when the bytes are valid UTF-8, otherwise the raw
/// bytes as a JSON array so nothing is lost.
fn bytes_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(err) => Value::Array(err.into_bytes().into_iter().map(Value::from).collect()),
    }
}

impl From<&sqlx::Error> for DbError {
    fn from(err: &sqlx::Error) -> Self {
        let kind = match err {
            sqlx::Error::Io(io) => match io.kind() {
                std::io::ErrorKind::TimedOut => DbErrorKind::TimedOut,
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe => DbErrorKind::ConnectionReset,
                std::io::ErrorKind::UnexpectedEof => DbErrorKind::ConnectionLost,
                _ => DbErrorKind::Other("E_IO".to_string()),
            },
            sqlx::Error::PoolTimedOut => DbErrorKind::TimedOut,
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => DbErrorKind::EnqueueAfterFatal,
            sqlx::Error::Protocol(_) => DbErrorKind::ConnectionLost,
            sqlx::Error::Database(db) => match db.try_downcast_ref::<MySqlDatabaseError>() {
                Some(mysql) => kind_for_server_error(mysql.number()),
                None => DbErrorKind::Other("E_DATABASE".to_string()),
            },
            _ => DbErrorKind::Other("E_DRIVER".to_string()),
        };

        DbError::new(kind, err.to_string())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(&err)
    }
}

impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Database(DbError::from(&err))
    }
}

/// Map a MySQL server error number onto the client's error code names.
pub fn kind_for_server_error(number: u16) -> DbErrorKind {
    match number {
        1213 => DbErrorKind::LockDeadlock,
        1205 => DbErrorKind::LockWaitTimeout,
        3024 => DbErrorKind::QueryTimeout,
        1062 => DbErrorKind::Other("ER_DUP_ENTRY".to_string()),
        1064 => DbErrorKind::Other("ER_PARSE_ERROR".to_string()),
        1146 => DbErrorKind::Other("ER_NO_SUCH_TABLE".to_string()),
        1054 => DbErrorKind::Other("ER_BAD_FIELD_ERROR".to_string()),
        1049 => DbErrorKind::Other("ER_BAD_DB_ERROR".to_string()),
        other => DbErrorKind::Other(format!("ER_{}", other)),
    }
}
