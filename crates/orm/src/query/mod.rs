//! Query execution: tenant table naming, statement execution, retries

pub mod executor;
pub mod retry;
pub mod table;

pub use executor::QueryExecutor;
pub use retry::{is_transient, with_retry, RetryPolicy};
pub use table::{resolve_table_name, DbConfig, TenantContext};
