//! Tenant-scoped table names
//!
//! Tenant rows live in a per-tenant database named `"{database}-{tenant}"`
//! that shares the schema of the main database. Site-only tables always live
//! in the connection's default database.

use serde::{Deserialize, Serialize};

use crate::backends::Connection;
use crate::error::{ModelError, ModelResult};

/// Database settings of the request's cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    /// Name of the main database; tenant databases are derived from it
    pub database: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl DbConfig {
    pub fn with_database(database: impl Into<String>) -> Self {
        Self {
            database: Some(database.into()),
            ..Default::default()
        }
    }
}

/// Who the current request is acting for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Option<String>,
    pub db_config: Option<DbConfig>,
}

impl TenantContext {
    /// A context without a tenant; every table resolves to the default database
    pub fn site() -> Self {
        Self::default()
    }

    pub fn tenant(tenant_id: impl Into<String>, db_config: DbConfig) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            db_config: Some(db_config),
        }
    }
}

/// Resolve the fully escaped table reference for a statement.
///
/// Fails with a configuration error (`E_CONFIG_ERROR`) when a tenant is set,
/// the table is not site-only and the database name is unknown.
pub fn resolve_table_name(
    connection: &dyn Connection,
    table_name: &str,
    site_only: bool,
    tenant: &TenantContext,
) -> ModelResult<String> {
    let table = connection.escape_identifier(table_name);

    let tenant_id = match (&tenant.tenant_id, site_only) {
        (Some(tenant_id), false) => tenant_id,
        _ => return Ok(table),
    };

    let database = tenant
        .db_config
        .as_ref()
        .and_then(|config| config.database.as_deref())
        .ok_or_else(|| {
            ModelError::Configuration(format!(
                "No database configured for tenant '{}' (table '{}')",
                tenant_id, table_name
            ))
        })?;

    let schema = connection.escape_identifier(&format!("{}-{}", database, tenant_id));
    Ok(format!("{}.{}", schema, table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::QueryResult;
    use crate::error::DbError;
    use async_trait::async_trait;
    use serde_json::Value;

    struct Quoting;

    #[async_trait]
    impl Connection for Quoting {
        async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult, DbError> {
            Ok(QueryResult::default())
        }
    }

    #[test]
    fn test_tenant_table_is_schema_qualified() {
        let tenant = TenantContext::tenant("t1", DbConfig::with_database("sites"));
        let name = resolve_table_name(&Quoting, "users", false, &tenant).unwrap();
        assert_eq!(name, "`sites-t1`.`users`");
        assert!(name.contains("sites"));
        assert!(name.contains("t1"));
    }

    #[test]
    fn test_site_only_ignores_tenant() {
        let tenant = TenantContext::tenant("t1", DbConfig::with_database("sites"));
        let name = resolve_table_name(&Quoting, "users", true, &tenant).unwrap();
        assert_eq!(name, "`users`");
        assert!(!name.contains("sites"));
        assert!(!name.contains("t1"));
    }

    #[test]
    fn test_no_tenant_uses_default_database() {
        let name = resolve_table_name(&Quoting, "users", false, &TenantContext::site()).unwrap();
        assert_eq!(name, "`users`");
    }

    #[test]
    fn test_missing_database_is_config_error() {
        let tenant = TenantContext::tenant("t1", DbConfig::default());
        let err = resolve_table_name(&Quoting, "users", false, &tenant).unwrap_err();
        assert_eq!(err.code(), "E_CONFIG_ERROR");

        let tenant = TenantContext {
            tenant_id: Some("t1".to_string()),
            db_config: None,
        };
        assert!(resolve_table_name(&Quoting, "users", false, &tenant).is_err());
    }

    #[test]
    fn test_identifiers_are_escaped() {
        let tenant = TenantContext::tenant("a`b", DbConfig::with_database("db"));
        let name = resolve_table_name(&Quoting, "odd`table", false, &tenant).unwrap();
        assert_eq!(name, "`db-a``b`.`odd``table`");
    }
}
