//! CRUD Operations - Create, Read, Update, Delete operations for models
//!
//! Every operation resolves the tenant table first, so a request without
//! database settings fails before any hook or statement runs. Statements
//! are not wrapped in a transaction: when relationship propagation fails
//! after the primary write, the primary write stays.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, debug_span, Instrument};

use crate::conditions::{build_condition, Condition, SqlFragment};
use crate::error::{ModelError, ModelResult};

use super::values::WriteKind;
use super::{Model, Record};

/// Trait providing CRUD operations for models
///
/// `find`, `update` and `destroy` take `Option<Condition>`: `None` is
/// rejected, `Some({})` addresses every row.
#[async_trait]
pub trait CrudOperations {
    /// Insert one row and return it as stored
    async fn create(&self, values: Record) -> ModelResult<Record>;

    async fn find(&self, cond: Option<Condition>) -> ModelResult<Vec<Record>>;

    async fn find_one(&self, cond: Option<Condition>) -> ModelResult<Option<Record>>;

    async fn count(&self, cond: Option<Condition>) -> ModelResult<u64>;

    /// Update matching rows and return them after the update
    async fn update(&self, cond: Option<Condition>, values: Record) -> ModelResult<Vec<Record>>;

    async fn destroy(&self, cond: Option<Condition>) -> ModelResult<()>;
}

#[async_trait]
impl CrudOperations for Model {
    async fn create(&self, values: Record) -> ModelResult<Record> {
        let span = debug_span!("create", model = self.key(), tenant = self.tenant_label());
        async move {
            let table = self.table_name()?;

            let mut input = values;
            self.hooks().before_create(&mut input).await?;

            let payload = self.useful_values(&input, WriteKind::Create)?;
            let sql = format!("INSERT INTO {} SET ?", table);
            let result = self.executor().insert(&sql, &[Value::Object(payload)]).await?;

            let mut row = match self.refetch(result.insert_id, &input).await? {
                Some(row) => row,
                None => input.clone(),
            };

            self.propagate_relations(&row, &input).await?;
            self.hooks().after_create(&mut row).await?;

            Ok(row)
        }
        .instrument(span)
        .await
    }

    async fn find(&self, cond: Option<Condition>) -> ModelResult<Vec<Record>> {
        let cond = cond.ok_or(ModelError::MissingCondition { operation: "find" })?;
        let span = debug_span!("find", model = self.key(), tenant = self.tenant_label());
        self.select(cond, None).instrument(span).await
    }

    async fn find_one(&self, cond: Option<Condition>) -> ModelResult<Option<Record>> {
        let cond = cond.ok_or(ModelError::MissingCondition { operation: "find_one" })?;
        let span = debug_span!("find_one", model = self.key(), tenant = self.tenant_label());
        let rows = self.select(cond, Some(1)).instrument(span).await?;
        Ok(rows.into_iter().next())
    }

    async fn count(&self, cond: Option<Condition>) -> ModelResult<u64> {
        let cond = cond.ok_or(ModelError::MissingCondition { operation: "count" })?;
        let span = debug_span!("count", model = self.key(), tenant = self.tenant_label());
        async move {
            let table = self.table_name()?;
            let fragment = self.where_fragment(cond).await?;
            let sql = with_where(format!("SELECT COUNT(*) AS count FROM {}", table), &fragment);

            let result = self.executor().run(&sql, &fragment.values).await?;
            let count = result
                .rows
                .first()
                .and_then(|row| row.get("count"))
                .and_then(count_value)
                .unwrap_or(0);
            Ok(count)
        }
        .instrument(span)
        .await
    }

    async fn update(&self, cond: Option<Condition>, values: Record) -> ModelResult<Vec<Record>> {
        let cond = cond.ok_or(ModelError::MissingCondition { operation: "update" })?;
        let span = debug_span!("update", model = self.key(), tenant = self.tenant_label());
        async move {
            let table = self.table_name()?;

            let mut input = values;
            self.hooks().before_update(&mut input).await?;

            let payload = self.useful_values(&input, WriteKind::Update)?;
            if payload.is_empty() {
                debug!("Nothing to update on '{}'", self.key());
            } else {
                let fragment = self.where_fragment(cond.clone()).await?;
                let sql = with_where(format!("UPDATE {} SET ?", table), &fragment);

                let mut params = Vec::with_capacity(fragment.values.len() + 1);
                params.push(Value::Object(payload));
                params.extend(fragment.values);

                let result = self.executor().run(&sql, &params).await?;
                debug!("Updated {} row(s) in '{}'", result.affected_rows, self.key());
            }

            let mut rows = self.find(Some(cond)).await?;

            futures::future::try_join_all(rows.iter().map(|row| self.propagate_relations(row, &input))).await?;

            for row in rows.iter_mut() {
                self.hooks().after_update(row).await?;
            }

            Ok(rows)
        }
        .instrument(span)
        .await
    }

    async fn destroy(&self, cond: Option<Condition>) -> ModelResult<()> {
        let cond = cond.ok_or(ModelError::MissingCondition { operation: "destroy" })?;
        let span = debug_span!("destroy", model = self.key(), tenant = self.tenant_label());
        async move {
            let table = self.table_name()?;
            let fragment = self.where_fragment(cond).await?;
            let sql = with_where(format!("DELETE FROM {}", table), &fragment);

            let result = self.executor().run(&sql, &fragment.values).await?;
            debug!("Deleted {} row(s) from '{}'", result.affected_rows, self.key());
            Ok(())
        }
        .instrument(span)
        .await
    }
}

impl Model {
    fn tenant_label(&self) -> &str {
        self.context().tenant_id().unwrap_or("-")
    }

    /// Relationship fields resolved, attribute names mapped to columns, built.
    async fn where_fragment(&self, cond: Condition) -> ModelResult<SqlFragment> {
        let cond = self.resolve_connected_conditions(cond).await?;
        build_condition(&self.to_column_condition(cond))
    }

    async fn select(&self, cond: Condition, limit: Option<u64>) -> ModelResult<Vec<Record>> {
        let table = self.table_name()?;
        let fragment = self.where_fragment(cond).await?;

        let mut sql = with_where(format!("SELECT * FROM {}", table), &fragment);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let result = self.executor().run(&sql, &fragment.values).await?;
        Ok(result
            .rows
            .into_iter()
            .map(|row| self.normalize_row(row))
            .collect())
    }

    /// Read back an inserted row by generated id, else by the caller's key.
    async fn refetch(&self, insert_id: Option<u64>, input: &Record) -> ModelResult<Option<Record>> {
        let pk = match self.pk() {
            Some(pk) => pk.to_string(),
            None => return Ok(None),
        };

        let key = match (insert_id, input.get(&pk)) {
            (Some(id), _) => Value::from(id),
            (None, Some(value)) if !value.is_null() => value.clone(),
            _ => return Ok(None),
        };

        let mut cond = Condition::new();
        cond.insert(pk, key);
        self.find_one(Some(cond)).await
    }
}

fn with_where(mut sql: String, fragment: &SqlFragment) -> String {
    if !fragment.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&fragment.query);
    }
    sql
}

fn count_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
