//! Relationship propagation after `create` and `update`
//!
//! A written row may carry values for relation fields whose link lives in
//! another table:
//! - `many:1`: the related rows get their reciprocal field set to our key
//! - `many:many`: one join row per related key
//!
//! The writes for different fields and keys run concurrently.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;
use tracing::warn;

use crate::conditions::Condition;
use crate::error::ModelResult;
use crate::relationships::{ConnectionInfo, ConnectionType};

use super::{CrudOperations, Model, Record};

impl Model {
    /// Apply the relation values of `input` for the stored `row`.
    pub(crate) async fn propagate_relations(&self, row: &Record, input: &Record) -> ModelResult<()> {
        let own_key = match self.pk().and_then(|pk| row.get(pk)) {
            Some(key) if !key.is_null() => key.clone(),
            _ => return Ok(()),
        };

        let mut writes: Vec<BoxFuture<'_, ModelResult<()>>> = Vec::new();

        for (field, info) in self.context().registry().graph().connections(self.key()) {
            let value = match input.get(field) {
                Some(value) if !is_empty(value) => value,
                _ => continue,
            };

            match info.connection_type {
                ConnectionType::ManyToOne => {
                    writes.push(self.link_many_one(info, own_key.clone(), value.clone()).boxed())
                }
                ConnectionType::ManyToMany => {
                    writes.push(self.link_many_many(info, own_key.clone(), value.clone()).boxed())
                }
                ConnectionType::OneToOne | ConnectionType::OneToMany => {}
            }
        }

        if writes.is_empty() {
            return Ok(());
        }

        try_join_all(writes).await.map(|_| ()).map_err(|e| {
            warn!(
                "Relationship propagation for '{}' failed after the row was written: {}",
                self.key(),
                e
            );
            e
        })
    }

    async fn link_many_one(&self, info: &ConnectionInfo, own_key: Value, value: Value) -> ModelResult<()> {
        let other = self.other_model(info)?;
        let other_pk = other.require_pk()?.to_string();
        let via = match info.attribute.via() {
            Some(via) => via.to_string(),
            None => return Ok(()),
        };

        let keys = related_keys(&value, &other_pk);
        if keys.is_empty() {
            return Ok(());
        }

        let mut cond = Condition::new();
        cond.insert(other_pk, Value::Array(keys));
        let mut values = Record::new();
        values.insert(via, own_key);

        other.update(Some(cond), values).await?;
        Ok(())
    }

    async fn link_many_many(&self, info: &ConnectionInfo, own_key: Value, value: Value) -> ModelResult<()> {
        let join = self.join_model(info)?;
        let other_pk = self.other_model(info)?.pk().unwrap_or_default().to_string();

        let links = related_keys(&value, &other_pk).into_iter().map(|key| {
            let mut link = Record::new();
            link.insert(self.key().to_string(), own_key.clone());
            link.insert(info.other_model.clone(), key);
            let join = join.clone();
            async move { join.create(link).await }
        });

        try_join_all(links).await?;
        Ok(())
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Keys named by a relation value: a key, a list of keys, or records
/// carrying the related model's primary key.
fn related_keys(value: &Value, other_pk: &str) -> Vec<Value> {
    let items = match value {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        single => vec![single],
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => record.get(other_pk).cloned(),
            Value::Null => None,
            key => Some(key.clone()),
        })
        .filter(|key| !key.is_null())
        .collect()
}
