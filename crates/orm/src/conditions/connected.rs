//! Connected conditions - relationship fields rewritten as primary-key lists
//!
//! A condition on a `many:1` or `many:many` field cannot be expressed against
//! this model's table, since the link lives elsewhere. The related rows are
//! looked up first and the keys they point at are merged into the condition
//! on this model's primary key. `1:1` and `1:many` fields are plain columns
//! and pass through.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::model::{CrudOperations, Model};
use crate::relationships::{ConnectionInfo, ConnectionType};

use super::{Condition, OR_KEY};

impl Model {
    /// Rewrite every `many:1` / `many:many` field of `cond`, `or` groups
    /// included. Related lookups run one after another.
    pub fn resolve_connected_conditions(&self, cond: Condition) -> BoxFuture<'_, ModelResult<Condition>> {
        async move {
            let mut cond = cond;

            let fields: Vec<String> = cond.keys().cloned().collect();
            for field in fields {
                if field == OR_KEY {
                    cond = self.resolve_or_groups(cond).await?;
                    continue;
                }

                let info = match self.attributes().get(&field) {
                    Some(attribute) if attribute.is_relation() => self.connection_info(&field)?.cloned(),
                    _ => None,
                };

                cond = match info {
                    Some(info) if info.connection_type == ConnectionType::ManyToOne => {
                        self.resolve_many_one(cond, &field, &info).await?
                    }
                    Some(info) if info.connection_type == ConnectionType::ManyToMany => {
                        self.resolve_many_many(cond, &field, &info).await?
                    }
                    _ => cond,
                };
            }

            Ok(cond)
        }
        .boxed()
    }

    /// `many:1`: find the related rows by their primary key and collect the
    /// keys their reciprocal field points back at.
    pub async fn resolve_many_one(
        &self,
        cond: Condition,
        field: &str,
        info: &ConnectionInfo,
    ) -> ModelResult<Condition> {
        let wanted = match cond.get(field) {
            Some(value) => value.clone(),
            None => return Ok(cond),
        };

        let other = self.other_model(info)?;
        let other_pk = other.require_pk()?.to_string();
        let via = info
            .attribute
            .via()
            .ok_or_else(|| ModelError::definition(self.key(), field, "collection is missing `via`"))?
            .to_string();

        let mut lookup = Condition::new();
        lookup.insert(other_pk, wanted);
        let rows = other.find(Some(lookup)).await?;

        let ids = rows.iter().filter_map(|row| row.get(&via).cloned()).collect();
        merge_into_pk(cond, field, self.require_pk()?, ids)
    }

    /// `many:many`: find the join rows naming the related keys and collect
    /// the keys on this model's side.
    pub async fn resolve_many_many(
        &self,
        cond: Condition,
        field: &str,
        info: &ConnectionInfo,
    ) -> ModelResult<Condition> {
        let wanted = match cond.get(field) {
            Some(value) => value.clone(),
            None => return Ok(cond),
        };

        let join = self.join_model(info)?;

        let mut lookup = Condition::new();
        lookup.insert(info.other_model.clone(), wanted);
        let rows = join.find(Some(lookup)).await?;

        let ids = rows.iter().filter_map(|row| row.get(self.key()).cloned()).collect();
        merge_into_pk(cond, field, self.require_pk()?, ids)
    }

    async fn resolve_or_groups(&self, mut cond: Condition) -> ModelResult<Condition> {
        let groups = match cond.get_mut(OR_KEY) {
            Some(Value::Array(groups)) => std::mem::take(groups),
            _ => return Ok(cond),
        };

        let mut resolved = Vec::with_capacity(groups.len());
        for group in groups {
            match group {
                Value::Object(nested) => {
                    resolved.push(Value::Object(self.resolve_connected_conditions(nested).await?))
                }
                other => resolved.push(other),
            }
        }

        cond.insert(OR_KEY.to_string(), Value::Array(resolved));
        Ok(cond)
    }
}

/// Drop `field` from `cond` and union `ids` into the primary-key term,
/// keeping the key order of everything else.
fn merge_into_pk(cond: Condition, field: &str, pk: &str, ids: Vec<Value>) -> ModelResult<Condition> {
    let mut merged = Condition::new();
    let mut pk_seen = false;

    for (key, value) in cond {
        if key == field {
            continue;
        }
        if key == pk {
            pk_seen = true;
            let mut list = as_list(pk, value)?;
            extend_unique(&mut list, ids.iter().cloned());
            merged.insert(key, Value::Array(list));
        } else {
            merged.insert(key, value);
        }
    }

    if !pk_seen {
        let mut list = Vec::with_capacity(ids.len());
        extend_unique(&mut list, ids);
        merged.insert(pk.to_string(), Value::Array(list));
    }

    Ok(merged)
}

fn as_list(pk: &str, value: Value) -> ModelResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(_) => Err(ModelError::Query(format!(
            "Cannot combine an operator condition on '{}' with a relationship condition",
            pk
        ))),
        Value::Null => Ok(Vec::new()),
        scalar => Ok(vec![scalar]),
    }
}

fn extend_unique(list: &mut Vec<Value>, ids: impl IntoIterator<Item = Value>) {
    for id in ids {
        if !id.is_null() && !list.contains(&id) {
            list.push(id);
        }
    }
}
