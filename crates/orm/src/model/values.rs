//! Value shaping between callers and tables
//!
//! Writes keep only declared, storable attributes and use column names;
//! reads rename columns back and parse JSON text.

use chrono::Utc;
use serde_json::Value;

use crate::attributes::{CREATED_AT, UPDATED_AT};
use crate::conditions::{Condition, OR_KEY};
use crate::error::ModelResult;

use super::{Model, Record};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Create,
    Update,
}

pub(crate) fn now_timestamp() -> Value {
    Value::String(Utc::now().format(TIMESTAMP_FORMAT).to_string())
}

impl Model {
    /// The SET payload for an INSERT or UPDATE, keyed by column name.
    ///
    /// Relation fields are kept only when the key is stored in this table
    /// (`1:1`, `1:many`). Timestamps are always set here, never taken from
    /// the caller; `createdAt` is never part of an update.
    pub(crate) fn useful_values(&self, input: &Record, kind: WriteKind) -> ModelResult<Record> {
        let attributes = self.attributes();
        let mut values = Record::new();

        for (name, value) in input {
            let attribute = match attributes.get(name) {
                Some(attribute) => attribute,
                None => continue,
            };
            if name == CREATED_AT || name == UPDATED_AT {
                continue;
            }

            if attribute.is_relation() {
                let stored_locally = self
                    .connection_info(name)?
                    .map(|info| info.connection_type.is_stored_locally())
                    .unwrap_or(false);
                if !stored_locally {
                    continue;
                }
            }

            let value = if attribute.is_json() && !value.is_null() {
                Value::String(value.to_string())
            } else {
                value.clone()
            };
            values.insert(attribute.column_name.clone(), value);
        }

        if kind == WriteKind::Create && attributes.has_created_at() {
            values.insert(attributes.column_for(CREATED_AT).to_string(), now_timestamp());
        }
        if attributes.has_updated_at() {
            values.insert(attributes.column_for(UPDATED_AT).to_string(), now_timestamp());
        }

        Ok(values)
    }

    /// Rename columns to attribute names and parse JSON columns.
    pub(crate) fn normalize_row(&self, row: Record) -> Record {
        let attributes = self.attributes();
        let mut normalized = Record::new();

        for (column, value) in row {
            let attribute = attributes
                .iter()
                .map(|(_, attribute)| attribute)
                .find(|attribute| attribute.column_name == column);

            match attribute {
                Some(attribute) => {
                    let value = match value {
                        Value::String(text) if attribute.is_json() => {
                            serde_json::from_str(&text).unwrap_or(Value::String(text))
                        }
                        other => other,
                    };
                    normalized.insert(attribute.attr_name.clone(), value);
                }
                None => {
                    normalized.insert(column, value);
                }
            }
        }

        normalized
    }

    /// Rewrite attribute names in a condition to column names, `or` groups
    /// included.
    pub(crate) fn to_column_condition(&self, cond: Condition) -> Condition {
        let attributes = self.attributes();
        cond.into_iter()
            .map(|(key, value)| {
                if key == OR_KEY {
                    let value = match value {
                        Value::Array(groups) => Value::Array(
                            groups
                                .into_iter()
                                .map(|group| match group {
                                    Value::Object(nested) => {
                                        Value::Object(self.to_column_condition(nested))
                                    }
                                    other => other,
                                })
                                .collect(),
                        ),
                        other => other,
                    };
                    (key, value)
                } else {
                    (attributes.column_for(&key).to_string(), value)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeDescriptor;
    use crate::backends::{Connection, QueryResult};
    use crate::context::RequestContext;
    use crate::definition::ModelDefinition;
    use crate::error::DbError;
    use crate::query::table::TenantContext;
    use crate::registry::ModelRegistry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct Idle;

    #[async_trait]
    impl Connection for Idle {
        async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult, DbError> {
            Ok(QueryResult::default())
        }
    }

    fn models() -> Arc<RequestContext> {
        let registry = ModelRegistry::builder()
            .register(
                "user",
                ModelDefinition::new("users")
                    .attribute("uuid", "uuid")
                    .attribute("name", AttributeDescriptor::scalar("string").column("full_name"))
                    .attribute("settings", "json")
                    .attribute("posts", AttributeDescriptor::collection("post", "author")),
            )
            .register(
                "post",
                ModelDefinition::new("posts")
                    .attribute("uuid", "uuid")
                    .attribute("author", AttributeDescriptor::model("user"))
                    .attribute("updatedAt", false),
            )
            .build()
            .unwrap();
        RequestContext::new(Arc::new(registry), Arc::new(Idle), TenantContext::site())
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_values() {
        let user = models().model("user").unwrap();
        let values = user
            .useful_values(
                &record(json!({
                    "uuid": "u1",
                    "name": "Ada",
                    "settings": {"theme": "dark"},
                    "posts": ["p1"],
                    "unknown": 1,
                    "createdAt": "1999-01-01 00:00:00"
                })),
                WriteKind::Create,
            )
            .unwrap();

        assert_eq!(values["uuid"], json!("u1"));
        assert_eq!(values["full_name"], json!("Ada"));
        assert_eq!(values["settings"], json!("{\"theme\":\"dark\"}"));
        assert!(!values.contains_key("posts"));
        assert!(!values.contains_key("unknown"));
        assert_ne!(values["createdAt"], json!("1999-01-01 00:00:00"));
        assert!(values.contains_key("updatedAt"));
    }

    #[test]
    fn test_update_values_never_touch_created_at() {
        let user = models().model("user").unwrap();
        let values = user
            .useful_values(&record(json!({"name": "B", "createdAt": "x"})), WriteKind::Update)
            .unwrap();
        assert!(!values.contains_key("createdAt"));
        assert!(values.contains_key("updatedAt"));

        let post = models().model("post").unwrap();
        let values = post
            .useful_values(&record(json!({"author": "u1"})), WriteKind::Update)
            .unwrap();
        assert_eq!(values["author"], json!("u1"));
        assert!(!values.contains_key("updatedAt"));
        assert!(!values.contains_key("createdAt"));
    }

    #[test]
    fn test_normalize_row() {
        let user = models().model("user").unwrap();
        let row = user.normalize_row(record(json!({
            "uuid": "u1",
            "full_name": "Ada",
            "settings": "{\"theme\":\"dark\"}",
            "extra": 5
        })));
        assert_eq!(row["name"], json!("Ada"));
        assert_eq!(row["settings"], json!({"theme": "dark"}));
        assert_eq!(row["extra"], json!(5));
        assert!(!row.contains_key("full_name"));
    }

    #[test]
    fn test_invalid_json_text_is_kept() {
        let user = models().model("user").unwrap();
        let row = user.normalize_row(record(json!({"settings": "not json"})));
        assert_eq!(row["settings"], json!("not json"));
    }

    #[test]
    fn test_condition_keys_become_columns() {
        let user = models().model("user").unwrap();
        let cond = user.to_column_condition(record(json!({
            "name": "Ada",
            "or": [{"name": "B"}, {"uuid": "u2"}]
        })));
        assert_eq!(
            Value::Object(cond),
            json!({"full_name": "Ada", "or": [{"full_name": "B"}, {"uuid": "u2"}]})
        );
    }
}
