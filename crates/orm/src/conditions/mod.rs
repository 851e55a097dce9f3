//! Query Conditions - condition maps to parameterized WHERE fragments
//!
//! A condition is a JSON object. Each key becomes one term and terms are
//! AND-joined in key order:
//!
//! | value                      | term                |
//! |----------------------------|---------------------|
//! | scalar                     | `key = ?`           |
//! | `null`                     | `key IS NULL`       |
//! | non-empty array            | `key IN ( ? )`      |
//! | empty array                | `1 = 0`             |
//! | operator object            | see [`operators`]   |
//! | `or: [cond, ...]`          | `( a OR b )`        |
//!
//! Arrays are bound as a single parameter; the connection expands them.

pub mod connected;
pub mod operators;

use serde_json::{Map, Value};

use crate::error::{ModelError, ModelResult};
use crate::security::validate_identifier;

/// A query condition: field name -> value, operator object or `or` group
pub type Condition = Map<String, Value>;

/// Reserved key holding a list of alternative conditions
pub const OR_KEY: &str = "or";

/// Never-matching term, used for empty IN-lists and empty `or` groups
pub const FALSE_TERM: &str = "1 = 0";

/// Always-matching term
pub const TRUE_TERM: &str = "1 = 1";

/// A WHERE fragment and the values bound to its placeholders, in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    pub query: String,
    pub values: Vec<Value>,
}

impl SqlFragment {
    /// An empty fragment means "no WHERE clause"
    pub fn is_empty(&self) -> bool {
        self.query.is_empty()
    }
}

/// Build the WHERE fragment for a condition.
pub fn build_condition(cond: &Condition) -> ModelResult<SqlFragment> {
    let mut values = Vec::new();
    let mut terms = Vec::with_capacity(cond.len());

    for (key, value) in cond {
        terms.push(build_term(key, value, &mut values)?);
    }

    Ok(SqlFragment {
        query: terms.join(" AND "),
        values,
    })
}

fn build_term(key: &str, value: &Value, values: &mut Vec<Value>) -> ModelResult<String> {
    if key == OR_KEY {
        return build_or_group(value, values);
    }

    validate_identifier(key)?;

    match value {
        Value::Null => Ok(format!("{} IS NULL", key)),
        Value::Array(items) if items.is_empty() => Ok(FALSE_TERM.to_string()),
        Value::Array(_) => {
            values.push(value.clone());
            Ok(format!("{} IN ( ? )", key))
        }
        Value::Object(operators) => operators::render(key, operators, values),
        _ => {
            values.push(value.clone());
            Ok(format!("{} = ?", key))
        }
    }
}

fn build_or_group(value: &Value, values: &mut Vec<Value>) -> ModelResult<String> {
    let alternatives = value
        .as_array()
        .ok_or_else(|| ModelError::Query("`or` expects an array of conditions".to_string()))?;

    if alternatives.is_empty() {
        return Ok(FALSE_TERM.to_string());
    }

    let mut terms = Vec::with_capacity(alternatives.len());
    for alternative in alternatives {
        let nested = alternative.as_object().ok_or_else(|| {
            ModelError::Query("`or` entries must be condition objects".to_string())
        })?;
        let fragment = build_condition(nested)?;
        if fragment.is_empty() {
            terms.push(TRUE_TERM.to_string());
        } else {
            values.extend(fragment.values);
            terms.push(fragment.query);
        }
    }

    Ok(format!("( {} )", terms.join(" OR ")))
}
