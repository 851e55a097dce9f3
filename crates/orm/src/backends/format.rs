//! Placeholder expansion for `?`-style statements
//!
//! The ORM binds an IN-list as one array parameter and a `SET ?` payload as
//! one object parameter. Drivers that only bind scalars need the statement
//! rewritten first:
//!
//! - array  `[1, 2]`         => `?, ?` (nested arrays become `(?, ?)`)
//! - object `{"a": 1, "b": 2}` => `` `a` = ?, `b` = ? ``
//!
//! Placeholders inside quoted strings or quoted identifiers are left alone.

use serde_json::Value;

use crate::error::{ModelError, ModelResult};
use crate::security::escape_identifier;

/// Rewrite `sql` so that every placeholder binds exactly one scalar.
///
/// Returns the new statement and the flattened parameter list.
pub fn expand_placeholders(sql: &str, params: &[Value]) -> ModelResult<(String, Vec<Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut flat = Vec::with_capacity(params.len());
    let mut params_iter = params.iter();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars();

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && q != '`' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '?' => {
                let param = params_iter.next().ok_or_else(|| {
                    ModelError::Query(format!("Not enough parameters for statement: {}", sql))
                })?;
                expand_one(param, &mut out, &mut flat);
            }
            _ => out.push(c),
        }
    }

    if params_iter.next().is_some() {
        return Err(ModelError::Query(format!(
            "Too many parameters for statement: {}",
            sql
        )));
    }

    Ok((out, flat))
}

fn expand_one(param: &Value, out: &mut String, flat: &mut Vec<Value>) {
    match param {
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::Array(inner) => {
                        flat.extend(inner.iter().map(scalar));
                        format!("({})", vec!["?"; inner.len()].join(", "))
                    }
                    other => {
                        flat.push(scalar(other));
                        "?".to_string()
                    }
                })
                .collect();
            out.push_str(&parts.join(", "));
        }
        Value::Object(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(column, value)| {
                    flat.push(scalar(value));
                    format!("{} = ?", escape_identifier(column))
                })
                .collect();
            out.push_str(&parts.join(", "));
        }
        other => {
            out.push('?');
            flat.push(other.clone());
        }
    }
}

/// Composite values nested inside an expansion are sent as JSON text
fn scalar(value: &Value) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}
