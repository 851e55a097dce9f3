//! Condition operators - `{ "<": 50 }`, `{ "contains": "x" }`, ...

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{ModelError, ModelResult};
use crate::security::escape_like;

use super::{FALSE_TERM, TRUE_TERM};

/// Operators accepted inside an operator object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOperator {
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    NotEqual,
    In,
    NotIn,
    Like,
    Contains,
    StartsWith,
    EndsWith,
}

impl ConditionOperator {
    pub fn parse(key: &str) -> Option<Self> {
        let operator = match key {
            "<" | "lessThan" => ConditionOperator::LessThan,
            "<=" | "lessThanOrEqual" => ConditionOperator::LessThanOrEqual,
            ">" | "greaterThan" => ConditionOperator::GreaterThan,
            ">=" | "greaterThanOrEqual" => ConditionOperator::GreaterThanOrEqual,
            "!" | "!=" | "not" => ConditionOperator::NotEqual,
            "in" => ConditionOperator::In,
            "nin" => ConditionOperator::NotIn,
            "like" => ConditionOperator::Like,
            "contains" => ConditionOperator::Contains,
            "startsWith" => ConditionOperator::StartsWith,
            "endsWith" => ConditionOperator::EndsWith,
            _ => return None,
        };
        Some(operator)
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionOperator::LessThan => write!(f, "<"),
            ConditionOperator::LessThanOrEqual => write!(f, "<="),
            ConditionOperator::GreaterThan => write!(f, ">"),
            ConditionOperator::GreaterThanOrEqual => write!(f, ">="),
            ConditionOperator::NotEqual => write!(f, "<>"),
            ConditionOperator::In => write!(f, "IN"),
            ConditionOperator::NotIn => write!(f, "NOT IN"),
            ConditionOperator::Like
            | ConditionOperator::Contains
            | ConditionOperator::StartsWith
            | ConditionOperator::EndsWith => write!(f, "LIKE"),
        }
    }
}

/// Render an operator object for `column`. Several operators in one object
/// are AND-joined and parenthesized.
pub fn render(column: &str, operators: &Map<String, Value>, values: &mut Vec<Value>) -> ModelResult<String> {
    if operators.is_empty() {
        return Err(ModelError::Query(format!(
            "Empty operator object for '{}'",
            column
        )));
    }

    let mut terms = Vec::with_capacity(operators.len());
    for (key, operand) in operators {
        let operator = ConditionOperator::parse(key).ok_or_else(|| {
            ModelError::Query(format!("Unknown operator '{}' for '{}'", key, column))
        })?;
        terms.push(render_one(column, operator, operand, values)?);
    }

    if terms.len() == 1 {
        Ok(terms.remove(0))
    } else {
        Ok(format!("( {} )", terms.join(" AND ")))
    }
}

fn render_one(
    column: &str,
    operator: ConditionOperator,
    operand: &Value,
    values: &mut Vec<Value>,
) -> ModelResult<String> {
    match operator {
        ConditionOperator::LessThan
        | ConditionOperator::LessThanOrEqual
        | ConditionOperator::GreaterThan
        | ConditionOperator::GreaterThanOrEqual => {
            if !is_scalar(operand) {
                return Err(ModelError::Query(format!(
                    "'{}' on '{}' expects a scalar",
                    operator, column
                )));
            }
            values.push(operand.clone());
            Ok(format!("{} {} ?", column, operator))
        }
        ConditionOperator::NotEqual => match operand {
            Value::Null => Ok(format!("{} IS NOT NULL", column)),
            Value::Array(_) => render_one(column, ConditionOperator::NotIn, operand, values),
            Value::Object(_) => Err(ModelError::Query(format!(
                "'not' on '{}' expects a scalar or a list",
                column
            ))),
            _ => {
                values.push(operand.clone());
                Ok(format!("{} {} ?", column, operator))
            }
        },
        ConditionOperator::In | ConditionOperator::NotIn => {
            let list = match operand {
                Value::Array(items) => items.clone(),
                Value::Object(_) => {
                    return Err(ModelError::Query(format!(
                        "'{}' on '{}' expects a list",
                        operator, column
                    )))
                }
                scalar => vec![scalar.clone()],
            };
            if list.is_empty() {
                // Nothing to include never matches, nothing to exclude always does
                let term = if operator == ConditionOperator::In { FALSE_TERM } else { TRUE_TERM };
                return Ok(term.to_string());
            }
            values.push(Value::Array(list));
            Ok(format!("{} {} ( ? )", column, operator))
        }
        ConditionOperator::Like => {
            values.push(Value::String(like_operand(column, operand)?));
            Ok(format!("{} LIKE ?", column))
        }
        ConditionOperator::Contains | ConditionOperator::StartsWith | ConditionOperator::EndsWith => {
            let escaped = escape_like(&like_operand(column, operand)?);
            let pattern = match operator {
                ConditionOperator::Contains => format!("%{}%", escaped),
                ConditionOperator::StartsWith => format!("{}%", escaped),
                _ => format!("%{}", escaped),
            };
            values.push(Value::String(pattern));
            Ok(format!("{} LIKE ?", column))
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

fn like_operand(column: &str, operand: &Value) -> ModelResult<String> {
    match operand {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(ModelError::Query(format!(
            "LIKE on '{}' expects a string",
            column
        ))),
    }
}
