//! In-memory `Connection` for integration tests
//!
//! Understands exactly the statement forms the ORM emits:
//! `INSERT INTO t SET ?`, `SELECT * FROM t [WHERE ..] [LIMIT n]`,
//! `SELECT COUNT(*) AS count FROM t [WHERE ..]`, `UPDATE t SET ? [WHERE ..]`
//! and `DELETE FROM t [WHERE ..]`.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tenant_orm::{
    Connection, DbError, DbErrorKind, ModelDefinition, ModelRegistry, QueryResult, Record,
    RequestContext, RetryPolicy, TenantContext,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("tenant_orm=debug")
        .try_init();
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct State {
    tables: BTreeMap<String, Vec<Record>>,
    auto_increment: HashMap<String, (String, u64)>,
    statements: Vec<Statement>,
    failures: Vec<(String, DbErrorKind, u32)>,
}

#[derive(Clone, Default)]
pub struct MemoryConnection {
    state: Arc<Mutex<State>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `table` an auto-increment `column`
    pub fn auto_increment(&self, table: &str, column: &str) {
        self.state
            .lock()
            .unwrap()
            .auto_increment
            .insert(table.to_string(), (column.to_string(), 0));
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        let entry = state.tables.entry(table.to_string()).or_default();
        entry.extend(rows.into_iter().map(record));
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn statements_starting_with(&self, prefix: &str) -> Vec<Statement> {
        self.statements()
            .into_iter()
            .filter(|s| s.sql.starts_with(prefix))
            .collect()
    }

    /// Fail the next `times` statements starting with `prefix`
    pub fn fail(&self, prefix: &str, kind: DbErrorKind, times: u32) {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((prefix.to_string(), kind, times));
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult, DbError> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        if let Some(failure) = state
            .failures
            .iter_mut()
            .find(|(prefix, _, times)| *times > 0 && sql.starts_with(prefix.as_str()))
        {
            failure.2 -= 1;
            return Err(DbError::new(failure.1.clone(), "scripted failure"));
        }

        let tokens: Vec<&str> = sql.split_whitespace().collect();
        match tokens.as_slice() {
            ["INSERT", "INTO", table, "SET", "?"] => {
                let table = table.to_string();
                let mut row = params
                    .first()
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or_else(|| bad("INSERT expects an object"))?;

                let mut insert_id = None;
                if let Some((column, next)) = state.auto_increment.get_mut(&table) {
                    *next += 1;
                    row.insert(column.clone(), json!(*next));
                    insert_id = Some(*next);
                }

                state.tables.entry(table).or_default().push(row);
                Ok(QueryResult::from_write(1, insert_id))
            }
            ["SELECT", "COUNT(*)", "AS", "count", "FROM", table, rest @ ..] => {
                let filter = Filter::parse(rest, params)?;
                let count = state
                    .tables
                    .get(*table)
                    .map(|rows| rows.iter().filter(|row| filter.matches(row)).count())
                    .unwrap_or(0);
                let mut row = Record::new();
                row.insert("count".to_string(), json!(count));
                Ok(QueryResult::from_rows(vec![row]))
            }
            ["SELECT", "*", "FROM", table, rest @ ..] => {
                let (rest, limit) = split_limit(rest)?;
                let filter = Filter::parse(rest, params)?;
                let mut rows: Vec<Record> = state
                    .tables
                    .get(*table)
                    .map(|rows| rows.iter().filter(|row| filter.matches(row)).cloned().collect())
                    .unwrap_or_default();
                if let Some(limit) = limit {
                    rows.truncate(limit);
                }
                Ok(QueryResult::from_rows(rows))
            }
            ["UPDATE", table, "SET", "?", rest @ ..] => {
                let changes = params
                    .first()
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or_else(|| bad("UPDATE expects an object"))?;
                let filter = Filter::parse(rest, params.get(1..).unwrap_or(&[]))?;
                let mut affected = 0;
                if let Some(rows) = state.tables.get_mut(*table) {
                    for row in rows.iter_mut().filter(|row| filter.matches(row)) {
                        for (column, value) in &changes {
                            row.insert(column.clone(), value.clone());
                        }
                        affected += 1;
                    }
                }
                Ok(QueryResult::from_write(affected, None))
            }
            ["DELETE", "FROM", table, rest @ ..] => {
                let filter = Filter::parse(rest, params)?;
                let mut affected = 0;
                if let Some(rows) = state.tables.get_mut(*table) {
                    let before = rows.len();
                    rows.retain(|row| !filter.matches(row));
                    affected = (before - rows.len()) as u64;
                }
                Ok(QueryResult::from_write(affected, None))
            }
            _ => Err(bad(&format!("unsupported statement: {}", sql))),
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult, DbError> {
        self.execute(sql, params)
    }
}

fn bad(message: &str) -> DbError {
    DbError::new(DbErrorKind::Other("ER_PARSE_ERROR".to_string()), message)
}

fn split_limit<'a>(tokens: &'a [&'a str]) -> Result<(&'a [&'a str], Option<usize>), DbError> {
    match tokens {
        [head @ .., "LIMIT", n] => {
            let n = n.parse().map_err(|_| bad("bad LIMIT"))?;
            Ok((head, Some(n)))
        }
        _ => Ok((tokens, None)),
    }
}

/// Parsed WHERE clause
enum Expr {
    Const(bool),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Cmp { column: String, op: String, value: Value },
    In { column: String, values: Vec<Value>, negated: bool },
    IsNull { column: String, negated: bool },
    Like { column: String, pattern: String },
}

struct Filter(Expr);

impl Filter {
    fn parse(tokens: &[&str], params: &[Value]) -> Result<Self, DbError> {
        match tokens {
            [] => Ok(Filter(Expr::Const(true))),
            ["WHERE", rest @ ..] => {
                let mut parser = Parser {
                    tokens: rest,
                    pos: 0,
                    params,
                    next_param: 0,
                };
                let expr = parser.or_expr()?;
                if parser.pos != rest.len() {
                    return Err(bad("trailing tokens in WHERE"));
                }
                Ok(Filter(expr))
            }
            _ => Err(bad("expected WHERE")),
        }
    }

    fn matches(&self, row: &Record) -> bool {
        eval(&self.0, row)
    }
}

struct Parser<'a> {
    tokens: &'a [&'a str],
    pos: usize,
    params: &'a [Value],
    next_param: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Result<&'a str, DbError> {
        let token = self.peek().ok_or_else(|| bad("unexpected end of WHERE"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, token: &str) -> Result<(), DbError> {
        if self.next()? == token {
            Ok(())
        } else {
            Err(bad(&format!("expected '{}'", token)))
        }
    }

    fn param(&mut self) -> Result<Value, DbError> {
        self.expect("?")?;
        let value = self
            .params
            .get(self.next_param)
            .cloned()
            .ok_or_else(|| bad("missing parameter"))?;
        self.next_param += 1;
        Ok(value)
    }

    fn or_expr(&mut self) -> Result<Expr, DbError> {
        let mut terms = vec![self.and_expr()?];
        while self.peek() == Some("OR") {
            self.pos += 1;
            terms.push(self.and_expr()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Expr::Or(terms) })
    }

    fn and_expr(&mut self) -> Result<Expr, DbError> {
        let mut terms = vec![self.atom()?];
        while self.peek() == Some("AND") {
            self.pos += 1;
            terms.push(self.atom()?);
        }
        Ok(if terms.len() == 1 { terms.remove(0) } else { Expr::And(terms) })
    }

    fn atom(&mut self) -> Result<Expr, DbError> {
        let first = self.next()?;
        if first == "(" {
            let inner = self.or_expr()?;
            self.expect(")")?;
            return Ok(inner);
        }
        if first == "1" {
            self.expect("=")?;
            return Ok(Expr::Const(self.next()? == "1"));
        }

        let column = first.trim_matches('`').to_string();
        match self.next()? {
            "IS" => {
                let negated = self.peek() == Some("NOT");
                if negated {
                    self.pos += 1;
                }
                self.expect("NULL")?;
                Ok(Expr::IsNull { column, negated })
            }
            "IN" => self.in_list(column, false),
            "NOT" => {
                self.expect("IN")?;
                self.in_list(column, true)
            }
            "LIKE" => {
                let pattern = self.param()?.as_str().unwrap_or_default().to_string();
                Ok(Expr::Like { column, pattern })
            }
            op @ ("=" | "<" | "<=" | ">" | ">=" | "<>") => Ok(Expr::Cmp {
                column,
                op: op.to_string(),
                value: self.param()?,
            }),
            other => Err(bad(&format!("unsupported operator '{}'", other))),
        }
    }

    fn in_list(&mut self, column: String, negated: bool) -> Result<Expr, DbError> {
        self.expect("(")?;
        let values = match self.param()? {
            Value::Array(values) => values,
            single => vec![single],
        };
        self.expect(")")?;
        Ok(Expr::In { column, values, negated })
    }
}

fn eval(expr: &Expr, row: &Record) -> bool {
    match expr {
        Expr::Const(value) => *value,
        Expr::And(terms) => terms.iter().all(|t| eval(t, row)),
        Expr::Or(terms) => terms.iter().any(|t| eval(t, row)),
        Expr::IsNull { column, negated } => {
            let is_null = row.get(column).map(Value::is_null).unwrap_or(true);
            is_null != *negated
        }
        Expr::In { column, values, negated } => {
            let cell = row.get(column).cloned().unwrap_or(Value::Null);
            let found = !cell.is_null() && values.iter().any(|v| loose_eq(&cell, v));
            found != *negated && !cell.is_null()
        }
        Expr::Cmp { column, op, value } => {
            let cell = row.get(column).cloned().unwrap_or(Value::Null);
            if cell.is_null() {
                return false;
            }
            match op.as_str() {
                "=" => loose_eq(&cell, value),
                "<>" => !loose_eq(&cell, value),
                _ => match (as_f64(&cell), as_f64(value)) {
                    (Some(a), Some(b)) => match op.as_str() {
                        "<" => a < b,
                        "<=" => a <= b,
                        ">" => a > b,
                        _ => a >= b,
                    },
                    _ => false,
                },
            }
        }
        Expr::Like { column, pattern } => match row.get(column) {
            Some(Value::String(text)) => like(text, pattern),
            _ => false,
        },
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (as_f64(a), as_f64(b)) {
        (Some(x), Some(y)) => x == y,
        _ => text(a) == text(b),
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// MySQL LIKE with `%`, `_` and `\` escapes
fn like(text: &str, pattern: &str) -> bool {
    #[derive(Clone, Copy)]
    enum P {
        Any,
        One,
        Lit(char),
    }

    let mut parts = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        parts.push(match c {
            '\\' => P::Lit(chars.next().unwrap_or('\\')),
            '%' => P::Any,
            '_' => P::One,
            c => P::Lit(c),
        });
    }

    fn go(text: &[char], parts: &[P]) -> bool {
        match parts.split_first() {
            None => text.is_empty(),
            Some((P::Any, rest)) => (0..=text.len()).any(|i| go(&text[i..], rest)),
            Some((P::One, rest)) => !text.is_empty() && go(&text[1..], rest),
            Some((P::Lit(c), rest)) => text.first() == Some(c) && go(&text[1..], rest),
        }
    }

    let text: Vec<char> = text.chars().collect();
    go(&text, &parts)
}

/// Build a request context over the given definitions and connection.
pub fn context(
    definitions: Vec<(&str, ModelDefinition)>,
    connection: &MemoryConnection,
    tenant: TenantContext,
) -> Arc<RequestContext> {
    let registry = definitions
        .into_iter()
        .fold(ModelRegistry::builder(), |builder, (key, def)| builder.register(key, def))
        .build()
        .expect("definitions should compile");
    let policy = RetryPolicy {
        base_delay: std::time::Duration::from_millis(1),
        ..RetryPolicy::default()
    };
    RequestContext::with_policy(Arc::new(registry), Arc::new(connection.clone()), tenant, policy)
}
