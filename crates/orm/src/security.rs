//! Security utilities for SQL injection prevention
//!
//! Identifiers in generated SQL come from model definitions and from the keys
//! of caller-supplied conditions. Values are always bound as parameters, so the
//! identifiers are the only text that reaches the statement verbatim.

use crate::error::{ModelError, ModelResult};

/// Characters allowed in bare SQL identifiers (alphanumeric, underscore, dollar)
const ALLOWED_IDENTIFIER_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_$";

/// MySQL limit on identifier length
const MAX_IDENTIFIER_LEN: usize = 64;

/// Escape a SQL identifier with MySQL backticks.
///
/// Backticks inside the identifier are doubled, so any name can be escaped.
///
/// ```
/// use tenant_orm::security::escape_identifier;
///
/// assert_eq!(escape_identifier("users"), "`users`");
/// assert_eq!(escape_identifier("we`ird"), "`we``ird`");
/// ```
pub fn escape_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// Validate that an identifier can be placed in SQL without escaping.
///
/// Column names and condition keys pass through here before a statement is
/// generated.
pub fn validate_identifier(identifier: &str) -> ModelResult<()> {
    if identifier.is_empty() {
        return Err(ModelError::Query("Identifier cannot be empty".to_string()));
    }

    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(ModelError::Query(format!(
            "Identifier '{}' is too long (max {} characters)",
            identifier, MAX_IDENTIFIER_LEN
        )));
    }

    if let Some(c) = identifier
        .chars()
        .find(|c| !ALLOWED_IDENTIFIER_CHARS.contains(*c))
    {
        return Err(ModelError::Query(format!(
            "Identifier '{}' contains invalid character '{}'",
            identifier, c
        )));
    }

    Ok(())
}

/// Escape the wildcard characters of a LIKE pattern fragment.
///
/// `\` is the default LIKE escape character in MySQL, so it is escaped first.
pub fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
