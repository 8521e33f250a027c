//! Identifier validation and quoting for Snowflake SQL.
//!
//! Identifiers (schema, table and column names) cannot be bound as statement
//! parameters, so every name that ends up in generated metadata SQL goes
//! through [`quote_ident`] and every value compared against a metadata view
//! goes through [`quote_literal`].
//!
//! Snowflake folds unquoted identifiers to upper case. Quoting preserves the
//! name as given, which is why lookups try both the given and the upper-cased
//! spelling (see [`candidate_names`]).

use crate::error::{Result, TdError};

/// Maximum identifier length accepted by Snowflake.
const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and
/// identifiers longer than Snowflake allows.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TdError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(TdError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(TdError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote an identifier with double quotes, preserving its case.
///
/// ```ignore
/// assert_eq!(quote_ident("users")?, "\"users\"");
/// assert_eq!(quote_ident("a\"b")?, "\"a\"\"b\"");
/// ```
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a table name with its schema: `"schema"."table"`.
pub fn qualify(namespace: &str, name: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(namespace)?, quote_ident(name)?))
}

/// Qualify a table name with database and schema.
pub fn qualify_in(database: &str, namespace: &str, name: &str) -> Result<String> {
    Ok(format!(
        "{}.{}.{}",
        quote_ident(database)?,
        quote_ident(namespace)?,
        quote_ident(name)?
    ))
}

/// Render a single-quoted string literal.
///
/// Snowflake treats backslash as an escape character inside string
/// literals, so it is doubled along with single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Spellings to try when looking up `(namespace, name)`: as given, then
/// upper-cased when that differs.
pub fn candidate_names(namespace: &str, name: &str) -> Vec<(String, String)> {
    let mut candidates = vec![(namespace.to_string(), name.to_string())];
    let upper = (namespace.to_uppercase(), name.to_uppercase());
    if upper != candidates[0] {
        candidates.push(upper);
    }
    candidates
}
