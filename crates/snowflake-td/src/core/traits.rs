//! The warehouse contract used by every component.
//!
//! - [`Warehouse`]: runs SQL against one warehouse session
//! - [`Row`]: one result row, values rendered as text
//!
//! # Design Patterns
//!
//! - **Template Method**: implementors provide [`Warehouse::query`] and
//!   [`Warehouse::execute`]; the metadata operations are default methods
//!   that build Snowflake metadata SQL on top of them.

use async_trait::async_trait;
use tracing::debug;

use super::identifier::{qualify_in, quote_ident, quote_literal};
use crate::error::{Result, WarehouseError};

/// One result row.
///
/// Values are kept as the text the warehouse returned (`None` for SQL NULL),
/// in result-set column order. Column lookup is case-insensitive because
/// Snowflake reports `SHOW` output in lower case and unquoted select aliases
/// in upper case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<(String, Option<String>)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column value.
    pub fn push(&mut self, column: impl Into<String>, value: Option<String>) {
        self.values.push((column.into(), value));
    }

    /// Value of `column`, or `None` when the column is missing or NULL.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .and_then(|(_, value)| value.as_deref())
    }

    /// Value at `index` in result-set order.
    pub fn get_index(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|(_, value)| value.as_deref())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case(column))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, Option<V>)> for Row
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Option<V>)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.map(Into::into)))
                .collect(),
        }
    }
}

/// A session on a SQL warehouse.
///
/// Every call completes its round trip before returning. Implementations
/// must be shareable across tasks: the orchestrator inspects streams
/// concurrently through one `Arc<dyn Warehouse>`.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Database all metadata lookups are scoped to.
    fn database(&self) -> &str;

    /// Run a statement and return its rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Run a statement (or a multi-statement transaction string) for its
    /// side effects.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Names of all schemas in [`database`](Self::database), exactly as stored.
    async fn list_schemas(&self) -> Result<Vec<String>> {
        let sql = format!("SHOW SCHEMAS IN DATABASE {}", quote_ident(self.database())?);
        debug!("{}", sql);
        let rows = self.query(&sql).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("name").map(str::to_string))
            .collect())
    }

    /// Column rows of a table (`SHOW COLUMNS`), matched exactly as given.
    ///
    /// Fails with the warehouse's "does not exist" error when the table is
    /// missing.
    async fn describe_table(&self, namespace: &str, name: &str) -> Result<Vec<Row>> {
        let sql = format!(
            "SHOW COLUMNS IN TABLE {}",
            qualify_in(self.database(), namespace, name)?
        );
        debug!("{}", sql);
        self.query(&sql).await
    }

    /// Table rows (`SHOW TABLES LIKE`) in a schema. The pattern is matched
    /// case-insensitively by the warehouse.
    async fn list_tables(&self, namespace: &str, pattern: &str) -> Result<Vec<Row>> {
        let sql = format!(
            "SHOW TABLES LIKE {} IN SCHEMA {}.{}",
            quote_literal(pattern),
            quote_ident(self.database())?,
            quote_ident(namespace)?
        );
        debug!("{}", sql);
        self.query(&sql).await
    }

    /// True when the table exists under exactly this spelling.
    async fn table_exists(&self, namespace: &str, name: &str) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) AS \"CNT\" FROM {}.INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {}",
            quote_ident(self.database())?,
            quote_literal(namespace),
            quote_literal(name)
        );
        debug!("{}", sql);
        let rows = self.query(&sql).await?;
        let count = rows
            .first()
            .and_then(|row| row.get("CNT"))
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| {
                WarehouseError::new(format!(
                    "Table existence check for {}.{} returned no count",
                    namespace, name
                ))
            })?;
        Ok(count > 0)
    }
}
