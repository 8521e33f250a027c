//! Actual table definitions as reported by the warehouse.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One column of an existing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name as stored.
    pub name: String,
    /// Canonical type name (see `typemap::canonicalize_reported_type`).
    pub type_name: String,
    /// Position in the table, 0-based.
    pub ordinal: usize,
    pub nullable: bool,
}

/// Columns of an existing table keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub columns: BTreeMap<String, ColumnDefinition>,
}

impl TableDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; its ordinal is the current column count.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        nullable: bool,
    ) -> &mut Self {
        let name = name.into();
        let ordinal = self.columns.len();
        self.columns.insert(
            name.clone(),
            ColumnDefinition {
                name,
                type_name: type_name.into(),
                ordinal,
                nullable,
            },
        );
        self
    }

    /// Builder form of [`add_column`](Self::add_column).
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        nullable: bool,
    ) -> Self {
        self.add_column(name, type_name, nullable);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.get(name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
