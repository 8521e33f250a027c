//! Stream identity and desired schema.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::AirbyteType;

/// Suffix of the temporary raw table used while a stream is being overwritten.
pub const TMP_TABLE_SUFFIX: &str = "_airbyte_tmp";

/// Identity of a stream in the warehouse.
///
/// The final and raw names are already transformed for the warehouse; the
/// original names are what the source reported and key the persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId {
    pub final_namespace: String,
    pub final_name: String,
    pub raw_namespace: String,
    pub raw_name: String,
    #[serde(default)]
    pub original_namespace: Option<String>,
    pub original_name: String,
}

impl StreamId {
    pub fn new(
        final_namespace: impl Into<String>,
        final_name: impl Into<String>,
        raw_namespace: impl Into<String>,
        raw_name: impl Into<String>,
        original_namespace: Option<String>,
        original_name: impl Into<String>,
    ) -> Self {
        Self {
            final_namespace: final_namespace.into(),
            final_name: final_name.into(),
            raw_namespace: raw_namespace.into(),
            raw_name: raw_name.into(),
            original_namespace,
            original_name: original_name.into(),
        }
    }

    /// Key under which this stream's destination state is persisted.
    pub fn as_descriptor(&self) -> StreamDescriptor {
        StreamDescriptor {
            namespace: self.original_namespace.clone(),
            name: self.original_name.clone(),
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.final_namespace, self.final_name)
    }
}

/// Source-side stream name, the key of persisted destination state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamDescriptor {
    #[serde(default)]
    pub namespace: Option<String>,
    pub name: String,
}

impl StreamDescriptor {
    pub fn new(namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A column of the final table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnId {
    /// Name as it appears in the warehouse.
    pub name: String,
    /// Name as the source reported it.
    pub original_name: String,
}

impl ColumnId {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            original_name: name.clone(),
            name,
        }
    }

    pub fn with_original(name: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            original_name: original_name.into(),
        }
    }
}

/// How records of a stream are written to the final table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Append every record.
    #[default]
    Append,
    /// Replace the table contents at the end of the sync.
    Overwrite,
    /// Append, then deduplicate on the primary key.
    AppendDedup,
}

/// Desired shape of a stream's final table.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub id: StreamId,
    pub sync_mode: SyncMode,
    pub primary_key: Vec<ColumnId>,
    pub cursor: Option<ColumnId>,
    /// Columns in declaration order.
    pub columns: Vec<(ColumnId, AirbyteType)>,
    pub generation_id: i64,
    pub minimum_generation_id: i64,
    pub sync_id: i64,
}

impl StreamConfig {
    /// Create a config with no primary key, cursor or generation info.
    pub fn new(id: StreamId, sync_mode: SyncMode, columns: Vec<(ColumnId, AirbyteType)>) -> Self {
        Self {
            id,
            sync_mode,
            primary_key: Vec::new(),
            cursor: None,
            columns,
            generation_id: 0,
            minimum_generation_id: 0,
            sync_id: 0,
        }
    }

    pub fn with_primary_key(mut self, primary_key: Vec<ColumnId>) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn with_cursor(mut self, cursor: ColumnId) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_generation(mut self, generation_id: i64, minimum_generation_id: i64) -> Self {
        self.generation_id = generation_id;
        self.minimum_generation_id = minimum_generation_id;
        self
    }

    /// Warehouse names of the primary key columns.
    pub fn primary_key_names(&self) -> HashSet<&str> {
        self.primary_key.iter().map(|c| c.name.as_str()).collect()
    }
}
