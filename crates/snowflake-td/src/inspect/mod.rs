//! Reads existing final tables and their row counts from warehouse metadata.
//!
//! Lookups here are tolerant: a metadata read that fails is logged, recorded
//! as [`Lookup::Unknown`] and reported to callers as "not present". One
//! stream's failure never stops the lookups for the others.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::identifier::candidate_names;
use crate::core::{Row, StreamId, TableDefinition, Warehouse};
use crate::error::TdError;
use crate::typemap::canonicalize_reported_type;

/// Default number of metadata lookups in flight at once.
const DEFAULT_CONCURRENCY: usize = 8;

/// Outcome of one metadata lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Found under one of the candidate spellings.
    Present(T),
    /// Not found under any spelling.
    Absent,
    /// The lookup failed; treated as absent.
    Unknown(String),
}

/// Existing final tables: namespace -> table name -> definition.
///
/// Keys are the spelling the table was found under. Only tables that exist
/// are present.
#[derive(Debug, Clone, Default)]
pub struct ExistingTables {
    tables: BTreeMap<String, BTreeMap<String, TableDefinition>>,
    unknown: BTreeMap<(String, String), String>,
}

impl ExistingTables {
    /// Definition of `namespace.name`, trying the given then the upper-cased
    /// spelling.
    pub fn get(&self, namespace: &str, name: &str) -> Option<&TableDefinition> {
        candidate_names(namespace, name)
            .into_iter()
            .find_map(|(ns, n)| self.tables.get(&ns).and_then(|t| t.get(&n)))
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.get(namespace, name).is_some()
    }

    /// Reason the lookup for `namespace.name` failed, if it did.
    pub fn failure(&self, namespace: &str, name: &str) -> Option<&str> {
        self.unknown
            .get(&(namespace.to_string(), name.to_string()))
            .map(String::as_str)
    }

    /// Namespace -> table name -> definition.
    pub fn tables(&self) -> &BTreeMap<String, BTreeMap<String, TableDefinition>> {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, namespace: String, name: String, table: TableDefinition) {
        self.tables.entry(namespace).or_default().insert(name, table);
    }
}

/// Row counts of existing final tables: namespace -> table name -> rows.
#[derive(Debug, Clone, Default)]
pub struct RowCounts {
    counts: BTreeMap<String, BTreeMap<String, u64>>,
}

impl RowCounts {
    /// Row count of `namespace.name`, trying the given then the upper-cased
    /// spelling. `None` when the table is missing or its count is unknown.
    pub fn get(&self, namespace: &str, name: &str) -> Option<u64> {
        candidate_names(namespace, name)
            .into_iter()
            .find_map(|(ns, n)| self.counts.get(&ns).and_then(|t| t.get(&n)).copied())
    }

    fn insert(&mut self, namespace: String, name: String, rows: u64) {
        self.counts.entry(namespace).or_default().insert(name, rows);
    }
}

/// Reads final-table metadata for a batch of streams.
pub struct SchemaInspector {
    warehouse: Arc<dyn Warehouse>,
    concurrency: usize,
}

impl SchemaInspector {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            warehouse,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Limit the number of lookups in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Definitions of the final tables of `ids` that exist.
    pub async fn find_existing_tables(&self, ids: &[StreamId]) -> ExistingTables {
        let targets = final_tables(ids);
        let outcomes: Vec<_> = stream::iter(targets)
            .map(|(ns, name)| async move {
                let outcome = self.describe(&ns, &name).await;
                (ns, name, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut existing = ExistingTables::default();
        for (ns, name, outcome) in outcomes {
            match outcome {
                Lookup::Present((found_ns, found_name, table)) => {
                    existing.insert(found_ns, found_name, table)
                }
                Lookup::Absent => {}
                Lookup::Unknown(reason) => {
                    existing.unknown.insert((ns, name), reason);
                }
            }
        }
        existing
    }

    /// Row counts of the final tables of `ids` that exist.
    pub async fn final_table_row_counts(&self, ids: &[StreamId]) -> RowCounts {
        let targets = final_tables(ids);
        let outcomes: Vec<_> = stream::iter(targets)
            .map(|(ns, name)| async move { self.row_count(&ns, &name).await })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut counts = RowCounts::default();
        for outcome in outcomes {
            if let Lookup::Present((ns, name, rows)) = outcome {
                counts.insert(ns, name, rows);
            }
        }
        counts
    }

    /// Describe one table. On success returns the spelling it was found
    /// under along with its definition.
    pub async fn describe(
        &self,
        namespace: &str,
        name: &str,
    ) -> Lookup<(String, String, TableDefinition)> {
        let mut failure = None;
        for (ns, n) in candidate_names(namespace, name) {
            match self.warehouse.describe_table(&ns, &n).await {
                Ok(rows) if rows.is_empty() => continue,
                Ok(rows) => return Lookup::Present((ns, n, table_from_columns(&rows))),
                Err(e) if e.is_object_not_found() => {
                    debug!("Table {}.{} not found", ns, n);
                }
                Err(e) => failure = Some(describe_failure(&ns, &n, e)),
            }
        }
        match failure {
            Some(reason) => {
                warn!(
                    "Could not read metadata of {}.{}, treating it as absent: {}",
                    namespace, name, reason
                );
                Lookup::Unknown(reason)
            }
            None => Lookup::Absent,
        }
    }

    /// Row count of one table.
    pub async fn row_count(&self, namespace: &str, name: &str) -> Lookup<(String, String, u64)> {
        let mut failure = None;
        for (ns, n) in candidate_names(namespace, name) {
            match self.warehouse.list_tables(&ns, &n).await {
                Ok(rows) => {
                    // LIKE is case-insensitive and treats `_` as a wildcard.
                    let Some(row) = rows.iter().find(|r| r.get("name") == Some(n.as_str())) else {
                        continue;
                    };
                    match row.get("rows").and_then(|v| v.trim().parse::<u64>().ok()) {
                        Some(count) => return Lookup::Present((ns, n, count)),
                        None => {
                            failure = Some(format!(
                                "unreadable row count {:?} for {}.{}",
                                row.get("rows"),
                                ns,
                                n
                            ))
                        }
                    }
                }
                Err(e) if e.is_object_not_found() => {
                    debug!("Schema {} not found", ns);
                }
                Err(e) => failure = Some(describe_failure(&ns, &n, e)),
            }
        }
        match failure {
            Some(reason) => {
                warn!(
                    "Could not read row count of {}.{}, treating it as unknown: {}",
                    namespace, name, reason
                );
                Lookup::Unknown(reason)
            }
            None => Lookup::Absent,
        }
    }
}

fn final_tables(ids: &[StreamId]) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| (id.final_namespace.clone(), id.final_name.clone()))
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

fn describe_failure(namespace: &str, name: &str, err: TdError) -> String {
    format!("{}.{}: {}", namespace, name, err)
}

/// Build a table definition from `SHOW COLUMNS` rows, or from
/// `INFORMATION_SCHEMA.COLUMNS` rows ordered by ordinal position.
pub fn table_from_columns(rows: &[Row]) -> TableDefinition {
    let mut table = TableDefinition::new();
    for row in rows {
        let Some(name) = row.get("column_name") else {
            continue;
        };
        let raw_type = row.get("data_type").unwrap_or_default();
        let (reported, json_nullable) = parse_data_type(raw_type);
        let nullable = json_nullable
            .or_else(|| row.get("null?").and_then(decode_nullable))
            .or_else(|| row.get("is_nullable").and_then(decode_nullable))
            .unwrap_or(true);
        table.add_column(name, canonicalize_reported_type(&reported), nullable);
    }
    table
}

/// `SHOW COLUMNS` reports `data_type` as a JSON document such as
/// `{"type":"FIXED","precision":38,"scale":0,"nullable":true}`.
fn parse_data_type(raw: &str) -> (String, Option<bool>) {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        if let Ok(Value::Object(doc)) = serde_json::from_str::<Value>(trimmed) {
            let type_name = doc
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return (type_name, doc.get("nullable").and_then(Value::as_bool));
        }
    }
    (trimmed.to_string(), None)
}

fn decode_nullable(value: &str) -> Option<bool> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRUE" | "Y" | "YES" => Some(true),
        "FALSE" | "N" | "NO" => Some(false),
        _ => None,
    }
}
