//! Compares a stream's intended final-table schema with the existing table.
//!
//! A mismatch means the final table has to be rebuilt from the raw table
//! (a soft reset) rather than merged into incrementally.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::{StreamConfig, TableDefinition};
use crate::typemap::to_sql_type_name;

/// Metadata columns every final table carries, with their canonical types.
pub const META_COLUMNS: [(&str, &str); 4] = [
    ("_AIRBYTE_RAW_ID", "VARCHAR"),
    ("_AIRBYTE_EXTRACTED_AT", "TIMESTAMP_TZ"),
    ("_AIRBYTE_META", "VARIANT"),
    ("_AIRBYTE_GENERATION_ID", "NUMBER"),
];

/// One reason the existing table differs from the intended schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaMismatch {
    MissingMetadataColumn {
        column: &'static str,
    },
    WrongMetadataColumnType {
        column: &'static str,
        expected: &'static str,
        actual: String,
    },
    /// A primary-key column is declared NOT NULL. Deduplication relies on
    /// being able to write NULL keys.
    NonNullablePrimaryKey {
        column: String,
    },
    /// Non-metadata columns differ by name or canonical type.
    ColumnSetDiffers {
        missing: Vec<(String, String)>,
        unexpected: Vec<(String, String)>,
    },
}

impl fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMetadataColumn { column } => {
                write!(f, "metadata column {} is missing", column)
            }
            Self::WrongMetadataColumnType {
                column,
                expected,
                actual,
            } => write!(
                f,
                "metadata column {} has type {}, expected {}",
                column, actual, expected
            ),
            Self::NonNullablePrimaryKey { column } => {
                write!(f, "primary key column {} is NOT NULL", column)
            }
            Self::ColumnSetDiffers {
                missing,
                unexpected,
            } => write!(
                f,
                "columns differ (missing: {:?}, unexpected: {:?})",
                missing, unexpected
            ),
        }
    }
}

/// True when `actual` can receive incremental merges for `intended`.
pub fn matches(intended: &StreamConfig, actual: &TableDefinition) -> bool {
    mismatches(intended, actual).is_empty()
}

/// Every difference between `intended` and `actual`. Empty iff [`matches`].
pub fn mismatches(intended: &StreamConfig, actual: &TableDefinition) -> Vec<SchemaMismatch> {
    let mut found = Vec::new();

    for (column, expected) in META_COLUMNS {
        match actual.column(column) {
            None => found.push(SchemaMismatch::MissingMetadataColumn { column }),
            Some(def) if def.type_name != expected => {
                found.push(SchemaMismatch::WrongMetadataColumnType {
                    column,
                    expected,
                    actual: def.type_name.clone(),
                })
            }
            Some(_) => {}
        }
    }

    let mut pk_columns: Vec<_> = intended.primary_key_names().into_iter().collect();
    pk_columns.sort_unstable();
    for pk in pk_columns {
        if let Some(def) = actual.column(pk) {
            if !def.nullable {
                found.push(SchemaMismatch::NonNullablePrimaryKey {
                    column: pk.to_string(),
                });
            }
        }
    }

    let expected_columns: BTreeMap<String, String> = intended
        .columns
        .iter()
        .map(|(id, ty)| (id.name.clone(), to_sql_type_name(ty).to_string()))
        .collect();
    let actual_columns: BTreeMap<String, String> = actual
        .columns
        .values()
        .filter(|def| !is_meta_column(&def.name))
        .map(|def| (def.name.clone(), def.type_name.clone()))
        .collect();

    if expected_columns != actual_columns {
        let missing = difference(&expected_columns, &actual_columns);
        let unexpected = difference(&actual_columns, &expected_columns);
        found.push(SchemaMismatch::ColumnSetDiffers {
            missing,
            unexpected,
        });
    }

    found
}

fn is_meta_column(name: &str) -> bool {
    META_COLUMNS.iter().any(|(meta, _)| *meta == name)
}

fn difference(
    left: &BTreeMap<String, String>,
    right: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    left.iter()
        .filter(|(name, ty)| right.get(*name) != Some(*ty))
        .map(|(name, ty)| (name.clone(), ty.clone()))
        .collect()
}
