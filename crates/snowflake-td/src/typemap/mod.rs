//! Type mapping between Airbyte column types and Snowflake type names.
//!
//! Both directions produce the same vocabulary so that the reconciler can
//! compare intended and actual columns with plain string equality:
//!
//! - [`to_sql_type_name`] maps an [`AirbyteType`] to the type a final-table
//!   column is created with.
//! - [`canonicalize_reported_type`] folds what Snowflake reports for an
//!   existing column into that same vocabulary.

use std::str::FromStr;

use crate::core::{AirbyteProtocolType, AirbyteType};
use crate::error::Result;

/// Map a column type to its Snowflake type name.
pub fn to_sql_type_name(airbyte_type: &AirbyteType) -> &'static str {
    match airbyte_type {
        AirbyteType::Primitive(p) => primitive_type_name(*p),
        AirbyteType::Struct { .. } => "OBJECT",
        AirbyteType::Array { .. } => "ARRAY",
        AirbyteType::UnsupportedOneOf { .. } => "VARIANT",
        AirbyteType::Union(union) => to_sql_type_name(union.choose_type()),
    }
}

fn primitive_type_name(p: AirbyteProtocolType) -> &'static str {
    match p {
        AirbyteProtocolType::String => "VARCHAR",
        AirbyteProtocolType::Number => "FLOAT",
        AirbyteProtocolType::Integer => "NUMBER",
        AirbyteProtocolType::Boolean => "BOOLEAN",
        AirbyteProtocolType::TimestampWithTimezone => "TIMESTAMP_TZ",
        AirbyteProtocolType::TimestampWithoutTimezone => "TIMESTAMP_NTZ",
        // Snowflake has no zoned TIME.
        AirbyteProtocolType::TimeWithTimezone => "VARCHAR",
        AirbyteProtocolType::TimeWithoutTimezone => "TIME",
        AirbyteProtocolType::Date => "DATE",
        AirbyteProtocolType::Unknown => "VARIANT",
    }
}

/// Map a primitive type given by name (e.g. `"TIMESTAMP_WITH_TIMEZONE"`).
///
/// Fails with [`TdError::UnrecognizedType`](crate::error::TdError::UnrecognizedType)
/// for names outside the protocol's type set.
pub fn sql_type_name_for(protocol_type: &str) -> Result<&'static str> {
    let p = AirbyteProtocolType::from_str(protocol_type)?;
    Ok(primitive_type_name(p))
}

/// Fold a type name reported by Snowflake metadata into the vocabulary of
/// [`to_sql_type_name`].
///
/// `SHOW COLUMNS` reports the physical family (`FIXED`, `REAL`, `TEXT`)
/// while `INFORMATION_SCHEMA` reports SQL names, sometimes with precision
/// arguments. Unknown names are upper-cased and passed through.
pub fn canonicalize_reported_type(reported: &str) -> String {
    let base = reported
        .split('(')
        .next()
        .unwrap_or(reported)
        .trim()
        .to_uppercase();

    match base.as_str() {
        "FIXED" | "NUMBER" | "DECIMAL" | "NUMERIC" | "INT" | "INTEGER" | "BIGINT"
        | "SMALLINT" | "TINYINT" | "BYTEINT" => "NUMBER".to_string(),
        "REAL" | "FLOAT" | "FLOAT4" | "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" => {
            "FLOAT".to_string()
        }
        "TEXT" | "VARCHAR" | "STRING" | "CHAR" | "CHARACTER" => "VARCHAR".to_string(),
        "TIMESTAMPTZ" | "TIMESTAMP_TZ" => "TIMESTAMP_TZ".to_string(),
        "TIMESTAMPNTZ" | "TIMESTAMP_NTZ" | "DATETIME" => "TIMESTAMP_NTZ".to_string(),
        _ => base,
    }
}
