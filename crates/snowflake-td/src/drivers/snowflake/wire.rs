//! Request and response bodies of the SQL API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Row;
use crate::error::WarehouseError;

/// Response code of a statement that is still running.
pub const CODE_IN_PROGRESS: &str = "333334";

/// Body of `POST /api/v2/statements`.
#[derive(Debug, Clone, Serialize)]
pub struct StatementRequest<'a> {
    pub statement: &'a str,
    /// Server-side timeout in seconds.
    pub timeout: u64,
    pub database: &'a str,
    pub warehouse: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'a str>,
    pub parameters: HashMap<&'static str, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnType {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionInfo {
    #[serde(default)]
    pub row_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSetMetaData {
    #[serde(default)]
    pub row_type: Vec<ColumnType>,
    #[serde(default)]
    pub partition_info: Vec<PartitionInfo>,
}

/// Successful (or in-progress) statement response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub statement_handle: Option<String>,
    #[serde(default)]
    pub result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    pub data: Vec<Vec<Option<String>>>,
}

impl StatementResponse {
    pub fn is_in_progress(&self) -> bool {
        self.code.as_deref() == Some(CODE_IN_PROGRESS)
    }

    /// Number of result partitions; the first one is inline.
    pub fn partition_count(&self) -> usize {
        self.result_set_meta_data
            .as_ref()
            .map(|m| m.partition_info.len())
            .unwrap_or(0)
    }
}

/// Response of `GET /api/v2/statements/{handle}?partition=N`.
#[derive(Debug, Clone, Deserialize)]
pub struct PartitionResponse {
    #[serde(default)]
    pub data: Vec<Vec<Option<String>>>,
}

/// Error body returned with a non-success status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    sql_state: Option<String>,
}

/// Zip column names onto data rows.
pub fn rows_from_result(meta: &ResultSetMetaData, data: Vec<Vec<Option<String>>>) -> Vec<Row> {
    data.into_iter()
        .map(|values| {
            meta.row_type
                .iter()
                .map(|col| col.name.as_str())
                .zip(values)
                .collect()
        })
        .collect()
}

/// Turn an error response into a [`WarehouseError`].
///
/// Bodies that are not the API's JSON error shape (proxies, gateways) are
/// kept verbatim.
pub fn error_from_body(status: u16, body: &str) -> WarehouseError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if parsed.message.is_some() => {
            let mut err = WarehouseError::new(parsed.message.unwrap_or_default());
            if let Some(code) = parsed.code {
                err = err.with_code(code);
            }
            if let Some(state) = parsed.sql_state {
                err = err.with_sql_state(state);
            }
            err
        }
        _ => {
            let text = match serde_json::from_str::<Value>(body) {
                Ok(Value::String(s)) => s,
                _ => body.trim().to_string(),
            };
            WarehouseError::new(format!("HTTP {}: {}", status, text))
        }
    }
}
