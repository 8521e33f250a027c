//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use snowflake_td::{
    AirbyteType, ColumnId, Result, Row, StreamConfig, StreamId, SyncMode, TdError, Warehouse,
    WarehouseError,
};

/// In-memory warehouse answering SQL by substring rules, first match wins.
pub struct ScriptedWarehouse {
    rules: Mutex<Vec<(String, std::result::Result<Vec<Row>, WarehouseError>)>>,
    log: Mutex<Vec<String>>,
}

impl ScriptedWarehouse {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn rows(&self, pattern: &str, rows: Vec<Row>) {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), Ok(rows)));
    }

    pub fn fail(&self, pattern: &str, error: WarehouseError) {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), Err(error)));
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn answer(&self, sql: &str) -> Result<Vec<Row>> {
        self.log.lock().unwrap().push(sql.to_string());
        let rules = self.rules.lock().unwrap();
        match rules.iter().find(|(pattern, _)| sql.contains(pattern.as_str())) {
            Some((_, Ok(rows))) => Ok(rows.clone()),
            Some((_, Err(err))) => Err(TdError::Warehouse(err.clone())),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Warehouse for ScriptedWarehouse {
    fn database(&self) -> &str {
        "ANALYTICS"
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.answer(sql)
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.answer(sql).map(|_| ())
    }
}

pub fn row(values: &[(&str, Option<&str>)]) -> Row {
    values.iter().map(|(k, v)| (*k, *v)).collect()
}

/// `SHOW COLUMNS` output for a final table with the metadata columns plus `extra`.
pub fn final_table_columns(extra: &[(&str, &str)]) -> Vec<Row> {
    [
        ("_AIRBYTE_RAW_ID", "VARCHAR"),
        ("_AIRBYTE_EXTRACTED_AT", "TIMESTAMP_TZ"),
        ("_AIRBYTE_META", "VARIANT"),
        ("_AIRBYTE_GENERATION_ID", "NUMBER"),
    ]
    .iter()
    .chain(extra.iter())
    .map(|(name, ty)| {
        let data_type = format!(r#"{{"type":"{}","nullable":true}}"#, ty);
        row(&[
            ("column_name", Some(name)),
            ("data_type", Some(data_type.as_str())),
        ])
    })
    .collect()
}

/// Append-mode stream `public.<name>` with final table `PUBLIC.<NAME>`.
pub fn users_stream(name: &str, columns: Vec<(&str, AirbyteType)>) -> StreamConfig {
    let id = StreamId::new(
        "PUBLIC",
        name.to_uppercase(),
        "airbyte_internal",
        format!("public_raw__stream_{}", name),
        Some("public".into()),
        name,
    );
    StreamConfig::new(
        id,
        SyncMode::Append,
        columns
            .into_iter()
            .map(|(col, ty)| (ColumnId::new(col), ty))
            .collect(),
    )
}
