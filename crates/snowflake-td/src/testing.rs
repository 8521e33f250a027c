//! Scripted in-memory warehouse for unit tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::{Row, Warehouse};
use crate::error::{Result, TdError, WarehouseError};

enum Reply {
    Rows(Vec<Row>),
    Fail(WarehouseError),
}

/// Answers SQL by substring rules, first match wins.
///
/// Queries matching no rule return no rows; statements matching no rule
/// succeed. Every statement is recorded in issue order.
pub struct FakeWarehouse {
    database: String,
    rules: Mutex<Vec<(String, Reply)>>,
    issued: Mutex<Vec<String>>,
}

impl FakeWarehouse {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            rules: Mutex::new(Vec::new()),
            issued: Mutex::new(Vec::new()),
        }
    }

    /// Return `rows` for SQL containing `pattern`.
    pub fn on_query(&self, pattern: &str, rows: Vec<Row>) -> &Self {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), Reply::Rows(rows)));
        self
    }

    /// Fail SQL containing `pattern` with `error`.
    pub fn fail_on(&self, pattern: &str, error: WarehouseError) -> &Self {
        self.rules
            .lock()
            .unwrap()
            .push((pattern.to_string(), Reply::Fail(error)));
        self
    }

    /// Every SQL string issued so far.
    pub fn issued(&self) -> Vec<String> {
        self.issued.lock().unwrap().clone()
    }

    /// Issued SQL containing `pattern`.
    pub fn issued_matching(&self, pattern: &str) -> Vec<String> {
        self.issued()
            .into_iter()
            .filter(|sql| sql.contains(pattern))
            .collect()
    }

    fn answer(&self, sql: &str) -> Result<Vec<Row>> {
        self.issued.lock().unwrap().push(sql.to_string());
        let rules = self.rules.lock().unwrap();
        match rules.iter().find(|(pattern, _)| sql.contains(pattern.as_str())) {
            Some((_, Reply::Rows(rows))) => Ok(rows.clone()),
            Some((_, Reply::Fail(err))) => Err(TdError::Warehouse(err.clone())),
            None => Ok(Vec::new()),
        }
    }
}

#[async_trait]
impl Warehouse for FakeWarehouse {
    fn database(&self) -> &str {
        &self.database
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        self.answer(sql)
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.answer(sql).map(|_| ())
    }
}

/// Shorthand for building a [`Row`] in tests.
pub fn row(values: &[(&str, Option<&str>)]) -> Row {
    values.iter().map(|(k, v)| (*k, *v)).collect()
}
