//! SQL API v2 client.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::{debug, trace};
use uuid::Uuid;

use super::wire::{
    error_from_body, rows_from_result, PartitionResponse, StatementRequest, StatementResponse,
};
use crate::config::WarehouseConfig;
use crate::core::{Row, Warehouse};
use crate::error::{Result, TdError, WarehouseError};

const STATEMENTS_PATH: &str = "/api/v2/statements";
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const USER_AGENT: &str = concat!("snowflake-td/", env!("CARGO_PKG_VERSION"));

/// Snowflake warehouse reached through the SQL API.
///
/// Every statement is a single HTTP request; there is no session, so
/// `BEGIN`/`COMMIT` only group statements sent in the same request.
pub struct SnowflakeClient {
    http: Client,
    base_url: String,
    database: String,
    warehouse: String,
    role: Option<String>,
    token: String,
    token_type: &'static str,
    timeout_secs: u64,
}

impl SnowflakeClient {
    /// Create a client from connection settings.
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            database: config.database.clone(),
            warehouse: config.warehouse.clone(),
            role: config.role.clone(),
            token: config.token.clone(),
            token_type: config.token_type.header_value(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("X-Snowflake-Authorization-Token-Type", self.token_type)
            .header("Accept", "application/json")
    }

    /// Submit `sql` and wait for it to finish.
    ///
    /// `statement_count` is sent as `MULTI_STATEMENT_COUNT`; `0` accepts any
    /// number of statements.
    async fn submit(&self, sql: &str, statement_count: usize) -> Result<StatementResponse> {
        let mut parameters = HashMap::new();
        parameters.insert("MULTI_STATEMENT_COUNT", statement_count.to_string());
        let body = StatementRequest {
            statement: sql,
            timeout: self.timeout_secs,
            database: &self.database,
            warehouse: &self.warehouse,
            role: self.role.as_deref(),
            parameters,
        };

        let request_id = Uuid::new_v4();
        let url = format!("{}{}", self.base_url, STATEMENTS_PATH);
        let response = self
            .authorized(self.http.post(&url))
            .query(&[("requestId", request_id.to_string())])
            .json(&body)
            .send()
            .await?;

        let mut parsed: StatementResponse = decode(response).await?;
        let deadline = Instant::now() + Duration::from_secs(self.timeout_secs);
        while parsed.is_in_progress() {
            let handle = parsed.statement_handle.clone().ok_or_else(|| {
                WarehouseError::new("statement in progress without a statement handle")
            })?;
            if Instant::now() >= deadline {
                return Err(WarehouseError::new(format!(
                    "statement {} still running after {}s",
                    handle, self.timeout_secs
                ))
                .into());
            }
            trace!("Statement {} in progress, polling", handle);
            tokio::time::sleep(POLL_INTERVAL).await;
            let response = self
                .authorized(self.http.get(format!("{}/{}", url, handle)))
                .send()
                .await?;
            parsed = decode(response).await?;
        }

        Ok(parsed)
    }

    /// Fetch partition `index` (1-based after the inline one).
    async fn fetch_partition(&self, handle: &str, index: usize) -> Result<PartitionResponse> {
        let url = format!("{}{}/{}", self.base_url, STATEMENTS_PATH, handle);
        let response = self
            .authorized(self.http.get(&url))
            .query(&[("partition", index.to_string())])
            .send()
            .await?;
        decode(response).await
    }
}

/// Decode a success body or turn the error body into a [`WarehouseError`].
async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(TdError::Warehouse(error_from_body(status.as_u16(), &text)));
    }
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl Warehouse for SnowflakeClient {
    fn database(&self) -> &str {
        &self.database
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let mut response = self.submit(sql, 1).await?;
        let meta = response.result_set_meta_data.take().unwrap_or_default();
        let partitions = meta.partition_info.len();
        let mut rows = rows_from_result(&meta, std::mem::take(&mut response.data));

        if partitions > 1 {
            let handle = response.statement_handle.as_deref().ok_or_else(|| {
                WarehouseError::new("partitioned result without a statement handle")
            })?;
            for index in 1..partitions {
                let partition = self.fetch_partition(handle, index).await?;
                rows.extend(rows_from_result(&meta, partition.data));
            }
        }

        debug!("Query returned {} rows in {} partitions", rows.len(), partitions.max(1));
        Ok(rows)
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        self.submit(sql, 0).await?;
        Ok(())
    }
}
