//! Destination state stored in the warehouse itself.
//!
//! Each sync appends one row per stream to `_airbyte_destination_state` in
//! the raw namespace:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "airbyte_internal"."_airbyte_destination_state" (
//!     "name" VARCHAR,
//!     "namespace" VARCHAR,
//!     "destination_state" VARCHAR,
//!     "updated_at" TIMESTAMP_TZ
//! )
//! ```
//!
//! Only the most recent row per stream counts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::identifier::qualify;
use crate::core::{StreamDescriptor, Warehouse};
use crate::error::{Result, TdError};
use crate::state::backend::{descriptor, DestinationStateStore};

/// Name of the state table.
pub const DESTINATION_STATE_TABLE: &str = "_airbyte_destination_state";

/// Reads the state table in the raw namespace.
pub struct WarehouseStateStore {
    warehouse: Arc<dyn Warehouse>,
    namespace: String,
}

impl WarehouseStateStore {
    pub fn new(warehouse: Arc<dyn Warehouse>, raw_namespace: impl Into<String>) -> Self {
        Self {
            warehouse,
            namespace: raw_namespace.into(),
        }
    }
}

#[async_trait]
impl DestinationStateStore for WarehouseStateStore {
    async fn load_all(&self) -> Result<HashMap<StreamDescriptor, Value>> {
        // Ascending order: later rows overwrite earlier ones below.
        let sql = format!(
            "SELECT \"name\", \"namespace\", \"destination_state\" FROM {} \
             ORDER BY \"updated_at\" ASC NULLS FIRST",
            qualify(&self.namespace, DESTINATION_STATE_TABLE)?
        );
        debug!("{}", sql);

        let rows = match self.warehouse.query(&sql).await {
            Ok(rows) => rows,
            Err(e) if e.is_object_not_found() => {
                info!(
                    "No destination state table in {}; every stream starts from the default state",
                    self.namespace
                );
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e),
        };

        let mut states = HashMap::new();
        for row in rows {
            let Some(name) = row.get("name") else {
                continue;
            };
            let key = descriptor(row.get("namespace"), name);
            let blob = match row.get("destination_state") {
                Some(text) => serde_json::from_str(text).map_err(|e| {
                    TdError::State(format!("Destination state of {} is not JSON: {}", key, e))
                })?,
                None => Value::Null,
            };
            states.insert(key, blob);
        }
        Ok(states)
    }

    fn backend_type(&self) -> &'static str {
        "warehouse"
    }
}
