//! Persisted per-stream destination state.
//!
//! The state is written by the sync that finished last and only read here.
//! It arrives as a loosely-typed JSON blob per stream and is decoded once,
//! at the store boundary, into [`DestinationState`].

pub mod backend;
pub mod file;
pub mod noop;
pub mod warehouse;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{StateBackendKind, StateConfig};
use crate::core::Warehouse;
use crate::error::{Result, TdError};

pub use backend::DestinationStateStore;
pub use file::FileStateStore;
pub use noop::NoOpStateStore;
pub use warehouse::WarehouseStateStore;

/// Version written by the current code.
pub const CURRENT_STATE_VERSION: u32 = 1;

/// Flags carried from one sync to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationState {
    pub version: u32,
    /// A previous sync changed the final table schema without finishing the
    /// rebuild; every raw record must be typed again.
    pub needs_soft_reset: bool,
    /// The raw table already has the `_airbyte_meta` column.
    pub airbyte_meta_present_in_raw: bool,
}

impl Default for DestinationState {
    fn default() -> Self {
        Self {
            version: CURRENT_STATE_VERSION,
            needs_soft_reset: false,
            airbyte_meta_present_in_raw: false,
        }
    }
}

impl DestinationState {
    /// Decode a persisted blob.
    ///
    /// `null` and missing fields take their defaults. Flags may be JSON
    /// booleans or the strings `"true"`/`"false"`; anything else is an error,
    /// as is a blob that is not an object.
    pub fn from_json(blob: &Value) -> Result<Self> {
        let object = match blob {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(TdError::State(format!(
                    "Destination state must be a JSON object, got {}",
                    other
                )))
            }
        };

        let version = match object.get("version") {
            None | Some(Value::Null) => CURRENT_STATE_VERSION,
            Some(v) => v
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| TdError::State(format!("Invalid destination state version {}", v)))?,
        };

        Ok(Self {
            version,
            needs_soft_reset: flag(object.get("needsSoftReset"), "needsSoftReset")?,
            airbyte_meta_present_in_raw: flag(
                object.get("airbyteMetaPresentInRaw"),
                "airbyteMetaPresentInRaw",
            )?,
        })
    }

    /// Encode for persistence by the caller.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "version": self.version,
            "needsSoftReset": self.needs_soft_reset,
            "airbyteMetaPresentInRaw": self.airbyte_meta_present_in_raw,
        })
    }

    /// Copy with `needs_soft_reset` replaced.
    pub fn with_soft_reset(self, needs_soft_reset: bool) -> Self {
        Self {
            needs_soft_reset,
            ..self
        }
    }

    /// Copy with `airbyte_meta_present_in_raw` replaced.
    pub fn with_airbyte_meta_present_in_raw(self, present: bool) -> Self {
        Self {
            airbyte_meta_present_in_raw: present,
            ..self
        }
    }
}

fn flag(value: Option<&Value>, field: &str) -> Result<bool> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        Some(other) => Err(TdError::State(format!(
            "Invalid value {} for destination state field {}",
            other, field
        ))),
    }
}

/// Build the state store selected in `config`.
pub fn create_store(
    config: &StateConfig,
    warehouse: Arc<dyn Warehouse>,
    raw_namespace: &str,
) -> Result<Arc<dyn DestinationStateStore>> {
    let store: Arc<dyn DestinationStateStore> = match config.backend {
        StateBackendKind::Warehouse => Arc::new(WarehouseStateStore::new(warehouse, raw_namespace)),
        StateBackendKind::File => {
            let path = config.path.as_ref().ok_or_else(|| {
                TdError::Config("state.path is required for the file state backend".to_string())
            })?;
            Arc::new(FileStateStore::new(path))
        }
        StateBackendKind::None => Arc::new(NoOpStateStore::new()),
    };
    Ok(store)
}
