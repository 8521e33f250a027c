//! Raw-table watermark status and the per-stream initial snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::stream::StreamConfig;
use crate::state::DestinationState;

/// State of a raw table at the start of a sync.
///
/// The meaning of `watermark` depends on `has_unprocessed_records`:
///
/// - `true`: records at or after the watermark may not have been typed yet;
///   the watermark is an exclusive lower bound for the next T+D pass.
/// - `false`: every record up to and including the watermark was typed.
///
/// `None` means there is no watermark at all, which is not the same as a
/// watermark at the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InitialRawTableStatus {
    pub raw_table_exists: bool,
    pub has_unprocessed_records: bool,
    pub watermark: Option<DateTime<Utc>>,
}

impl InitialRawTableStatus {
    /// The raw table does not exist.
    pub fn absent() -> Self {
        Self {
            raw_table_exists: false,
            has_unprocessed_records: false,
            watermark: None,
        }
    }

    /// Some records are untyped; `lower_bound` is exclusive.
    pub fn unprocessed_after(lower_bound: DateTime<Utc>) -> Self {
        Self {
            raw_table_exists: true,
            has_unprocessed_records: true,
            watermark: Some(lower_bound),
        }
    }

    /// Every record is typed, up to `upper_bound` inclusive.
    pub fn processed_through(upper_bound: Option<DateTime<Utc>>) -> Self {
        Self {
            raw_table_exists: true,
            has_unprocessed_records: false,
            watermark: upper_bound,
        }
    }
}

/// Everything the planner needs to decide between create, soft reset and
/// incremental merge for one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationInitialStatus {
    pub stream_config: StreamConfig,
    pub is_final_table_present: bool,
    pub initial_raw_table_status: InitialRawTableStatus,
    pub initial_temp_raw_table_status: InitialRawTableStatus,
    pub is_schema_mismatch: bool,
    pub is_final_table_empty: bool,
    pub destination_state: DestinationState,
}

impl DestinationInitialStatus {
    /// True when every raw record must be re-typed, not only new ones.
    pub fn needs_soft_reset(&self) -> bool {
        self.is_schema_mismatch || self.destination_state.needs_soft_reset
    }
}
