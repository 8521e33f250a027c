//! Incremental-processing watermarks over raw tables.
//!
//! The watermark tells the next typing-and-deduping pass where to start:
//!
//! - If any raw record has not been loaded into the final table yet, the
//!   watermark is one nanosecond before the oldest such record. It is an
//!   exclusive lower bound: everything after it must be (re)processed.
//! - Otherwise the watermark is the newest record's extraction time. It is
//!   an inclusive upper bound: everything up to it is already typed.
//!
//! These are two separate queries on purpose. A single `COALESCE(MIN, MAX)`
//! would return a value without telling which bound it is.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::debug;

use crate::core::identifier::{candidate_names, qualify_in};
use crate::core::stream::TMP_TABLE_SUFFIX;
use crate::core::{InitialRawTableStatus, StreamId, Warehouse};
use crate::error::{Result, TdError, WarehouseError};

/// Output format for extraction timestamps: nanoseconds and the offset.
const TIMESTAMP_FORMAT: &str = "YYYY-MM-DDTHH24:MI:SS.FF9TZH:TZM";

/// Which raw table of a stream to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTableVariant {
    /// The raw table records are normally written to.
    Main,
    /// The `_airbyte_tmp` table used while overwriting a stream.
    Temp,
}

impl RawTableVariant {
    pub fn suffix(self) -> &'static str {
        match self {
            RawTableVariant::Main => "",
            RawTableVariant::Temp => TMP_TABLE_SUFFIX,
        }
    }
}

/// Computes [`InitialRawTableStatus`] for raw tables.
pub struct RawTableWatermarkTracker {
    warehouse: Arc<dyn Warehouse>,
}

impl RawTableWatermarkTracker {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self { warehouse }
    }

    /// Existence and watermark of one raw table of `id`.
    ///
    /// Every failure is returned to the caller; nothing here is treated as
    /// "table absent" except the existence check itself answering no.
    pub async fn initial_raw_table_status(
        &self,
        id: &StreamId,
        variant: RawTableVariant,
    ) -> Result<InitialRawTableStatus> {
        let raw_name = format!("{}{}", id.raw_name, variant.suffix());
        let Some((ns, name)) = self.find_raw_table(&id.raw_namespace, &raw_name).await? else {
            debug!("Raw table {}.{} does not exist", id.raw_namespace, raw_name);
            return Ok(InitialRawTableStatus::absent());
        };
        let table = qualify_in(self.warehouse.database(), &ns, &name)?;

        if let Some(oldest) = self.min_unloaded_extracted_at(&table).await? {
            return Ok(InitialRawTableStatus::unprocessed_after(
                lower_exclusive_bound(oldest),
            ));
        }

        let newest = self.max_extracted_at(&table).await?;
        Ok(InitialRawTableStatus::processed_through(newest))
    }

    async fn find_raw_table(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<(String, String)>> {
        for (ns, n) in candidate_names(namespace, name) {
            if self.warehouse.table_exists(&ns, &n).await? {
                return Ok(Some((ns, n)));
            }
        }
        Ok(None)
    }

    /// Oldest extraction time among records not yet loaded, with the
    /// recorded offset added back before taking the minimum.
    async fn min_unloaded_extracted_at(&self, table: &str) -> Result<Option<DateTime<Utc>>> {
        let sql = format!(
            "SELECT TO_VARCHAR(MIN(\
             TIMESTAMPADD(HOUR, EXTRACT(timezone_hour FROM \"_airbyte_extracted_at\"), \
             TIMESTAMPADD(MINUTE, EXTRACT(timezone_minute FROM \"_airbyte_extracted_at\"), \
             CONVERT_TIMEZONE('UTC', \"_airbyte_extracted_at\")))), '{}') AS \"MIN_TIMESTAMP\" \
             FROM {} WHERE \"_airbyte_loaded_at\" IS NULL",
            TIMESTAMP_FORMAT, table
        );
        debug!("{}", sql);
        let rows = self.warehouse.query(&sql).await?;
        match rows.first().and_then(|row| row.get("MIN_TIMESTAMP")) {
            Some(value) => Ok(Some(parse_warehouse_timestamp(value)?.with_timezone(&Utc))),
            None => Ok(None),
        }
    }

    /// Newest extraction time, reconstructed to UTC from its recorded offset.
    async fn max_extracted_at(&self, table: &str) -> Result<Option<DateTime<Utc>>> {
        let sql = format!(
            "SELECT TO_VARCHAR(MAX(\"_airbyte_extracted_at\"), '{}') AS \"MAX_TIMESTAMP\" FROM {}",
            TIMESTAMP_FORMAT, table
        );
        debug!("{}", sql);
        let rows = self.warehouse.query(&sql).await?;
        let Some(value) = rows.first().and_then(|row| row.get("MAX_TIMESTAMP")) else {
            return Ok(None);
        };

        let recorded = parse_warehouse_timestamp(value)?;
        let offset_seconds = recorded.offset().local_minus_utc();
        Ok(Some(reconstruct_utc(
            recorded.with_timezone(&Utc),
            offset_seconds / 3600,
            (offset_seconds % 3600) / 60,
        )))
    }
}

/// The instant one nanosecond before `t`, so that `> bound` includes `t`.
pub fn lower_exclusive_bound(t: DateTime<Utc>) -> DateTime<Utc> {
    t - Duration::nanoseconds(1)
}

/// Reinterpret a recorded local wall-clock time as UTC.
///
/// Older writers stored extraction times in the session time zone rather
/// than UTC. Adding the recorded offset back onto the instant yields the wall
/// time the writer saw, which was the UTC time it meant to record.
///
/// Known limitation: the offset is the one recorded with each value. Records
/// written across a daylight-saving transition may come out one hour off.
pub fn reconstruct_utc(
    instant: DateTime<Utc>,
    offset_hours: i32,
    offset_minutes: i32,
) -> DateTime<Utc> {
    instant
        + Duration::hours(i64::from(offset_hours))
        + Duration::minutes(i64::from(offset_minutes))
}

/// Parse a timestamp rendered with [`TIMESTAMP_FORMAT`].
pub fn parse_warehouse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%:z")
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f %:z"))
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map_err(|e| {
            TdError::Warehouse(WarehouseError::new(format!(
                "Unparseable extraction timestamp {:?}: {}",
                value, e
            )))
        })
}
