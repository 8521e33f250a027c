//! Initial-state orchestrator - assembles one snapshot per stream.
//!
//! For every stream of a sync the planner needs to know whether the final
//! table exists, whether its schema still matches, whether it is empty, how
//! far each raw table has been typed, and which flags the previous sync left
//! behind. [`Orchestrator::gather_initial_state`] collects all of that in one
//! pass over warehouse metadata.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::config::{Config, GatherConfig};
use crate::core::{DestinationInitialStatus, StreamConfig, StreamDescriptor, Warehouse};
use crate::error::{Result, TdError};
use crate::inspect::{ExistingTables, RowCounts, SchemaInspector};
use crate::reconcile;
use crate::state::{self, DestinationState, DestinationStateStore};
use crate::watermark::{RawTableVariant, RawTableWatermarkTracker};

/// Builds [`DestinationInitialStatus`] for a batch of streams.
pub struct Orchestrator {
    inspector: SchemaInspector,
    tracker: RawTableWatermarkTracker,
    state_store: Arc<dyn DestinationStateStore>,
    max_concurrent_streams: usize,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        state_store: Arc<dyn DestinationStateStore>,
        gather: &GatherConfig,
    ) -> Self {
        let max_concurrent_streams = gather.max_concurrent_streams.max(1);
        Self {
            inspector: SchemaInspector::new(warehouse.clone())
                .with_concurrency(max_concurrent_streams),
            tracker: RawTableWatermarkTracker::new(warehouse),
            state_store,
            max_concurrent_streams,
        }
    }

    /// Create an orchestrator with the state store selected in `config`.
    pub fn from_config(config: &Config, warehouse: Arc<dyn Warehouse>) -> Result<Self> {
        let state_store =
            state::create_store(&config.state, warehouse.clone(), &config.raw_namespace)?;
        info!("Using {} state store", state_store.backend_type());
        Ok(Self::new(warehouse, state_store, &config.gather))
    }

    /// One status per stream config, in input order.
    ///
    /// Metadata lookups that fail are treated as "table absent". Any other
    /// failure while assembling a stream aborts the whole call with
    /// [`TdError::SchemaAssembly`].
    pub async fn gather_initial_state(
        &self,
        stream_configs: &[StreamConfig],
    ) -> Result<Vec<DestinationInitialStatus>> {
        info!("Gathering initial state for {} streams", stream_configs.len());

        let mut seen = HashSet::new();
        for config in stream_configs {
            if !seen.insert(&config.id) {
                return Err(TdError::Config(format!(
                    "Duplicate stream {} in one batch",
                    config.id
                )));
            }
        }

        let states = self.state_store.load_all().await?;
        debug!("Loaded destination state for {} streams", states.len());

        let ids: Vec<_> = stream_configs.iter().map(|c| c.id.clone()).collect();
        let (existing, counts) = futures::join!(
            self.inspector.find_existing_tables(&ids),
            self.inspector.final_table_row_counts(&ids)
        );

        let statuses: Vec<_> = stream::iter(stream_configs)
            .map(|config| self.assemble(config, &existing, &counts, &states))
            .buffered(self.max_concurrent_streams)
            .try_collect()
            .await?;

        info!("Gathered initial state for {} streams", statuses.len());
        Ok(statuses)
    }

    async fn assemble(
        &self,
        config: &StreamConfig,
        existing: &ExistingTables,
        counts: &RowCounts,
        states: &HashMap<StreamDescriptor, serde_json::Value>,
    ) -> Result<DestinationInitialStatus> {
        let id = &config.id;
        self.assemble_inner(config, existing, counts, states)
            .await
            .map_err(|e| TdError::schema_assembly(id.to_string(), e))
    }

    async fn assemble_inner(
        &self,
        config: &StreamConfig,
        existing: &ExistingTables,
        counts: &RowCounts,
        states: &HashMap<StreamDescriptor, serde_json::Value>,
    ) -> Result<DestinationInitialStatus> {
        let id = &config.id;

        let (is_final_table_present, is_schema_mismatch, is_final_table_empty) =
            match existing.get(&id.final_namespace, &id.final_name) {
                Some(table) => {
                    let mismatches = reconcile::mismatches(config, table);
                    for mismatch in &mismatches {
                        info!("Stream {}: {}", id, mismatch);
                    }
                    let empty = counts.get(&id.final_namespace, &id.final_name) == Some(0);
                    (true, !mismatches.is_empty(), empty)
                }
                None => (false, false, true),
            };

        let (initial_raw_table_status, initial_temp_raw_table_status) = futures::try_join!(
            self.tracker.initial_raw_table_status(id, RawTableVariant::Main),
            self.tracker.initial_raw_table_status(id, RawTableVariant::Temp)
        )?;

        let destination_state = match states.get(&id.as_descriptor()) {
            Some(blob) => DestinationState::from_json(blob)?,
            None => DestinationState::default(),
        };

        info!(
            "Stream {}: final table present={} mismatch={} empty={}, \
             raw exists={} unprocessed={} watermark={:?}, \
             temp raw exists={}, soft reset requested={}",
            id,
            is_final_table_present,
            is_schema_mismatch,
            is_final_table_empty,
            initial_raw_table_status.raw_table_exists,
            initial_raw_table_status.has_unprocessed_records,
            initial_raw_table_status.watermark,
            initial_temp_raw_table_status.raw_table_exists,
            destination_state.needs_soft_reset
        );

        Ok(DestinationInitialStatus {
            stream_config: config.clone(),
            is_final_table_present,
            initial_raw_table_status,
            initial_temp_raw_table_status,
            is_schema_mismatch,
            is_final_table_empty,
            destination_state,
        })
    }
}
