//! # snowflake-td
//!
//! Typing-and-deduplication state reconciliation for Snowflake destinations.
//!
//! Before a sync loads anything, the destination needs to know where every
//! stream stands in the warehouse:
//!
//! - **Final tables**: which exist, whether they are empty, and whether
//!   their columns still match the stream's desired schema
//! - **Raw tables**: whether unprocessed records are waiting, and the
//!   extraction watermark to resume typing-and-deduplication from
//! - **Destination state**: persisted per-stream flags such as a pending
//!   soft reset
//!
//! [`Orchestrator::gather_initial_state`] assembles all of this into one
//! [`DestinationInitialStatus`] per stream. [`TransactionExecutor`] then runs
//! the generated SQL transaction by transaction, and
//! [`NamespaceProvisioner`] creates missing schemas up front.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use snowflake_td::{Config, Orchestrator, SnowflakeClient, Warehouse};
//!
//! # async fn run(streams: Vec<snowflake_td::StreamConfig>) -> snowflake_td::Result<()> {
//! let config = Config::load("config.yaml")?;
//! let warehouse: Arc<dyn Warehouse> = Arc::new(SnowflakeClient::new(&config.warehouse)?);
//! let orchestrator = Orchestrator::from_config(&config, warehouse)?;
//! for status in orchestrator.gather_initial_state(&streams).await? {
//!     println!("{}: soft reset = {}", status.stream_config.id, status.needs_soft_reset());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod executor;
pub mod inspect;
pub mod namespace;
pub mod orchestrator;
pub mod reconcile;
pub mod state;
pub mod typemap;
pub mod watermark;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::{Config, GatherConfig, StateBackendKind, StateConfig, WarehouseConfig};
pub use core::{
    AirbyteProtocolType, AirbyteType, ColumnDefinition, ColumnId, DestinationInitialStatus,
    InitialRawTableStatus, Row, StreamConfig, StreamDescriptor, StreamId, SyncMode,
    TableDefinition, Union, Warehouse,
};
pub use drivers::SnowflakeClient;
pub use error::{ConfigErrorKind, Result, TdError, WarehouseError};
pub use executor::{CorrelationId, ErrorClassifier, Sql, TransactionExecutor};
pub use inspect::SchemaInspector;
pub use namespace::{EnsureReport, NamespaceProvisioner};
pub use orchestrator::Orchestrator;
pub use reconcile::SchemaMismatch;
pub use state::{DestinationState, DestinationStateStore};
pub use watermark::{RawTableVariant, RawTableWatermarkTracker};
