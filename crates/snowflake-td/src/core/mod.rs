//! Core data model shared by every component.
//!
//! - [`stream`]: stream identity and the desired schema of a stream
//! - [`types`]: the closed set of Airbyte column types
//! - [`schema`]: actual table definitions reported by the warehouse
//! - [`status`]: raw-table watermark status and the per-stream snapshot
//! - [`identifier`]: identifier validation and quoting
//! - [`traits`]: the warehouse access contract
//!
//! Nothing in here talks to the warehouse directly; components receive an
//! `Arc<dyn Warehouse>` and the model types flow between them.

pub mod identifier;
pub mod schema;
pub mod status;
pub mod stream;
pub mod traits;
pub mod types;

pub use schema::{ColumnDefinition, TableDefinition};
pub use status::{DestinationInitialStatus, InitialRawTableStatus};
pub use stream::{ColumnId, StreamConfig, StreamDescriptor, StreamId, SyncMode};
pub use traits::{Row, Warehouse};
pub use types::{AirbyteProtocolType, AirbyteType, Union};
