//! State store trait for persisted destination state.
//!
//! The [`DestinationStateStore`] trait defines where destination state is
//! read from. Implementations:
//!
//! - **Warehouse**: `WarehouseStateStore` in `warehouse.rs`
//! - **File**: `FileStateStore` in `file.rs`
//! - **None**: `NoOpStateStore` in `noop.rs`
//!
//! # Design Pattern
//!
//! This uses the Strategy pattern to decouple state storage from the
//! orchestrator, which works with `Arc<dyn DestinationStateStore>`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::StreamDescriptor;
use crate::error::Result;

/// Read access to persisted destination state.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow sharing across async tasks.
#[async_trait]
pub trait DestinationStateStore: Send + Sync {
    /// Latest raw state blob of every stream that has one.
    ///
    /// Streams without persisted state are simply absent from the map.
    /// Blobs are returned undecoded; see
    /// [`DestinationState::from_json`](super::DestinationState::from_json).
    async fn load_all(&self) -> Result<HashMap<StreamDescriptor, Value>>;

    /// Get the backend type name for logging/debugging.
    fn backend_type(&self) -> &'static str;
}

/// Treat an empty namespace as "no namespace", the way states are keyed.
pub(crate) fn descriptor(namespace: Option<&str>, name: &str) -> StreamDescriptor {
    StreamDescriptor::new(namespace.filter(|ns| !ns.is_empty()), name)
}
