//! No-op state store for deployments that keep no destination state.
//!
//! Every stream starts from the default state, so a soft reset requested by
//! an interrupted sync is not carried over.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::core::StreamDescriptor;
use crate::error::Result;
use crate::state::backend::DestinationStateStore;

/// State store that never has any state.
///
/// Logs a warning on first use.
pub struct NoOpStateStore {
    warned: AtomicBool,
}

impl NoOpStateStore {
    /// Create a new no-op state store.
    pub fn new() -> Self {
        Self {
            warned: AtomicBool::new(false),
        }
    }

    fn warn_once(&self) {
        if !self.warned.swap(true, Ordering::SeqCst) {
            warn!(
                "Using no-op state store: destination state is not read. \
                 Every stream starts from the default state."
            );
        }
    }
}

impl Default for NoOpStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DestinationStateStore for NoOpStateStore {
    async fn load_all(&self) -> Result<HashMap<StreamDescriptor, Value>> {
        self.warn_once();
        Ok(HashMap::new())
    }

    fn backend_type(&self) -> &'static str {
        "noop"
    }
}
