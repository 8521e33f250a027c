//! JSON file state store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::StreamDescriptor;
use crate::error::{Result, TdError};
use crate::state::backend::{descriptor, DestinationStateStore};

/// One stream's entry in the state file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StateEntry {
    #[serde(default)]
    namespace: Option<String>,
    name: String,
    state: Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    streams: Vec<StateEntry>,
}

/// Reads destination state from a JSON file:
///
/// ```json
/// {"streams": [{"namespace": "public", "name": "users", "state": {"needsSoftReset": true}}]}
/// ```
///
/// A missing file means no stream has state yet. When a stream appears more
/// than once, the last entry wins.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file contents with `states` (atomic write).
    ///
    /// Nothing in this crate writes state; this is for the caller that
    /// persists the outcome of a sync, and for seeding the file.
    pub fn save(&self, states: &HashMap<StreamDescriptor, Value>) -> Result<()> {
        let mut streams: Vec<_> = states
            .iter()
            .map(|(key, state)| StateEntry {
                namespace: key.namespace.clone(),
                name: key.name.clone(),
                state: state.clone(),
            })
            .collect();
        streams.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

        let content = serde_json::to_string_pretty(&StateFile { streams })
            .map_err(|e| TdError::State(format!("Failed to serialize state: {}", e)))?;

        // Atomic write: write to temp file, then rename
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    async fn read(&self) -> Result<HashMap<StreamDescriptor, Value>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("State file {} does not exist yet", self.path.display());
                return Ok(HashMap::new());
            }
            Err(e) => return Err(e.into()),
        };
        let file: StateFile = serde_json::from_str(&content).map_err(|e| {
            TdError::State(format!(
                "State file {} is not valid: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(file
            .streams
            .into_iter()
            .map(|entry| (descriptor(entry.namespace.as_deref(), &entry.name), entry.state))
            .collect())
    }
}

#[async_trait]
impl DestinationStateStore for FileStateStore {
    async fn load_all(&self) -> Result<HashMap<StreamDescriptor, Value>> {
        self.read().await
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}
