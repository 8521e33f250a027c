//! Error types for state gathering and SQL execution.

use std::fmt;

use thiserror::Error;

use crate::executor::CorrelationId;

/// Error reported by the warehouse itself.
///
/// Carries the vendor's message verbatim so it can be surfaced next to any
/// classification done on top of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseError {
    /// Vendor error code (e.g. `002003`), if the warehouse returned one.
    pub code: Option<String>,
    /// ANSI SQLSTATE, if the warehouse returned one.
    pub sql_state: Option<String>,
    /// Raw vendor message.
    pub message: String,
}

impl WarehouseError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            sql_state: None,
            message: message.into(),
        }
    }

    /// Attach a vendor error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach a SQLSTATE.
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    /// True when the warehouse reports that the object does not exist (or
    /// is not visible to the current role, which Snowflake reports the same
    /// way).
    pub fn is_object_not_found(&self) -> bool {
        self.code.as_deref() == Some(OBJECT_NOT_FOUND_CODE)
            || self.message.contains("does not exist or not authorized")
    }
}

/// Snowflake error code for a missing or invisible object.
const OBJECT_NOT_FOUND_CODE: &str = "002003";

impl fmt::Display for WarehouseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.sql_state) {
            (Some(code), Some(state)) => write!(f, "{} ({}): {}", code, state, self.message),
            (Some(code), None) => write!(f, "{}: {}", code, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for WarehouseError {}

/// Category of a user-actionable warehouse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigErrorKind {
    /// Login rejected (bad password, invalid token).
    Credentials,
    /// Authenticated but not allowed to touch the object.
    Permissions,
    /// Credit quota or resource monitor limit reached.
    Quota,
    /// Network policy rejects the client address.
    NetworkPolicy,
    /// Virtual warehouse missing or suspended.
    Warehouse,
}

impl fmt::Display for ConfigErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credentials => write!(f, "credentials"),
            Self::Permissions => write!(f, "permissions"),
            Self::Quota => write!(f, "quota"),
            Self::NetworkPolicy => write!(f, "network_policy"),
            Self::Warehouse => write!(f, "warehouse"),
        }
    }
}

/// Main error type for state gathering and SQL execution.
#[derive(Error, Debug)]
pub enum TdError {
    /// Invalid configuration (YAML, missing fields, duplicate streams).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unclassified warehouse error.
    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    /// Warehouse error the user can fix in their own setup.
    #[error("{message}")]
    Configuration {
        kind: ConfigErrorKind,
        message: String,
        #[source]
        vendor: WarehouseError,
    },

    /// A SQL transaction failed; later transactions in the batch were not run.
    #[error("Sql {correlation} failed: {message}")]
    Transaction {
        correlation: CorrelationId,
        message: String,
        #[source]
        vendor: WarehouseError,
    },

    /// Unexpected failure while building one stream's initial status.
    #[error("Failed to gather initial state for stream {stream}")]
    SchemaAssembly {
        stream: String,
        #[source]
        source: Box<TdError>,
    },

    /// A type name outside the closed type set reached the type mapper.
    #[error("Unrecognized type: {0}")]
    UnrecognizedType(String),

    /// Persisted destination state could not be read or decoded.
    #[error("State error: {0}")]
    State(String),

    /// HTTP transport error talking to the warehouse.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Execution was cancelled between transactions.
    #[error("Execution cancelled")]
    Cancelled,
}

impl TdError {
    /// Wrap an error raised while assembling `stream`'s status.
    pub fn schema_assembly(stream: impl Into<String>, source: TdError) -> Self {
        TdError::SchemaAssembly {
            stream: stream.into(),
            source: Box::new(source),
        }
    }

    /// True for errors the user can resolve in their warehouse setup.
    pub fn is_configuration(&self) -> bool {
        match self {
            TdError::Configuration { .. } | TdError::Config(_) => true,
            TdError::SchemaAssembly { source, .. } => source.is_configuration(),
            _ => false,
        }
    }

    /// Raw vendor message behind this error, if it came from the warehouse.
    pub fn vendor_message(&self) -> Option<&str> {
        match self {
            TdError::Warehouse(e) => Some(&e.message),
            TdError::Configuration { vendor, .. } | TdError::Transaction { vendor, .. } => {
                Some(&vendor.message)
            }
            TdError::SchemaAssembly { source, .. } => source.vendor_message(),
            _ => None,
        }
    }

    /// True when a warehouse error says the object is missing.
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, TdError::Warehouse(e) if e.is_object_not_found())
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, TdError>;
