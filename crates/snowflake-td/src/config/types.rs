//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Warehouse connection.
    pub warehouse: WarehouseConfig,

    /// Schema holding raw tables and the state table (default: "airbyte_internal").
    #[serde(default = "default_raw_namespace")]
    pub raw_namespace: String,

    /// Initial-state gathering behavior.
    #[serde(default)]
    pub gather: GatherConfig,

    /// Where destination state is read from.
    #[serde(default)]
    pub state: StateConfig,
}

/// Snowflake connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Account identifier, e.g. `myorg-myaccount`.
    pub account: String,

    /// Host override (default: `<account>.snowflakecomputing.com`).
    #[serde(default)]
    pub host: Option<String>,

    /// Database all streams live in.
    pub database: String,

    /// Virtual warehouse to run statements on.
    pub warehouse: String,

    /// Role to assume (default: the user's default role).
    #[serde(default)]
    pub role: Option<String>,

    /// Bearer token for the SQL API.
    pub token: String,

    /// Kind of token (default: OAUTH).
    #[serde(default)]
    pub token_type: TokenType,

    /// Per-request timeout in seconds (default: 120).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl WarehouseConfig {
    /// Base URL of the account.
    pub fn base_url(&self) -> String {
        match &self.host {
            Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
                host.trim_end_matches('/').to_string()
            }
            Some(host) => format!("https://{}", host.trim_end_matches('/')),
            None => format!("https://{}.snowflakecomputing.com", self.account),
        }
    }
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("account", &self.account)
            .field("host", &self.host)
            .field("database", &self.database)
            .field("warehouse", &self.warehouse)
            .field("role", &self.role)
            .field("token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Value of the `X-Snowflake-Authorization-Token-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    /// OAuth access token.
    #[default]
    Oauth,
    /// Pre-signed key-pair JWT.
    KeypairJwt,
    /// Programmatic access token.
    ProgrammaticAccessToken,
}

impl TokenType {
    pub fn header_value(self) -> &'static str {
        match self {
            TokenType::Oauth => "OAUTH",
            TokenType::KeypairJwt => "KEYPAIR_JWT",
            TokenType::ProgrammaticAccessToken => "PROGRAMMATIC_ACCESS_TOKEN",
        }
    }
}

/// Initial-state gathering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatherConfig {
    /// Streams whose status is assembled concurrently (default: 8).
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: usize,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_streams: default_max_concurrent_streams(),
        }
    }
}

/// State store selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateBackendKind {
    /// `_airbyte_destination_state` in the raw namespace.
    #[default]
    Warehouse,
    /// JSON file at `state.path`.
    File,
    /// No state; every stream starts from the defaults.
    None,
}

/// Destination state configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default)]
    pub backend: StateBackendKind,

    /// State file for the file backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_raw_namespace() -> String {
    "airbyte_internal".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_max_concurrent_streams() -> usize {
    8
}
