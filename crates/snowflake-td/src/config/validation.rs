//! Configuration validation.

use super::{Config, StateBackendKind};
use crate::core::identifier::validate_identifier;
use crate::error::{Result, TdError};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Warehouse validation
    if config.warehouse.account.is_empty() {
        return Err(TdError::Config("warehouse.account is required".into()));
    }
    if config.warehouse.database.is_empty() {
        return Err(TdError::Config("warehouse.database is required".into()));
    }
    if config.warehouse.warehouse.is_empty() {
        return Err(TdError::Config("warehouse.warehouse is required".into()));
    }
    if config.warehouse.token.is_empty() {
        return Err(TdError::Config("warehouse.token is required".into()));
    }
    if config.warehouse.request_timeout_secs == 0 {
        return Err(TdError::Config(
            "warehouse.request_timeout_secs must be at least 1".into(),
        ));
    }
    validate_identifier(&config.warehouse.database)?;
    validate_identifier(&config.raw_namespace)?;

    if config.gather.max_concurrent_streams == 0 {
        return Err(TdError::Config(
            "gather.max_concurrent_streams must be at least 1".into(),
        ));
    }

    if config.state.backend == StateBackendKind::File && config.state.path.is_none() {
        return Err(TdError::Config(
            "state.path is required when state.backend is 'file'".into(),
        ));
    }

    Ok(())
}
