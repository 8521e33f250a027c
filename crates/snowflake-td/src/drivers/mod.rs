//! Warehouse driver implementations.
//!
//! This module provides warehouse-specific implementations of
//! [`Warehouse`](crate::core::Warehouse):
//!
//! - [`snowflake`]: Snowflake over the SQL API v2
//!
//! # Adding New Warehouses
//!
//! 1. Create a new module under `drivers/`
//! 2. Implement `Warehouse::query`, `Warehouse::execute` and
//!    `Warehouse::database`; override the metadata methods if the warehouse
//!    does not speak Snowflake's `SHOW` commands
//! 3. Add classification rules for its configuration errors

pub mod snowflake;

pub use snowflake::SnowflakeClient;
