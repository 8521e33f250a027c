//! Snowflake driver.
//!
//! - [`SnowflakeClient`]: [`Warehouse`](crate::core::Warehouse) over the
//!   Snowflake SQL API v2 (`/api/v2/statements`)

mod client;
mod wire;

pub use client::SnowflakeClient;
