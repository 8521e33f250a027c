//! End-to-end initial-state gathering against a scripted warehouse.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{final_table_columns, row, users_stream, ScriptedWarehouse};
use serde_json::json;
use snowflake_td::state::FileStateStore;
use snowflake_td::{
    AirbyteType, Config, GatherConfig, InitialRawTableStatus, Orchestrator, StreamDescriptor,
    TdError, WarehouseError,
};

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn config() -> Config {
    Config::from_yaml(
        r#"
warehouse:
  account: myorg-myaccount
  database: ANALYTICS
  warehouse: COMPUTE_WH
  token: secret
"#,
    )
    .unwrap()
}

/// Raw tables not scripted before this call do not exist.
fn no_other_tables(wh: &ScriptedWarehouse) {
    wh.rows("INFORMATION_SCHEMA.TABLES", vec![row(&[("CNT", Some("0"))])]);
}

// =============================================================================
// Full snapshot
// =============================================================================

#[tokio::test]
async fn test_snapshot_of_mixed_streams() {
    let wh = Arc::new(ScriptedWarehouse::new());

    // users: final table matches and holds rows; raw table has unloaded records.
    wh.rows(
        "SHOW COLUMNS IN TABLE \"ANALYTICS\".\"PUBLIC\".\"USERS\"",
        final_table_columns(&[("ID", "FIXED"), ("EMAIL", "TEXT")]),
    );
    wh.rows(
        "SHOW TABLES LIKE 'USERS'",
        vec![row(&[("name", Some("USERS")), ("rows", Some("12"))])],
    );
    wh.rows(
        "TABLE_NAME = 'public_raw__stream_users'",
        vec![row(&[("CNT", Some("1"))])],
    );
    wh.rows(
        "MIN_TIMESTAMP\" FROM \"ANALYTICS\".\"airbyte_internal\".\"public_raw__stream_users\"",
        vec![row(&[(
            "MIN_TIMESTAMP",
            Some("2024-05-01T08:30:00.000000000+00:00"),
        )])],
    );

    // orders: final table has drifted, is empty, raw table fully typed.
    wh.rows(
        "SHOW COLUMNS IN TABLE \"ANALYTICS\".\"PUBLIC\".\"ORDERS\"",
        final_table_columns(&[("ID", "FIXED"), ("TOTAL", "TEXT")]),
    );
    wh.rows(
        "SHOW TABLES LIKE 'ORDERS'",
        vec![row(&[("name", Some("ORDERS")), ("rows", Some("0"))])],
    );
    wh.rows(
        "TABLE_NAME = 'public_raw__stream_orders'",
        vec![row(&[("CNT", Some("1"))])],
    );
    wh.rows(
        "MIN_TIMESTAMP\" FROM \"ANALYTICS\".\"airbyte_internal\".\"public_raw__stream_orders\"",
        vec![row(&[("MIN_TIMESTAMP", None)])],
    );
    wh.rows(
        "MAX_TIMESTAMP\" FROM \"ANALYTICS\".\"airbyte_internal\".\"public_raw__stream_orders\"",
        vec![row(&[(
            "MAX_TIMESTAMP",
            Some("2024-05-01T03:00:00.000000000-05:00"),
        )])],
    );

    // Persisted state asks for a soft reset of users.
    wh.rows(
        "_airbyte_destination_state",
        vec![row(&[
            ("name", Some("users")),
            ("namespace", Some("public")),
            ("destination_state", Some(r#"{"needsSoftReset":true}"#)),
        ])],
    );
    no_other_tables(&wh);

    let orchestrator = Orchestrator::from_config(&config(), wh.clone()).unwrap();
    let users = users_stream(
        "users",
        vec![("ID", AirbyteType::integer()), ("EMAIL", AirbyteType::string())],
    );
    let orders = users_stream(
        "orders",
        vec![("ID", AirbyteType::integer()), ("TOTAL", AirbyteType::number())],
    );

    let statuses = orchestrator
        .gather_initial_state(&[users, orders])
        .await
        .unwrap();
    assert_eq!(statuses.len(), 2);

    let users = &statuses[0];
    assert_eq!(users.stream_config.id.final_name, "USERS");
    assert!(users.is_final_table_present);
    assert!(!users.is_schema_mismatch);
    assert!(!users.is_final_table_empty);
    assert!(users.initial_raw_table_status.raw_table_exists);
    assert!(users.initial_raw_table_status.has_unprocessed_records);
    assert_eq!(
        users.initial_raw_table_status.watermark,
        Some(utc("2024-05-01T08:29:59.999999999Z"))
    );
    assert_eq!(users.initial_temp_raw_table_status, InitialRawTableStatus::absent());
    assert!(users.destination_state.needs_soft_reset);
    assert!(users.needs_soft_reset());

    let orders = &statuses[1];
    assert_eq!(orders.stream_config.id.final_name, "ORDERS");
    assert!(orders.is_final_table_present);
    assert!(orders.is_schema_mismatch);
    assert!(orders.is_final_table_empty);
    assert!(orders.initial_raw_table_status.raw_table_exists);
    assert!(!orders.initial_raw_table_status.has_unprocessed_records);
    // 03:00 at -05:00 is 08:00 UTC, shifted back by the recorded offset.
    assert_eq!(
        orders.initial_raw_table_status.watermark,
        Some(utc("2024-05-01T03:00:00Z"))
    );
    assert!(!orders.destination_state.needs_soft_reset);
    assert!(orders.needs_soft_reset());
}

#[tokio::test]
async fn test_fresh_destination() {
    let wh = Arc::new(ScriptedWarehouse::new());
    wh.fail(
        "_airbyte_destination_state",
        WarehouseError::new(
            "SQL compilation error:\nObject 'ANALYTICS.AIRBYTE_INTERNAL._AIRBYTE_DESTINATION_STATE' does not exist or not authorized.",
        )
        .with_code("002003"),
    );
    no_other_tables(&wh);

    let orchestrator = Orchestrator::from_config(&config(), wh.clone()).unwrap();
    let statuses = orchestrator
        .gather_initial_state(&[users_stream("users", vec![("ID", AirbyteType::integer())])])
        .await
        .unwrap();

    let status = &statuses[0];
    assert!(!status.is_final_table_present);
    assert!(!status.is_schema_mismatch);
    assert!(status.is_final_table_empty);
    assert_eq!(status.initial_raw_table_status, InitialRawTableStatus::absent());
    assert_eq!(status.initial_temp_raw_table_status, InitialRawTableStatus::absent());
    assert!(!status.needs_soft_reset());
    assert!(wh.log().iter().all(|sql| !sql.contains("MIN(")));
}

#[tokio::test]
async fn test_empty_batch() {
    let wh = Arc::new(ScriptedWarehouse::new());
    let orchestrator = Orchestrator::from_config(&config(), wh).unwrap();
    let statuses = orchestrator.gather_initial_state(&[]).await.unwrap();
    assert!(statuses.is_empty());
}

// =============================================================================
// State backends
// =============================================================================

#[tokio::test]
async fn test_file_state_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store = FileStateStore::new(&path);

    let mut states = HashMap::new();
    states.insert(
        StreamDescriptor::new(Some("public"), "users"),
        json!({"needsSoftReset": "true", "airbyteMetaPresentInRaw": true}),
    );
    store.save(&states).unwrap();

    let wh = Arc::new(ScriptedWarehouse::new());
    no_other_tables(&wh);
    let orchestrator = Orchestrator::new(wh, Arc::new(store), &GatherConfig::default());

    let statuses = orchestrator
        .gather_initial_state(&[users_stream("users", vec![("ID", AirbyteType::integer())])])
        .await
        .unwrap();
    assert!(statuses[0].destination_state.needs_soft_reset);
    assert!(statuses[0].destination_state.airbyte_meta_present_in_raw);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_metadata_failure_degrades_to_absent() {
    let wh = Arc::new(ScriptedWarehouse::new());
    wh.fail("SHOW COLUMNS", WarehouseError::new("Internal error"));
    wh.fail("SHOW TABLES", WarehouseError::new("Internal error"));
    no_other_tables(&wh);

    let orchestrator = Orchestrator::from_config(&config(), wh).unwrap();
    let statuses = orchestrator
        .gather_initial_state(&[users_stream("users", vec![("ID", AirbyteType::integer())])])
        .await
        .unwrap();
    assert!(!statuses[0].is_final_table_present);
}

#[tokio::test]
async fn test_state_table_failure_is_fatal() {
    let wh = Arc::new(ScriptedWarehouse::new());
    wh.fail(
        "_airbyte_destination_state",
        WarehouseError::new(
            "Warehouse 'COMPUTE_WH' cannot be resumed because resource monitor 'RM' has exceeded its quota.",
        ),
    );

    let orchestrator = Orchestrator::from_config(&config(), wh).unwrap();
    let err = orchestrator
        .gather_initial_state(&[users_stream("users", vec![("ID", AirbyteType::integer())])])
        .await
        .unwrap_err();
    assert!(matches!(err, TdError::Warehouse(_)));
}

#[tokio::test]
async fn test_raw_table_failure_names_the_stream() {
    let wh = Arc::new(ScriptedWarehouse::new());
    wh.rows(
        "TABLE_NAME = 'public_raw__stream_users'",
        vec![row(&[("CNT", Some("1"))])],
    );
    wh.rows(
        "MIN_TIMESTAMP",
        vec![row(&[("MIN_TIMESTAMP", Some("not a timestamp"))])],
    );
    no_other_tables(&wh);

    let orchestrator = Orchestrator::from_config(&config(), wh).unwrap();
    let err = orchestrator
        .gather_initial_state(&[users_stream("users", vec![("ID", AirbyteType::integer())])])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("PUBLIC.USERS"));
    assert!(err.format_detailed().contains("not a timestamp"));
}
