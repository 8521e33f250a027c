//! Transaction execution and schema provisioning against a scripted warehouse.

mod common;

use std::sync::Arc;

use common::{row, ScriptedWarehouse};
use snowflake_td::executor::MULTI_STATEMENT_PREAMBLE;
use snowflake_td::{
    ConfigErrorKind, NamespaceProvisioner, Sql, TdError, TransactionExecutor, WarehouseError,
};
use tokio_util::sync::CancellationToken;

// =============================================================================
// TransactionExecutor
// =============================================================================

#[tokio::test]
async fn test_transactions_run_in_order() {
    let wh = Arc::new(ScriptedWarehouse::new());
    let executor = TransactionExecutor::new(wh.clone());

    let sql = Sql::concat([
        Sql::transactionally([
            "DELETE FROM \"PUBLIC\".\"USERS\" WHERE TRUE",
            "INSERT INTO \"PUBLIC\".\"USERS\" SELECT * FROM \"PUBLIC\".\"USERS_AIRBYTE_TMP\"",
        ]),
        Sql::of("DROP TABLE IF EXISTS \"PUBLIC\".\"USERS_AIRBYTE_TMP\""),
    ]);
    executor.execute(&sql).await.unwrap();

    let log = wh.log();
    assert_eq!(log.len(), 2);
    assert!(log[0].starts_with("BEGIN TRANSACTION;\n"));
    assert!(log[0].contains("DELETE FROM"));
    assert!(log[0].ends_with("COMMIT;\n"));
    assert_eq!(log[1], "DROP TABLE IF EXISTS \"PUBLIC\".\"USERS_AIRBYTE_TMP\";");
}

#[tokio::test]
async fn test_empty_sql_issues_nothing() {
    let wh = Arc::new(ScriptedWarehouse::new());
    TransactionExecutor::new(wh.clone())
        .execute(&Sql::empty())
        .await
        .unwrap();
    assert!(wh.log().is_empty());
}

#[tokio::test]
async fn test_failure_stops_the_batch() {
    let wh = Arc::new(ScriptedWarehouse::new());
    wh.fail(
        "MERGE",
        WarehouseError::new(format!(
            "{} 1 (0-based).\nNumeric value 'abc' is not recognized",
            MULTI_STATEMENT_PREAMBLE
        ))
        .with_code("100038"),
    );

    let sql = Sql::separately([
        "CREATE TABLE \"PUBLIC\".\"T\" (\"ID\" NUMBER)",
        "MERGE INTO \"PUBLIC\".\"T\" USING x ON TRUE WHEN MATCHED THEN DELETE",
        "DROP TABLE \"PUBLIC\".\"X\"",
    ]);
    let err = TransactionExecutor::new(wh.clone())
        .execute(&sql)
        .await
        .unwrap_err();

    match err {
        TdError::Transaction {
            correlation,
            message,
            vendor,
        } => {
            assert_eq!(correlation.index, 1);
            assert_eq!(message, "Numeric value 'abc' is not recognized");
            assert_eq!(vendor.code.as_deref(), Some("100038"));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(wh.log().len(), 2);
}

#[tokio::test]
async fn test_permission_failure_is_configuration_error() {
    let wh = Arc::new(ScriptedWarehouse::new());
    wh.fail(
        "CREATE",
        WarehouseError::new(
            "SQL access control error:\nInsufficient privileges to operate on schema 'PUBLIC'",
        )
        .with_code("003001"),
    );

    let err = TransactionExecutor::new(wh)
        .execute(&Sql::of("CREATE TABLE \"PUBLIC\".\"T\" (\"ID\" NUMBER)"))
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(matches!(
        err,
        TdError::Configuration {
            kind: ConfigErrorKind::Permissions,
            ..
        }
    ));
    assert!(err.vendor_message().unwrap().contains("Insufficient privileges"));
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let wh = Arc::new(ScriptedWarehouse::new());
    let token = CancellationToken::new();
    let executor = TransactionExecutor::new(wh.clone()).with_cancellation(token.clone());
    token.cancel();

    let err = executor.execute(&Sql::of("SELECT 1")).await.unwrap_err();
    assert!(matches!(err, TdError::Cancelled));
    assert!(wh.log().is_empty());
}

// =============================================================================
// NamespaceProvisioner
// =============================================================================

#[tokio::test]
async fn test_ensure_creates_only_missing_schemas() {
    let wh = Arc::new(ScriptedWarehouse::new());
    wh.rows(
        "SHOW SCHEMAS IN DATABASE \"ANALYTICS\"",
        vec![
            row(&[("name", Some("PUBLIC"))]),
            row(&[("name", Some("INFORMATION_SCHEMA"))]),
        ],
    );

    let report = NamespaceProvisioner::new(wh.clone())
        .ensure(["PUBLIC", "airbyte_internal", "PUBLIC"])
        .await
        .unwrap();

    assert_eq!(report.existing, vec!["PUBLIC".to_string()]);
    assert_eq!(report.created, vec!["airbyte_internal".to_string()]);

    let creates: Vec<_> = wh
        .log()
        .into_iter()
        .filter(|sql| sql.starts_with("CREATE SCHEMA"))
        .collect();
    assert_eq!(creates, vec!["CREATE SCHEMA IF NOT EXISTS \"airbyte_internal\";"]);
}

#[tokio::test]
async fn test_ensure_reports_classified_failure() {
    let wh = Arc::new(ScriptedWarehouse::new());
    wh.fail(
        "CREATE SCHEMA IF NOT EXISTS \"RESTRICTED\"",
        WarehouseError::new(
            "SQL access control error:\nInsufficient privileges to operate on database 'ANALYTICS'",
        ),
    );

    let err = NamespaceProvisioner::new(wh.clone())
        .ensure(["RESTRICTED", "OTHER"])
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    // The second schema is still attempted.
    assert!(wh
        .log()
        .contains(&"CREATE SCHEMA IF NOT EXISTS \"OTHER\";".to_string()));
}
