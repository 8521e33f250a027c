//! Sequential, transactional execution of SQL batches.
//!
//! A batch ([`Sql`]) is an ordered list of transactions. Later statements
//! may depend on the side effects of earlier ones, so transactions run one
//! at a time in submission order and the first failure stops the batch.

pub mod classify;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::Warehouse;
use crate::error::{Result, TdError};

pub use classify::{strip_preamble, ClassificationRule, ErrorClassifier, MULTI_STATEMENT_PREAMBLE};

/// Marker opening a multi-statement transaction.
pub const BEGIN_TRANSACTION: &str = "BEGIN TRANSACTION";
/// Marker closing a multi-statement transaction.
pub const COMMIT: &str = "COMMIT";

/// An ordered batch of transactions, each an ordered list of statements.
///
/// Construction normalizes the batch: blank statements and transactions
/// left empty are dropped, and every statement ends with `;`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sql {
    transactions: Vec<Vec<String>>,
}

impl Sql {
    /// A batch with nothing to run.
    pub fn empty() -> Self {
        Self::default()
    }

    /// One statement in its own transaction.
    pub fn of(statement: impl Into<String>) -> Self {
        Self::transactionally([statement])
    }

    /// All statements in a single transaction.
    pub fn transactionally<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::create(vec![statements.into_iter().map(Into::into).collect()])
    }

    /// Each statement in its own transaction.
    pub fn separately<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::create(
            statements
                .into_iter()
                .map(|s| vec![s.into()])
                .collect(),
        )
    }

    /// The transactions of every part, in order.
    pub fn concat<I>(parts: I) -> Self
    where
        I: IntoIterator<Item = Sql>,
    {
        Self::create(parts.into_iter().flat_map(|sql| sql.transactions).collect())
    }

    fn create(transactions: Vec<Vec<String>>) -> Self {
        let transactions = transactions
            .into_iter()
            .map(|tx| tx.into_iter().filter_map(|s| terminate(&s)).collect::<Vec<_>>())
            .filter(|tx| !tx.is_empty())
            .collect();
        Self { transactions }
    }

    pub fn transactions(&self) -> &[Vec<String>] {
        &self.transactions
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Render one string per transaction.
    ///
    /// A single-statement transaction is returned as is. Longer ones are
    /// wrapped as `begin;\n<stmt>\n...<commit>;\n`.
    pub fn as_sql_strings(&self, begin: &str, commit: &str) -> Vec<String> {
        self.transactions
            .iter()
            .map(|tx| {
                if let [single] = tx.as_slice() {
                    return single.clone();
                }
                let mut out = format!("{};\n", begin);
                for statement in tx {
                    out.push_str(statement);
                    out.push('\n');
                }
                out.push_str(commit);
                out.push_str(";\n");
                out
            })
            .collect()
    }
}

fn terminate(statement: &str) -> Option<String> {
    let trimmed = statement.trim();
    if trimmed.is_empty() || trimmed == ";" {
        return None;
    }
    if trimmed.ends_with(';') {
        Some(trimmed.to_string())
    } else {
        Some(format!("{};", trimmed))
    }
}

/// Identifies one transaction of one batch in logs and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CorrelationId {
    pub batch_id: Uuid,
    /// 0-based position of the transaction in the batch.
    pub index: usize,
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.batch_id, self.index)
    }
}

/// Runs [`Sql`] batches on one warehouse session.
pub struct TransactionExecutor {
    warehouse: Arc<dyn Warehouse>,
    classifier: ErrorClassifier,
    cancel: CancellationToken,
}

impl TransactionExecutor {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            warehouse,
            classifier: ErrorClassifier::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Stop submitting transactions once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Execute every transaction of `sql` in order.
    ///
    /// Stops at the first failure and returns it classified. Cancellation is
    /// checked before each transaction; one already submitted always runs to
    /// completion or failure.
    pub async fn execute(&self, sql: &Sql) -> Result<()> {
        let batch_id = Uuid::new_v4();
        let transactions = sql.as_sql_strings(BEGIN_TRANSACTION, COMMIT);

        for (index, transaction) in transactions.iter().enumerate() {
            let correlation = CorrelationId { batch_id, index };

            if self.cancel.is_cancelled() {
                warn!(
                    "Cancelled before sql {}; {} of {} transactions not run",
                    correlation,
                    transactions.len() - index,
                    transactions.len()
                );
                return Err(TdError::Cancelled);
            }

            info!("Executing sql {}: {}", correlation, transaction);
            let start = Instant::now();

            if let Err(e) = self.warehouse.execute(transaction).await {
                let err = self.classifier.classify_any(e, |vendor| TdError::Transaction {
                    correlation,
                    message: strip_preamble(&vendor.message).to_string(),
                    vendor,
                });
                error!(
                    "Sql {} failed after {} ms: {}",
                    correlation,
                    start.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }

            info!(
                "Sql {} completed in {} ms",
                correlation,
                start.elapsed().as_millis()
            );
        }

        Ok(())
    }
}
