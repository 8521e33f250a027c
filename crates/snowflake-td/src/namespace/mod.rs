//! Idempotent schema provisioning.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::identifier::quote_ident;
use crate::core::Warehouse;
use crate::error::{Result, TdError};
use crate::executor::ErrorClassifier;

/// What [`NamespaceProvisioner::ensure`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureReport {
    /// Schemas created by this call.
    pub created: Vec<String>,
    /// Schemas that already existed.
    pub existing: Vec<String>,
}

/// Creates schemas that do not exist yet.
pub struct NamespaceProvisioner {
    warehouse: Arc<dyn Warehouse>,
    classifier: ErrorClassifier,
}

impl NamespaceProvisioner {
    pub fn new(warehouse: Arc<dyn Warehouse>) -> Self {
        Self {
            warehouse,
            classifier: ErrorClassifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Ensure every schema in `names` exists.
    ///
    /// Names are matched case-sensitively against the schema listing and
    /// created quoted, so their case is preserved. Every name is attempted
    /// even after a failure; the first failure is returned once all names
    /// were tried.
    pub async fn ensure<I, S>(&self, names: I) -> Result<EnsureReport>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = EnsureReport::default();
        let mut failures = Vec::new();

        for name in names {
            let name = name.as_ref();
            if report.created.iter().chain(&report.existing).any(|n| n == name) {
                continue;
            }
            match self.ensure_one(name).await {
                Ok(true) => report.created.push(name.to_string()),
                Ok(false) => report.existing.push(name.to_string()),
                Err(e) => {
                    let err = self.classifier.classify_error(e, TdError::Warehouse);
                    warn!("Failed to provision schema {}: {}", name, err);
                    failures.push(err);
                }
            }
        }

        match failures.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }

    /// Returns true when the schema had to be created.
    async fn ensure_one(&self, name: &str) -> Result<bool> {
        let schemas = self.warehouse.list_schemas().await?;
        if schemas.iter().any(|s| s == name) {
            debug!("Schema {} already exists", name);
            return Ok(false);
        }

        let sql = format!("CREATE SCHEMA IF NOT EXISTS {};", quote_ident(name)?);
        self.warehouse.execute(&sql).await?;
        info!("Created schema {}", name);
        Ok(true)
    }
}
