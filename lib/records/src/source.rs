//! The record source abstraction and an in-memory implementation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use kubebrowser_core::{ConfigRecord, Result};
use tracing::info;

use crate::error::RecordSourceError;
use crate::selector::Selector;

/// Read-only access to configuration records.
///
/// Listing must be cheap: handlers call it on every request.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Returns records in `namespace` whose labels match `selector`.
    ///
    /// Ordering is stable for a given snapshot.
    async fn list(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<Arc<ConfigRecord>>, RecordSourceError>;
}

/// A fixed set of records.
#[derive(Debug, Clone, Default)]
pub struct StaticRecordSource {
    records: Vec<Arc<ConfigRecord>>,
}

impl StaticRecordSource {
    #[must_use]
    pub fn new(records: Vec<ConfigRecord>) -> Self {
        Self {
            records: records.into_iter().map(Arc::new).collect(),
        }
    }

    /// Parses a JSON array of records.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid record array.
    pub fn from_json(json: &str) -> Result<Self, RecordSourceError> {
        let records: Vec<ConfigRecord> =
            serde_json::from_str(json).map_err(|e| RecordSourceError::InvalidSnapshot {
                details: e.to_string(),
            })?;
        Ok(Self::new(records))
    }

    /// Loads a JSON array of records from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RecordSourceError> {
        let path = path.as_ref();
        let json =
            std::fs::read_to_string(path).map_err(|e| RecordSourceError::InvalidSnapshot {
                details: format!("{}: {e}", path.display()),
            })?;
        let source = Self::from_json(&json)?;
        info!(path = %path.display(), count = source.records.len(), "loaded record snapshot");
        Ok(source)
    }
}

#[async_trait]
impl RecordSource for StaticRecordSource {
    async fn list(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<Vec<Arc<ConfigRecord>>, RecordSourceError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.namespace == namespace && selector.matches(&r.labels))
            .cloned()
            .collect())
    }
}
