//! Equality-based label selectors.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RecordSourceError;

/// A set of `key=value` requirements, all of which must hold.
///
/// The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: BTreeMap<String, String>,
}

impl Selector {
    /// A selector matching every record.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Adds a `key=value` requirement.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements.insert(key.into(), value.into());
        self
    }

    /// Returns true if this selector has no requirements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Returns true if `labels` satisfies every requirement.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements
            .iter()
            .all(|(key, value)| labels.get(key) == Some(value))
    }
}

impl FromStr for Selector {
    type Err = RecordSourceError;

    /// Parses `k=v,k2=v2`. Blank input yields the empty selector.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut selector = Self::default();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(RecordSourceError::InvalidSelector {
                    details: format!("label selector term '{part}' is not key=value"),
                });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(RecordSourceError::InvalidSelector {
                    details: format!("label selector term '{part}' has an empty key"),
                });
            }
            selector = selector.with(key, value.trim());
        }
        Ok(selector)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .requirements
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        f.write_str(&terms.join(","))
    }
}
