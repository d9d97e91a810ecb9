//! Configuration record sources for kubebrowser.
//!
//! A [`RecordSource`] answers "which records exist in this namespace and
//! match this selector". Two implementations are provided:
//! - [`StaticRecordSource`]: a fixed snapshot, loaded from memory or a JSON file
//! - [`KubeRecordSource`]: a watch-backed cache of `Kubeconfig` custom resources

pub mod error;
pub mod kubernetes;
pub mod selector;
pub mod source;

pub use error::RecordSourceError;
pub use kubernetes::{KubeRecordSource, Kubeconfig, KubeconfigResourceSpec};
pub use selector::Selector;
pub use source::{RecordSource, StaticRecordSource};
