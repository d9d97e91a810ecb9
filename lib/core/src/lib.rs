//! Core types for kubebrowser.
//!
//! This crate holds the configuration-record model shared by the record
//! source, the access filter and the materializer, plus the `Result` alias
//! used for error propagation across the workspace.

pub mod error;
pub mod record;

pub use error::Result;
pub use record::{
    AuthProvider, AuthProviderConfig, Cluster, ClusterDetails, ConfigRecord, Context,
    ContextDetails, KubeconfigData, KubeconfigSpec, NamedUser, UserDetails, Whitelist,
};
