//! kubebrowser web server.
//!
//! This crate provides the OIDC gateway in front of the kubebrowser UI:
//! authentication, sessions, and the API serving per-user kubeconfigs.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
