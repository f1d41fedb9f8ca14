//! Executor Layer Tests
//!
//! End-to-end tests through the public `settee` API with a scripted
//! transport:
//! - Client - configuration, credentials, shutdown
//! - Database - the typed document, query and index helpers
//! - Dispatcher - streaming, cancellation and deadlines as seen by callers

mod common;

mod config_file;
mod error_handling;
mod walkthrough;
