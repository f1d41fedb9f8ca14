//! Core types for settee
//!
//! This crate defines the data model shared by the wire and executor layers:
//! - Error: the error taxonomy and its classification
//! - Operation: the closed set of database operations and their validation
//! - ViewKey, Stale: view query keys and staleness
//! - Outcome, Row, Completion: what an executed operation produces
//! - ident: identifier rules for databases, documents and design documents

#![warn(clippy::all)]

pub mod error;
pub mod ident;
pub mod key;
pub mod operation;
pub mod outcome;

pub use error::{Error, ErrorKind, Result};
pub use key::{Stale, ViewKey};
pub use operation::{
    CreateIndex, DefaultField, DeleteDocument, DeleteIndex, FindDocuments, GetDocument, IndexType,
    Operation, OperationKind, PutDocument, QueryView, UNSET,
};
pub use outcome::{Completion, Document, IndexResult, Outcome, Row, RowsSummary, WriteResult};

// Re-export the JSON value type so callers don't need serde_json directly
pub use serde_json::Value as JsonValue;
