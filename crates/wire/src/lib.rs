//! HTTP wire encoding for settee
//!
//! This crate turns operations into requests and responses into outcomes.
//! It performs no I/O of its own: a transport supplies [`WireResponse`]s with
//! a chunked body stream and the executor drives the parser.
//!
//! - params: query parameter encoding
//! - context: server endpoint, credentials and database name
//! - request: method, path, headers and body for each operation
//! - status: mapping of error statuses to [`settee_core::Error`]
//! - rows: incremental decoding of row arrays
//! - response: decoding whole-body and streamed responses

#![warn(clippy::all)]

pub mod context;
pub mod params;
pub mod request;
pub mod response;
pub mod rows;
pub mod status;

pub use context::{ClientContext, Credentials, DatabaseContext};
pub use params::{query_params, view_params, Omit, ParamSpec, ParamValue, QueryParam, WireEncoding};
pub use request::{Method, RequestBuilder, WireRequest};
pub use response::{BodyStream, ResponseParser, RowSink, WireResponse};
pub use rows::RowScanner;
pub use status::{error_for_status, is_success};
