//! Decoding responses into outcomes.
//!
//! [`ResponseParser::parse`] maps error statuses through
//! [`error_for_status`], decodes whole-body responses into typed results and
//! streams row responses through a [`RowSink`] as each row becomes decodable.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use settee_core::{
    Document, Error, IndexResult, OperationKind, Outcome, Result, Row, RowsSummary, WriteResult,
};

use crate::rows::RowScanner;
use crate::status::{error_for_status, is_success};

/// Response body delivered chunk by chunk.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// A response as produced by a transport.
pub struct WireResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: BodyStream,
}

impl WireResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: BodyStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response whose body is already in memory.
    pub fn from_bytes(status: u16, body: impl Into<Bytes>) -> Self {
        Self::from_chunks(status, vec![body.into()])
    }

    /// A response whose body arrives in the given chunks.
    pub fn from_chunks(status: u16, chunks: Vec<Bytes>) -> Self {
        let body = stream::iter(chunks.into_iter().map(Ok::<Bytes, Error>));
        Self::new(status, Vec::new(), Box::pin(body))
    }

    /// First header with `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for WireResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WireResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Receiver of streamed rows.
///
/// `emit` is awaited for each row before the next one is decoded, so a sink
/// that waits applies backpressure to the body stream.
#[async_trait]
pub trait RowSink: Send {
    async fn emit(&mut self, row: Row) -> Result<()>;
}

#[async_trait]
impl RowSink for Vec<Row> {
    async fn emit(&mut self, row: Row) -> Result<()> {
        self.push(row);
        Ok(())
    }
}

/// Stateless decoder from [`WireResponse`] to [`Outcome`].
pub struct ResponseParser;

impl ResponseParser {
    /// Decode `response` for an operation of `kind`.
    ///
    /// Rows are passed to `sink` as they are decoded. If the stream breaks or
    /// turns malformed part way, rows already emitted stay emitted and the
    /// error is returned.
    pub async fn parse<S>(kind: OperationKind, response: WireResponse, sink: &mut S) -> Result<Outcome>
    where
        S: RowSink + ?Sized,
    {
        let status = response.status;
        if !is_success(status) {
            // A broken error body still yields the status error.
            let body = read_body(response.body).await.unwrap_or_default();
            return Err(error_for_status(kind, status, &body));
        }

        if let Some(field) = rows_field(kind) {
            return parse_rows(field, response.body, sink).await;
        }

        let body = read_body(response.body).await?;
        let object: Map<String, JsonValue> = serde_json::from_slice(&body)
            .map_err(|e| Error::decoding(format!("malformed {} response: {}", kind, e)))?;

        match kind {
            OperationKind::GetDocument => Ok(Outcome::Document(Document::from_body(object)?)),
            OperationKind::PutDocument | OperationKind::DeleteDocument => {
                let write: WriteBody = serde_json::from_value(JsonValue::Object(object))?;
                Ok(Outcome::Write(WriteResult {
                    id: write.id,
                    rev: write.rev,
                    status,
                }))
            }
            OperationKind::CreateIndex => {
                let index: IndexResult = serde_json::from_value(JsonValue::Object(object))?;
                Ok(Outcome::Index(index))
            }
            _ => Ok(Outcome::Acknowledged { status }),
        }
    }
}

#[derive(Deserialize)]
struct WriteBody {
    id: String,
    rev: String,
}

/// Name of the streamed array for row-streaming kinds.
fn rows_field(kind: OperationKind) -> Option<&'static str> {
    match kind {
        OperationKind::QueryView => Some("rows"),
        OperationKind::FindDocuments => Some("docs"),
        OperationKind::ListIndexes => Some("indexes"),
        _ => None,
    }
}

async fn parse_rows<S>(field: &'static str, mut body: BodyStream, sink: &mut S) -> Result<Outcome>
where
    S: RowSink + ?Sized,
{
    let mut scanner = RowScanner::new(field);
    let mut delivered = 0u64;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let fed = scanner.feed(&chunk);
        // Rows completed before a malformed byte are still delivered.
        while let Some(value) = scanner.pop_row() {
            sink.emit(Row::from_json(value)?).await?;
            delivered += 1;
        }
        fed?;
    }

    let trailer = scanner.finish()?;
    Ok(Outcome::Rows(RowsSummary {
        rows: delivered,
        total_rows: trailer.get("total_rows").and_then(JsonValue::as_u64),
        offset: trailer.get("offset").and_then(JsonValue::as_u64),
        bookmark: trailer
            .get("bookmark")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
        warning: trailer
            .get("warning")
            .and_then(JsonValue::as_str)
            .map(str::to_string),
    }))
}

async fn read_body(mut body: BodyStream) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chunks(parts: &[&str]) -> Vec<Bytes> {
        parts.iter().map(|p| Bytes::from(p.to_string())).collect()
    }

    async fn parse(kind: OperationKind, response: WireResponse) -> (Vec<Row>, Result<Outcome>) {
        let mut rows = Vec::new();
        let outcome = ResponseParser::parse(kind, response, &mut rows).await;
        (rows, outcome)
    }

    #[tokio::test]
    async fn test_get_document() {
        let response = WireResponse::from_bytes(200, r#"{"_id":"a","_rev":"1-x","name":"aardvark"}"#);
        let (rows, outcome) = parse(OperationKind::GetDocument, response).await;
        assert!(rows.is_empty());
        let doc = outcome.unwrap().into_document().unwrap();
        assert_eq!(doc.rev, "1-x");
        assert_eq!(doc.get("name"), Some(&json!("aardvark")));
    }

    #[tokio::test]
    async fn test_write_keeps_status() {
        let response = WireResponse::from_bytes(202, r#"{"ok":true,"id":"a","rev":"2-y"}"#);
        let (_, outcome) = parse(OperationKind::PutDocument, response).await;
        assert_eq!(
            outcome.unwrap(),
            Outcome::Write(WriteResult {
                id: "a".into(),
                rev: "2-y".into(),
                status: 202
            })
        );
    }

    #[tokio::test]
    async fn test_write_missing_rev_is_decoding_error() {
        let response = WireResponse::from_bytes(201, r#"{"ok":true,"id":"a"}"#);
        let (_, outcome) = parse(OperationKind::PutDocument, response).await;
        assert!(matches!(outcome, Err(Error::Decoding { .. })));
    }

    #[tokio::test]
    async fn test_create_index() {
        let response = WireResponse::from_bytes(
            200,
            r#"{"result":"exists","id":"_design/idx","name":"by-class"}"#,
        );
        let (_, outcome) = parse(OperationKind::CreateIndex, response).await;
        let index = outcome.unwrap().into_index().unwrap();
        assert!(!index.created());
        assert_eq!(index.id, "_design/idx");
    }

    #[tokio::test]
    async fn test_acknowledged() {
        let response = WireResponse::from_bytes(201, r#"{"ok":true}"#);
        let (_, outcome) = parse(OperationKind::CreateDatabase, response).await;
        assert_eq!(outcome.unwrap(), Outcome::Acknowledged { status: 201 });
    }

    #[tokio::test]
    async fn test_error_status() {
        let response = WireResponse::from_bytes(
            409,
            r#"{"error":"conflict","reason":"Document update conflict."}"#,
        );
        let (_, outcome) = parse(OperationKind::PutDocument, response).await;
        assert_eq!(
            outcome.unwrap_err(),
            Error::Conflict {
                status: 409,
                reason: "conflict: Document update conflict.".into()
            }
        );
    }

    #[tokio::test]
    async fn test_view_rows_streamed_across_chunks() {
        let response = WireResponse::from_chunks(
            200,
            chunks(&[
                r#"{"total_rows":2,"off"#,
                r#"set":0,"rows":[{"id":"a","key":"a","value":1},{"id":"b","#,
                r#""key":"b","value":2}]}"#,
            ]),
        );
        let (rows, outcome) = parse(OperationKind::QueryView, response).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].id(), Some("b"));
        let summary = outcome.unwrap().into_rows().unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.total_rows, Some(2));
        assert_eq!(summary.offset, Some(0));
    }

    #[tokio::test]
    async fn test_reduce_row() {
        let response = WireResponse::from_bytes(200, r#"{"rows":[{"key":null,"value":42}]}"#);
        let (rows, outcome) = parse(OperationKind::QueryView, response).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value(), Some(&json!(42)));
        assert_eq!(outcome.unwrap().into_rows().unwrap().total_rows, None);
    }

    #[tokio::test]
    async fn test_find_bookmark() {
        let response = WireResponse::from_bytes(
            200,
            r#"{"docs":[{"_id":"a"},{"_id":"b"}],"bookmark":"g1AAA"}"#,
        );
        let (rows, outcome) = parse(OperationKind::FindDocuments, response).await;
        assert_eq!(rows.len(), 2);
        let summary = outcome.unwrap().into_rows().unwrap();
        assert_eq!(summary.bookmark.as_deref(), Some("g1AAA"));
    }

    #[tokio::test]
    async fn test_list_indexes() {
        let response = WireResponse::from_bytes(
            200,
            r#"{"total_rows":1,"indexes":[{"ddoc":null,"name":"_all_docs","type":"special","def":{"fields":[{"_id":"asc"}]}}]}"#,
        );
        let (rows, outcome) = parse(OperationKind::ListIndexes, response).await;
        assert_eq!(rows[0].get("name"), Some(&json!("_all_docs")));
        assert_eq!(outcome.unwrap().into_rows().unwrap().total_rows, Some(1));
    }

    #[tokio::test]
    async fn test_malformed_stream_keeps_earlier_rows() {
        let response = WireResponse::from_chunks(
            200,
            chunks(&[
                r#"{"rows":[{"id":"a"},{"id":"b"},"#,
                r#"{"id":"c"},{"id":!!!"#,
            ]),
        );
        let (rows, outcome) = parse(OperationKind::QueryView, response).await;
        assert_eq!(rows.len(), 3);
        assert!(matches!(outcome, Err(Error::Decoding { .. })));
    }

    #[tokio::test]
    async fn test_broken_stream_is_transport_error() {
        let parts: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(br#"{"rows":[{"id":"a"},"#)),
            Err(Error::transport("connection reset")),
        ];
        let response = WireResponse::new(200, Vec::new(), Box::pin(stream::iter(parts)));
        let (rows, outcome) = parse(OperationKind::QueryView, response).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(outcome.unwrap_err(), Error::transport("connection reset"));
    }

    #[tokio::test]
    async fn test_non_object_row_rejected() {
        let response = WireResponse::from_bytes(200, r#"{"rows":[{"id":"a"},7]}"#);
        let (rows, outcome) = parse(OperationKind::QueryView, response).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(
            outcome.unwrap_err(),
            Error::decoding("expected row object, found number")
        );
    }

    struct FailingSink;

    #[async_trait]
    impl RowSink for FailingSink {
        async fn emit(&mut self, _row: Row) -> Result<()> {
            Err(Error::Cancelled)
        }
    }

    #[tokio::test]
    async fn test_sink_error_stops_parsing() {
        let response = WireResponse::from_bytes(200, r#"{"rows":[{"id":"a"},{"id":"b"}]}"#);
        let outcome = ResponseParser::parse(OperationKind::QueryView, response, &mut FailingSink).await;
        assert_eq!(outcome.unwrap_err(), Error::Cancelled);
    }
}
