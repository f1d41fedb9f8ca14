//! Results of executed operations.
//!
//! Each [`OperationKind`](crate::OperationKind) produces exactly one
//! [`Outcome`] variant on success. Row-streaming operations deliver their rows
//! separately and finish with [`Outcome::Rows`], a summary of the stream.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{Error, Result};

/// A fetched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// `_id` of the document
    pub id: String,
    /// `_rev` of the returned revision
    pub rev: String,
    /// The complete body as returned, including `_id` and `_rev`
    pub body: Map<String, JsonValue>,
}

impl Document {
    /// Build from a decoded response body.
    pub fn from_body(body: Map<String, JsonValue>) -> Result<Self> {
        let id = string_field(&body, "_id")?;
        let rev = string_field(&body, "_rev")?;
        Ok(Self { id, rev, body })
    }

    /// Look up a field of the body.
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.body.get(field)
    }
}

/// Result of a document write or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub id: String,
    /// Revision created by the write (the tombstone revision for deletes)
    pub rev: String,
    /// 201 when committed, 202 when accepted but not yet durable
    pub status: u16,
}

/// Result of index creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexResult {
    /// `"created"` or `"exists"`
    pub result: String,
    /// Design document id holding the index
    pub id: String,
    pub name: String,
}

impl IndexResult {
    /// True when the index was newly created.
    pub fn created(&self) -> bool {
        self.result == "created"
    }
}

/// One row of a streamed response.
///
/// View rows carry `id`, `key`, `value` (and `doc` with `include_docs`);
/// reduced rows carry `key` and `value`; find rows are the matching documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(pub Map<String, JsonValue>);

impl Row {
    /// Wrap a decoded row, which must be a JSON object.
    pub fn from_json(value: JsonValue) -> Result<Self> {
        match value {
            JsonValue::Object(map) => Ok(Row(map)),
            other => Err(Error::decoding(format!(
                "expected row object, found {}",
                json_type_name(&other)
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    /// Document id of a view row, or `_id` of a find row.
    pub fn id(&self) -> Option<&str> {
        self.get("id")
            .or_else(|| self.get("_id"))
            .and_then(JsonValue::as_str)
    }

    pub fn key(&self) -> Option<&JsonValue> {
        self.get("key")
    }

    pub fn value(&self) -> Option<&JsonValue> {
        self.get("value")
    }

    /// Embedded document of a view row queried with `include_docs`.
    pub fn doc(&self) -> Option<&Map<String, JsonValue>> {
        self.get("doc").and_then(JsonValue::as_object)
    }

    pub fn into_inner(self) -> Map<String, JsonValue> {
        self.0
    }
}

/// Summary of a completed row stream.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowsSummary {
    /// Rows delivered to the caller
    pub rows: u64,
    /// `total_rows` reported by a view
    pub total_rows: Option<u64>,
    /// `offset` reported by a view
    pub offset: Option<u64>,
    /// Continuation token reported by a find
    pub bookmark: Option<String>,
    /// Advisory message from the server, e.g. no matching index
    pub warning: Option<String>,
}

/// Successful result of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    /// `GetDocument`
    Document(Document),
    /// `PutDocument`, `DeleteDocument`
    Write(WriteResult),
    /// `QueryView`, `FindDocuments`, `ListIndexes`
    Rows(RowsSummary),
    /// `CreateIndex`
    Index(IndexResult),
    /// `DeleteIndex`, `CreateDatabase`, `DeleteDatabase`
    Acknowledged { status: u16 },
}

impl Outcome {
    pub fn into_document(self) -> Option<Document> {
        match self {
            Outcome::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn into_write(self) -> Option<WriteResult> {
        match self {
            Outcome::Write(write) => Some(write),
            _ => None,
        }
    }

    pub fn into_rows(self) -> Option<RowsSummary> {
        match self {
            Outcome::Rows(summary) => Some(summary),
            _ => None,
        }
    }

    pub fn into_index(self) -> Option<IndexResult> {
        match self {
            Outcome::Index(index) => Some(index),
            _ => None,
        }
    }
}

/// Terminal signal of an operation.
///
/// Rows delivered before a failure stay delivered: `rows_delivered` counts
/// them whether the outcome is a success or an error. Rows left buffered when
/// a handle is finished are not counted.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub outcome: Result<Outcome>,
    pub rows_delivered: u64,
}

impl Completion {
    pub fn success(outcome: Outcome, rows_delivered: u64) -> Self {
        Self {
            outcome: Ok(outcome),
            rows_delivered,
        }
    }

    pub fn failure(error: Error, rows_delivered: u64) -> Self {
        Self {
            outcome: Err(error),
            rows_delivered,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&Error> {
        self.outcome.as_ref().err()
    }

    /// A failure after some rows were already delivered.
    pub fn is_partial(&self) -> bool {
        self.outcome.is_err() && self.rows_delivered > 0
    }

    /// Convert into the plain result, dropping the row count.
    pub fn into_result(self) -> Result<Outcome> {
        self.outcome
    }
}

fn string_field(body: &Map<String, JsonValue>, field: &str) -> Result<String> {
    body.get(field)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::decoding(format!("response is missing string field '{}'", field)))
}

pub(crate) fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: JsonValue) -> Map<String, JsonValue> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_document_from_body() {
        let doc = Document::from_body(object(json!({"_id": "a", "_rev": "1-x", "n": 1}))).unwrap();
        assert_eq!(doc.id, "a");
        assert_eq!(doc.rev, "1-x");
        assert_eq!(doc.get("n"), Some(&json!(1)));
    }

    #[test]
    fn test_document_missing_rev_is_decoding_error() {
        let err = Document::from_body(object(json!({"_id": "a"}))).unwrap_err();
        assert!(matches!(err, Error::Decoding { .. }));
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::from_json(json!({
            "id": "doc1", "key": ["a", "b"], "value": 3, "doc": {"_id": "doc1"}
        }))
        .unwrap();
        assert_eq!(row.id(), Some("doc1"));
        assert_eq!(row.key(), Some(&json!(["a", "b"])));
        assert_eq!(row.value(), Some(&json!(3)));
        assert!(row.doc().is_some());

        let find_row = Row::from_json(json!({"_id": "doc2", "name": "x"})).unwrap();
        assert_eq!(find_row.id(), Some("doc2"));
    }

    #[test]
    fn test_row_must_be_object() {
        let err = Row::from_json(json!([1])).unwrap_err();
        assert_eq!(err, Error::decoding("expected row object, found array"));
    }

    #[test]
    fn test_partial_completion() {
        let c = Completion::failure(Error::decoding("eof"), 3);
        assert!(c.is_partial());
        assert!(!Completion::failure(Error::Cancelled, 0).is_partial());
        assert!(!Completion::success(Outcome::Rows(RowsSummary::default()), 3).is_partial());
    }
}
