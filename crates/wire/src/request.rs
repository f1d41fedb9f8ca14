//! Building wire requests from operations.
//!
//! [`RequestBuilder::build`] validates the operation, resolves its path
//! against the database, encodes its query parameters and attaches headers
//! and body. Any failure here happens before a request exists, so nothing is
//! ever sent for an invalid operation.

use serde_json::Value as JsonValue;
use settee_core::ident::{is_dot_segment, split_doc_id};
use settee_core::{Error, Operation, Result};
use url::Url;

use crate::context::DatabaseContext;
use crate::params::{query_params, QueryParam};

/// HTTP method of a wire request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully encoded request, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl WireRequest {
    /// Percent-encoded path.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Encoded query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// Decoded query parameters in wire order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// First header with `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Request body decoded as JSON.
    pub fn json_body(&self) -> Option<JsonValue> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_slice(b).ok())
    }
}

/// Builds [`WireRequest`]s for one database.
pub struct RequestBuilder<'a> {
    db: &'a DatabaseContext,
}

impl<'a> RequestBuilder<'a> {
    pub fn new(db: &'a DatabaseContext) -> Self {
        Self { db }
    }

    /// Validate `op` and encode it as a request.
    pub fn build(&self, op: &Operation) -> Result<WireRequest> {
        op.validate()?;

        let (method, segments) = route(op)?;
        let body = body(op)?;
        let params = query_params(op)?;
        let url = self.url(&segments, &params)?;

        let client = self.db.client();
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if let Some(credentials) = client.credentials() {
            headers.push(("Authorization".to_string(), credentials.header_value()));
        }
        headers.extend(client.default_headers().iter().cloned());

        Ok(WireRequest {
            method,
            url,
            headers,
            body,
        })
    }

    fn url(&self, segments: &[&str], params: &[QueryParam]) -> Result<Url> {
        // `extend` drops dot segments instead of encoding them.
        if let Some(dot) = segments.iter().find(|s| is_dot_segment(s)) {
            return Err(Error::validation(format!(
                "path segment '{}' is not allowed",
                dot
            )));
        }
        let mut url = self.db.client().base_url().clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| Error::config("server URL cannot be a base"))?;
            path.pop_if_empty();
            path.push(self.db.name());
            // Each identifier is one segment: a '/' inside it is escaped.
            path.extend(segments);
        }
        if params.is_empty() {
            url.set_query(None);
        } else {
            let mut query = url.query_pairs_mut();
            query.clear();
            for param in params {
                query.append_pair(param.name, &param.value);
            }
        }
        Ok(url)
    }
}

/// Method and path segments below the database.
fn route(op: &Operation) -> Result<(Method, Vec<&str>)> {
    let routed = match op {
        Operation::GetDocument(op) => (Method::Get, split_doc_id(&op.doc_id)?.segments()),
        Operation::PutDocument(op) => (Method::Put, split_doc_id(&op.doc_id)?.segments()),
        Operation::DeleteDocument(op) => (Method::Delete, split_doc_id(&op.doc_id)?.segments()),
        Operation::QueryView(q) => (
            Method::Get,
            vec!["_design", q.design_name(), "_view", q.view.as_str()],
        ),
        Operation::FindDocuments(_) => (Method::Post, vec!["_find"]),
        Operation::CreateIndex(_) => (Method::Post, vec!["_index"]),
        Operation::DeleteIndex(op) => (
            Method::Delete,
            vec![
                "_index",
                op.design_name(),
                op.index_type.as_str(),
                op.name.as_str(),
            ],
        ),
        Operation::ListIndexes => (Method::Get, vec!["_index"]),
        Operation::CreateDatabase => (Method::Put, Vec::new()),
        Operation::DeleteDatabase => (Method::Delete, Vec::new()),
    };
    Ok(routed)
}

/// JSON body for the operations that declare one.
fn body(op: &Operation) -> Result<Option<Vec<u8>>> {
    let value = match op {
        Operation::PutDocument(op) => op.body.clone(),
        Operation::FindDocuments(op) => op.body(),
        Operation::CreateIndex(op) => op.body(),
        _ => return Ok(None),
    };
    serde_json::to_vec(&value)
        .map(Some)
        .map_err(|e| Error::validation(format!("request body is not serializable: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ClientContext, Credentials};
    use serde_json::json;
    use settee_core::{
        CreateIndex, DeleteDocument, DeleteIndex, FindDocuments, GetDocument, IndexType,
        PutDocument, QueryView, Stale,
    };
    use std::sync::Arc;

    fn db() -> DatabaseContext {
        let client = ClientContext::new("http://localhost:5984")
            .unwrap()
            .with_credentials(Credentials::basic("user", "pass"))
            .with_header("User-Agent", "settee-test");
        DatabaseContext::new(Arc::new(client), "animals").unwrap()
    }

    fn build(op: impl Into<Operation>) -> Result<WireRequest> {
        let db = db();
        RequestBuilder::new(&db).build(&op.into())
    }

    #[test]
    fn test_get_document_request() {
        let req = build(GetDocument::new("aardvark")).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.url.as_str(), "http://localhost:5984/animals/aardvark");
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.header("Authorization"), Some("Basic dXNlcjpwYXNz"));
        assert_eq!(req.header("user-agent"), Some("settee-test"));
        assert!(req.header("Content-Type").is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn test_dot_identifiers_never_reach_the_database_path() {
        let err = build(DeleteDocument::new("..", "1-a")).unwrap_err();
        assert!(err.is_validation());
        let err = build(PutDocument::new("..", json!({}))).unwrap_err();
        assert!(err.is_validation());
        let err = build(GetDocument::new(".")).unwrap_err();
        assert!(err.is_validation());
        let err = build(GetDocument::new("_local/..")).unwrap_err();
        assert!(err.is_validation());
        let err = build(QueryView::new("..", "v")).unwrap_err();
        assert!(err.is_validation());
        let err = build(QueryView::new("zoo", ".")).unwrap_err();
        assert!(err.is_validation());
        let err = build(DeleteIndex::new("_design/..", "idx", IndexType::Json)).unwrap_err();
        assert!(err.is_validation());
        let err = build(DeleteIndex::new("idx", "..", IndexType::Json)).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_url_rejects_dot_segments() {
        let db = db();
        let builder = RequestBuilder::new(&db);
        assert!(builder.url(&[".."], &[]).unwrap_err().is_validation());
        assert!(builder.url(&["_design", "."], &[]).unwrap_err().is_validation());
        let url = builder.url(&["..."], &[]).unwrap();
        assert_eq!(url.path(), "/animals/...");
    }

    #[test]
    fn test_doc_id_slash_is_escaped() {
        let req = build(GetDocument::new("a/b c")).unwrap();
        assert_eq!(req.path(), "/animals/a%2Fb%20c");
    }

    #[test]
    fn test_design_doc_id_keeps_prefix_segment() {
        let req = build(GetDocument::new("_design/zoo")).unwrap();
        assert_eq!(req.path(), "/animals/_design/zoo");
    }

    #[test]
    fn test_put_document_has_json_body() {
        let req = build(PutDocument::new("doc", json!({"name": "x"})).rev("1-a")).unwrap();
        assert_eq!(req.method, Method::Put);
        assert_eq!(req.query(), Some("rev=1-a"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.json_body(), Some(json!({"name": "x"})));
    }

    #[test]
    fn test_delete_document_request() {
        let req = build(DeleteDocument::new("doc", "2-b")).unwrap();
        assert_eq!(req.method, Method::Delete);
        assert_eq!(req.url.as_str(), "http://localhost:5984/animals/doc?rev=2-b");
    }

    #[test]
    fn test_view_request_path_and_query() {
        let q = QueryView::new("_design/zoo", "by_class")
            .key(vec!["mammal", "big cat"])
            .limit(5)
            .stale(Stale::Ok);
        let req = build(q).unwrap();
        assert_eq!(req.path(), "/animals/_design/zoo/_view/by_class");
        assert_eq!(
            req.query_pairs(),
            vec![
                ("key".to_string(), "[\"mammal\",\"big cat\"]".to_string()),
                ("limit".to_string(), "5".to_string()),
                ("stale".to_string(), "ok".to_string()),
            ]
        );
        // JSON punctuation is escaped for the query string.
        assert_eq!(
            req.query(),
            Some("key=%5B%22mammal%22%2C%22big+cat%22%5D&limit=5&stale=ok")
        );
    }

    #[test]
    fn test_key_and_keys_rejected_before_building() {
        let q = QueryView::new("zoo", "v").key("a").keys(vec!["b"]);
        assert!(build(q).unwrap_err().is_validation());
    }

    #[test]
    fn test_find_request() {
        let req = build(FindDocuments::new(json!({"class": "bird"})).limit(3)).unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.path(), "/animals/_find");
        assert!(req.query().is_none());
        assert_eq!(
            req.json_body(),
            Some(json!({"selector": {"class": "bird"}, "limit": 3}))
        );
    }

    #[test]
    fn test_index_requests() {
        let req = build(CreateIndex::json([json!("class")]).name("by-class")).unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.path(), "/animals/_index");

        let req = build(DeleteIndex::new("_design/idx", "by-class", IndexType::Text)).unwrap();
        assert_eq!(req.method, Method::Delete);
        assert_eq!(req.path(), "/animals/_index/idx/text/by-class");

        let req = RequestBuilder::new(&db()).build(&Operation::ListIndexes).unwrap();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.path(), "/animals/_index");
    }

    #[test]
    fn test_database_requests() {
        let db = db();
        let builder = RequestBuilder::new(&db);
        let req = builder.build(&Operation::CreateDatabase).unwrap();
        assert_eq!((req.method, req.path()), (Method::Put, "/animals"));
        let req = builder.build(&Operation::DeleteDatabase).unwrap();
        assert_eq!((req.method, req.path()), (Method::Delete, "/animals"));
    }

    #[test]
    fn test_base_path_prefix_preserved() {
        let client = ClientContext::new("https://proxy.example.com/couch/").unwrap();
        let db = DatabaseContext::new(Arc::new(client), "a/b").unwrap();
        let req = RequestBuilder::new(&db)
            .build(&GetDocument::new("doc").into())
            .unwrap();
        assert_eq!(req.url.as_str(), "https://proxy.example.com/couch/a%2Fb/doc");
    }

    #[test]
    fn test_build_is_deterministic() {
        let q = QueryView::new("zoo", "v")
            .start_key("a")
            .end_key(vec!["z"])
            .descending(true)
            .limit(2);
        let db = db();
        let builder = RequestBuilder::new(&db);
        let op: Operation = q.into();
        assert_eq!(builder.build(&op).unwrap(), builder.build(&op).unwrap());
    }
}
