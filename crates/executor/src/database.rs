//! Database: operations against one named database.
//!
//! The `submit*` methods expose the full operation model. The async helpers
//! below them cover the common cases and return typed results.

use serde_json::Value as JsonValue;
use settee_core::{
    CreateIndex, DeleteDocument, DeleteIndex, Document, Error, FindDocuments, GetDocument,
    IndexResult, IndexType, Operation, Outcome, PutDocument, QueryView, Result, Row, RowsSummary,
    WriteResult,
};
use settee_wire::{DatabaseContext, RequestBuilder, WireRequest};

use crate::dispatcher::{Callbacks, CancelHandle, Dispatcher, OperationHandle, SubmitOptions};

/// A named database on a server.
#[derive(Debug, Clone)]
pub struct Database {
    context: DatabaseContext,
    dispatcher: Dispatcher,
}

impl Database {
    pub(crate) fn new(context: DatabaseContext, dispatcher: Dispatcher) -> Self {
        Self {
            context,
            dispatcher,
        }
    }

    pub fn name(&self) -> &str {
        self.context.name()
    }

    pub fn context(&self) -> &DatabaseContext {
        &self.context
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit an operation; rows and completion arrive on the handle.
    pub fn submit(&self, op: impl Into<Operation>) -> Result<OperationHandle> {
        self.dispatcher.submit(&self.context, op.into())
    }

    pub fn submit_with_options(
        &self,
        op: impl Into<Operation>,
        options: SubmitOptions,
    ) -> Result<OperationHandle> {
        self.dispatcher
            .submit_with_options(&self.context, op.into(), options)
    }

    /// Submit an operation with row and completion callbacks.
    pub fn submit_with(&self, op: impl Into<Operation>, callbacks: Callbacks) -> Result<CancelHandle> {
        self.dispatcher
            .submit_with(&self.context, op.into(), SubmitOptions::default(), callbacks)
    }

    /// The request an operation would send, without sending it.
    pub fn build_request(&self, op: &Operation) -> Result<WireRequest> {
        RequestBuilder::new(&self.context).build(op)
    }

    async fn run(&self, op: impl Into<Operation>) -> Result<Outcome> {
        self.submit(op)?.outcome().await
    }

    async fn run_rows(&self, op: impl Into<Operation>) -> Result<(Vec<Row>, RowsSummary)> {
        let (rows, completion) = self.submit(op)?.collect().await;
        let summary = expect(completion.into_result()?, Outcome::into_rows)?;
        Ok((rows, summary))
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Fetch the latest revision of a document.
    pub async fn get_document(&self, doc_id: &str) -> Result<Document> {
        expect(self.run(GetDocument::new(doc_id)).await?, Outcome::into_document)
    }

    /// Fetch a specific revision of a document.
    pub async fn get_document_at_rev(&self, doc_id: &str, rev: &str) -> Result<Document> {
        expect(
            self.run(GetDocument::new(doc_id).rev(rev)).await?,
            Outcome::into_document,
        )
    }

    /// Create or update a document. Updates carry `_rev` in `body`.
    pub async fn put_document(&self, doc_id: &str, body: JsonValue) -> Result<WriteResult> {
        expect(
            self.run(PutDocument::new(doc_id, body)).await?,
            Outcome::into_write,
        )
    }

    /// Delete revision `rev` of a document.
    pub async fn delete_document(&self, doc_id: &str, rev: &str) -> Result<WriteResult> {
        expect(
            self.run(DeleteDocument::new(doc_id, rev)).await?,
            Outcome::into_write,
        )
    }

    /// Fetch a document from outside the async runtime.
    ///
    /// Blocks the calling thread until the operation completes. A missing
    /// document is `Ok(None)`. Must not be called from an async task: on a
    /// single-threaded runtime the operation could never run.
    pub fn fetch_blocking(&self, doc_id: &str) -> Result<Option<Document>> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.submit_with(
            GetDocument::new(doc_id),
            Callbacks::new(move |completion| {
                let _ = tx.send(completion);
            }),
        )?;
        let completion = rx.recv().map_err(|_| Error::Cancelled)?;
        match completion.into_result() {
            Ok(outcome) => expect(outcome, Outcome::into_document).map(Some),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    // =========================================================================
    // Views and queries
    // =========================================================================

    /// Run a view query and gather its rows.
    pub async fn query_view(&self, query: QueryView) -> Result<(Vec<Row>, RowsSummary)> {
        self.run_rows(query).await
    }

    /// Run a selector query and gather the matching documents.
    pub async fn find_documents(
        &self,
        query: FindDocuments,
    ) -> Result<(Vec<Row>, RowsSummary)> {
        self.run_rows(query).await
    }

    // =========================================================================
    // Indexes
    // =========================================================================

    /// Create a JSON index over `fields`.
    pub async fn create_json_index(
        &self,
        name: Option<&str>,
        fields: impl IntoIterator<Item = JsonValue>,
    ) -> Result<IndexResult> {
        let mut op = CreateIndex::json(fields);
        if let Some(name) = name {
            op = op.name(name);
        }
        expect(self.run(op).await?, Outcome::into_index)
    }

    /// Create a text index over `fields` (`{"name": ..., "type": ...}` objects).
    pub async fn create_text_index(
        &self,
        name: Option<&str>,
        fields: impl IntoIterator<Item = JsonValue>,
    ) -> Result<IndexResult> {
        let mut op = CreateIndex::text(fields);
        if let Some(name) = name {
            op = op.name(name);
        }
        expect(self.run(op).await?, Outcome::into_index)
    }

    pub async fn delete_json_index(&self, ddoc: &str, name: &str) -> Result<()> {
        self.run(DeleteIndex::new(ddoc, name, IndexType::Json))
            .await
            .map(|_| ())
    }

    pub async fn delete_text_index(&self, ddoc: &str, name: &str) -> Result<()> {
        self.run(DeleteIndex::new(ddoc, name, IndexType::Text))
            .await
            .map(|_| ())
    }

    /// List the indexes of this database, one row per index.
    pub async fn list_indexes(&self) -> Result<Vec<Row>> {
        self.run_rows(Operation::ListIndexes)
            .await
            .map(|(rows, _)| rows)
    }

    // =========================================================================
    // Database lifecycle
    // =========================================================================

    /// Create this database on the server.
    pub async fn create(&self) -> Result<()> {
        self.run(Operation::CreateDatabase).await.map(|_| ())
    }

    /// Delete this database and all its documents.
    pub async fn delete(&self) -> Result<()> {
        self.run(Operation::DeleteDatabase).await.map(|_| ())
    }
}

/// Narrow an outcome to the variant its operation produces.
fn expect<T>(outcome: Outcome, narrow: impl FnOnce(Outcome) -> Option<T>) -> Result<T> {
    narrow(outcome).ok_or_else(|| Error::decoding("operation produced an unexpected outcome"))
}
