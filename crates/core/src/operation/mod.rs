//! The closed set of operations a database accepts.
//!
//! Every action is a variant of [`Operation`]. Operations are plain data:
//! they carry no callbacks and no connection state, and they are consumed by
//! submission, so they cannot be changed once handed to the dispatcher.
//!
//! | Variant | Method | Path |
//! |---------|--------|------|
//! | `GetDocument` | GET | `/{db}/{docid}` |
//! | `PutDocument` | PUT | `/{db}/{docid}` |
//! | `DeleteDocument` | DELETE | `/{db}/{docid}` |
//! | `QueryView` | GET | `/{db}/_design/{ddoc}/_view/{view}` |
//! | `FindDocuments` | POST | `/{db}/_find` |
//! | `CreateIndex` | POST | `/{db}/_index` |
//! | `DeleteIndex` | DELETE | `/{db}/_index/{ddoc}/{type}/{name}` |
//! | `ListIndexes` | GET | `/{db}/_index` |
//! | `CreateDatabase` | PUT | `/{db}` |
//! | `DeleteDatabase` | DELETE | `/{db}` |

mod document;
mod query;
mod view;

pub use document::{DeleteDocument, GetDocument, PutDocument};
pub use query::{CreateIndex, DefaultField, DeleteIndex, FindDocuments, IndexType};
pub use view::{QueryView, UNSET};

use crate::Result;

/// A database operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    GetDocument(GetDocument),
    PutDocument(PutDocument),
    DeleteDocument(DeleteDocument),
    QueryView(QueryView),
    FindDocuments(FindDocuments),
    CreateIndex(CreateIndex),
    DeleteIndex(DeleteIndex),
    ListIndexes,
    CreateDatabase,
    DeleteDatabase,
}

/// Discriminant of an [`Operation`], used for logging and response handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GetDocument,
    PutDocument,
    DeleteDocument,
    QueryView,
    FindDocuments,
    CreateIndex,
    DeleteIndex,
    ListIndexes,
    CreateDatabase,
    DeleteDatabase,
}

impl OperationKind {
    /// Stable name for logs.
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::GetDocument => "get_document",
            OperationKind::PutDocument => "put_document",
            OperationKind::DeleteDocument => "delete_document",
            OperationKind::QueryView => "query_view",
            OperationKind::FindDocuments => "find_documents",
            OperationKind::CreateIndex => "create_index",
            OperationKind::DeleteIndex => "delete_index",
            OperationKind::ListIndexes => "list_indexes",
            OperationKind::CreateDatabase => "create_database",
            OperationKind::DeleteDatabase => "delete_database",
        }
    }

    /// Operations addressing a single document. A 404 for these means the
    /// document is missing rather than some other resource.
    pub fn targets_document(self) -> bool {
        matches!(
            self,
            OperationKind::GetDocument | OperationKind::PutDocument | OperationKind::DeleteDocument
        )
    }

    /// Operations whose response is a stream of rows.
    pub fn streams_rows(self) -> bool {
        matches!(
            self,
            OperationKind::QueryView | OperationKind::FindDocuments | OperationKind::ListIndexes
        )
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Operation {
    /// The kind of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::GetDocument(_) => OperationKind::GetDocument,
            Operation::PutDocument(_) => OperationKind::PutDocument,
            Operation::DeleteDocument(_) => OperationKind::DeleteDocument,
            Operation::QueryView(_) => OperationKind::QueryView,
            Operation::FindDocuments(_) => OperationKind::FindDocuments,
            Operation::CreateIndex(_) => OperationKind::CreateIndex,
            Operation::DeleteIndex(_) => OperationKind::DeleteIndex,
            Operation::ListIndexes => OperationKind::ListIndexes,
            Operation::CreateDatabase => OperationKind::CreateDatabase,
            Operation::DeleteDatabase => OperationKind::DeleteDatabase,
        }
    }

    /// Check required fields and conflicting settings.
    ///
    /// Nothing is sent for an operation that fails validation.
    pub fn validate(&self) -> Result<()> {
        match self {
            Operation::GetDocument(op) => op.validate(),
            Operation::PutDocument(op) => op.validate(),
            Operation::DeleteDocument(op) => op.validate(),
            Operation::QueryView(op) => op.validate(),
            Operation::FindDocuments(op) => op.validate(),
            Operation::CreateIndex(op) => op.validate(),
            Operation::DeleteIndex(op) => op.validate(),
            Operation::ListIndexes | Operation::CreateDatabase | Operation::DeleteDatabase => Ok(()),
        }
    }
}

macro_rules! impl_from_op {
    ($($ty:ident),* $(,)?) => {
        $(
            impl From<$ty> for Operation {
                fn from(op: $ty) -> Self {
                    Operation::$ty(op)
                }
            }
        )*
    };
}

impl_from_op!(
    GetDocument,
    PutDocument,
    DeleteDocument,
    QueryView,
    FindDocuments,
    CreateIndex,
    DeleteIndex,
);
