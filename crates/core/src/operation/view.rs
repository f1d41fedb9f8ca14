//! Map/reduce view queries.

use crate::ident::{design_name, require_name};
use crate::key::{Stale, ViewKey};
use crate::{Error, Result};

/// Sentinel for integer parameters that are left to the server.
pub const UNSET: i64 = -1;

/// Query a map/reduce view.
///
/// Integer parameters (`limit`, `skip`, `group_level`) are omitted from the
/// request when negative; unset booleans are omitted; omitted parameters
/// take the server's default.
///
/// Returns: a row per view row (or per group for reduced views), then
/// `Outcome::Rows`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryView {
    /// Design document holding the view, with or without `_design/`.
    pub ddoc: String,
    /// View name.
    pub view: String,
    pub descending: bool,
    pub end_key: Option<ViewKey>,
    pub end_key_doc_id: Option<String>,
    pub group: bool,
    pub group_level: i64,
    pub include_docs: bool,
    pub inclusive_end: bool,
    pub key: Option<ViewKey>,
    pub keys: Option<Vec<ViewKey>>,
    pub limit: i64,
    pub reduce: bool,
    pub skip: i64,
    pub stale: Stale,
    pub start_key: Option<ViewKey>,
    pub start_key_doc_id: Option<String>,
}

impl QueryView {
    /// Query `view` in design document `ddoc` with every parameter unset.
    pub fn new(ddoc: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            ddoc: ddoc.into(),
            view: view.into(),
            descending: false,
            end_key: None,
            end_key_doc_id: None,
            group: false,
            group_level: UNSET,
            include_docs: false,
            inclusive_end: false,
            key: None,
            keys: None,
            limit: UNSET,
            reduce: false,
            skip: UNSET,
            stale: Stale::No,
            start_key: None,
            start_key_doc_id: None,
        }
    }

    /// Design document name without the `_design/` prefix.
    pub fn design_name(&self) -> &str {
        design_name(&self.ddoc)
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn end_key(mut self, key: impl Into<ViewKey>) -> Self {
        self.end_key = Some(key.into());
        self
    }

    pub fn end_key_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.end_key_doc_id = Some(doc_id.into());
        self
    }

    pub fn group(mut self, group: bool) -> Self {
        self.group = group;
        self
    }

    /// Group by the first `level` elements of complex keys. Negative leaves
    /// the level to the server.
    pub fn group_level(mut self, level: i64) -> Self {
        self.group_level = level;
        self
    }

    pub fn include_docs(mut self, include_docs: bool) -> Self {
        self.include_docs = include_docs;
        self
    }

    pub fn inclusive_end(mut self, inclusive_end: bool) -> Self {
        self.inclusive_end = inclusive_end;
        self
    }

    /// Only rows matching `key`. Cannot be combined with [`keys`](Self::keys).
    pub fn key(mut self, key: impl Into<ViewKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Only rows matching one of `keys`, in the order given.
    pub fn keys<K: Into<ViewKey>>(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Maximum number of rows. Negative means no limit.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn reduce(mut self, reduce: bool) -> Self {
        self.reduce = reduce;
        self
    }

    /// Rows to skip. Negative leaves it to the server.
    pub fn skip(mut self, skip: i64) -> Self {
        self.skip = skip;
        self
    }

    pub fn stale(mut self, stale: Stale) -> Self {
        self.stale = stale;
        self
    }

    pub fn start_key(mut self, key: impl Into<ViewKey>) -> Self {
        self.start_key = Some(key.into());
        self
    }

    pub fn start_key_doc_id(mut self, doc_id: impl Into<String>) -> Self {
        self.start_key_doc_id = Some(doc_id.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_name("design document name", self.design_name())?;
        require_name("view name", &self.view)?;
        if self.key.is_some() && self.keys.is_some() {
            return Err(Error::validation("key and keys cannot both be set"));
        }
        if self.include_docs && self.reduce {
            return Err(Error::validation(
                "include_docs cannot be used with reduce",
            ));
        }
        Ok(())
    }
}
