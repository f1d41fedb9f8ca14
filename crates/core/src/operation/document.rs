//! Single-document operations.

use serde_json::Value as JsonValue;

use crate::ident::split_doc_id;
use crate::{Error, Result};

/// Fetch one document, optionally at a specific revision.
///
/// Returns: `Outcome::Document`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetDocument {
    /// Id of the document to fetch.
    pub doc_id: String,
    /// Revision to fetch. The latest revision when unset.
    pub rev: Option<String>,
    /// Include the document's revision history (`revs=true`).
    pub revs: bool,
    /// Include conflicting revisions (`conflicts=true`).
    pub conflicts: bool,
}

impl GetDocument {
    /// Fetch the latest revision of `doc_id`.
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            ..Self::default()
        }
    }

    /// Fetch a specific revision.
    pub fn rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    /// Include revision history.
    pub fn revs(mut self, revs: bool) -> Self {
        self.revs = revs;
        self
    }

    /// Include conflicting revisions.
    pub fn conflicts(mut self, conflicts: bool) -> Self {
        self.conflicts = conflicts;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        split_doc_id(&self.doc_id)?;
        if let Some(rev) = &self.rev {
            validate_rev(rev)?;
        }
        Ok(())
    }
}

/// Create or update a document.
///
/// Creating a document omits `rev`; updating requires the current revision.
/// Returns: `Outcome::Write`
#[derive(Debug, Clone, PartialEq)]
pub struct PutDocument {
    /// Id of the document to write.
    pub doc_id: String,
    /// Current revision when updating.
    pub rev: Option<String>,
    /// Document body. Must be a JSON object.
    pub body: JsonValue,
}

impl PutDocument {
    /// Create `doc_id` with `body`.
    pub fn new(doc_id: impl Into<String>, body: JsonValue) -> Self {
        Self {
            doc_id: doc_id.into(),
            rev: None,
            body,
        }
    }

    /// Update the document at revision `rev`.
    pub fn rev(mut self, rev: impl Into<String>) -> Self {
        self.rev = Some(rev.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        split_doc_id(&self.doc_id)?;
        if let Some(rev) = &self.rev {
            validate_rev(rev)?;
        }
        let body = self
            .body
            .as_object()
            .ok_or_else(|| Error::validation("document body must be a JSON object"))?;
        if let Some(id) = body.get("_id") {
            if id.as_str() != Some(self.doc_id.as_str()) {
                return Err(Error::validation(format!(
                    "body _id {} does not match document id '{}'",
                    id, self.doc_id
                )));
            }
        }
        if let (Some(body_rev), Some(rev)) = (body.get("_rev"), &self.rev) {
            if body_rev.as_str() != Some(rev.as_str()) {
                return Err(Error::validation(format!(
                    "body _rev {} does not match revision '{}'",
                    body_rev, rev
                )));
            }
        }
        Ok(())
    }
}

/// Delete a document at a given revision.
///
/// Returns: `Outcome::Write`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteDocument {
    /// Id of the document to delete.
    pub doc_id: String,
    /// Revision being deleted. Required.
    pub rev: String,
}

impl DeleteDocument {
    /// Delete `doc_id` at `rev`.
    pub fn new(doc_id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            rev: rev.into(),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        split_doc_id(&self.doc_id)?;
        validate_rev(&self.rev)
    }
}

/// Revisions have the form `{generation}-{hash}`.
fn validate_rev(rev: &str) -> Result<()> {
    let valid = match rev.split_once('-') {
        Some((generation, hash)) => {
            !generation.is_empty()
                && generation.bytes().all(|b| b.is_ascii_digit())
                && !hash.is_empty()
        }
        None => false,
    };
    if !valid {
        return Err(Error::validation(format!("malformed revision '{}'", rev)));
    }
    Ok(())
}
