//! Query parameter encoding.
//!
//! Each parameter an operation can send is described by a [`ParamSpec`]:
//! its wire name, when it is left out, and how its value is written. The
//! tables below list every parameter per operation in ascending wire-name
//! order, so the same operation always produces the same query string.
//!
//! | Rule | Omitted when |
//! |------|--------------|
//! | `IfFalse` | the flag is `false` |
//! | `IfNegative` | the integer is below zero |
//! | `IfNone` | the value is unset |
//! | `Never` | never; an unset value is a validation error |
//!
//! Structured values (view keys) are JSON-encoded before URL encoding.
//! Selectors and other bodies never appear in the query string.

use settee_core::{
    DeleteDocument, Error, GetDocument, Operation, PutDocument, QueryView, Result, ViewKey,
};

/// When a parameter is left out of the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Omit {
    IfFalse,
    IfNegative,
    IfNone,
    Never,
}

/// How a parameter value is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEncoding {
    /// The value as-is
    Raw,
    /// The value as JSON text
    Json,
}

/// Encoding policy for one query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub omit: Omit,
    pub encoding: WireEncoding,
}

/// A typed parameter value handed to [`ParamSpec::encode`].
#[derive(Debug, Clone, Copy)]
pub enum ParamValue<'a> {
    Bool(bool),
    Int(i64),
    Text(Option<&'a str>),
    Key(Option<&'a ViewKey>),
    Keys(Option<&'a [ViewKey]>),
    /// A fixed literal, `None` when the enumerated value is the default
    Token(Option<&'static str>),
}

impl ParamValue<'_> {
    fn is_unset(&self) -> bool {
        matches!(
            self,
            ParamValue::Text(None)
                | ParamValue::Key(None)
                | ParamValue::Keys(None)
                | ParamValue::Token(None)
        )
    }
}

/// An encoded `name=value` pair, before URL escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub name: &'static str,
    pub value: String,
}

impl ParamSpec {
    /// A boolean flag sent only when `true`.
    pub const fn flag(name: &'static str) -> Self {
        Self {
            name,
            omit: Omit::IfFalse,
            encoding: WireEncoding::Raw,
        }
    }

    /// An integer sent only when zero or positive.
    pub const fn count(name: &'static str) -> Self {
        Self {
            name,
            omit: Omit::IfNegative,
            encoding: WireEncoding::Raw,
        }
    }

    /// An optional string sent verbatim.
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            omit: Omit::IfNone,
            encoding: WireEncoding::Raw,
        }
    }

    /// An optional value sent as JSON.
    pub const fn json(name: &'static str) -> Self {
        Self {
            name,
            omit: Omit::IfNone,
            encoding: WireEncoding::Json,
        }
    }

    /// A required string sent verbatim.
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            omit: Omit::Never,
            encoding: WireEncoding::Raw,
        }
    }

    /// Encode `value` under this policy.
    ///
    /// Returns `Ok(None)` when the policy omits the value.
    pub fn encode(&self, value: ParamValue<'_>) -> Result<Option<QueryParam>> {
        let omitted = match (self.omit, &value) {
            (Omit::IfFalse, ParamValue::Bool(b)) => !*b,
            (Omit::IfNegative, ParamValue::Int(n)) => *n < 0,
            (Omit::IfNone, v) if v.is_unset() => true,
            (Omit::IfNone, _) => false,
            (Omit::Never, v) if v.is_unset() => {
                return Err(Error::validation(format!(
                    "parameter '{}' is required",
                    self.name
                )))
            }
            (Omit::Never, _) => false,
            (omit, v) => {
                return Err(Error::validation(format!(
                    "parameter '{}': rule {:?} does not apply to {:?}",
                    self.name, omit, v
                )))
            }
        };
        if omitted {
            return Ok(None);
        }

        let value = match (self.encoding, value) {
            (_, ParamValue::Bool(b)) => b.to_string(),
            (_, ParamValue::Int(n)) => n.to_string(),
            (WireEncoding::Raw, ParamValue::Text(Some(s))) => s.to_string(),
            (WireEncoding::Json, ParamValue::Text(Some(s))) => json_text(s),
            (WireEncoding::Json, ParamValue::Key(Some(key))) => key.to_json_string(),
            (WireEncoding::Json, ParamValue::Keys(Some(keys))) => {
                ViewKey::Array(keys.to_vec()).to_json_string()
            }
            (_, ParamValue::Token(Some(token))) => token.to_string(),
            (WireEncoding::Raw, ParamValue::Key(_) | ParamValue::Keys(_)) => {
                return Err(Error::validation(format!(
                    "parameter '{}': keys must be JSON-encoded",
                    self.name
                )))
            }
            // Unset values were handled by the omission rules above.
            (_, v) => {
                return Err(Error::validation(format!(
                    "parameter '{}': no value to encode in {:?}",
                    self.name, v
                )))
            }
        };
        Ok(Some(QueryParam {
            name: self.name,
            value,
        }))
    }
}

fn json_text(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

// =============================================================================
// Parameter tables
// =============================================================================

/// View query parameters, ascending by wire name.
pub mod view {
    use super::ParamSpec;

    pub const DESCENDING: ParamSpec = ParamSpec::flag("descending");
    pub const END_KEY: ParamSpec = ParamSpec::json("endkey");
    pub const END_KEY_DOC_ID: ParamSpec = ParamSpec::json("endkey_docid");
    pub const GROUP: ParamSpec = ParamSpec::flag("group");
    pub const GROUP_LEVEL: ParamSpec = ParamSpec::count("group_level");
    pub const INCLUDE_DOCS: ParamSpec = ParamSpec::flag("include_docs");
    pub const INCLUSIVE_END: ParamSpec = ParamSpec::flag("inclusive_end");
    pub const KEY: ParamSpec = ParamSpec::json("key");
    pub const KEYS: ParamSpec = ParamSpec::json("keys");
    pub const LIMIT: ParamSpec = ParamSpec::count("limit");
    pub const REDUCE: ParamSpec = ParamSpec::flag("reduce");
    pub const SKIP: ParamSpec = ParamSpec::count("skip");
    pub const STALE: ParamSpec = ParamSpec::text("stale");
    pub const START_KEY: ParamSpec = ParamSpec::json("startkey");
    pub const START_KEY_DOC_ID: ParamSpec = ParamSpec::json("startkey_docid");
}

/// Single-document parameters, ascending by wire name.
pub mod document {
    use super::ParamSpec;

    pub const CONFLICTS: ParamSpec = ParamSpec::flag("conflicts");
    pub const REV: ParamSpec = ParamSpec::text("rev");
    pub const REQUIRED_REV: ParamSpec = ParamSpec::required("rev");
    pub const REVS: ParamSpec = ParamSpec::flag("revs");
}

fn collect(pairs: &[(ParamSpec, ParamValue<'_>)]) -> Result<Vec<QueryParam>> {
    let mut params = Vec::with_capacity(pairs.len());
    for (spec, value) in pairs {
        if let Some(param) = spec.encode(*value)? {
            params.push(param);
        }
    }
    Ok(params)
}

/// Query parameters for a view query.
pub fn view_params(q: &QueryView) -> Result<Vec<QueryParam>> {
    collect(&[
        (view::DESCENDING, ParamValue::Bool(q.descending)),
        (view::END_KEY, ParamValue::Key(q.end_key.as_ref())),
        (view::END_KEY_DOC_ID, ParamValue::Text(q.end_key_doc_id.as_deref())),
        (view::GROUP, ParamValue::Bool(q.group)),
        (view::GROUP_LEVEL, ParamValue::Int(q.group_level)),
        (view::INCLUDE_DOCS, ParamValue::Bool(q.include_docs)),
        (view::INCLUSIVE_END, ParamValue::Bool(q.inclusive_end)),
        (view::KEY, ParamValue::Key(q.key.as_ref())),
        (view::KEYS, ParamValue::Keys(q.keys.as_deref())),
        (view::LIMIT, ParamValue::Int(q.limit)),
        (view::REDUCE, ParamValue::Bool(q.reduce)),
        (view::SKIP, ParamValue::Int(q.skip)),
        (view::STALE, ParamValue::Token(q.stale.token())),
        (view::START_KEY, ParamValue::Key(q.start_key.as_ref())),
        (view::START_KEY_DOC_ID, ParamValue::Text(q.start_key_doc_id.as_deref())),
    ])
}

fn get_params(op: &GetDocument) -> Result<Vec<QueryParam>> {
    collect(&[
        (document::CONFLICTS, ParamValue::Bool(op.conflicts)),
        (document::REV, ParamValue::Text(op.rev.as_deref())),
        (document::REVS, ParamValue::Bool(op.revs)),
    ])
}

fn put_params(op: &PutDocument) -> Result<Vec<QueryParam>> {
    collect(&[(document::REV, ParamValue::Text(op.rev.as_deref()))])
}

fn delete_params(op: &DeleteDocument) -> Result<Vec<QueryParam>> {
    collect(&[(document::REQUIRED_REV, ParamValue::Text(Some(op.rev.as_str())))])
}

/// Query parameters for any operation, in a fixed order.
pub fn query_params(op: &Operation) -> Result<Vec<QueryParam>> {
    match op {
        Operation::GetDocument(op) => get_params(op),
        Operation::PutDocument(op) => put_params(op),
        Operation::DeleteDocument(op) => delete_params(op),
        Operation::QueryView(q) => view_params(q),
        Operation::FindDocuments(_)
        | Operation::CreateIndex(_)
        | Operation::DeleteIndex(_)
        | Operation::ListIndexes
        | Operation::CreateDatabase
        | Operation::DeleteDatabase => Ok(Vec::new()),
    }
}
