//! Identifier rules for databases, documents, design documents and indexes.

use crate::{Error, Result};

/// Prefix of design document ids.
pub const DESIGN_PREFIX: &str = "_design/";

/// Prefix of local (non-replicating) document ids.
pub const LOCAL_PREFIX: &str = "_local/";

/// A document id split into the path segments it occupies.
///
/// `_design/` and `_local/` ids keep their prefix as a separate segment, every
/// other id is a single segment (a `/` inside it is not a path separator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocIdSegments<'a> {
    /// An ordinary document id
    Plain(&'a str),
    /// `_design/{name}`
    Design(&'a str),
    /// `_local/{name}`
    Local(&'a str),
}

impl<'a> DocIdSegments<'a> {
    /// Path segments for this id, in order.
    pub fn segments(&self) -> Vec<&'a str> {
        match *self {
            DocIdSegments::Plain(id) => vec![id],
            DocIdSegments::Design(name) => vec!["_design", name],
            DocIdSegments::Local(name) => vec!["_local", name],
        }
    }
}

/// Validate a database name.
///
/// Names must start with a lowercase letter and contain only lowercase
/// letters, digits and `_ $ ( ) + - /`.
pub fn validate_database_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err(Error::validation("database name must not be empty")),
        Some(c) if !c.is_ascii_lowercase() => {
            return Err(Error::validation(format!(
                "database name '{}' must start with a lowercase letter",
                name
            )))
        }
        Some(_) => {}
    }
    if let Some(bad) = chars.find(|c| {
        !(c.is_ascii_lowercase() || c.is_ascii_digit() || "_$()+-/".contains(*c))
    }) {
        return Err(Error::validation(format!(
            "database name '{}' contains invalid character '{}'",
            name, bad
        )));
    }
    Ok(())
}

/// Classify and validate a document id.
pub fn split_doc_id(id: &str) -> Result<DocIdSegments<'_>> {
    if id.is_empty() {
        return Err(Error::validation("document id must not be empty"));
    }
    if let Some(name) = id.strip_prefix(DESIGN_PREFIX) {
        require_name("design document name", name)?;
        return Ok(DocIdSegments::Design(name));
    }
    if let Some(name) = id.strip_prefix(LOCAL_PREFIX) {
        require_name("local document name", name)?;
        return Ok(DocIdSegments::Local(name));
    }
    if id.starts_with('_') {
        return Err(Error::validation(format!(
            "document id '{}' uses a reserved '_' prefix",
            id
        )));
    }
    reject_dot_segment("document id", id)?;
    Ok(DocIdSegments::Plain(id))
}

/// Strip an optional `_design/` prefix from a design document name.
pub fn design_name(ddoc: &str) -> &str {
    ddoc.strip_prefix(DESIGN_PREFIX).unwrap_or(ddoc)
}

/// Require a non-empty identifier that can stand as one path segment.
pub fn require_name(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(format!("{} must not be empty", what)));
    }
    reject_dot_segment(what, value)
}

/// True for `.` and `..`, which URL parsing collapses instead of encoding.
pub fn is_dot_segment(segment: &str) -> bool {
    segment == "." || segment == ".."
}

fn reject_dot_segment(what: &str, value: &str) -> Result<()> {
    if is_dot_segment(value) {
        return Err(Error::validation(format!(
            "{} '{}' is not a valid path segment",
            what, value
        )));
    }
    Ok(())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn legal_database_names_accepted(name in "[a-z][a-z0-9_$()+/-]{0,40}") {
            prop_assert!(validate_database_name(&name).is_ok());
        }

        #[test]
        fn uppercase_start_rejected(name in "[A-Z][a-z0-9]{0,10}") {
            prop_assert!(validate_database_name(&name).unwrap_err().is_validation());
        }

        #[test]
        fn plain_ids_stay_one_segment(id in "[a-zA-Z0-9][ -~]{0,40}") {
            let segments = split_doc_id(&id).unwrap().segments();
            prop_assert_eq!(segments, vec![id.as_str()]);
        }
    }
}
