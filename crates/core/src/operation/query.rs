//! Selector queries and query indexes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::ident::{design_name, require_name};
use crate::{Error, Result};

/// Find documents matching a selector.
///
/// Returns: one row per matching document, then `Outcome::Rows` carrying the
/// bookmark for the next page.
#[derive(Debug, Clone, PartialEq)]
pub struct FindDocuments {
    /// Selector expression. Must be a JSON object.
    pub selector: JsonValue,
    /// Fields to return. All fields when empty.
    pub fields: Vec<String>,
    /// Sort specification: field names or `{field: "asc"|"desc"}` objects.
    pub sort: Vec<JsonValue>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    /// Resume from a previous page.
    pub bookmark: Option<String>,
    /// Design document (and optionally index name) to use.
    pub use_index: Option<String>,
    /// Read quorum.
    pub r: Option<u32>,
}

impl FindDocuments {
    pub fn new(selector: JsonValue) -> Self {
        Self {
            selector,
            fields: Vec::new(),
            sort: Vec::new(),
            limit: None,
            skip: None,
            bookmark: None,
            use_index: None,
            r: None,
        }
    }

    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn sort(mut self, sort: impl IntoIterator<Item = JsonValue>) -> Self {
        self.sort = sort.into_iter().collect();
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn bookmark(mut self, bookmark: impl Into<String>) -> Self {
        self.bookmark = Some(bookmark.into());
        self
    }

    pub fn use_index(mut self, index: impl Into<String>) -> Self {
        self.use_index = Some(index.into());
        self
    }

    pub fn r(mut self, r: u32) -> Self {
        self.r = Some(r);
        self
    }

    /// The request body sent to `_find`.
    pub fn body(&self) -> JsonValue {
        let mut body = Map::new();
        body.insert("selector".into(), self.selector.clone());
        if !self.fields.is_empty() {
            body.insert("fields".into(), JsonValue::from(self.fields.clone()));
        }
        if !self.sort.is_empty() {
            body.insert("sort".into(), JsonValue::Array(self.sort.clone()));
        }
        if let Some(limit) = self.limit {
            body.insert("limit".into(), JsonValue::from(limit));
        }
        if let Some(skip) = self.skip {
            body.insert("skip".into(), JsonValue::from(skip));
        }
        if let Some(bookmark) = &self.bookmark {
            body.insert("bookmark".into(), JsonValue::from(bookmark.as_str()));
        }
        if let Some(index) = &self.use_index {
            body.insert("use_index".into(), JsonValue::from(index.as_str()));
        }
        if let Some(r) = self.r {
            body.insert("r".into(), JsonValue::from(r));
        }
        JsonValue::Object(body)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.selector.is_object() {
            return Err(Error::validation("selector must be a JSON object"));
        }
        if self.fields.iter().any(|f| f.is_empty()) {
            return Err(Error::validation("field names must not be empty"));
        }
        for entry in &self.sort {
            validate_sort_entry(entry)?;
        }
        if let Some(bookmark) = &self.bookmark {
            require_name("bookmark", bookmark)?;
        }
        if self.r == Some(0) {
            return Err(Error::validation("read quorum must be at least 1"));
        }
        Ok(())
    }
}

fn validate_sort_entry(entry: &JsonValue) -> Result<()> {
    match entry {
        JsonValue::String(field) if !field.is_empty() => Ok(()),
        JsonValue::Object(map) if map.len() == 1 => {
            let (field, direction) = map
                .iter()
                .next()
                .ok_or_else(|| Error::validation("empty sort entry"))?;
            match direction.as_str() {
                Some("asc") | Some("desc") if !field.is_empty() => Ok(()),
                _ => Err(Error::validation(format!(
                    "sort direction for '{}' must be \"asc\" or \"desc\"",
                    field
                ))),
            }
        }
        other => Err(Error::validation(format!(
            "sort entry {} must be a field name or a single-field object",
            other
        ))),
    }
}

/// Index type for query indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    #[default]
    Json,
    Text,
}

impl IndexType {
    /// Literal used in request bodies and index paths.
    pub fn as_str(self) -> &'static str {
        match self {
            IndexType::Json => "json",
            IndexType::Text => "text",
        }
    }
}

/// Settings for the default field of a text index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultField {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
}

/// Create a query index.
///
/// Returns: `Outcome::Index`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateIndex {
    /// Index name. The server generates one when unset.
    pub name: Option<String>,
    /// Design document to place the index in. The server generates one when unset.
    pub ddoc: Option<String>,
    pub index_type: IndexType,
    /// Fields to index.
    pub fields: Vec<JsonValue>,
    /// Text indexes only.
    pub default_field: Option<DefaultField>,
    /// Partial index selector.
    pub selector: Option<JsonValue>,
}

impl CreateIndex {
    /// A JSON index over `fields`.
    pub fn json(fields: impl IntoIterator<Item = JsonValue>) -> Self {
        Self {
            index_type: IndexType::Json,
            fields: fields.into_iter().collect(),
            ..Self::default()
        }
    }

    /// A text index over `fields` (every field when empty).
    pub fn text(fields: impl IntoIterator<Item = JsonValue>) -> Self {
        Self {
            index_type: IndexType::Text,
            fields: fields.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn ddoc(mut self, ddoc: impl Into<String>) -> Self {
        self.ddoc = Some(ddoc.into());
        self
    }

    pub fn default_field(mut self, default_field: DefaultField) -> Self {
        self.default_field = Some(default_field);
        self
    }

    pub fn selector(mut self, selector: JsonValue) -> Self {
        self.selector = Some(selector);
        self
    }

    /// The request body sent to `_index`.
    pub fn body(&self) -> JsonValue {
        let mut index = Map::new();
        if !self.fields.is_empty() || self.index_type == IndexType::Json {
            index.insert("fields".into(), JsonValue::Array(self.fields.clone()));
        }
        if let Some(default_field) = &self.default_field {
            index.insert(
                "default_field".into(),
                serde_json::to_value(default_field).unwrap_or(JsonValue::Null),
            );
        }
        if let Some(selector) = &self.selector {
            index.insert("selector".into(), selector.clone());
        }

        let mut body = Map::new();
        body.insert("index".into(), JsonValue::Object(index));
        body.insert("type".into(), JsonValue::from(self.index_type.as_str()));
        if let Some(name) = &self.name {
            body.insert("name".into(), JsonValue::from(name.as_str()));
        }
        if let Some(ddoc) = &self.ddoc {
            body.insert("ddoc".into(), JsonValue::from(design_name(ddoc)));
        }
        JsonValue::Object(body)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            require_name("index name", name)?;
        }
        if let Some(ddoc) = &self.ddoc {
            require_name("design document name", design_name(ddoc))?;
        }
        if let Some(selector) = &self.selector {
            if !selector.is_object() {
                return Err(Error::validation("index selector must be a JSON object"));
            }
        }
        match self.index_type {
            IndexType::Json => {
                if self.fields.is_empty() {
                    return Err(Error::validation("a JSON index needs at least one field"));
                }
                if self.default_field.is_some() {
                    return Err(Error::validation(
                        "default_field only applies to text indexes",
                    ));
                }
                for field in &self.fields {
                    validate_sort_entry(field)?;
                }
            }
            IndexType::Text => {
                for field in &self.fields {
                    validate_text_field(field)?;
                }
            }
        }
        Ok(())
    }
}

fn validate_text_field(field: &JsonValue) -> Result<()> {
    let name = field.get("name").and_then(JsonValue::as_str);
    let kind = field.get("type").and_then(JsonValue::as_str);
    match (name, kind) {
        (Some(name), Some("boolean" | "string" | "number")) if !name.is_empty() => Ok(()),
        _ => Err(Error::validation(format!(
            "text index field {} must be {{\"name\", \"type\"}} with type boolean, string or number",
            field
        ))),
    }
}

/// Delete a query index.
///
/// Returns: `Outcome::Acknowledged`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteIndex {
    /// Design document holding the index, with or without `_design/`.
    pub ddoc: String,
    pub name: String,
    pub index_type: IndexType,
}

impl DeleteIndex {
    pub fn new(ddoc: impl Into<String>, name: impl Into<String>, index_type: IndexType) -> Self {
        Self {
            ddoc: ddoc.into(),
            name: name.into(),
            index_type,
        }
    }

    pub fn design_name(&self) -> &str {
        design_name(&self.ddoc)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_name("design document name", self.design_name())?;
        require_name("index name", &self.name)
    }
}
