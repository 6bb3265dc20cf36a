//! Wire types for the document service API.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A document as returned by the document service.
///
/// Read-only snapshot for one processing pass. `content` is the text the
/// service extracted at ingest time and may be empty for image-only scans.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<u32>,
    #[serde(default)]
    pub correspondent: Option<u32>,
    #[serde(default)]
    pub document_type: Option<u32>,
    /// ISO-like creation timestamp, passed through verbatim.
    #[serde(default)]
    pub created: String,
}

/// One page of a paginated collection. `next` is a full URL cursor.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub next: Option<String>,
    pub results: Vec<T>,
}

/// A named taxonomy entity (tag, correspondent or document type).
#[derive(Debug, Clone, Deserialize)]
pub struct NamedEntity {
    pub id: u32,
    pub name: String,
}

/// A custom field definition.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomField {
    pub id: u32,
    pub name: String,
    pub data_type: String,
}

/// A custom field assignment sent with a document update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldValue {
    pub field: u32,
    pub value: bool,
}

/// Partial document update. Optional fields that are `None` are omitted
/// from the PATCH body entirely, so existing values are never cleared.
/// `tags` and `custom_fields` are always sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correspondent: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<u32>,
    pub tags: Vec<u32>,
    pub custom_fields: Vec<CustomFieldValue>,
}

/// The three independent name→id namespaces of the document service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Tags,
    Correspondents,
    DocumentTypes,
}

impl Namespace {
    /// API collection path segment.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Tags => "tags",
            Self::Correspondents => "correspondents",
            Self::DocumentTypes => "document_types",
        }
    }

    /// Singular label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Tags => "tag",
            Self::Correspondents => "correspondent",
            Self::DocumentTypes => "document type",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}
