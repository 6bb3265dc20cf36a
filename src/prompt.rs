//! Prompt template loading and placeholder substitution.
//!
//! The template is a plain text file with `%TAGS%`, `%TYPES%` and
//! `%CORRESPONDENTS%` markers. Rendering substitutes JSON-encoded lists
//! of the names currently in the taxonomy cache, so it runs once per
//! cycle, after the cache refresh.

use std::path::Path;

use crate::config::InitError;
use crate::paperless::{Namespace, TaxonomyCache};

const PLACEHOLDERS: [(&str, Namespace); 3] = [
    ("%TAGS%", Namespace::Tags),
    ("%TYPES%", Namespace::DocumentTypes),
    ("%CORRESPONDENTS%", Namespace::Correspondents),
];

#[derive(Debug)]
pub struct PromptTemplate {
    raw: String,
}

impl PromptTemplate {
    pub fn load(path: &Path) -> Result<Self, InitError> {
        let raw = std::fs::read_to_string(path).map_err(|source| InitError::PromptTemplate {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), chars = raw.len(), "prompt template loaded");
        Ok(Self { raw })
    }

    pub fn from_text(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }

    /// Substitute every known placeholder with the cache's current names.
    /// Unknown `%...%` markers are left untouched.
    pub fn render(&self, cache: &TaxonomyCache) -> String {
        let mut rendered = self.raw.clone();
        for (marker, namespace) in PLACEHOLDERS {
            if rendered.contains(marker) {
                let names = serde_json::to_string(&cache.names(namespace))
                    .unwrap_or_else(|_| "[]".to_string());
                rendered = rendered.replace(marker, &names);
            }
        }
        rendered
    }
}
