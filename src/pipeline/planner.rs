//! Maps a model suggestion onto a concrete document update.
//!
//! Every field degrades independently: a suggestion field that is absent,
//! empty, or unresolvable leaves the corresponding document field alone.
//! Planning itself never fails; the caller gets a best-effort payload.

use std::collections::BTreeSet;

use crate::llm::Suggestion;
use crate::paperless::{
    CustomFieldValue, Document, DocumentUpdate, Namespace, Resolution, TaxonomyBackend,
    TaxonomyCache,
};

/// Build the update payload for one document.
///
/// Tag rules: suggested names are resolved (creating missing tags) and
/// merged with the document's existing tags, or replace them entirely
/// when `override_tags` is set. The processed marker is set true in
/// every payload, whatever else resolved.
pub fn plan_update(
    document: &Document,
    suggestion: &Suggestion,
    cache: &mut TaxonomyCache,
    backend: &dyn TaxonomyBackend,
    override_tags: bool,
) -> DocumentUpdate {
    let title = nonempty(suggestion.title.as_deref());
    let created = nonempty(suggestion.created.as_deref());

    let correspondent = suggestion
        .correspondent
        .as_deref()
        .and_then(|name| resolve_field(cache, backend, Namespace::Correspondents, name));
    let document_type = suggestion
        .document_type
        .as_deref()
        .and_then(|name| resolve_field(cache, backend, Namespace::DocumentTypes, name));

    let mut tag_set: BTreeSet<u32> = if override_tags {
        BTreeSet::new()
    } else {
        document.tags.iter().copied().collect()
    };
    for name in suggestion.tag_names() {
        match cache.resolve_or_create(backend, Namespace::Tags, name) {
            Resolution::Resolved(id) => {
                tag_set.insert(id);
            }
            Resolution::Unresolved => {}
        }
    }

    DocumentUpdate {
        title,
        created,
        correspondent,
        document_type,
        tags: tag_set.into_iter().collect(),
        custom_fields: vec![CustomFieldValue {
            field: cache.marker_field(),
            value: true,
        }],
    }
}

fn resolve_field(
    cache: &mut TaxonomyCache,
    backend: &dyn TaxonomyBackend,
    namespace: Namespace,
    name: &str,
) -> Option<u32> {
    match cache.resolve_or_create(backend, namespace, name) {
        Resolution::Resolved(id) => Some(id),
        Resolution::Unresolved => None,
    }
}

fn nonempty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
