//! In-memory taxonomy cache: name→id maps for tags, correspondents and
//! document types, plus the id of the processed-marker custom field.
//!
//! The cache is rebuilt from scratch at the start of every polling cycle
//! and mutated only when a missing entry is created mid-cycle, so later
//! documents in the same cycle reuse the new id instead of re-creating it.

use std::collections::HashMap;
use std::sync::Mutex;

use super::types::{CustomField, NamedEntity, Namespace};
use super::PaperlessError;

/// Taxonomy operations the cache needs from the document service.
pub trait TaxonomyBackend {
    /// Complete contents of a namespace, all pages followed.
    fn entities(&self, namespace: Namespace) -> Result<Vec<NamedEntity>, PaperlessError>;

    fn create_entity(&self, namespace: Namespace, name: &str)
        -> Result<NamedEntity, PaperlessError>;

    /// Boolean custom field with the given name, matched case-insensitively.
    fn boolean_field(&self, name: &str) -> Result<Option<CustomField>, PaperlessError>;

    fn create_boolean_field(&self, name: &str) -> Result<(), PaperlessError>;
}

/// Outcome of a name→id resolution attempt.
///
/// `Unresolved` is the soft-failure case: lookup missed and creation
/// failed. The planner leaves the corresponding field out of the update
/// instead of treating this as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved(u32),
    Unresolved,
}

impl Resolution {
    pub fn id(self) -> Option<u32> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::Unresolved => None,
        }
    }
}

/// Lookup keys are trimmed and lowercased so `"Acme Corp"`, `" acme corp "`
/// and `"ACME CORP"` all address the same entry.
fn cache_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug)]
pub struct TaxonomyCache {
    tags: HashMap<String, u32>,
    correspondents: HashMap<String, u32>,
    document_types: HashMap<String, u32>,
    marker_field: u32,
}

impl TaxonomyCache {
    /// Rebuild all three maps from the document service and resolve the
    /// processed-marker field, creating it when absent.
    pub fn load(
        backend: &dyn TaxonomyBackend,
        marker_field_name: &str,
    ) -> Result<Self, PaperlessError> {
        let tags = load_namespace(backend, Namespace::Tags)?;
        let correspondents = load_namespace(backend, Namespace::Correspondents)?;
        let document_types = load_namespace(backend, Namespace::DocumentTypes)?;
        let marker_field = resolve_marker_field(backend, marker_field_name)?;

        tracing::info!(
            tags = tags.len(),
            correspondents = correspondents.len(),
            document_types = document_types.len(),
            marker_field,
            "taxonomy cache rebuilt"
        );

        Ok(Self {
            tags,
            correspondents,
            document_types,
            marker_field,
        })
    }

    fn map(&self, namespace: Namespace) -> &HashMap<String, u32> {
        match namespace {
            Namespace::Tags => &self.tags,
            Namespace::Correspondents => &self.correspondents,
            Namespace::DocumentTypes => &self.document_types,
        }
    }

    fn map_mut(&mut self, namespace: Namespace) -> &mut HashMap<String, u32> {
        match namespace {
            Namespace::Tags => &mut self.tags,
            Namespace::Correspondents => &mut self.correspondents,
            Namespace::DocumentTypes => &mut self.document_types,
        }
    }

    /// Cached id for a case-insensitively matched name.
    pub fn resolve(&self, namespace: Namespace, name: &str) -> Option<u32> {
        self.map(namespace).get(&cache_key(name)).copied()
    }

    /// Cached id, or one creation attempt against the document service.
    /// A created entry is inserted into the cache immediately.
    pub fn resolve_or_create(
        &mut self,
        backend: &dyn TaxonomyBackend,
        namespace: Namespace,
        name: &str,
    ) -> Resolution {
        let key = cache_key(name);
        if key.is_empty() {
            return Resolution::Unresolved;
        }
        if let Some(id) = self.map(namespace).get(&key) {
            return Resolution::Resolved(*id);
        }

        match backend.create_entity(namespace, name.trim()) {
            Ok(entity) => {
                tracing::info!(
                    kind = namespace.label(),
                    name = name.trim(),
                    id = entity.id,
                    "created taxonomy entry"
                );
                self.map_mut(namespace).insert(key, entity.id);
                Resolution::Resolved(entity.id)
            }
            Err(e) => {
                tracing::warn!(
                    kind = namespace.label(),
                    name = name.trim(),
                    error = %e,
                    "could not create taxonomy entry, leaving field unset"
                );
                Resolution::Unresolved
            }
        }
    }

    /// Id of the boolean processed-marker custom field.
    pub fn marker_field(&self) -> u32 {
        self.marker_field
    }

    /// Sorted normalized names of a namespace, for prompt rendering.
    pub fn names(&self, namespace: Namespace) -> Vec<&str> {
        let mut names: Vec<&str> = self.map(namespace).keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn load_namespace(
    backend: &dyn TaxonomyBackend,
    namespace: Namespace,
) -> Result<HashMap<String, u32>, PaperlessError> {
    let entities = backend.entities(namespace)?;
    Ok(entities
        .into_iter()
        .map(|e| (cache_key(&e.name), e.id))
        .collect())
}

/// Find the boolean marker field, creating and re-resolving it when absent.
fn resolve_marker_field(
    backend: &dyn TaxonomyBackend,
    name: &str,
) -> Result<u32, PaperlessError> {
    if let Some(field) = backend.boolean_field(name)? {
        return Ok(field.id);
    }

    tracing::warn!(field = name, "processed-marker field not found, creating it");
    backend.create_boolean_field(name)?;

    backend
        .boolean_field(name)?
        .map(|f| f.id)
        .ok_or_else(|| PaperlessError::MarkerField(name.to_string()))
}

/// In-memory `TaxonomyBackend` for tests. Records creation requests.
pub struct MockTaxonomy {
    entities: Mutex<Vec<(Namespace, NamedEntity)>>,
    fields: Mutex<Vec<CustomField>>,
    next_id: Mutex<u32>,
    fail_entity_creation: bool,
    drop_field_creation: bool,
    entity_creations: Mutex<Vec<(Namespace, String)>>,
    field_creations: Mutex<Vec<String>>,
}

impl MockTaxonomy {
    pub fn new() -> Self {
        Self {
            entities: Mutex::new(Vec::new()),
            fields: Mutex::new(Vec::new()),
            next_id: Mutex::new(100),
            fail_entity_creation: false,
            drop_field_creation: false,
            entity_creations: Mutex::new(Vec::new()),
            field_creations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_entity(self, namespace: Namespace, name: &str, id: u32) -> Self {
        self.entities.lock().unwrap().push((
            namespace,
            NamedEntity {
                id,
                name: name.to_string(),
            },
        ));
        self
    }

    pub fn with_boolean_field(self, name: &str, id: u32) -> Self {
        self.fields.lock().unwrap().push(CustomField {
            id,
            name: name.to_string(),
            data_type: "boolean".into(),
        });
        self
    }

    /// Every `create_entity` call fails with a server error.
    pub fn failing_entity_creation(mut self) -> Self {
        self.fail_entity_creation = true;
        self
    }

    /// `create_boolean_field` succeeds but never records the field, so
    /// re-resolution keeps missing it.
    pub fn dropping_field_creation(mut self) -> Self {
        self.drop_field_creation = true;
        self
    }

    pub fn entity_creations(&self) -> Vec<(Namespace, String)> {
        self.entity_creations.lock().unwrap().clone()
    }

    pub fn field_creations(&self) -> Vec<String> {
        self.field_creations.lock().unwrap().clone()
    }

    fn allocate_id(&self) -> u32 {
        let mut next = self.next_id.lock().unwrap();
        let id = *next;
        *next += 1;
        id
    }
}

impl Default for MockTaxonomy {
    fn default() -> Self {
        Self::new()
    }
}

impl TaxonomyBackend for MockTaxonomy {
    fn entities(&self, namespace: Namespace) -> Result<Vec<NamedEntity>, PaperlessError> {
        Ok(self
            .entities
            .lock()
            .unwrap()
            .iter()
            .filter(|(ns, _)| *ns == namespace)
            .map(|(_, e)| e.clone())
            .collect())
    }

    fn create_entity(
        &self,
        namespace: Namespace,
        name: &str,
    ) -> Result<NamedEntity, PaperlessError> {
        self.entity_creations
            .lock()
            .unwrap()
            .push((namespace, name.to_string()));
        if self.fail_entity_creation {
            return Err(PaperlessError::Api {
                status: 500,
                body: "creation rejected".into(),
            });
        }
        let entity = NamedEntity {
            id: self.allocate_id(),
            name: name.to_string(),
        };
        self.entities
            .lock()
            .unwrap()
            .push((namespace, entity.clone()));
        Ok(entity)
    }

    fn boolean_field(&self, name: &str) -> Result<Option<CustomField>, PaperlessError> {
        let key = name.trim().to_lowercase();
        Ok(self
            .fields
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.data_type == "boolean" && f.name.trim().to_lowercase() == key)
            .cloned())
    }

    fn create_boolean_field(&self, name: &str) -> Result<(), PaperlessError> {
        self.field_creations.lock().unwrap().push(name.to_string());
        if !self.drop_field_creation {
            self.fields.lock().unwrap().push(CustomField {
                id: self.allocate_id(),
                name: name.to_string(),
                data_type: "boolean".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_with_marker() -> MockTaxonomy {
        MockTaxonomy::new().with_boolean_field("AI Processed", 9)
    }

    #[test]
    fn resolution_is_case_and_whitespace_insensitive() {
        let backend = backend_with_marker().with_entity(Namespace::Correspondents, "Acme Corp", 4);
        let cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        assert_eq!(cache.resolve(Namespace::Correspondents, "Acme Corp"), Some(4));
        assert_eq!(cache.resolve(Namespace::Correspondents, " acme corp "), Some(4));
        assert_eq!(cache.resolve(Namespace::Correspondents, "ACME CORP"), Some(4));
        assert_eq!(cache.resolve(Namespace::Correspondents, "Other"), None);
    }

    #[test]
    fn namespaces_are_independent() {
        let backend = backend_with_marker().with_entity(Namespace::Tags, "Insurance", 7);
        let cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        assert_eq!(cache.resolve(Namespace::Tags, "insurance"), Some(7));
        assert_eq!(cache.resolve(Namespace::Correspondents, "insurance"), None);
    }

    #[test]
    fn create_once_then_reuse_cache() {
        let backend = backend_with_marker();
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        let first = cache.resolve_or_create(&backend, Namespace::Tags, "Receipts");
        let second = cache.resolve_or_create(&backend, Namespace::Tags, " RECEIPTS ");

        assert_eq!(first, second);
        assert!(first.id().is_some());
        assert_eq!(backend.entity_creations().len(), 1);
    }

    #[test]
    fn creation_sends_trimmed_original_casing() {
        let backend = backend_with_marker();
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        cache.resolve_or_create(&backend, Namespace::Correspondents, "  Acme Corp  ");
        let creations = backend.entity_creations();
        assert_eq!(creations[0].1, "Acme Corp");
    }

    #[test]
    fn failed_creation_is_unresolved_not_error() {
        let backend = MockTaxonomy::new()
            .with_boolean_field("AI Processed", 9)
            .failing_entity_creation();
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        let outcome = cache.resolve_or_create(&backend, Namespace::DocumentTypes, "Invoice");
        assert_eq!(outcome, Resolution::Unresolved);
        assert_eq!(outcome.id(), None);
    }

    #[test]
    fn blank_name_never_hits_the_backend() {
        let backend = backend_with_marker();
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        let outcome = cache.resolve_or_create(&backend, Namespace::Tags, "   ");
        assert_eq!(outcome, Resolution::Unresolved);
        assert!(backend.entity_creations().is_empty());
    }

    #[test]
    fn marker_field_found_without_creation() {
        let backend = backend_with_marker();
        let cache = TaxonomyCache::load(&backend, "ai processed").unwrap();
        assert_eq!(cache.marker_field(), 9);
        assert!(backend.field_creations().is_empty());
    }

    #[test]
    fn missing_marker_field_is_created_and_re_resolved() {
        let backend = MockTaxonomy::new();
        let cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();
        assert_eq!(backend.field_creations(), vec!["AI Processed".to_string()]);
        assert_eq!(cache.marker_field(), 100);
    }

    #[test]
    fn marker_field_unresolvable_after_creation_is_an_error() {
        let backend = MockTaxonomy::new().dropping_field_creation();
        let err = TaxonomyCache::load(&backend, "AI Processed").unwrap_err();
        assert!(matches!(err, PaperlessError::MarkerField(_)));
    }

    #[test]
    fn names_are_sorted_and_normalized() {
        let backend = backend_with_marker()
            .with_entity(Namespace::Tags, "Taxes", 1)
            .with_entity(Namespace::Tags, "insurance", 2);
        let cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();
        assert_eq!(cache.names(Namespace::Tags), vec!["insurance", "taxes"]);
    }
}
