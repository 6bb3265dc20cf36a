//! Drives one document through text acquisition, classification,
//! planning and write-back.
//!
//! Trait-object dependencies keep the whole flow testable with mocks.

use crate::config::{OcrSource, Settings};
use crate::llm::{Classifier, LlmClient, VisionTextExtractor};
use crate::paperless::{Document, DocumentStore, TaxonomyBackend, TaxonomyCache};
use crate::render::PageRenderer;

use super::planner::plan_update;
use super::ProcessError;

/// Everything a document pass needs, borrowed for the duration of a run.
pub struct ProcessContext<'a> {
    pub store: &'a dyn DocumentStore,
    pub taxonomy: &'a dyn TaxonomyBackend,
    pub llm: &'a dyn LlmClient,
    pub renderer: &'a dyn PageRenderer,
    pub settings: &'a Settings,
}

/// Process a single document end to end.
///
/// Errors bubble to the caller, which logs them and moves on; the
/// document stays unmarked and is retried next cycle.
pub fn process_document(
    ctx: &ProcessContext<'_>,
    cache: &mut TaxonomyCache,
    prompt: &str,
    document: &Document,
) -> Result<(), ProcessError> {
    tracing::info!(id = document.id, title = %document.title, "processing document");

    let text = classification_text(ctx, document);
    if text.is_empty() {
        tracing::warn!(id = document.id, "classification input is empty, proceeding anyway");
    }

    let classifier = Classifier::new(ctx.llm, &ctx.settings.ollama_model);
    let suggestion = classifier.classify(prompt, &text)?;
    tracing::info!(
        id = document.id,
        suggestion = %serde_json::to_string(&suggestion).unwrap_or_default(),
        "model suggestion"
    );

    let update = plan_update(
        document,
        &suggestion,
        cache,
        ctx.taxonomy,
        ctx.settings.override_existing_tags,
    );

    if ctx.settings.dry_run {
        tracing::info!(
            id = document.id,
            update = %serde_json::to_string(&update).unwrap_or_default(),
            "dry run, not applying update"
        );
        return Ok(());
    }

    ctx.store.update_document(document.id, &update)?;
    tracing::info!(id = document.id, "document updated");
    Ok(())
}

/// Fetch and process one document by id (manual runs).
pub fn process_single(
    ctx: &ProcessContext<'_>,
    cache: &mut TaxonomyCache,
    prompt: &str,
    id: u32,
) -> Result<(), ProcessError> {
    let document = ctx.store.document(id)?;
    process_document(ctx, cache, prompt, &document)
}

/// Text handed to the classifier.
///
/// Vision OCR applies only when selected AND the original can be
/// fetched, rendered, and stays within the page limit; every other
/// outcome degrades to the service-extracted text with a warning.
fn classification_text(ctx: &ProcessContext<'_>, document: &Document) -> String {
    match ctx.settings.ocr_source {
        OcrSource::DocumentService => document.content.clone(),
        OcrSource::ModelVision => {
            vision_text(ctx, document).unwrap_or_else(|| document.content.clone())
        }
    }
}

fn vision_text(ctx: &ProcessContext<'_>, document: &Document) -> Option<String> {
    let pdf = match ctx.store.original_file(document.id) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(
                id = document.id,
                error = %e,
                "could not download original, falling back to service text"
            );
            return None;
        }
    };

    let pages = match ctx.renderer.page_count(&pdf) {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(
                id = document.id,
                error = %e,
                "could not inspect original, falling back to service text"
            );
            return None;
        }
    };

    if pages > ctx.settings.max_vision_pages {
        tracing::warn!(
            id = document.id,
            pages,
            limit = ctx.settings.max_vision_pages,
            "page count exceeds vision limit, falling back to service text"
        );
        return None;
    }

    let images = match ctx.renderer.render_pages(&pdf) {
        Ok(images) => images,
        Err(e) => {
            tracing::warn!(
                id = document.id,
                error = %e,
                "page rendering failed, falling back to service text"
            );
            return None;
        }
    };

    let extractor = VisionTextExtractor::new(ctx.llm, &ctx.settings.ollama_model);
    Some(extractor.extract_text(&images))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunMode;
    use crate::llm::MockLlmClient;
    use crate::paperless::{MockDocumentStore, MockTaxonomy, Namespace};
    use crate::render::MockPageRenderer;
    use std::path::PathBuf;

    fn settings() -> Settings {
        Settings {
            paperless_url: "http://paperless:8000".into(),
            paperless_token: "secret".into(),
            processed_field: "AI Processed".into(),
            ollama_url: "http://localhost:11434".into(),
            ollama_model: "llama3".into(),
            prompt_file: PathBuf::from("prompt.txt"),
            log_level: "info".into(),
            override_existing_tags: false,
            ocr_source: OcrSource::DocumentService,
            max_vision_pages: 10,
            scan_interval: 600,
            mode: RunMode::Auto,
            doc_id: None,
            dry_run: false,
        }
    }

    fn document(id: u32, content: &str) -> Document {
        Document {
            id,
            title: format!("scan_{id:04}"),
            content: content.into(),
            tags: vec![1],
            correspondent: None,
            document_type: None,
            created: "2024-01-01T00:00:00Z".into(),
        }
    }

    fn taxonomy() -> MockTaxonomy {
        MockTaxonomy::new()
            .with_boolean_field("AI Processed", 9)
            .with_entity(Namespace::Tags, "inbox", 1)
    }

    #[test]
    fn service_text_path_never_touches_vision() {
        let store = MockDocumentStore::new(vec![document(5, "invoice body")]);
        let backend = taxonomy();
        let llm = MockLlmClient::new(r#"{"title": "Invoice"}"#);
        let renderer = MockPageRenderer::new(3);
        let settings = settings();
        let ctx = ProcessContext {
            store: &store,
            taxonomy: &backend,
            llm: &llm,
            renderer: &renderer,
            settings: &settings,
        };
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        process_document(&ctx, &mut cache, "classify:", &store.document(5).unwrap()).unwrap();

        assert_eq!(llm.image_calls(), 0);
        assert_eq!(renderer.render_calls(), 0);
        let updates = store.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1.title.as_deref(), Some("Invoice"));
        assert_eq!(
            llm.structured_prompts(),
            vec!["classify:\n\ninvoice body".to_string()]
        );
    }

    #[test]
    fn empty_service_text_still_classifies() {
        let store = MockDocumentStore::new(vec![document(6, "")]);
        let backend = taxonomy();
        let llm = MockLlmClient::new("{}");
        let renderer = MockPageRenderer::new(1);
        let settings = settings();
        let ctx = ProcessContext {
            store: &store,
            taxonomy: &backend,
            llm: &llm,
            renderer: &renderer,
            settings: &settings,
        };
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        process_document(&ctx, &mut cache, "classify:", &store.document(6).unwrap()).unwrap();

        assert_eq!(llm.image_calls(), 0);
        assert_eq!(llm.structured_prompts(), vec!["classify:\n\n".to_string()]);
        assert_eq!(store.updates().len(), 1);
    }

    #[test]
    fn oversized_document_falls_back_to_service_text() {
        let store = MockDocumentStore::new(vec![document(7, "fallback body")])
            .with_original(7, b"%PDF".to_vec());
        let backend = taxonomy();
        let llm = MockLlmClient::new("{}");
        let renderer = MockPageRenderer::new(12);
        let mut settings = settings();
        settings.ocr_source = OcrSource::ModelVision;
        settings.max_vision_pages = 10;
        let ctx = ProcessContext {
            store: &store,
            taxonomy: &backend,
            llm: &llm,
            renderer: &renderer,
            settings: &settings,
        };
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        process_document(&ctx, &mut cache, "classify:", &store.document(7).unwrap()).unwrap();

        assert_eq!(renderer.render_calls(), 0);
        assert_eq!(llm.image_calls(), 0);
        assert_eq!(
            llm.structured_prompts(),
            vec!["classify:\n\nfallback body".to_string()]
        );
    }

    #[test]
    fn vision_path_feeds_page_text_to_the_classifier() {
        let store = MockDocumentStore::new(vec![document(8, "service text")])
            .with_original(8, b"%PDF".to_vec());
        let backend = taxonomy();
        let llm = MockLlmClient::new("{}").with_image_sequence(vec![
            Ok("Page one".into()),
            Ok("Page two".into()),
        ]);
        let renderer = MockPageRenderer::new(2);
        let mut settings = settings();
        settings.ocr_source = OcrSource::ModelVision;
        let ctx = ProcessContext {
            store: &store,
            taxonomy: &backend,
            llm: &llm,
            renderer: &renderer,
            settings: &settings,
        };
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        process_document(&ctx, &mut cache, "classify:", &store.document(8).unwrap()).unwrap();

        assert_eq!(renderer.render_calls(), 1);
        assert_eq!(llm.image_calls(), 2);
        assert_eq!(
            llm.structured_prompts(),
            vec!["classify:\n\nPage one\n\nPage two".to_string()]
        );
    }

    #[test]
    fn render_failure_falls_back_to_service_text() {
        let store = MockDocumentStore::new(vec![document(9, "typed text")])
            .with_original(9, b"%PDF".to_vec());
        let backend = taxonomy();
        let llm = MockLlmClient::new("{}");
        let renderer = MockPageRenderer::new(2).failing_render();
        let mut settings = settings();
        settings.ocr_source = OcrSource::ModelVision;
        let ctx = ProcessContext {
            store: &store,
            taxonomy: &backend,
            llm: &llm,
            renderer: &renderer,
            settings: &settings,
        };
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        process_document(&ctx, &mut cache, "classify:", &store.document(9).unwrap()).unwrap();

        assert_eq!(llm.image_calls(), 0);
        assert_eq!(
            llm.structured_prompts(),
            vec!["classify:\n\ntyped text".to_string()]
        );
    }

    #[test]
    fn missing_original_falls_back_to_service_text() {
        let store = MockDocumentStore::new(vec![document(10, "stored text")]);
        let backend = taxonomy();
        let llm = MockLlmClient::new("{}");
        let renderer = MockPageRenderer::new(1);
        let mut settings = settings();
        settings.ocr_source = OcrSource::ModelVision;
        let ctx = ProcessContext {
            store: &store,
            taxonomy: &backend,
            llm: &llm,
            renderer: &renderer,
            settings: &settings,
        };
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        process_document(&ctx, &mut cache, "classify:", &store.document(10).unwrap()).unwrap();

        assert_eq!(
            llm.structured_prompts(),
            vec!["classify:\n\nstored text".to_string()]
        );
    }

    #[test]
    fn dry_run_plans_but_never_patches() {
        let store = MockDocumentStore::new(vec![document(11, "body")]);
        let backend = taxonomy();
        let llm = MockLlmClient::new(r#"{"title": "Planned"}"#);
        let renderer = MockPageRenderer::new(1);
        let mut settings = settings();
        settings.dry_run = true;
        let ctx = ProcessContext {
            store: &store,
            taxonomy: &backend,
            llm: &llm,
            renderer: &renderer,
            settings: &settings,
        };
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        process_document(&ctx, &mut cache, "classify:", &store.document(11).unwrap()).unwrap();
        assert!(store.updates().is_empty());
    }

    #[test]
    fn classification_failure_propagates() {
        let store = MockDocumentStore::new(vec![document(12, "body")]);
        let backend = taxonomy();
        let llm = MockLlmClient::failing("model down");
        let renderer = MockPageRenderer::new(1);
        let settings = settings();
        let ctx = ProcessContext {
            store: &store,
            taxonomy: &backend,
            llm: &llm,
            renderer: &renderer,
            settings: &settings,
        };
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        let result = process_document(&ctx, &mut cache, "classify:", &store.document(12).unwrap());
        assert!(matches!(result, Err(ProcessError::Llm(_))));
        assert!(store.updates().is_empty());
    }

    #[test]
    fn process_single_fetches_by_id() {
        let store = MockDocumentStore::new(vec![document(21, "body")]);
        let backend = taxonomy();
        let llm = MockLlmClient::new("{}");
        let renderer = MockPageRenderer::new(1);
        let settings = settings();
        let ctx = ProcessContext {
            store: &store,
            taxonomy: &backend,
            llm: &llm,
            renderer: &renderer,
            settings: &settings,
        };
        let mut cache = TaxonomyCache::load(&backend, "AI Processed").unwrap();

        process_single(&ctx, &mut cache, "classify:", 21).unwrap();
        assert_eq!(store.updates().len(), 1);

        let missing = process_single(&ctx, &mut cache, "classify:", 99);
        assert!(matches!(missing, Err(ProcessError::Paperless(_))));
    }
}
