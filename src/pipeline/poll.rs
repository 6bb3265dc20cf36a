//! Fixed-interval polling loop.
//!
//! One cycle lists unprocessed documents, rebuilds the taxonomy cache,
//! renders the prompt against it, and processes each document in turn.
//! Per-document failures are logged and skipped; cycle-level failures
//! are logged and retried after the normal sleep. The loop never exits
//! on a runtime error.

use std::time::Duration;

use crate::paperless::{PaperlessError, TaxonomyCache};
use crate::prompt::PromptTemplate;

use super::processor::{process_document, ProcessContext};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub listed: usize,
    pub processed: usize,
    pub failed: usize,
}

/// Run cycles until the process is terminated.
pub fn run(ctx: &ProcessContext<'_>, template: &PromptTemplate) {
    let interval = ctx.settings.scan_interval;
    tracing::info!(interval_secs = interval, "starting polling loop");

    loop {
        match run_cycle(ctx, template) {
            Ok(stats) => {
                if stats.listed > 0 {
                    tracing::info!(
                        listed = stats.listed,
                        processed = stats.processed,
                        failed = stats.failed,
                        "cycle complete"
                    );
                }
            }
            Err(e) => tracing::error!(error = %e, "cycle failed"),
        }

        tracing::debug!(seconds = interval, "sleeping until next cycle");
        std::thread::sleep(Duration::from_secs(interval));
    }
}

/// One full pass: list, refresh, classify, write back.
///
/// Returns `Err` only for cycle-level failures (listing or cache
/// refresh); individual document failures are counted in the stats.
pub fn run_cycle(
    ctx: &ProcessContext<'_>,
    template: &PromptTemplate,
) -> Result<CycleStats, PaperlessError> {
    let documents = ctx
        .store
        .unprocessed_documents(&ctx.settings.processed_field)?;
    let mut cache = TaxonomyCache::load(ctx.taxonomy, &ctx.settings.processed_field)?;

    if documents.is_empty() {
        tracing::info!("no unprocessed documents");
        return Ok(CycleStats::default());
    }

    tracing::info!(count = documents.len(), "found unprocessed documents");
    let prompt = template.render(&cache);

    let mut stats = CycleStats {
        listed: documents.len(),
        ..Default::default()
    };
    for document in &documents {
        match process_document(ctx, &mut cache, &prompt, document) {
            Ok(()) => stats.processed += 1,
            Err(e) => {
                tracing::error!(id = document.id, error = %e, "document processing failed");
                stats.failed += 1;
            }
        }
    }

    Ok(stats)
}
