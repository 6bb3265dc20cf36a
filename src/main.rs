use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;

use docent::config::{InitError, RunMode, Settings};
use docent::llm::{OllamaClient, REQUEST_TIMEOUT_SECS};
use docent::paperless::{PaperlessClient, TaxonomyCache};
use docent::pipeline::{poll, process_single, ProcessContext};
use docent::prompt::PromptTemplate;
use docent::render::EmbeddedImageRenderer;

fn main() -> ExitCode {
    let settings = match Settings::try_parse() {
        Ok(settings) => settings,
        Err(e) => {
            let kind = e.kind();
            let _ = e.print();
            return match kind {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    docent::init_tracing(&settings.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "docent starting");

    match run(&settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "initialization failed");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: &Settings) -> Result<(), InitError> {
    settings.validate()?;

    let template = PromptTemplate::load(&settings.prompt_file)?;
    let paperless = PaperlessClient::new(&settings.paperless_url, &settings.paperless_token)?;
    let ollama = OllamaClient::new(&settings.ollama_url, REQUEST_TIMEOUT_SECS)?;

    // Advisory only: a missing model still fails per document, visibly.
    match ollama.is_model_available(&settings.ollama_model) {
        Ok(true) => tracing::info!(model = %settings.ollama_model, "model available"),
        Ok(false) => {
            tracing::warn!(model = %settings.ollama_model, "model not reported by the model service")
        }
        Err(e) => tracing::warn!(error = %e, "could not verify model availability"),
    }

    let renderer = EmbeddedImageRenderer;
    let ctx = ProcessContext {
        store: &paperless,
        taxonomy: &paperless,
        llm: &ollama,
        renderer: &renderer,
        settings,
    };

    match settings.mode {
        RunMode::Manual => {
            let Some(id) = settings.doc_id else {
                return Err(InitError::MissingDocumentId);
            };
            let mut cache = TaxonomyCache::load(ctx.taxonomy, &settings.processed_field)?;
            let prompt = template.render(&cache);
            if let Err(e) = process_single(&ctx, &mut cache, &prompt, id) {
                tracing::error!(id, error = %e, "document processing failed");
            }
            Ok(())
        }
        RunMode::Auto => {
            poll::run(&ctx, &template);
            Ok(())
        }
    }
}
