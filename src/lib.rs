pub mod config;
pub mod llm;
pub mod paperless;
pub mod pipeline;
pub mod prompt;
pub mod render;

use tracing_subscriber::EnvFilter;

/// Initialize tracing. `RUST_LOG` wins over the configured default.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}
