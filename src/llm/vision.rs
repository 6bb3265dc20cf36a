//! Page-by-page text extraction through the vision model.

use base64::Engine as _;

use super::ollama::LlmClient;

/// Fixed instruction for page-level extraction.
const PAGE_OCR_PROMPT: &str = "\
Extract all text from this document page exactly as it appears, \
preserving the reading order. Output only the extracted text, \
with no commentary.";

/// Extracts text from rendered page images, one model request per page.
pub struct VisionTextExtractor<'a> {
    llm: &'a dyn LlmClient,
    model: &'a str,
}

impl<'a> VisionTextExtractor<'a> {
    pub fn new(llm: &'a dyn LlmClient, model: &'a str) -> Self {
        Self { llm, model }
    }

    /// Sequential OCR over PNG page images, in page order.
    ///
    /// A failing page never aborts the batch; it contributes a
    /// placeholder naming the page number and later pages still run.
    /// Sections are joined with a blank line.
    pub fn extract_text(&self, pages: &[Vec<u8>]) -> String {
        let mut sections = Vec::with_capacity(pages.len());

        for (index, page) in pages.iter().enumerate() {
            let page_number = index + 1;
            let encoded = base64::engine::general_purpose::STANDARD.encode(page);

            match self.llm.generate_with_images(
                self.model,
                PAGE_OCR_PROMPT,
                std::slice::from_ref(&encoded),
            ) {
                Ok(text) => {
                    tracing::debug!(
                        page = page_number,
                        chars = text.len(),
                        "page text extracted"
                    );
                    sections.push(text.trim().to_string());
                }
                Err(e) => {
                    tracing::warn!(
                        page = page_number,
                        error = %e,
                        "page extraction failed, inserting placeholder"
                    );
                    sections.push(format!("[page {page_number}: text extraction failed]"));
                }
            }
        }

        sections.join("\n\n")
    }
}
