use std::path::Path;

use tracing::{debug, info};

use crate::config::{ExtractionConfig, ExtractionMode};
use crate::error::Result;
use crate::session::Document;
use super::document::PdfDocument;
use super::elements::{assemble_page, classify_blocks};
use super::text::TextExtractor;

/// Turns a document on disk into its ordered page texts
pub trait PageSource {
    /// Load every page, in physical order, one string per page.
    ///
    /// Unsupported or corrupt input fails with a load error
    /// (see [`crate::Error::is_load_error`]).
    fn load(&self, path: &Path) -> Result<Document>;
}

/// Page source backed by mupdf
#[derive(Debug, Clone, Default)]
pub struct PdfPageSource {
    config: ExtractionConfig,
}

impl PdfPageSource {
    pub const fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extract the pages of an already opened document
    pub fn extract(&self, pdf: &PdfDocument) -> Result<Document> {
        let extractor = TextExtractor::new(pdf);

        let pages = (0..pdf.page_count())
            .map(|page_num| match self.config.mode {
                ExtractionMode::Plain => extractor.page_text(page_num),
                ExtractionMode::Elements => {
                    let elements = classify_blocks(extractor.page_blocks(page_num)?);
                    debug!("Page {}: {} elements", page_num, elements.len());
                    Ok(assemble_page(
                        &elements,
                        &self.config.include_categories,
                        self.config.title_style,
                    ))
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Document::new(pdf.id(), pages))
    }
}

impl PageSource for PdfPageSource {
    fn load(&self, path: &Path) -> Result<Document> {
        info!("Loading file {}", path.display());

        let pdf = PdfDocument::from_file(path)?;
        if let Some(title) = &pdf.metadata().title {
            debug!("Title: {}", title);
        }
        let document = self.extract(&pdf)?;

        info!("Loaded {} pages", document.page_count());
        Ok(document)
    }
}
