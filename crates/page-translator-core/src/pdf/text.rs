use mupdf::{TextPage, TextPageOptions};

use crate::error::{Error, Result};
use super::document::PdfDocument;
use super::page_index::PageIndex;

/// A paragraph-level text block extracted from a page
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// The text content, lines joined with spaces
    pub text: String,
    /// Average line height, a proxy for the font size
    pub font_size: f32,
    /// Number of non-empty lines in the block
    pub line_count: usize,
}

/// Text extraction from PDF pages
pub struct TextExtractor<'a> {
    doc: &'a PdfDocument,
}

impl<'a> TextExtractor<'a> {
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self { doc }
    }

    /// Run `f` against the structured text of one page.
    fn with_text_page<R>(&self, page_num: usize, f: impl FnOnce(&TextPage) -> R) -> Result<R> {
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;

        let doc = self.doc.open_document()?;
        let page = doc.load_page(page_index.into()).map_err(|e| {
            Error::PdfTextExtraction {
                page: page_num,
                reason: format!("Failed to load page: {e}"),
            }
        })?;

        let text_page = page.to_text_page(TextPageOptions::empty()).map_err(|e| {
            Error::PdfTextExtraction {
                page: page_num,
                reason: format!("Failed to get text page: {e}"),
            }
        })?;

        Ok(f(&text_page))
    }

    /// Plain text of a page, one output line per text line.
    ///
    /// A page without text yields an empty string.
    pub fn page_text(&self, page_num: usize) -> Result<String> {
        self.with_text_page(page_num, |text_page| {
            let mut lines = Vec::new();
            for block in text_page.blocks() {
                for line in block.lines() {
                    let text: String = line.chars().filter_map(|c| c.char()).collect();
                    lines.push(text.trim_end().to_string());
                }
            }

            lines.join("\n").trim().to_string()
        })
    }

    /// Paragraph blocks of a page in reading order.
    ///
    /// Lines inside a block are joined with a space; a trailing hyphen at a
    /// line break is removed and the word rejoined.
    pub fn page_blocks(&self, page_num: usize) -> Result<Vec<TextBlock>> {
        self.with_text_page(page_num, |text_page| {
            let mut blocks = Vec::new();

            for block in text_page.blocks() {
                let mut block_text = String::new();
                let mut line_heights: Vec<f32> = Vec::new();
                let mut line_count = 0;

                for line in block.lines() {
                    let mut line_text = String::new();
                    let mut top = f32::MAX;
                    let mut bottom = f32::MIN;

                    for text_char in line.chars() {
                        if let Some(c) = text_char.char() {
                            line_text.push(c);
                        }
                        let quad = text_char.quad();
                        top = top.min(quad.ul.y).min(quad.ur.y);
                        bottom = bottom.max(quad.ll.y).max(quad.lr.y);
                    }

                    let line_trimmed = line_text.trim();
                    if line_trimmed.is_empty() {
                        continue;
                    }

                    if bottom > top {
                        line_heights.push(bottom - top);
                    }
                    line_count += 1;
                    join_line(&mut block_text, line_trimmed);
                }

                if block_text.is_empty() {
                    continue;
                }

                #[allow(clippy::cast_precision_loss)] // line counts are tiny
                let font_size = if line_heights.is_empty() {
                    0.0
                } else {
                    line_heights.iter().sum::<f32>() / line_heights.len() as f32
                };

                blocks.push(TextBlock {
                    text: block_text,
                    font_size,
                    line_count,
                });
            }

            blocks
        })
    }
}

/// Append a line to a paragraph, undoing end-of-line hyphenation.
fn join_line(paragraph: &mut String, line: &str) {
    if paragraph.ends_with('-') {
        paragraph.pop();
    } else if !paragraph.is_empty() {
        paragraph.push(' ');
    }
    paragraph.push_str(line);
}
