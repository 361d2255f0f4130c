//! Element classification for the `elements` extraction mode.
//!
//! Text blocks are sorted into a closed set of categories. By default titles
//! and narrative paragraphs make up the page text handed to the translator;
//! list items and stray fragments (page numbers, running headers) are
//! dropped. `extraction.include_categories` changes the selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::TitleStyle;
use crate::error::Error;
use super::text::TextBlock;

/// Block is a title candidate above this multiple of the page's median size
const TITLE_SIZE_RATIO: f32 = 1.3;
/// Titles longer than this are treated as narrative text
const TITLE_MAX_WORDS: usize = 12;
/// Titles wrap onto at most this many lines
const TITLE_MAX_LINES: usize = 3;
/// Unpunctuated blocks shorter than this are fragments
const FRAGMENT_MAX_WORDS: usize = 4;

/// Category of an extracted text element.
///
/// Names in configuration are parsed with [`FromStr`]; an unknown name is an
/// error rather than a silently dropped category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ElementCategory {
    Title,
    NarrativeText,
    ListItem,
    UncategorizedText,
}

impl ElementCategory {
    pub const ALL: [Self; 4] = [
        Self::Title,
        Self::NarrativeText,
        Self::ListItem,
        Self::UncategorizedText,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::NarrativeText => "NarrativeText",
            Self::ListItem => "ListItem",
            Self::UncategorizedText => "UncategorizedText",
        }
    }

    /// Categories translated when the configuration does not say otherwise
    pub const DEFAULT_INCLUDED: [Self; 2] = [Self::Title, Self::NarrativeText];
}

impl fmt::Display for ElementCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| Error::UnknownElementCategory(s.to_string()))
    }
}

impl TryFrom<String> for ElementCategory {
    type Error = Error;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        name.parse()
    }
}

impl From<ElementCategory> for &'static str {
    fn from(category: ElementCategory) -> Self {
        category.as_str()
    }
}

/// A classified block of page text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub category: ElementCategory,
    pub text: String,
}

/// Classify the blocks of one page.
///
/// Font sizes are compared against the page median, so a page set entirely
/// in one size never produces titles.
pub fn classify_blocks(blocks: Vec<TextBlock>) -> Vec<Element> {
    let median = median_font_size(&blocks);

    blocks
        .into_iter()
        .map(|block| Element {
            category: classify(&block, median),
            text: block.text,
        })
        .collect()
}

fn classify(block: &TextBlock, median_font_size: f32) -> ElementCategory {
    let text = block.text.trim();
    let words = text.split_whitespace().count();

    if is_list_item(text) {
        return ElementCategory::ListItem;
    }

    if median_font_size > 0.0
        && block.font_size >= median_font_size * TITLE_SIZE_RATIO
        && words <= TITLE_MAX_WORDS
        && block.line_count <= TITLE_MAX_LINES
    {
        return ElementCategory::Title;
    }

    if words < FRAGMENT_MAX_WORDS && !text.contains(['.', '!', '?', '。', ':']) {
        return ElementCategory::UncategorizedText;
    }

    ElementCategory::NarrativeText
}

fn is_list_item(text: &str) -> bool {
    if text.starts_with(['•', '◦', '▪', '*', '–', '-']) {
        return text.chars().nth(1).is_some_and(char::is_whitespace);
    }

    // "1. item", "12) item", "a) item"
    let marker: String = text.chars().take_while(|c| !c.is_whitespace()).collect();
    let Some(body) = marker.strip_suffix(['.', ')']) else {
        return false;
    };
    let is_enumerator = (!body.is_empty() && body.len() <= 3 && body.chars().all(|c| c.is_ascii_digit()))
        || (body.len() == 1 && body.chars().all(|c| c.is_ascii_lowercase()));

    is_enumerator && marker.len() < text.len()
}

fn median_font_size(blocks: &[TextBlock]) -> f32 {
    let mut sizes: Vec<f32> = blocks
        .iter()
        .map(|b| b.font_size)
        .filter(|s| *s > 0.0)
        .collect();
    if sizes.is_empty() {
        return 0.0;
    }

    sizes.sort_by(f32::total_cmp);
    sizes[sizes.len() / 2]
}

/// Join the elements of a page whose category is in `include` into the
/// text sent for translation.
pub fn assemble_page(
    elements: &[Element],
    include: &[ElementCategory],
    title_style: TitleStyle,
) -> String {
    let mut text = String::new();

    for element in elements.iter().filter(|e| include.contains(&e.category)) {
        if element.category == ElementCategory::Title && title_style == TitleStyle::Heading {
            text.push_str("# ");
        }
        text.push_str(&element.text);
        text.push_str("\n\n");
    }

    text.trim_end().to_string()
}
