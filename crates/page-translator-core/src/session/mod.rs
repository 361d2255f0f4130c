//! Per-document session state.
//!
//! A [`Session`] owns the loaded [`Document`] and the [`TranslationLog`] of
//! pages translated so far. Callers keep the session between runs of their
//! UI loop and hand it to the driver on every invocation; nothing here is
//! global.

mod store;

pub use store::{SessionKey, SessionStore};

use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;
use crate::cost::CostSummary;
use crate::driver::{Step, TranslationDriver, check_prefix};
use crate::error::Result;
use crate::tokens::TokenCounter;
use crate::translator::FragmentSink;

/// The page texts of one loaded file, in physical order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: String,
    pages: Vec<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            id: id.into(),
            pages,
        }
    }

    /// Build a document from page texts alone, identified by their content
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages: Vec<String> = pages.into_iter().map(Into::into).collect();
        let id = pages_digest(&pages);

        Self { id, pages }
    }

    /// MD5 hex digest of the page texts.
    ///
    /// Unlike the id, this changes whenever extraction produces different
    /// text for the same file.
    pub fn content_digest(&self) -> String {
        pages_digest(&self.pages)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&str> {
        self.pages.get(index).map(String::as_str)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

fn pages_digest(pages: &[String]) -> String {
    let mut context = md5::Context::new();
    for page in pages {
        context.consume(page.as_bytes());
        context.consume(b"\x0c"); // form feed between pages
    }
    format!("{:x}", context.compute())
}

/// Append-only list of finished translations, entry `i` belonging to page `i`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationLog(Vec<String>);

impl TranslationLog {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Rebuild a log from stored entries.
    ///
    /// The entries are checked against their document when the log is
    /// attached to a session or passed to the driver.
    pub const fn from_entries(entries: Vec<String>) -> Self {
        Self(entries)
    }

    /// Index of the next page eligible for translation
    pub fn cursor(&self) -> usize {
        self.0.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Only the driver commits entries
    pub(crate) fn push(&mut self, translated: String) {
        self.0.push(translated);
    }
}

/// What the viewer needs to render one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageView<'a> {
    pub index: usize,
    pub source: &'a str,
    pub translated: Option<&'a str>,
    /// This is the next page to translate
    pub is_next: bool,
    /// The next page, and a translation of it was requested
    pub pending: bool,
}

/// A document together with the translations made for it
#[derive(Debug, Clone)]
pub struct Session {
    document: Document,
    log: TranslationLog,
}

impl Session {
    /// Start with nothing translated
    pub const fn new(document: Document) -> Self {
        Self {
            document,
            log: TranslationLog::new(),
        }
    }

    /// Continue from an earlier log of the same document
    pub fn resume(document: Document, log: TranslationLog) -> Result<Self> {
        check_prefix(document.page_count(), log.len())?;
        Ok(Self { document, log })
    }

    pub const fn document(&self) -> &Document {
        &self.document
    }

    pub const fn log(&self) -> &TranslationLog {
        &self.log
    }

    pub fn cursor(&self) -> usize {
        self.log.cursor()
    }

    pub fn is_complete(&self) -> bool {
        self.log.len() == self.document.page_count()
    }

    /// Run one driver step against this session
    pub async fn advance(
        &mut self,
        driver: &TranslationDriver,
        translate_requested: bool,
        sink: Option<&mut dyn FragmentSink>,
    ) -> Result<Step> {
        driver
            .advance(self.document.pages(), &mut self.log, translate_requested, sink)
            .await
    }

    /// Token and cost totals for the pages translated so far
    pub fn cost(&self, counter: &dyn TokenCounter, pricing: &PricingConfig) -> Result<CostSummary> {
        CostSummary::compute(self.document.pages(), self.log.as_slice(), counter, pricing)
    }

    /// One view per page, for rendering source and translation side by side
    pub fn views(&self, translate_requested: bool) -> Vec<PageView<'_>> {
        let cursor = self.cursor();

        self.document
            .pages()
            .iter()
            .enumerate()
            .map(|(index, source)| PageView {
                index,
                source,
                translated: self.log.get(index),
                is_next: index == cursor,
                pending: index == cursor && translate_requested,
            })
            .collect()
    }
}
