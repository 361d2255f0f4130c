//! Incremental, page-at-a-time translation driver.
//!
//! The driver is called again and again by a UI loop with the same document
//! and the session's log. Each call does real work for at most one page, the
//! first one without a translation, and only when the caller asks for it.
//! Pages that are already translated are never sent again.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, Lang};
use crate::error::{Error, Result};
use crate::session::TranslationLog;
use crate::translator::{FragmentSink, Translator, TranslatorInfo, create_translator};

/// Result of one driver invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Every page already has a translation
    Finished,
    /// Nothing requested; page `cursor` is next in line
    Waiting { cursor: usize },
    /// Page `page` was translated and appended to the log
    Translated { page: usize },
}

/// Check that a log of `log_len` entries can belong to `page_count` pages
pub(crate) fn check_prefix(page_count: usize, log_len: usize) -> Result<()> {
    if log_len > page_count {
        return Err(Error::invariant(format!(
            "{log_len} translations recorded for {page_count} pages"
        )));
    }
    Ok(())
}

pub struct TranslationDriver {
    translator: Arc<dyn Translator>,
    source_lang: Lang,
    target_lang: Lang,
}

impl TranslationDriver {
    pub const fn new(translator: Arc<dyn Translator>, source_lang: Lang, target_lang: Lang) -> Self {
        Self {
            translator,
            source_lang,
            target_lang,
        }
    }

    /// Driver using the configured translator backend and language pair
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let translator = create_translator(&config.translator)?;
        Ok(Self::new(
            translator,
            config.source_lang.clone(),
            config.target_lang.clone(),
        ))
    }

    pub fn translator_info(&self) -> TranslatorInfo {
        self.translator.info()
    }

    /// Whether the translator can be called at all (e.g. has its API key)
    pub fn is_available(&self) -> bool {
        self.translator.is_available()
    }

    pub const fn source_lang(&self) -> &Lang {
        &self.source_lang
    }

    pub const fn target_lang(&self) -> &Lang {
        &self.target_lang
    }

    /// Translate the next untranslated page if `translate_requested`.
    ///
    /// On success the translation is appended to `log` at index
    /// `log.cursor()`. On failure the log is left exactly as it was and the
    /// same page is next on the following call. Fragments are forwarded to
    /// `sink` while the translator produces them.
    pub async fn advance(
        &self,
        pages: &[String],
        log: &mut TranslationLog,
        translate_requested: bool,
        sink: Option<&mut dyn FragmentSink>,
    ) -> Result<Step> {
        check_prefix(pages.len(), log.len())?;

        let cursor = log.cursor();
        let Some(source) = pages.get(cursor) else {
            debug!("All {} pages translated", pages.len());
            return Ok(Step::Finished);
        };

        if !translate_requested {
            return Ok(Step::Waiting { cursor });
        }

        info!("Translate page {}/{}", cursor + 1, pages.len());

        let translated = self
            .translator
            .translate(source, &self.source_lang, &self.target_lang, sink)
            .await
            .inspect_err(|e| warn!("Page {} not translated: {}", cursor + 1, e))?;

        log.push(translated);
        Ok(Step::Translated { page: cursor })
    }
}
