//! Page Translator Core Library
//!
//! Page-by-page translation of PDF documents through an OpenAI-compatible
//! chat API:
//! - PDF text extraction (plain or classified elements)
//! - Streaming translation with incremental fragments
//! - An incremental driver that translates one page per request, in order
//! - Token and cost accounting over the translated pages
//! - Session persistence so a rerun resumes where it stopped

pub mod config;
pub mod cost;
pub mod driver;
pub mod error;
pub mod pdf;
pub mod session;
pub mod tokens;
pub mod translator;
pub mod util;

pub use config::{
    AppConfig, ExtractionConfig, ExtractionMode, Lang, PricingConfig, SessionConfig, TitleStyle,
    TranslatorConfig, DEFAULT_SOURCE_LANG, DEFAULT_TARGET_LANG,
};
pub use cost::CostSummary;
pub use driver::{Step, TranslationDriver};
pub use error::{Error, Result};
pub use pdf::{PageSource, PdfDocument, PdfPageSource};
pub use session::{Document, PageView, Session, SessionKey, SessionStore, TranslationLog};
pub use tokens::{BpeTokenCounter, EstimatingTokenCounter, TokenCounter, counter_for_model};
pub use translator::{FragmentSink, OpenAiTranslator, Translator, TranslatorInfo, create_translator};

/// Open the configured session store, or `None` when persistence is off
pub fn open_session_store(config: &SessionConfig) -> Result<Option<SessionStore>> {
    if !config.persist {
        return Ok(None);
    }

    let path = config
        .path
        .clone()
        .unwrap_or_else(util::session_store_path);
    SessionStore::open(path).map(Some)
}
