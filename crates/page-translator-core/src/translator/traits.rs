use async_trait::async_trait;
use crate::config::Lang;
use crate::error::Result;

/// Information about a translator backend
#[derive(Debug, Clone)]
pub struct TranslatorInfo {
    /// Human-readable name
    pub name: &'static str,
    /// Whether this translator requires an API key
    pub requires_api_key: bool,
    /// Whether this translator can emit partial output while working
    pub supports_streaming: bool,
}

/// Receives translated text as it is produced.
///
/// Each call carries the next delta, not the text so far. Calls happen
/// synchronously and in order while the translation is in progress.
pub trait FragmentSink: Send {
    fn on_fragment(&mut self, fragment: &str);
}

impl<F> FragmentSink for F
where
    F: FnMut(&str) + Send,
{
    fn on_fragment(&mut self, fragment: &str) {
        self(fragment);
    }
}

/// Trait for translation backends
#[async_trait]
pub trait Translator: Send + Sync {
    /// Get information about this translator
    fn info(&self) -> TranslatorInfo;

    /// Translate `text` from `source` to `target`.
    ///
    /// With a sink, fragments are forwarded as they arrive and the complete
    /// translation is returned at the end. Failures are errors; a partial
    /// or empty translation is never returned as success.
    async fn translate(
        &self,
        text: &str,
        source: &Lang,
        target: &Lang,
        sink: Option<&mut dyn FragmentSink>,
    ) -> Result<String>;

    /// Check if the translator is usable (e.g., API key configured)
    fn is_available(&self) -> bool {
        true
    }
}
