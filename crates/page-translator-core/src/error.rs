use thiserror::Error;

/// Unified error type for page-translator-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Loading a document (opening, parsing, text extraction)
/// - Translation operations (API requests, streaming responses, rate limiting)
/// - Session state (invariant violations, persistence)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Load Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to extract text from a PDF page
    #[error("failed to extract text from page {page}: {reason}")]
    PdfTextExtraction { page: usize, reason: String },

    /// An element category name that the extractor does not know about
    #[error("unknown element category: {0}")]
    UnknownElementCategory(String),

    // ==========================================================================
    // Translation Errors
    // ==========================================================================
    /// Translation API request failed
    #[error("translation API request failed: {0}")]
    TranslationRequest(String),

    /// Invalid response from translation API
    #[error("invalid translation API response: {0}")]
    TranslationInvalidResponse(String),

    /// The response stream stopped before the completion marker
    #[error("translation stream ended before completion ({received} bytes received)")]
    TranslationIncomplete { received: usize },

    /// Rate limited by translation API
    #[error("translation rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    TranslationRateLimited { retry_after: Option<u64> },

    /// API key not configured for translation service
    #[error("translation API key not configured")]
    TranslationMissingApiKey,

    /// Translation request timed out
    #[error("translation request timed out")]
    TranslationTimeout,

    // ==========================================================================
    // Session Errors
    // ==========================================================================
    /// The translation log no longer matches its document
    #[error("session invariant violated: {reason}")]
    InvariantViolation { reason: String },

    /// Failed to open, read or write the session store
    #[error("session store error: {0}")]
    SessionStore(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error came from the translator backend.
    ///
    /// Translation errors are recoverable: the session is untouched and the
    /// same page can be requested again.
    pub const fn is_translation_error(&self) -> bool {
        matches!(
            self,
            Self::TranslationRequest(_)
                | Self::TranslationInvalidResponse(_)
                | Self::TranslationIncomplete { .. }
                | Self::TranslationRateLimited { .. }
                | Self::TranslationMissingApiKey
                | Self::TranslationTimeout
        )
    }

    /// Whether this error means the document could not be loaded.
    pub const fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::PdfOpen(_)
                | Self::PdfInvalidPage { .. }
                | Self::PdfTextExtraction { .. }
        )
    }

    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
