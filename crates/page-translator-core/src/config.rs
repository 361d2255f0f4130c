use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::pdf::ElementCategory;

/// Language codes following ISO 639-1 with regional variants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn default_source_lang() -> Lang {
    Lang::new(DEFAULT_SOURCE_LANG)
}

fn default_target_lang() -> Lang {
    Lang::new(DEFAULT_TARGET_LANG)
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Default source language code
pub const DEFAULT_SOURCE_LANG: &str = "en";
/// Default target language code
pub const DEFAULT_TARGET_LANG: &str = "ja";

/// Hosted OpenAI endpoint, the default translator backend
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
/// Chat model used when none is configured
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// USD per 1000 prompt tokens for the default model
pub const DEFAULT_INPUT_RATE_PER_1K: f64 = 0.0015;
/// USD per 1000 completion tokens for the default model
pub const DEFAULT_OUTPUT_RATE_PER_1K: f64 = 0.002;
/// Conversion rate applied to the USD estimate
pub const DEFAULT_FX_RATE: f64 = 140.0;
/// Currency the converted estimate is reported in
pub const DEFAULT_CURRENCY: &str = "JPY";

/// Translator backend configuration for OpenAI-compatible APIs.
///
/// Works against the hosted OpenAI API as well as llama.cpp, Ollama and any
/// other server speaking the chat-completions protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl TranslatorConfig {
    /// Create a new translator config
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            api_key,
            model: model.into(),
            ..Self::default()
        }
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

const fn default_timeout_secs() -> u64 {
    120
}

const fn default_retry_count() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: None,
            model: default_model(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Token prices used for the running cost estimate.
///
/// These are plain configuration values; update them when the provider's
/// price list changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Price per 1000 input (prompt) tokens
    #[serde(default = "default_input_rate")]
    pub input_rate_per_1k: f64,
    /// Price per 1000 output (completion) tokens
    #[serde(default = "default_output_rate")]
    pub output_rate_per_1k: f64,
    /// Multiplier from the pricing currency to `currency`
    #[serde(default = "default_fx_rate")]
    pub fx_rate: f64,
    /// Display name of the converted currency
    #[serde(default = "default_currency")]
    pub currency: String,
}

const fn default_input_rate() -> f64 {
    DEFAULT_INPUT_RATE_PER_1K
}

const fn default_output_rate() -> f64 {
    DEFAULT_OUTPUT_RATE_PER_1K
}

const fn default_fx_rate() -> f64 {
    DEFAULT_FX_RATE
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl PricingConfig {
    pub fn new(input_rate_per_1k: f64, output_rate_per_1k: f64, fx_rate: f64) -> Self {
        Self {
            input_rate_per_1k,
            output_rate_per_1k,
            fx_rate,
            currency: default_currency(),
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_INPUT_RATE_PER_1K,
            DEFAULT_OUTPUT_RATE_PER_1K,
            DEFAULT_FX_RATE,
        )
    }
}

/// How page text is pulled out of the PDF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Whole page text, line by line
    #[default]
    Plain,
    /// Classified text blocks; only titles and narrative text are kept
    Elements,
}

/// How title elements are rendered in `Elements` mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TitleStyle {
    /// `# Title`
    #[default]
    Heading,
    /// Titles become ordinary paragraphs
    Merge,
}

/// Text extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub mode: ExtractionMode,
    #[serde(default)]
    pub title_style: TitleStyle,
    /// Element categories kept in `Elements` mode, by name
    #[serde(default = "default_include_categories")]
    pub include_categories: Vec<ElementCategory>,
}

fn default_include_categories() -> Vec<ElementCategory> {
    ElementCategory::DEFAULT_INCLUDED.to_vec()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::default(),
            title_style: TitleStyle::default(),
            include_categories: default_include_categories(),
        }
    }
}

/// Session persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Keep translated pages between runs on the same document
    #[serde(default = "default_true")]
    pub persist: bool,

    /// Session store directory (defaults to ~/.cache/page-translator/sessions)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

const fn default_true() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist: true,
            path: None,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source language
    #[serde(default = "default_source_lang")]
    pub source_lang: Lang,

    /// Target language
    #[serde(default = "default_target_lang")]
    pub target_lang: Lang,

    /// Translator backend configuration
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Token prices for the cost estimate
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Page text extraction
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Session persistence
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            translator: TranslatorConfig::default(),
            pricing: PricingConfig::default(),
            extraction: ExtractionConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Prefix for environment overrides, e.g. `PAGE_TRANSLATOR__TRANSLATOR__MODEL`
pub const ENV_PREFIX: &str = "PAGE_TRANSLATOR";

impl AppConfig {
    /// Load configuration from a single TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations, lowest priority first:
    /// ~/.config/page-translator/config.toml, ./config.toml, then
    /// `PAGE_TRANSLATOR__*` environment variables.
    pub fn load() -> Self {
        let user_config = crate::util::config_dir()
            .map(|dir| dir.join("page-translator").join("config.toml"));

        match Self::load_layered(user_config.as_deref(), Path::new("config.toml")) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Merge the given files (both optional) and the environment on top of
    /// the defaults.
    pub fn load_layered(user_config: Option<&Path>, local_config: &Path) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = user_config {
            tracing::debug!("Config layer: {}", path.display());
            builder = builder.add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder
            .add_source(
                config::File::from(local_config.to_path_buf())
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| Error::ConfigLoad(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the estimate or the client meaningless
    pub fn validate(&self) -> Result<()> {
        let rates = [
            ("pricing.input_rate_per_1k", self.pricing.input_rate_per_1k),
            ("pricing.output_rate_per_1k", self.pricing.output_rate_per_1k),
            ("pricing.fx_rate", self.pricing.fx_rate),
        ];
        for (field, value) in rates {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::ConfigInvalid {
                    field: field.to_string(),
                    reason: format!("must be a non-negative number, got {value}"),
                });
            }
        }

        if self.translator.retry_count == 0 {
            return Err(Error::ConfigInvalid {
                field: "translator.retry_count".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
