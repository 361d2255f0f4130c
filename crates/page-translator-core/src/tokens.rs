//! Token counting for cost estimates.
//!
//! OpenAI chat models are counted with their own BPE vocabulary. Models
//! without a known vocabulary (local servers, other vendors) fall back to a
//! character-ratio estimate.

use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Maps text to a token count under a fixed model vocabulary.
///
/// Implementations must be pure: the same text always gives the same count
/// and counting never touches the network.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> usize;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> usize + Send + Sync,
{
    fn count_tokens(&self, text: &str) -> usize {
        self(text)
    }
}

/// Exact token counts under the BPE vocabulary of one OpenAI model
pub struct BpeTokenCounter {
    model: String,
    bpe: CoreBPE,
}

impl BpeTokenCounter {
    /// Counter for `model`, or `None` if its vocabulary is unknown
    pub fn for_model(model: &str) -> Option<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).ok()?;
        Some(Self {
            model: model.to_string(),
            bpe,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for BpeTokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BpeTokenCounter")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl TokenCounter for BpeTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Pick the counter for a configured model name
pub fn counter_for_model(model: &str) -> Box<dyn TokenCounter> {
    match BpeTokenCounter::for_model(model) {
        Some(counter) => Box::new(counter),
        None => {
            debug!("No BPE vocabulary for model {}, estimating tokens", model);
            Box::new(EstimatingTokenCounter)
        }
    }
}

/// Script-aware token estimate for BPE chat models.
///
/// Roughly four characters per token for Latin and Cyrillic text, two per
/// token for CJK ideographs and kana, five per token for Arabic. Counts round
/// up so that any non-empty text costs at least one token.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimatingTokenCounter;

impl TokenCounter for EstimatingTokenCounter {
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }

        if text.is_ascii() {
            return text.len().div_ceil(4);
        }

        let mut char_count: usize = 0;
        let mut cjk_count: usize = 0;
        let mut arabic_count = 0;

        for c in text.chars() {
            char_count += 1;
            if is_cjk_char(c) {
                cjk_count += 1;
            } else if is_arabic_char(c) {
                arabic_count += 1;
            }
        }

        if cjk_count > 0 {
            cjk_count.div_ceil(2) + (char_count - cjk_count).div_ceil(4)
        } else if arabic_count > char_count / 2 {
            char_count.div_ceil(5)
        } else {
            char_count.div_ceil(4)
        }
    }
}

#[inline]
fn is_cjk_char(c: char) -> bool {
    matches!(
        u32::from(c),
        0x4E00..=0x9FFF // CJK Unified Ideographs
            | 0x3040..=0x309F // Hiragana
            | 0x30A0..=0x30FF // Katakana
            | 0xAC00..=0xD7AF // Hangul
    )
}

#[inline]
fn is_arabic_char(c: char) -> bool {
    matches!(
        u32::from(c),
        0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF
    )
}
