//! Running token and cost totals.
//!
//! Totals are never accumulated incrementally. They are folded from the
//! translated prefix of the document every time they are asked for, so they
//! always agree with the translation log.

use serde::Serialize;
use std::fmt;

use crate::config::PricingConfig;
use crate::driver::check_prefix;
use crate::error::Result;
use crate::tokens::TokenCounter;
use crate::util::format_amount;

/// Token usage and estimated spend for the pages translated so far
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CostSummary {
    /// Number of translated pages counted
    pub pages: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// In the pricing currency
    pub estimated_cost: f64,
    /// `estimated_cost * fx_rate`
    pub converted_cost: f64,
    pub currency: String,
}

impl CostSummary {
    /// Fold `(pages[i], translated[i])` for every translated page.
    pub fn compute(
        pages: &[String],
        translated: &[String],
        counter: &dyn TokenCounter,
        pricing: &PricingConfig,
    ) -> Result<Self> {
        check_prefix(pages.len(), translated.len())?;

        let (input_tokens, output_tokens) = pages
            .iter()
            .zip(translated)
            .fold((0, 0), |(input, output), (source, target)| {
                (
                    input + counter.count_tokens(source),
                    output + counter.count_tokens(target),
                )
            });

        #[allow(clippy::cast_precision_loss)] // token counts stay far below 2^52
        let estimated_cost = (input_tokens as f64) * pricing.input_rate_per_1k / 1000.0
            + (output_tokens as f64) * pricing.output_rate_per_1k / 1000.0;

        Ok(Self {
            pages: translated.len(),
            input_tokens,
            output_tokens,
            estimated_cost,
            converted_cost: estimated_cost * pricing.fx_rate,
            currency: pricing.currency.clone(),
        })
    }
}

impl fmt::Display for CostSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} page(s), {} input + {} output tokens, ${} ({} {})",
            self.pages,
            self.input_tokens,
            self.output_tokens,
            format_amount(self.estimated_cost),
            self.currency,
            format_amount(self.converted_cost),
        )
    }
}
