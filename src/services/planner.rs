//! Token budget planning for generation requests.
//!
//! Two independent responsibilities: batch sizing for discrete items
//! (flashcards, quiz questions) from a static per-item token cost, and
//! safe output sizing for free-form text given the provider's combined
//! input+output context limit.

use crate::error::PlanError;
use crate::models::{ItemKind, LimitsConfig};
use crate::utils::estimate_tokens;

/// Decomposition of an item request into provider-sized batches.
///
/// Ephemeral: derived from the static cost table and the configured
/// output ceiling, recomputed per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub item_kind: ItemKind,
    pub total: u32,
    pub batch_sizes: Vec<u32>,
}

impl BatchPlan {
    pub fn is_batched(&self) -> bool {
        self.batch_sizes.len() > 1
    }
}

/// How a summary request should be executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryStrategy {
    /// One request covering the full input.
    Single { max_output_tokens: u32 },
    /// Concurrent per-section requests followed by a combine call.
    Sectioned {
        section_chars: usize,
        max_output_tokens: u32,
    },
}

/// Sizes generation requests against the provider's token limits.
#[derive(Debug, Clone)]
pub struct TokenBudgetPlanner {
    limits: LimitsConfig,
}

impl TokenBudgetPlanner {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Estimated output tokens per generated item, JSON overhead included.
    pub fn tokens_per_item(kind: ItemKind) -> u32 {
        match kind {
            ItemKind::Flashcard => 350,
            ItemKind::MultipleChoice => 500,
            ItemKind::TrueFalse => 300,
            ItemKind::ClinicalCase => 700,
        }
    }

    /// Items that fit one request under the safe output ceiling.
    pub fn items_per_batch(&self, kind: ItemKind) -> u32 {
        self.limits.safe_output_limit / Self::tokens_per_item(kind)
    }

    /// Split `total` into batch sizes that each fit the output ceiling.
    ///
    /// Sizes sum to `total`; the last batch holds the remainder. A request
    /// that fits in one batch yields a single-element plan.
    pub fn plan_batches(&self, kind: ItemKind, total: u32) -> Result<BatchPlan, PlanError> {
        if total == 0 {
            return Err(PlanError::InvalidInput(
                "item count must be at least 1".to_string(),
            ));
        }

        let items_per_batch = self.items_per_batch(kind);
        if items_per_batch == 0 {
            return Err(PlanError::InvalidInput(format!(
                "safe output limit {} cannot fit a single {} item",
                self.limits.safe_output_limit, kind
            )));
        }

        let mut batch_sizes = Vec::new();
        let mut remaining = total;
        while remaining > 0 {
            let size = remaining.min(items_per_batch);
            batch_sizes.push(size);
            remaining -= size;
        }

        Ok(BatchPlan {
            item_kind: kind,
            total,
            batch_sizes,
        })
    }

    /// Largest output that keeps `input + output` within the combined
    /// context limit minus the safety margin.
    ///
    /// The result is floored at the minimum useful output unless even the
    /// minimum cannot fit, in which case the maximum that does fit is
    /// returned, possibly 0; callers must treat 0 as context exhaustion.
    pub fn safe_output_tokens(&self, input_tokens: u32, desired: u32) -> u32 {
        let possible = self
            .limits
            .context_limit
            .saturating_sub(input_tokens)
            .saturating_sub(self.limits.safety_margin)
            .min(self.limits.max_output_tokens);

        let output = desired.min(possible);
        if output < self.limits.min_output_tokens {
            self.limits.min_output_tokens.min(possible)
        } else {
            output
        }
    }

    /// Pick the summary execution strategy for the given input text.
    pub fn summary_strategy(&self, content: &str, desired: Option<u32>) -> SummaryStrategy {
        let desired = desired.unwrap_or(self.limits.desired_summary_tokens);

        if content.len() < self.limits.single_summary_max_chars {
            let safe = self.safe_output_tokens(estimate_tokens(content), desired);
            if safe >= self.limits.min_single_summary_tokens {
                return SummaryStrategy::Single {
                    max_output_tokens: safe,
                };
            }
        }

        // Sections are small, so the combine phase dominates sizing
        SummaryStrategy::Sectioned {
            section_chars: self.limits.section_chars,
            max_output_tokens: self.safe_output_tokens(0, desired),
        }
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }
}
