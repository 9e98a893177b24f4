//! Token Budget (C2)
//!
//! Estimates token counts from character length and truncates result arrays
//! to fit within a configured budget while guaranteeing at least
//! `min_items` survive, even if the first item alone exceeds the budget.

use crate::config::TokenBudgetConfig;
use serde::Serialize;

/// Outcome of truncating a slice of items to the configured token budget.
#[derive(Debug, Clone, PartialEq)]
pub struct TruncateResult<T> {
    pub items: Vec<T>,
    pub tokens_used: usize,
    pub truncated: bool,
    pub original_count: usize,
    pub returned_count: usize,
}

/// Token budget estimator/truncator. Cheap to construct; holds only config.
#[derive(Debug, Clone)]
pub struct TokenBudget {
    config: TokenBudgetConfig,
}

impl TokenBudget {
    pub fn new(config: TokenBudgetConfig) -> Self {
        Self { config }
    }

    /// Estimate the token count of `text` as `max(1, ceil(len / chars_per_token))`.
    pub fn estimate_tokens_str(&self, text: &str) -> usize {
        let len = text.chars().count() as f64;
        ((len / self.config.chars_per_token).ceil() as usize).max(1)
    }

    /// Estimate the token count of any serializable value by stringifying it
    /// first (matching the spec's "stringify non-string inputs" rule).
    pub fn estimate_tokens<T: Serialize>(&self, value: &T) -> usize {
        let text = serde_json::to_string(value).unwrap_or_default();
        self.estimate_tokens_str(&text)
    }

    fn effective_budget(&self) -> f64 {
        self.config.max_tokens as f64 * self.config.safety_buffer
    }

    /// `true` if `value`'s estimated token count fits within the effective
    /// budget (`max_tokens * safety_buffer`).
    pub fn fits_within_budget<T: Serialize>(&self, value: &T) -> bool {
        (self.estimate_tokens(value) as f64) <= self.effective_budget()
    }

    /// Remaining budget (non-negative) after `used` tokens have been spent.
    pub fn remaining_budget(&self, used: usize) -> f64 {
        (self.effective_budget() - used as f64).max(0.0)
    }

    /// Truncate `items` to fit the token budget. Stops adding once the
    /// cumulative estimate would exceed the effective budget *and* at least
    /// `min_items` have already been included — so the first item is always
    /// included regardless of its own size.
    pub fn truncate<T, F>(&self, items: Vec<T>, estimate: F) -> TruncateResult<T>
    where
        F: Fn(&T) -> usize,
    {
        let original_count = items.len();
        let budget = self.effective_budget();
        let min_items = self.config.min_items;

        let mut kept = Vec::with_capacity(items.len());
        let mut tokens_used = 0usize;
        let mut truncated = false;

        for item in items {
            let cost = estimate(&item);
            let would_be = tokens_used + cost;
            if would_be as f64 > budget && kept.len() >= min_items {
                truncated = true;
                break;
            }
            tokens_used = would_be;
            kept.push(item);
        }

        truncated = truncated || kept.len() < original_count;

        TruncateResult {
            returned_count: kept.len(),
            items: kept,
            tokens_used,
            truncated,
            original_count,
        }
    }

    /// Convenience truncation for serializable items, estimating tokens via
    /// JSON stringification per-item.
    pub fn truncate_serializable<T: Serialize>(&self, items: Vec<T>) -> TruncateResult<T> {
        let budget = self.clone();
        self.truncate(items, move |item| budget.estimate_tokens(item))
    }
}
