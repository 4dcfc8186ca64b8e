//! Process-level LLM usage accounting.
//!
//! The gateway records every call here. Counters are atomics; the cumulative
//! cost is a mutex-held float since it is read far less often than written.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Price per 1K tokens (prompt, completion) in USD, keyed by model-name
/// prefix. Longest matching prefix wins.
const PRICE_TABLE: &[(&str, f64, f64)] = &[
    ("gpt-4o-mini", 0.000_15, 0.000_6),
    ("gpt-4o", 0.005, 0.015),
    ("gpt-4-turbo", 0.01, 0.03),
    ("gpt-4", 0.03, 0.06),
    ("gpt-3.5-turbo", 0.000_5, 0.001_5),
    ("text-embedding-3-small", 0.000_02, 0.0),
    ("text-embedding-3-large", 0.000_13, 0.0),
    ("text-embedding-ada-002", 0.000_1, 0.0),
];

/// Estimate the cost of one call in USD. Unknown models cost zero.
pub fn estimate_cost(model: &str, prompt_tokens: u32, completion_tokens: u32) -> f64 {
    let matched = PRICE_TABLE
        .iter()
        .filter(|(prefix, _, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _, _)| prefix.len());

    match matched {
        Some((_, prompt_price, completion_price)) => {
            (f64::from(prompt_tokens) / 1000.0) * prompt_price
                + (f64::from(completion_tokens) / 1000.0) * completion_price
        }
        None => {
            tracing::warn!(model, "no price table entry for model, recording zero cost");
            0.0
        }
    }
}

/// Point-in-time snapshot of the aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub total_calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
}

/// Thread-safe accumulator for process-level LLM usage.
#[derive(Debug, Default)]
pub struct UsageTracker {
    calls: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    cost_usd: Mutex<f64>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed call.
    pub fn record(&self, model: &str, prompt_tokens: u32, completion_tokens: u32) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.prompt_tokens
            .fetch_add(u64::from(prompt_tokens), Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(u64::from(completion_tokens), Ordering::Relaxed);
        let cost = estimate_cost(model, prompt_tokens, completion_tokens);
        *self.cost_usd.lock() += cost;
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let prompt = self.prompt_tokens.load(Ordering::Relaxed);
        let completion = self.completion_tokens.load(Ordering::Relaxed);
        UsageSnapshot {
            total_calls: self.calls.load(Ordering::Relaxed),
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
            estimated_cost_usd: *self.cost_usd.lock(),
        }
    }
}
