//! Token, cost and throughput accounting

use chrono::{DateTime, Utc};
use glint_protocol::NormalizedResponse;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::PricingTable;

/// How many performance records are kept
pub const MAX_RECORDS: usize = 10;

/// Performance of one completed request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub tokens: u64,
    pub cost: f64,
    pub timestamp: DateTime<Utc>,
    pub duration_secs: f64,
    pub tokens_per_second: f64,
    pub chars_per_token: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageTotals {
    pub total_tokens: u64,
    pub total_cost: f64,
    pub requests: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub totals: UsageTotals,
    /// Oldest first
    pub records: Vec<UsageRecord>,
}

#[derive(Debug, Default)]
struct TrackerState {
    totals: UsageTotals,
    last_cost: f64,
    records: VecDeque<UsageRecord>,
}

/// Running totals plus a rolling window of recent request performance
#[derive(Debug)]
pub struct UsageTracker {
    pricing: PricingTable,
    state: Mutex<TrackerState>,
}

impl UsageTracker {
    pub fn new(pricing: PricingTable) -> Self {
        Self {
            pricing,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Account for one response. Returns `(tokens, cost)` for this response;
    /// a response without usage records nothing.
    pub fn record(&self, provider: &str, model: &str, response: &NormalizedResponse) -> (u64, f64) {
        let tokens = response.total_tokens();
        if tokens == 0 {
            self.state.lock().last_cost = 0.0;
            return (0, 0.0);
        }

        let cost = tokens as f64 / 1000.0 * self.pricing.price_per_1k(provider, model);
        let mut state = self.state.lock();
        state.totals.total_tokens += tokens;
        state.totals.total_cost += cost;
        state.totals.requests += 1;
        state.last_cost = cost;
        debug!(provider, model, tokens, cost, "Recorded usage");
        (tokens, cost)
    }

    /// Record throughput for a request that took `start..end`.
    ///
    /// The record carries the cost of the most recent [`record`](Self::record) call.
    pub fn record_performance(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        prompt_len: usize,
        response_len: usize,
        tokens: u64,
    ) -> UsageRecord {
        let duration_secs = (end - start).num_milliseconds().max(0) as f64 / 1000.0;
        let tokens_per_second = if duration_secs > 0.0 {
            tokens as f64 / duration_secs
        } else {
            0.0
        };
        let chars_per_token = if tokens > 0 {
            (prompt_len + response_len) as f64 / tokens as f64
        } else {
            0.0
        };

        let mut state = self.state.lock();
        let record = UsageRecord {
            tokens,
            cost: state.last_cost,
            timestamp: end,
            duration_secs,
            tokens_per_second,
            chars_per_token,
        };
        state.records.push_back(record.clone());
        while state.records.len() > MAX_RECORDS {
            state.records.pop_front();
        }
        record
    }

    pub fn totals(&self) -> UsageTotals {
        self.state.lock().totals
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        let state = self.state.lock();
        UsageSnapshot {
            totals: state.totals,
            records: state.records.iter().cloned().collect(),
        }
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new(PricingTable::default())
    }
}
