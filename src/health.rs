//! Provider health tracking and ranking
//!
//! Accumulates success/failure counts and latency per provider and ranks
//! candidates by empirical reliability.

use crate::{
    constants::{DEGRADED_FAILURE_RATE, NEUTRAL_FAILURE_RATE, UNAVAILABLE_FAILURE_RATE},
    error::ProviderError,
    types::ProviderStatus,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

/// Health record for a single provider
///
/// Counters never decrease for the lifetime of a tracker (short of an
/// explicit reset).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub provider_id: String,
    pub success_count: u64,
    pub failure_count: u64,
    /// Sum of latencies of successful calls
    pub total_latency_ms: u64,
    pub last_error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProviderHealth {
    /// Zero-valued record for a provider with no observations
    pub fn empty(provider_id: &str) -> Self {
        Self {
            provider_id: provider_id.to_string(),
            success_count: 0,
            failure_count: 0,
            total_latency_ms: 0,
            last_error: None,
            last_updated: None,
        }
    }

    pub fn observations(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// Failure rate (0.0 to 1.0), `None` without observations
    pub fn failure_rate(&self) -> Option<f64> {
        match self.observations() {
            0 => None,
            total => Some(self.failure_count as f64 / total as f64),
        }
    }

    /// Mean latency of successful calls, `None` without successes
    pub fn average_latency_ms(&self) -> Option<f64> {
        match self.success_count {
            0 => None,
            n => Some(self.total_latency_ms as f64 / n as f64),
        }
    }

    pub fn status(&self) -> ProviderStatus {
        match self.failure_rate() {
            Some(rate) if rate >= UNAVAILABLE_FAILURE_RATE => ProviderStatus::Unavailable,
            Some(rate) if rate >= DEGRADED_FAILURE_RATE => ProviderStatus::Degraded,
            _ => ProviderStatus::Healthy,
        }
    }

    /// Sort key: failure rate, then average latency
    ///
    /// Unseen providers sit at the neutral failure rate. A provider that never
    /// succeeded sorts last among equal failure rates.
    fn rank_key(&self) -> (f64, f64) {
        match self.failure_rate() {
            None => (NEUTRAL_FAILURE_RATE, 0.0),
            Some(rate) => (rate, self.average_latency_ms().unwrap_or(f64::MAX)),
        }
    }
}

/// Process-wide health counters, one record per provider id
#[derive(Default)]
pub struct HealthTracker {
    records: RwLock<HashMap<String, ProviderHealth>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful call and its latency
    pub fn record_success(&self, provider_id: &str, latency: Duration) {
        let mut records = self.records.write();
        let health = records
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderHealth::empty(provider_id));
        health.success_count += 1;
        health.total_latency_ms += latency.as_millis() as u64;
        health.last_updated = Some(Utc::now());
    }

    /// Records a failed call and keeps its error
    pub fn record_failure(&self, provider_id: &str, error: &ProviderError) {
        let mut records = self.records.write();
        let health = records
            .entry(provider_id.to_string())
            .or_insert_with(|| ProviderHealth::empty(provider_id));
        health.failure_count += 1;
        health.last_error = Some(error.to_string());
        health.last_updated = Some(Utc::now());
    }

    /// Current record for a provider, zero-valued if never seen
    pub fn get_health(&self, provider_id: &str) -> ProviderHealth {
        self.records
            .read()
            .get(provider_id)
            .cloned()
            .unwrap_or_else(|| ProviderHealth::empty(provider_id))
    }

    /// Orders candidates best-first
    ///
    /// Lower failure rate wins, lower average latency breaks ties. The sort is
    /// stable, so equal scores keep the order of `candidates`.
    pub fn rank<S: AsRef<str>>(&self, candidates: &[S]) -> Vec<String> {
        let records = self.records.read();
        let mut scored: Vec<(String, (f64, f64))> = candidates
            .iter()
            .map(|id| {
                let id = id.as_ref();
                let key = records
                    .get(id)
                    .map(ProviderHealth::rank_key)
                    .unwrap_or((NEUTRAL_FAILURE_RATE, 0.0));
                (id.to_string(), key)
            })
            .collect();

        scored.sort_by(|(_, a), (_, b)| compare_keys(a, b));
        scored.into_iter().map(|(id, _)| id).collect()
    }

    /// Records for every provider seen so far, sorted by id
    pub fn snapshot(&self) -> Vec<ProviderHealth> {
        let mut all: Vec<ProviderHealth> = self.records.read().values().cloned().collect();
        all.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));
        all
    }

    /// Forgets every record
    pub fn reset(&self) {
        self.records.write().clear();
    }
}

fn compare_keys(a: &(f64, f64), b: &(f64, f64)) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.total_cmp(&b.1))
}
