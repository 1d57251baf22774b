//! Telemetry events emitted by the snapshot orchestrator
//!
//! Sinks are fire-and-forget: [`TelemetrySink::log`] returns nothing, and the
//! orchestrator additionally contains panics raised inside a sink.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

/// Whether a request was answered from a fresh cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryState {
    Hit,
    Miss,
}

impl TelemetryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryState::Hit => "hit",
            TelemetryState::Miss => "miss",
        }
    }
}

/// Metadata attached to every telemetry event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMetadata {
    /// Provider that produced the data (or was tried last, on failure)
    pub provider_id: Option<String>,
    pub state: TelemetryState,
    pub latency_ms: u64,
    pub address: String,
    pub chain: String,
    pub cached: bool,
    pub error: Option<String>,
}

/// A recorded telemetry event
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub id: Uuid,
    pub name: String,
    pub value: f64,
    pub metadata: TelemetryMetadata,
    pub timestamp: DateTime<Utc>,
}

/// Destination for telemetry events
pub trait TelemetrySink: Send + Sync {
    /// Records one event. Must not block on I/O.
    fn log(&self, event_name: &str, value: f64, metadata: &TelemetryMetadata);
}

/// Sink that forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn log(&self, event_name: &str, value: f64, metadata: &TelemetryMetadata) {
        tracing::info!(
            target: "market_snapshot::telemetry",
            event = event_name,
            value = value,
            provider = metadata.provider_id.as_deref().unwrap_or("none"),
            state = metadata.state.as_str(),
            latency_ms = metadata.latency_ms,
            chain = %metadata.chain,
            address = %metadata.address,
            cached = metadata.cached,
            error = metadata.error.as_deref(),
            "telemetry"
        );
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct MemoryTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of all recorded events, oldest first
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn log(&self, event_name: &str, value: f64, metadata: &TelemetryMetadata) {
        self.events.lock().push(TelemetryEvent {
            id: Uuid::new_v4(),
            name: event_name.to_string(),
            value,
            metadata: metadata.clone(),
            timestamp: Utc::now(),
        });
    }
}
