//! 遥测模块：请求级遥测记录与可注入的遥测接收端。
//!
//! Telemetry Module.
//!
//! The pipeline emits one [`TelemetryRecord`] per completed request plus a
//! request counter and a latency histogram update. Where those go is decided
//! by the [`TelemetrySink`] handed to the orchestrator; there is no global
//! registry. Sink failures are logged by the caller and never affect the
//! response.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`TelemetryRecord`] | Per-request event (lengths, duration, cached flag) |
//! | [`TelemetrySink`] | Trait for telemetry destinations |
//! | [`NoopTelemetrySink`] | Discards everything |
//! | [`TracingTelemetrySink`] | Renders records as structured `tracing` events |
//! | [`InMemoryTelemetrySink`] | Keeps records and metrics in memory (tests, diagnostics) |
//! | [`CompositeTelemetrySink`] | Fans out to several sinks |

mod sinks;

pub use sinks::{CompositeTelemetrySink, InMemoryTelemetrySink, TracingTelemetrySink};

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Counter incremented once per completed request.
pub const REQUEST_COUNTER: &str = "model_requests";
/// Histogram of end-to-end request latency, in seconds.
pub const LATENCY_HISTOGRAM: &str = "model_latency";

/// Final outcome of a request as seen by telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Success,
    Cached,
    Rejected,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Success => "success",
            EventKind::Cached => "cached",
            EventKind::Rejected => "rejected",
            EventKind::Error => "error",
        }
    }
}

/// One request's telemetry. Carries lengths only, never content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub request_id: String,
    pub event_kind: EventKind,
    pub prompt_length: usize,
    pub context_length: usize,
    pub response_length: usize,
    pub duration: Duration,
    pub cached: bool,
}

impl TelemetryRecord {
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// Destination for telemetry.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record(&self, record: TelemetryRecord) -> Result<()>;

    async fn increment_counter(&self, _name: &str, _value: u64) -> Result<()> {
        Ok(())
    }

    async fn record_histogram(&self, _name: &str, _value: f64) -> Result<()> {
        Ok(())
    }
}

/// No-op sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetrySink;

#[async_trait]
impl TelemetrySink for NoopTelemetrySink {
    async fn record(&self, _record: TelemetryRecord) -> Result<()> {
        Ok(())
    }
}

/// Returns a shared no-op sink.
pub fn noop_sink() -> Arc<dyn TelemetrySink> {
    Arc::new(NoopTelemetrySink)
}
