//! Telemetry sink implementations.

use super::{TelemetryRecord, TelemetrySink};
use crate::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

/// Logs each record as a structured `tracing` event.
#[derive(Debug, Clone)]
pub struct TracingTelemetrySink {
    service_name: String,
}

impl TracingTelemetrySink {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl Default for TracingTelemetrySink {
    fn default() -> Self {
        Self::new("model-service")
    }
}

#[async_trait]
impl TelemetrySink for TracingTelemetrySink {
    async fn record(&self, record: TelemetryRecord) -> Result<()> {
        info!(
            target: "ai_lib_serve::telemetry",
            service = %self.service_name,
            request_id = %record.request_id,
            event = record.event_kind.as_str(),
            prompt_length = record.prompt_length,
            context_length = record.context_length,
            response_length = record.response_length,
            duration_ms = record.duration_ms(),
            cached = record.cached,
            "Model request processed"
        );
        Ok(())
    }
}

/// In-memory sink; keeps at most `max_records` records, dropping the oldest.
pub struct InMemoryTelemetrySink {
    records: RwLock<VecDeque<TelemetryRecord>>,
    counters: RwLock<HashMap<String, u64>>,
    histograms: RwLock<HashMap<String, Vec<f64>>>,
    max_records: usize,
}

impl InMemoryTelemetrySink {
    pub fn new(max_records: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            counters: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
            max_records,
        }
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    pub fn histogram(&self, name: &str) -> Vec<f64> {
        self.histograms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryTelemetrySink {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl TelemetrySink for InMemoryTelemetrySink {
    async fn record(&self, record: TelemetryRecord) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.push_back(record);
        if records.len() > self.max_records {
            records.pop_front();
        }
        Ok(())
    }

    async fn increment_counter(&self, name: &str, value: u64) -> Result<()> {
        *self
            .counters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert(0) += value;
        Ok(())
    }

    async fn record_histogram(&self, name: &str, value: f64) -> Result<()> {
        self.histograms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .push(value);
        Ok(())
    }
}

/// Fans every call out to all inner sinks concurrently. Reports the first
/// inner failure after all sinks have been called.
#[derive(Default)]
pub struct CompositeTelemetrySink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl CompositeTelemetrySink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

fn first_error(results: Vec<Result<()>>) -> Result<()> {
    results.into_iter().find(|r| r.is_err()).unwrap_or(Ok(()))
}

#[async_trait]
impl TelemetrySink for CompositeTelemetrySink {
    async fn record(&self, record: TelemetryRecord) -> Result<()> {
        first_error(join_all(self.sinks.iter().map(|s| s.record(record.clone()))).await)
    }

    async fn increment_counter(&self, name: &str, value: u64) -> Result<()> {
        first_error(join_all(self.sinks.iter().map(|s| s.increment_counter(name, value))).await)
    }

    async fn record_histogram(&self, name: &str, value: f64) -> Result<()> {
        first_error(join_all(self.sinks.iter().map(|s| s.record_histogram(name, value))).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{EventKind, REQUEST_COUNTER};
    use crate::Error;
    use std::time::Duration;

    fn record(kind: EventKind) -> TelemetryRecord {
        TelemetryRecord {
            request_id: "r1".into(),
            event_kind: kind,
            prompt_length: 5,
            context_length: 0,
            response_length: 20,
            duration: Duration::from_millis(12),
            cached: kind == EventKind::Cached,
        }
    }

    struct FailingSink;

    #[async_trait]
    impl TelemetrySink for FailingSink {
        async fn record(&self, _: TelemetryRecord) -> Result<()> {
            Err(Error::Telemetry("exporter down".into()))
        }
    }

    #[tokio::test]
    async fn test_in_memory_bounded() {
        let sink = InMemoryTelemetrySink::new(2);
        sink.record(record(EventKind::Success)).await.unwrap();
        sink.record(record(EventKind::Cached)).await.unwrap();
        sink.record(record(EventKind::Rejected)).await.unwrap();
        let kinds: Vec<EventKind> = sink.records().iter().map(|r| r.event_kind).collect();
        assert_eq!(kinds, vec![EventKind::Cached, EventKind::Rejected]);
    }

    #[tokio::test]
    async fn test_in_memory_keeps_newest_in_order() {
        let sink = InMemoryTelemetrySink::new(3);
        for i in 0..10 {
            let mut r = record(EventKind::Success);
            r.request_id = format!("r{i}");
            sink.record(r).await.unwrap();
        }
        let ids: Vec<String> = sink.records().into_iter().map(|r| r.request_id).collect();
        assert_eq!(ids, vec!["r7", "r8", "r9"]);
    }

    #[tokio::test]
    async fn test_in_memory_metrics() {
        let sink = InMemoryTelemetrySink::default();
        sink.increment_counter(REQUEST_COUNTER, 1).await.unwrap();
        sink.increment_counter(REQUEST_COUNTER, 2).await.unwrap();
        sink.record_histogram("latency", 0.5).await.unwrap();
        assert_eq!(sink.counter(REQUEST_COUNTER), 3);
        assert_eq!(sink.histogram("latency"), vec![0.5]);
        assert_eq!(sink.counter("unknown"), 0);
    }

    #[tokio::test]
    async fn test_composite_reaches_all_sinks_despite_failure() {
        let memory = Arc::new(InMemoryTelemetrySink::default());
        let composite = CompositeTelemetrySink::new()
            .add_sink(Arc::new(FailingSink))
            .add_sink(memory.clone());
        assert!(composite.record(record(EventKind::Success)).await.is_err());
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_event_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&EventKind::Rejected).unwrap(),
            "\"rejected\""
        );
    }
}
