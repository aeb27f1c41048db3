//! End-to-end pipeline behavior with in-process collaborators.

use ai_lib_serve::auth::{ApiKeyAuthenticator, AuthConfig, Authenticator};
use ai_lib_serve::cache::{
    CacheConfig, CacheError, CacheKey, CacheStore, KeyDeriver, ManualClock, MemoryStore,
    ResponseCache,
};
use ai_lib_serve::generation::{GenerationError, Generator};
use ai_lib_serve::telemetry::{
    EventKind, InMemoryTelemetrySink, TelemetryRecord, TelemetrySink, LATENCY_HISTOGRAM,
    REQUEST_COUNTER,
};
use ai_lib_serve::validation::{RejectReason, ValidationRules};
use ai_lib_serve::{Error, GenerationRequest, OutcomeStatus, RequestOrchestrator};
use async_trait::async_trait;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const KEY: &str = "test-key";

/// Returns a fixed reply and counts calls.
struct ScriptedGenerator {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn ok(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(GenerationError::Backend)
    }
}

/// Store whose connection is always down; counts attempts.
#[derive(Default)]
struct UnreachableStore {
    attempts: AtomicUsize,
}

#[async_trait]
impl CacheStore for UnreachableStore {
    async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set_with_ttl(&self, _: &CacheKey, _: &[u8], _: Duration) -> Result<(), CacheError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Unavailable("connection refused".into()))
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}

struct BrokenTelemetry;

#[async_trait]
impl TelemetrySink for BrokenTelemetry {
    async fn record(&self, _: TelemetryRecord) -> ai_lib_serve::Result<()> {
        Err(Error::Telemetry("exporter unreachable".into()))
    }

    async fn increment_counter(&self, _: &str, _: u64) -> ai_lib_serve::Result<()> {
        Err(Error::Telemetry("exporter unreachable".into()))
    }
}

fn authenticator() -> Arc<dyn Authenticator> {
    Arc::new(ApiKeyAuthenticator::new(&AuthConfig::from_comma_separated(KEY)))
}

fn rules() -> ValidationRules {
    ValidationRules::builder()
        .min_length(10)
        .max_length(4000)
        .build()
        .unwrap()
}

fn memory_cache() -> Arc<ResponseCache> {
    Arc::new(ResponseCache::new(
        CacheConfig::default(),
        Arc::new(MemoryStore::new(100)),
    ))
}

fn summarize_request() -> GenerationRequest {
    GenerationRequest::new("Summarize X", "")
        .with_max_tokens(NonZeroU32::new(50).unwrap())
        .with_temperature(0.7)
}

#[tokio::test]
async fn test_summary_is_generated_then_served_from_cache() {
    let generator = ScriptedGenerator::ok("A brief valid summary.");
    let telemetry = Arc::new(InMemoryTelemetrySink::default());
    let orchestrator = RequestOrchestrator::builder()
        .authenticator(authenticator())
        .generator(generator.clone())
        .cache(memory_cache())
        .rules(rules())
        .telemetry(telemetry.clone())
        .build()
        .unwrap();

    let request = summarize_request();
    let first = orchestrator.handle(Some(KEY), &request).await.unwrap();
    assert_eq!(first.response, "A brief valid summary.");
    assert!(!first.cached);
    assert_eq!(generator.calls(), 1);

    let second = orchestrator.handle(Some(KEY), &request).await.unwrap();
    assert_eq!(second.response, "A brief valid summary.");
    assert!(second.cached);
    assert_eq!(generator.calls(), 1);

    let kinds: Vec<EventKind> = telemetry.records().iter().map(|r| r.event_kind).collect();
    assert_eq!(kinds, vec![EventKind::Success, EventKind::Cached]);
    let records = telemetry.records();
    assert_eq!(records[0].prompt_length, "Summarize X".len());
    assert_eq!(records[0].response_length, "A brief valid summary.".len());
    assert!(records[1].cached);
    assert_eq!(telemetry.counter(REQUEST_COUNTER), 2);
    assert_eq!(telemetry.histogram(LATENCY_HISTOGRAM).len(), 2);
}

#[tokio::test]
async fn test_different_params_miss_the_cache() {
    let generator = ScriptedGenerator::ok("A brief valid summary.");
    let orchestrator = RequestOrchestrator::builder()
        .authenticator(authenticator())
        .generator(generator.clone())
        .cache(memory_cache())
        .build()
        .unwrap();

    orchestrator.handle(Some(KEY), &summarize_request()).await.unwrap();
    let other = summarize_request().with_temperature(0.2);
    let resp = orchestrator.handle(Some(KEY), &other).await.unwrap();
    assert!(!resp.cached);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_unknown_credential_never_reaches_cache_or_generation() {
    let generator = ScriptedGenerator::ok("A brief valid summary.");
    let store = Arc::new(UnreachableStore::default());
    let telemetry = Arc::new(InMemoryTelemetrySink::default());
    let orchestrator = RequestOrchestrator::builder()
        .authenticator(authenticator())
        .generator(generator.clone())
        .cache(Arc::new(ResponseCache::new(CacheConfig::default(), store.clone())))
        .telemetry(telemetry.clone())
        .build()
        .unwrap();

    for credential in [Some("wrong-key"), None] {
        let err = orchestrator
            .handle(credential, &summarize_request())
            .await
            .unwrap_err();
        assert_eq!(err.status(), OutcomeStatus::AccessDenied);
    }
    assert_eq!(generator.calls(), 0);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 0);
    assert!(telemetry.is_empty());
}

#[tokio::test]
async fn test_rejected_response_is_never_cached() {
    let generator = ScriptedGenerator::ok("short");
    let cache = memory_cache();
    let telemetry = Arc::new(InMemoryTelemetrySink::default());
    let orchestrator = RequestOrchestrator::builder()
        .authenticator(authenticator())
        .generator(generator.clone())
        .cache(cache.clone())
        .rules(rules())
        .telemetry(telemetry.clone())
        .build()
        .unwrap();

    let request = summarize_request();
    let err = orchestrator.handle(Some(KEY), &request).await.unwrap_err();
    assert_eq!(err.status(), OutcomeStatus::ValidationFailed);
    match &err {
        Error::Rejected { reason, response } => {
            assert_eq!(*reason, RejectReason::TooShort { length: 5, min: 10 });
            assert_eq!(reason.to_string(), "too short");
            assert_eq!(response, "short");
        }
        other => panic!("unexpected error: {other}"),
    }

    let key = KeyDeriver::new().derive_request(&request);
    assert_eq!(cache.get(&key).await, None);

    // A retry regenerates instead of serving the rejected text.
    assert!(orchestrator.handle(Some(KEY), &request).await.is_err());
    assert_eq!(generator.calls(), 2);
    assert_eq!(telemetry.records()[0].event_kind, EventKind::Rejected);
}

#[tokio::test]
async fn test_forbidden_pattern_rejection_reason() {
    let orchestrator = RequestOrchestrator::builder()
        .authenticator(authenticator())
        .generator(ScriptedGenerator::ok("As an AI language model, I cannot."))
        .rules(
            ValidationRules::builder()
                .forbid_pattern("(?i)as an ai language model")
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let err = orchestrator
        .handle(Some(KEY), &summarize_request())
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Response rejected: contains forbidden pattern: (?i)as an ai language model"
    );
}

#[tokio::test]
async fn test_generation_failure_aborts_and_is_not_cached() {
    let generator = ScriptedGenerator::failing("backend exploded");
    let cache = memory_cache();
    let telemetry = Arc::new(InMemoryTelemetrySink::default());
    let orchestrator = RequestOrchestrator::builder()
        .authenticator(authenticator())
        .generator(generator.clone())
        .cache(cache.clone())
        .telemetry(telemetry.clone())
        .build()
        .unwrap();

    let request = summarize_request();
    let err = orchestrator.handle(Some(KEY), &request).await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));
    assert_eq!(err.status(), OutcomeStatus::InternalError);
    assert_eq!(generator.calls(), 1);
    assert_eq!(cache.stats().sets, 0);
    assert_eq!(telemetry.records()[0].event_kind, EventKind::Error);
}

#[tokio::test]
async fn test_unreachable_cache_fails_open() {
    let generator = ScriptedGenerator::ok("A brief valid summary.");
    let store = Arc::new(UnreachableStore::default());
    let orchestrator = RequestOrchestrator::builder()
        .authenticator(authenticator())
        .generator(generator.clone())
        .cache(Arc::new(ResponseCache::new(CacheConfig::default(), store.clone())))
        .build()
        .unwrap();

    for _ in 0..2 {
        let resp = orchestrator
            .handle(Some(KEY), &summarize_request())
            .await
            .unwrap();
        assert_eq!(resp.response, "A brief valid summary.");
        assert!(!resp.cached);
    }
    assert_eq!(generator.calls(), 2);
    // one read and one write per request
    assert_eq!(store.attempts.load(Ordering::SeqCst), 4);
    assert_eq!(orchestrator.cache().stats().errors, 4);
}

#[tokio::test]
async fn test_telemetry_failure_does_not_affect_response() {
    let orchestrator = RequestOrchestrator::builder()
        .authenticator(authenticator())
        .generator(ScriptedGenerator::ok("A brief valid summary."))
        .telemetry(Arc::new(BrokenTelemetry))
        .build()
        .unwrap();

    let resp = orchestrator
        .handle(Some(KEY), &summarize_request())
        .await
        .unwrap();
    assert_eq!(resp.response, "A brief valid summary.");
}

#[tokio::test]
async fn test_cached_entry_expires_and_is_regenerated() {
    let clock = Arc::new(ManualClock::new());
    let cache = Arc::new(ResponseCache::new(
        CacheConfig::default(),
        Arc::new(MemoryStore::with_clock(100, clock.clone())),
    ));
    let generator = ScriptedGenerator::ok("A brief valid summary.");
    let orchestrator = RequestOrchestrator::builder()
        .authenticator(authenticator())
        .generator(generator.clone())
        .cache(cache)
        .cache_ttl(Duration::from_secs(60))
        .build()
        .unwrap();

    let request = summarize_request();
    orchestrator.handle(Some(KEY), &request).await.unwrap();
    clock.advance(Duration::from_secs(30));
    assert!(orchestrator.handle(Some(KEY), &request).await.unwrap().cached);

    clock.advance(Duration::from_secs(30));
    assert!(!orchestrator.handle(Some(KEY), &request).await.unwrap().cached);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_cache_hit_is_not_revalidated() {
    let cache = memory_cache();
    let request = summarize_request();
    // Entry written under earlier, looser rules.
    cache
        .set(&KeyDeriver::new().derive_request(&request), "ok")
        .await;

    let generator = ScriptedGenerator::ok("A brief valid summary.");
    let orchestrator = RequestOrchestrator::builder()
        .authenticator(authenticator())
        .generator(generator.clone())
        .cache(cache)
        .rules(rules())
        .build()
        .unwrap();

    let resp = orchestrator.handle(Some(KEY), &request).await.unwrap();
    assert_eq!(resp.response, "ok");
    assert!(resp.cached);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_share_the_cache() {
    let generator = ScriptedGenerator::ok("A brief valid summary.");
    let orchestrator = Arc::new(
        RequestOrchestrator::builder()
            .authenticator(authenticator())
            .generator(generator.clone())
            .cache(memory_cache())
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let orch = orchestrator.clone();
            tokio::spawn(async move { orch.handle(Some(KEY), &summarize_request()).await })
        })
        .collect();
    for h in handles {
        let resp = h.await.unwrap().unwrap();
        assert_eq!(resp.response, "A brief valid summary.");
    }

    // No single-flight: racing misses may each generate, but the entry ends up cached.
    assert!(generator.calls() >= 1);
    let after = orchestrator
        .handle(Some(KEY), &summarize_request())
        .await
        .unwrap();
    assert!(after.cached);
}
