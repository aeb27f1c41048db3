//! End-to-end request pipeline.
//!
//! ```text
//! Authenticating → CacheLookup ─(hit)→ Done(cached)
//!                       └─(miss)→ Generating → Validating ─(reject)→ Rejected
//!                                                   └─(accept)→ CacheStore → Done
//! ```
//!
//! Each call to [`RequestOrchestrator::handle`] is independent; the only state
//! shared between concurrent calls is the cache store. Nothing is persisted
//! before the final cache write, so a caller that stops waiting leaves
//! nothing to clean up.

use crate::auth::{ApiKeyAuthenticator, Authenticator, Principal};
use crate::cache::{self, CacheConfig, KeyDeriver, MemoryStore, ResponseCache};
use crate::config::ServiceConfig;
use crate::error::Error;
use crate::generation::{Generator, HttpGenerator};
use crate::telemetry::{
    EventKind, TelemetryRecord, TelemetrySink, TracingTelemetrySink, LATENCY_HISTOGRAM,
    REQUEST_COUNTER,
};
use crate::types::{GenerationRequest, GenerationResponse};
use crate::validation::{ResponseValidator, ValidationRules, Verdict};
use crate::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Composes authentication, caching, generation, validation and telemetry.
pub struct RequestOrchestrator {
    authenticator: Arc<dyn Authenticator>,
    generator: Arc<dyn Generator>,
    cache: Arc<ResponseCache>,
    key_deriver: KeyDeriver,
    validator: ResponseValidator,
    telemetry: Arc<dyn TelemetrySink>,
    cache_ttl: Duration,
}

impl RequestOrchestrator {
    pub fn builder() -> RequestOrchestratorBuilder {
        RequestOrchestratorBuilder::new()
    }

    /// Wire the production pipeline from service configuration.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let store = cache::open_store(&config.cache.url, config.cache.max_entries)?;
        let cache = ResponseCache::new(config.cache.to_cache_config(), store);
        Self::builder()
            .authenticator(Arc::new(ApiKeyAuthenticator::new(&config.auth)))
            .generator(Arc::new(HttpGenerator::new(&config.generation)?))
            .cache(Arc::new(cache))
            .key_deriver(KeyDeriver::new().with_namespace(config.cache.key_prefix.clone()))
            .rules(ValidationRules::from_config(&config.validation)?)
            .telemetry(Arc::new(TracingTelemetrySink::new(config.service_name.clone())))
            .build()
    }

    /// Authenticate a credential without running a request.
    pub fn authenticate(&self, credential: Option<&str>) -> Result<Principal> {
        self.authenticator.authenticate(credential).map_err(|e| {
            warn!(error = %e, "request denied");
            Error::from(e)
        })
    }

    /// Run one request through the pipeline.
    pub async fn handle(
        &self,
        credential: Option<&str>,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse> {
        let started = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = info_span!(
            "generate",
            request_id = %request_id,
            prompt_length = request.prompt.chars().count(),
            context_length = request.context.chars().count(),
            max_tokens = request.max_tokens.get(),
            temperature = request.temperature,
        );

        self.run(&request_id, credential, request, started)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        request_id: &str,
        credential: Option<&str>,
        request: &GenerationRequest,
        started: Instant,
    ) -> Result<GenerationResponse> {
        let principal = self.authenticate(credential)?;
        debug!(principal = %principal.id, "authenticated");

        let key = self.key_deriver.derive_request(request);
        if let Some(text) = self.cache.get(&key).await {
            self.emit(request_id, request, EventKind::Cached, text.chars().count(), started)
                .await;
            info!("served from cache");
            return Ok(GenerationResponse {
                response: text,
                cached: true,
            });
        }

        let text = match self.generator.generate(request).await {
            Ok(text) => text,
            Err(e) => {
                error!(generator = self.generator.name(), error = %e, "generation failed");
                self.emit(request_id, request, EventKind::Error, 0, started).await;
                return Err(Error::from(e));
            }
        };
        let response_length = text.chars().count();

        if let Verdict::Reject(reason) = self.validator.validate(&text) {
            warn!(reason = %reason, response_length, "response rejected");
            self.emit(request_id, request, EventKind::Rejected, response_length, started)
                .await;
            return Err(Error::Rejected {
                reason,
                response: text,
            });
        }

        self.cache.set_with_ttl(&key, &text, self.cache_ttl).await;
        self.emit(request_id, request, EventKind::Success, response_length, started)
            .await;
        info!(response_length, "generated");
        Ok(GenerationResponse {
            response: text,
            cached: false,
        })
    }

    async fn emit(
        &self,
        request_id: &str,
        request: &GenerationRequest,
        kind: EventKind,
        response_length: usize,
        started: Instant,
    ) {
        let duration = started.elapsed();
        let record = TelemetryRecord {
            request_id: request_id.to_string(),
            event_kind: kind,
            prompt_length: request.prompt.chars().count(),
            context_length: request.context.chars().count(),
            response_length,
            duration,
            cached: kind == EventKind::Cached,
        };
        if let Err(e) = self.telemetry.record(record).await {
            warn!(error = %e, "telemetry record dropped");
        }
        if let Err(e) = self.telemetry.increment_counter(REQUEST_COUNTER, 1).await {
            warn!(error = %e, metric = REQUEST_COUNTER, "telemetry metric dropped");
        }
        if let Err(e) = self
            .telemetry
            .record_histogram(LATENCY_HISTOGRAM, duration.as_secs_f64())
            .await
        {
            warn!(error = %e, metric = LATENCY_HISTOGRAM, "telemetry metric dropped");
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn key_deriver(&self) -> &KeyDeriver {
        &self.key_deriver
    }

    pub fn validator(&self) -> &ResponseValidator {
        &self.validator
    }
}

/// Builder for [`RequestOrchestrator`].
///
/// An authenticator and a generator are required. Unless overridden, the
/// cache is an in-memory store of 10 000 entries with a one hour ttl, the
/// rules are [`ValidationRules::default`] and telemetry goes to
/// [`TracingTelemetrySink`].
#[derive(Default)]
pub struct RequestOrchestratorBuilder {
    authenticator: Option<Arc<dyn Authenticator>>,
    generator: Option<Arc<dyn Generator>>,
    cache: Option<Arc<ResponseCache>>,
    key_deriver: Option<KeyDeriver>,
    rules: Option<ValidationRules>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    cache_ttl: Option<Duration>,
}

impl RequestOrchestratorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn key_deriver(mut self, key_deriver: KeyDeriver) -> Self {
        self.key_deriver = Some(key_deriver);
        self
    }

    pub fn rules(mut self, rules: ValidationRules) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Ttl for newly cached responses; defaults to the cache's configured ttl.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn build(self) -> Result<RequestOrchestrator> {
        let authenticator = self
            .authenticator
            .ok_or_else(|| Error::configuration("orchestrator requires an authenticator"))?;
        let generator = self
            .generator
            .ok_or_else(|| Error::configuration("orchestrator requires a generator"))?;
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(ResponseCache::new(
                CacheConfig::default(),
                Arc::new(MemoryStore::new(10_000)),
            ))
        });
        let cache_ttl = self.cache_ttl.unwrap_or_else(|| cache.default_ttl());

        Ok(RequestOrchestrator {
            authenticator,
            generator,
            cache,
            key_deriver: self.key_deriver.unwrap_or_default(),
            validator: ResponseValidator::new(self.rules.unwrap_or_default()),
            telemetry: self
                .telemetry
                .unwrap_or_else(|| Arc::new(TracingTelemetrySink::default())),
            cache_ttl,
        })
    }
}
