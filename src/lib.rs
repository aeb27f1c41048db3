//! # ai-lib-serve
//!
//! 面向大模型推理后端的请求管道：缓存、响应校验与遥测。
//!
//! Request pipeline that fronts an LLM generation backend and adds response
//! caching, response validation and telemetry around raw generation calls.
//!
//! ## Overview
//!
//! Every request follows the same linear path:
//!
//! ```text
//! authenticate → cache lookup ─(hit)──────────────────────────────→ done (cached)
//!                     └─(miss)→ generate → validate ─(reject)→ rejected
//!                                                └─(accept)→ cache store → done
//! ```
//!
//! The cache is a best-effort optimization: a store outage degrades to "always
//! regenerate" and is never surfaced to the caller. Validation is authoritative,
//! so a rejected response is never cached or returned as a success.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_lib_serve::auth::{ApiKeyAuthenticator, AuthConfig};
//! use ai_lib_serve::generation::{GenerationConfig, HttpGenerator};
//! use ai_lib_serve::{GenerationRequest, RequestOrchestrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> ai_lib_serve::Result<()> {
//!     let auth = AuthConfig::from_comma_separated("key-1,key-2");
//!     let orchestrator = RequestOrchestrator::builder()
//!         .authenticator(Arc::new(ApiKeyAuthenticator::new(&auth)))
//!         .generator(Arc::new(HttpGenerator::new(&GenerationConfig::default())?))
//!         .build()?;
//!
//!     let request = GenerationRequest::new("Summarize X", "");
//!     let response = orchestrator.handle(Some("key-1"), &request).await?;
//!     println!("{} (cached: {})", response.response, response.cached);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | API-key authentication against a configured allow-set |
//! | [`cache`] | Cache key derivation, cache stores and the fail-open response cache |
//! | [`validation`] | Response acceptance rules (length bounds, required/forbidden patterns) |
//! | [`generation`] | Generation backend trait and the HTTP backend client |
//! | [`telemetry`] | Telemetry records and sinks |
//! | [`orchestrator`] | The end-to-end request pipeline |
//! | [`config`] | Service configuration (YAML file + environment) |

pub mod auth;
pub mod cache;
pub mod config;
pub mod generation;
pub mod orchestrator;
pub mod telemetry;
pub mod types;
pub mod validation;

#[cfg(feature = "server")]
pub mod server;

pub use config::ServiceConfig;
pub use orchestrator::{RequestOrchestrator, RequestOrchestratorBuilder};
pub use types::{GenerationRequest, GenerationResponse};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, OutcomeStatus};
