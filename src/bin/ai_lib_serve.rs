//! ai-lib-serve — cached, validated LLM request service.
//!
//! Usage:
//!   ai-lib-serve [config.yaml]
//!
//! The config path may also be given via `AI_LIB_SERVE_CONFIG`. Environment
//! overrides (`VALID_API_KEYS`, `REDIS_URL`, ...) are applied on top.

use ai_lib_serve::{server, RequestOrchestrator, ServiceConfig};
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("AI_LIB_SERVE_CONFIG").ok())
        .map(PathBuf::from);

    let config = ServiceConfig::load(path.as_deref()).context("loading configuration")?;
    if config.auth.api_keys.is_empty() {
        tracing::warn!("no API keys configured; every request will be denied");
    }

    let orchestrator =
        RequestOrchestrator::from_config(&config).context("building request pipeline")?;
    tracing::info!(
        service = %config.service_name,
        model = %config.generation.model,
        cache_store = orchestrator.cache().store_name(),
        "starting"
    );

    server::serve(&config.server.bind_addr, Arc::new(orchestrator))
        .await
        .context("serving HTTP")?;
    Ok(())
}
