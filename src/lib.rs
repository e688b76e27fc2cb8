//! ClaimIQ API
//!
//! Bootstrap layer for the ClaimIQ backend: resolves configuration from the
//! environment, assembles the request pipeline (proxy trust, security
//! headers, cross-origin policy, rate limiting, authentication context) and
//! registers the deferred-task execution contract.

pub mod api;
pub mod cli;
pub mod config;
pub mod infrastructure;

pub use config::Settings;

use std::sync::Arc;

use api::middleware::SecurityPolicy;
use api::state::AppState;
use infrastructure::auth::TokenVerifier;
use infrastructure::rate_limit::RateLimiter;
use infrastructure::tasks::{TaskExecutionPolicy, TaskQueue};
use tracing::info;

/// Constructs the process-wide components from a resolved snapshot.
///
/// Everything here is "initialize once per process": the snapshot is frozen
/// behind an `Arc`, the database pool is created lazily (no I/O until the
/// first checkout), and the task-queue contract is validated before any
/// request is served.
pub async fn create_app_state(settings: Settings) -> anyhow::Result<AppState> {
    let settings = Arc::new(settings);

    let db = infrastructure::database::build_pool(&settings.database)?;

    let rate_limiter = match &settings.rate_limit.storage_url {
        Some(url) => {
            info!(storage = %url, "Using external rate-limit counter storage");
            Arc::new(
                RateLimiter::with_redis(settings.rate_limit.default_policy.clone(), url.as_str())
                    .await?,
            )
        }
        None => {
            info!("Using in-process rate-limit counters");
            Arc::new(RateLimiter::in_memory(
                settings.rate_limit.default_policy.clone(),
            ))
        }
    };

    let token_verifier = Arc::new(TokenVerifier::new(&settings.token_signing_secret));

    let task_queue = Arc::new(TaskQueue::new(
        &settings.task_queue,
        TaskExecutionPolicy::default(),
    )?);
    info!(
        broker = %settings.task_queue.broker_url,
        result_backend = %settings.task_queue.result_backend_url,
        "Deferred-task contract registered"
    );

    Ok(AppState::new(
        settings,
        db,
        rate_limiter,
        token_verifier,
        task_queue,
        Arc::new(SecurityPolicy::strict_default()),
    ))
}
