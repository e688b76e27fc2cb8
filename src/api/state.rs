//! Application state for shared, process-wide components
//!
//! Every "initialize once per process" collaborator lives here and is passed
//! into the pipeline assembler explicitly; there is no global state. All
//! fields are read-only after construction except the rate limiter's
//! internal counters.

use std::sync::Arc;

use sqlx::PgPool;

use crate::api::middleware::security::SecurityPolicy;
use crate::config::Settings;
use crate::infrastructure::auth::TokenVerifier;
use crate::infrastructure::rate_limit::RateLimiter;
use crate::infrastructure::tasks::TaskQueue;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: PgPool,
    pub rate_limiter: Arc<RateLimiter>,
    pub token_verifier: Arc<TokenVerifier>,
    pub task_queue: Arc<TaskQueue>,
    pub security_policy: Arc<SecurityPolicy>,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        db: PgPool,
        rate_limiter: Arc<RateLimiter>,
        token_verifier: Arc<TokenVerifier>,
        task_queue: Arc<TaskQueue>,
        security_policy: Arc<SecurityPolicy>,
    ) -> Self {
        Self {
            settings,
            db,
            rate_limiter,
            token_verifier,
            task_queue,
            security_policy,
        }
    }
}
