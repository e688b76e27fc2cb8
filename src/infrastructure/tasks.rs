//! Deferred-task execution contract
//!
//! Registers the work-submission channel against the configured broker and
//! result store. The executor itself is an external collaborator; this
//! module only fixes the contract: JSON-only envelopes, UTC timestamps,
//! soft/hard execution ceilings, worker recycling, and round-robin prefetch.
//! Submission is fire-and-forget - the request path never blocks on a task
//! and task failures never propagate back into it.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::TaskQueueSettings;

/// Broker list the submission channel pushes envelopes onto.
pub const TASK_QUEUE_KEY: &str = "claimiq:tasks";

#[derive(Debug, Error)]
pub enum TaskQueueError {
    #[error(
        "task soft time limit ({soft_secs}s) must be strictly less than the hard limit ({hard_secs}s)"
    )]
    SoftCeilingNotBelowHard { soft_secs: u64, hard_secs: u64 },

    #[error("invalid task broker URL: {0}")]
    Broker(String),

    #[error("invalid task result-backend URL: {0}")]
    ResultBackend(String),
}

/// Per-task execution limits and worker lifecycle policy.
#[derive(Debug, Clone, Serialize)]
pub struct TaskExecutionPolicy {
    /// Running tasks are signaled to wind down after this long.
    pub soft_time_limit: Duration,
    /// Tasks still running this long after start are forcibly terminated and
    /// recorded as failed.
    pub hard_time_limit: Duration,
    /// Worker processes are recycled after this many completed tasks to
    /// bound memory growth.
    pub max_tasks_per_worker: u32,
    /// One unacknowledged task per worker: strict round-robin fairness
    /// instead of greedy batching.
    pub prefetch_count: u16,
}

impl Default for TaskExecutionPolicy {
    fn default() -> Self {
        Self {
            soft_time_limit: Duration::from_secs(25 * 60),
            hard_time_limit: Duration::from_secs(30 * 60),
            max_tasks_per_worker: 100,
            prefetch_count: 1,
        }
    }
}

impl TaskExecutionPolicy {
    pub fn validate(&self) -> Result<(), TaskQueueError> {
        if self.soft_time_limit >= self.hard_time_limit {
            return Err(TaskQueueError::SoftCeilingNotBelowHard {
                soft_secs: self.soft_time_limit.as_secs(),
                hard_secs: self.hard_time_limit.as_secs(),
            });
        }
        Ok(())
    }
}

/// Identifier assigned to a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskId(pub Uuid);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The JSON envelope pushed to the broker. Timestamps are UTC; the execution
/// limits travel with the task so the executor enforces the same ceilings
/// the submitter registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: TaskId,
    pub task: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    pub soft_time_limit_secs: u64,
    pub hard_time_limit_secs: u64,
}

/// Work-submission channel to the out-of-process task executor.
pub struct TaskQueue {
    broker: redis::Client,
    result_backend: redis::Client,
    policy: TaskExecutionPolicy,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("policy", &self.policy)
            .finish()
    }
}

impl TaskQueue {
    /// Wires the broker and result-store endpoints. Validates the execution
    /// policy but opens no connection; the first submission does.
    pub fn new(
        settings: &TaskQueueSettings,
        policy: TaskExecutionPolicy,
    ) -> Result<Self, TaskQueueError> {
        policy.validate()?;

        let broker = redis::Client::open(settings.broker_url.as_str())
            .map_err(|e| TaskQueueError::Broker(e.to_string()))?;
        let result_backend = redis::Client::open(settings.result_backend_url.as_str())
            .map_err(|e| TaskQueueError::ResultBackend(e.to_string()))?;

        Ok(Self {
            broker,
            result_backend,
            policy,
        })
    }

    pub fn policy(&self) -> &TaskExecutionPolicy {
        &self.policy
    }

    /// The result store the executor writes task outcomes to. The pipeline
    /// never reads it; it is registered here so both sides agree on one
    /// endpoint.
    pub fn result_backend(&self) -> &redis::Client {
        &self.result_backend
    }

    /// Submits a task and returns its identifier immediately. Delivery runs
    /// in the background; a broker outage is logged and dropped rather than
    /// surfaced to the caller.
    pub fn submit(&self, task: &str, payload: Value) -> TaskId {
        let envelope = TaskEnvelope {
            id: TaskId(Uuid::new_v4()),
            task: task.to_string(),
            payload,
            enqueued_at: Utc::now(),
            soft_time_limit_secs: self.policy.soft_time_limit.as_secs(),
            hard_time_limit_secs: self.policy.hard_time_limit.as_secs(),
        };
        let id = envelope.id;
        let broker = self.broker.clone();

        tokio::spawn(async move {
            match serde_json::to_string(&envelope) {
                Ok(body) => {
                    if let Err(e) = push(broker, body).await {
                        warn!(task_id = %envelope.id, error = %e, "Task submission failed");
                    } else {
                        debug!(task_id = %envelope.id, task = %envelope.task, "Task submitted");
                    }
                }
                Err(e) => warn!(task_id = %envelope.id, error = %e, "Task envelope not serializable"),
            }
        });

        id
    }
}

async fn push(broker: redis::Client, body: String) -> Result<(), redis::RedisError> {
    let mut connection = broker.get_multiplexed_async_connection().await?;
    let _: () = connection.lpush(TASK_QUEUE_KEY, body).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskQueueSettings;
    use url::Url;

    fn settings() -> TaskQueueSettings {
        TaskQueueSettings {
            broker_url: Url::parse("redis://127.0.0.1:1/0").unwrap(),
            result_backend_url: Url::parse("redis://127.0.0.1:1/0").unwrap(),
        }
    }

    #[test]
    fn test_default_policy_is_valid() {
        let policy = TaskExecutionPolicy::default();

        assert!(policy.validate().is_ok());
        assert_eq!(policy.soft_time_limit, Duration::from_secs(25 * 60));
        assert_eq!(policy.hard_time_limit, Duration::from_secs(30 * 60));
        assert_eq!(policy.max_tasks_per_worker, 100);
        assert_eq!(policy.prefetch_count, 1);
    }

    #[test]
    fn test_soft_ceiling_must_be_below_hard() {
        let policy = TaskExecutionPolicy {
            soft_time_limit: Duration::from_secs(30 * 60),
            hard_time_limit: Duration::from_secs(30 * 60),
            ..TaskExecutionPolicy::default()
        };

        assert!(matches!(
            policy.validate(),
            Err(TaskQueueError::SoftCeilingNotBelowHard { .. })
        ));
    }

    #[test]
    fn test_invalid_policy_rejected_at_registration() {
        let policy = TaskExecutionPolicy {
            soft_time_limit: Duration::from_secs(31 * 60),
            ..TaskExecutionPolicy::default()
        };

        assert!(TaskQueue::new(&settings(), policy).is_err());
    }

    #[test]
    fn test_submit_is_fire_and_forget() {
        // The broker endpoint is unreachable; submission must still return
        // an ID immediately without surfacing an error.
        tokio_test::block_on(async {
            let queue = TaskQueue::new(&settings(), TaskExecutionPolicy::default()).unwrap();
            let id = queue.submit("claims.recalculate", serde_json::json!({"claim_id": 7}));

            assert!(!id.to_string().is_empty());
        });
    }

    #[test]
    fn test_envelope_is_json_with_utc_timestamp_and_limits() {
        let envelope = TaskEnvelope {
            id: TaskId(Uuid::nil()),
            task: "claims.recalculate".to_string(),
            payload: serde_json::json!({"claim_id": 7}),
            enqueued_at: Utc::now(),
            soft_time_limit_secs: 25 * 60,
            hard_time_limit_secs: 30 * 60,
        };

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"task\":\"claims.recalculate\""));
        assert!(json.contains("\"soft_time_limit_secs\":1500"));
        assert!(json.contains("\"hard_time_limit_secs\":1800"));

        let parsed: TaskEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.enqueued_at.timezone(), Utc);
    }
}
