use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::store::{ScoreStore, StoreError, StoreResult, UpsertOutcome};

const INITIAL_DELAY: Duration = Duration::from_millis(200);
const MAX_DELAY: Duration = Duration::from_secs(2);
const MAX_ATTEMPTS: u32 = 3;

/// Retry schedule for score writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub attempts: u32,
    /// Pause after the first failure; doubled after every further failure.
    pub initial_delay: Duration,
    /// Upper bound of the pause between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: MAX_ATTEMPTS,
            initial_delay: INITIAL_DELAY,
            max_delay: MAX_DELAY,
        }
    }
}

/// Upsert `score` for `identity`, retrying failed writes with exponential backoff.
///
/// Returns [`StoreError::RetryExhausted`] wrapping the last failure once every
/// attempt failed.
pub async fn persist_score(
    store: &dyn ScoreStore,
    identity: &str,
    score: u32,
    policy: RetryPolicy,
) -> StoreResult<UpsertOutcome> {
    let attempts = policy.attempts.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 1;

    loop {
        match store.upsert(identity, score).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) if attempt >= attempts => {
                return Err(StoreError::RetryExhausted {
                    attempts,
                    source: Box::new(err),
                });
            }
            Err(err) => {
                warn!(attempt, identity, error = %err, "score write failed; retrying");
                sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
                attempt += 1;
            }
        }
    }
}
