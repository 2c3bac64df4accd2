//! Durable high score persistence shared by every channel session.

mod error;
pub mod file;
pub mod memory;

use std::cmp::Ordering;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub use self::error::{StoreError, StoreResult};
pub use self::file::JsonFileScoreStore;
pub use self::memory::MemoryScoreStore;

/// Highest score ever recorded for a player identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreRecord {
    /// Display form of the identity that set the record.
    pub identity: String,
    /// Best cumulative score seen for this identity.
    pub score: u32,
    /// When the record was last raised.
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

impl ScoreRecord {
    /// Build a record stamped with the current UTC time.
    pub fn new(identity: impl Into<String>, score: u32) -> Self {
        Self {
            identity: identity.into(),
            score,
            recorded_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Whether an upsert changed the stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The score beat the stored record (or no record existed).
    Updated,
    /// The stored record was already at least as high.
    Unchanged,
}

/// Abstraction over the persistence layer for high scores.
///
/// Implementations must be safe to call concurrently from several channel
/// sessions and must serialize writes for the same identity.
pub trait ScoreStore: Send + Sync {
    /// Every stored record, in no particular order.
    fn load(&self) -> BoxFuture<'static, StoreResult<Vec<ScoreRecord>>>;
    /// Stored record for `identity`, matched case-insensitively.
    fn get(&self, identity: &str) -> BoxFuture<'static, StoreResult<Option<ScoreRecord>>>;
    /// Persist `score` only if it beats the stored record for `identity`.
    fn upsert(&self, identity: &str, score: u32) -> BoxFuture<'static, StoreResult<UpsertOutcome>>;
    /// Best `n` records, highest score first, ties broken by earliest timestamp.
    fn top(&self, n: usize) -> BoxFuture<'static, StoreResult<Vec<ScoreRecord>>>;
}

/// Key under which an identity is stored.
pub(crate) fn identity_key(identity: &str) -> String {
    identity.trim().to_lowercase()
}

/// Ordering used by [`ScoreStore::top`].
pub(crate) fn leaderboard_order(a: &ScoreRecord, b: &ScoreRecord) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.recorded_at.cmp(&b.recorded_at))
        .then_with(|| a.identity.cmp(&b.identity))
}

/// Sort `records` into leaderboard order and keep the first `n`.
pub(crate) fn rank(mut records: Vec<ScoreRecord>, n: usize) -> Vec<ScoreRecord> {
    records.sort_by(leaderboard_order);
    records.truncate(n);
    records
}
