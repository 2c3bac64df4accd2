use thiserror::Error;

use crate::bank::BankError;

/// Errors returned by the engine's channel management operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The question bank cannot feed a session.
    #[error("question bank unusable")]
    Bank(#[from] BankError),
    /// A session already runs in this channel.
    #[error("already playing in {0}")]
    ChannelAlreadyJoined(String),
    /// No session runs in this channel.
    #[error("not playing in {0}")]
    UnknownChannel(String),
    /// The session task stopped before handling the request.
    #[error("session in {0} is closed")]
    SessionClosed(String),
}
