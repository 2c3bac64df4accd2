pub mod session;
pub mod state_machine;
pub mod timer;

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender},
        oneshot,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    bank::{BankError, QuestionBank},
    config::QuizConfig,
    dto::{events::ChatEvent, outbound::Outbound},
    error::EngineError,
    messages::MessageFormatter,
    services::persistence::RetryPolicy,
    store::ScoreStore,
};

pub use self::session::{GameSession, SessionSnapshot};
pub use self::state_machine::{GamePhase, Snapshot};
use self::session::{ChannelSession, SessionContext, SessionInput};

/// Engine handle shared between the transport and the binary.
pub type SharedEngine = Arc<QuizEngine>;

/// Handle used to feed a running channel session.
struct SessionHandle {
    tx: UnboundedSender<SessionInput>,
    task: JoinHandle<()>,
}

/// Registry of channel sessions sharing one configuration, score store and formatter.
pub struct QuizEngine {
    context: SessionContext,
    sessions: DashMap<String, SessionHandle>,
}

fn channel_key(channel: &str) -> String {
    channel.trim().to_lowercase()
}

impl QuizEngine {
    /// Construct a new engine wrapped in an [`Arc`], together with the outbound stream
    /// every session writes to.
    pub fn new(
        config: QuizConfig,
        store: Arc<dyn ScoreStore>,
        formatter: Arc<dyn MessageFormatter>,
    ) -> (SharedEngine, UnboundedReceiver<Outbound>) {
        Self::new_with_retry(config, store, formatter, RetryPolicy::default())
    }

    /// Same as [`QuizEngine::new`] with a custom persistence retry policy.
    pub fn new_with_retry(
        config: QuizConfig,
        store: Arc<dyn ScoreStore>,
        formatter: Arc<dyn MessageFormatter>,
        retry: RetryPolicy,
    ) -> (SharedEngine, UnboundedReceiver<Outbound>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            context: SessionContext {
                config: Arc::new(config),
                store,
                formatter,
                outbound,
                retry,
            },
            sessions: DashMap::new(),
        });
        (engine, rx)
    }

    /// Configuration shared by every session.
    pub fn config(&self) -> &QuizConfig {
        &self.context.config
    }

    /// Start a session in `channel` asking questions from `bank`.
    ///
    /// The session posts the channel topic as soon as it starts.
    pub fn join_channel(&self, channel: &str, bank: QuestionBank) -> Result<(), EngineError> {
        if bank.is_empty() {
            return Err(BankError::Empty.into());
        }

        match self.sessions.entry(channel_key(channel)) {
            Entry::Occupied(_) => Err(EngineError::ChannelAlreadyJoined(channel.to_owned())),
            Entry::Vacant(slot) => {
                let (tx, task) =
                    ChannelSession::spawn(self.context.clone(), channel.trim().to_owned(), bank);
                slot.insert(SessionHandle { tx, task });
                info!(channel, "joined channel");
                Ok(())
            }
        }
    }

    /// Stop the session in `channel`. Its pending timers are cancelled with it.
    pub fn part_channel(&self, channel: &str) -> bool {
        let Some((_, handle)) = self.sessions.remove(&channel_key(channel)) else {
            return false;
        };

        handle.task.abort();
        info!(channel, "parted channel");
        true
    }

    /// Queue a chat event for the session in `channel`.
    pub fn dispatch(&self, channel: &str, event: ChatEvent) -> Result<(), EngineError> {
        let Some(handle) = self.sessions.get(&channel_key(channel)) else {
            debug!(channel, ?event, "event for unknown channel");
            return Err(EngineError::UnknownChannel(channel.to_owned()));
        };

        handle.tx.send(SessionInput::Chat(event)).map_err(|_| {
            warn!(channel, "session queue closed");
            EngineError::SessionClosed(channel.to_owned())
        })
    }

    /// Observe the session in `channel` once every event queued before the call is handled.
    pub async fn snapshot(&self, channel: &str) -> Option<SessionSnapshot> {
        let tx = {
            let handle = self.sessions.get(&channel_key(channel))?;
            handle.tx.clone()
        };

        let (reply, response) = oneshot::channel();
        tx.send(SessionInput::Snapshot(reply)).ok()?;
        response.await.ok()
    }

    /// Channels with a running session.
    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        channels.sort();
        channels
    }

    /// Part every channel.
    pub fn shutdown(&self) {
        for channel in self.channels() {
            self.part_channel(&channel);
        }
    }
}
