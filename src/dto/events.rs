/// Inbound chat activity delivered by the transport for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A participant entered the channel.
    PlayerJoined(String),
    /// A participant left the channel or disconnected.
    PlayerLeft(String),
    /// A participant switched identity on the same connection.
    IdentityChanged {
        /// Identity before the change.
        old: String,
        /// Identity after the change.
        new: String,
    },
    /// A participant wrote a line in the channel.
    MessageReceived {
        /// Author of the line.
        identity: String,
        /// Raw text of the line.
        text: String,
    },
    /// A participant fed the bot.
    BotSnackReceived(String),
}

impl ChatEvent {
    /// Identity the event originates from (the new one for identity changes).
    pub fn identity(&self) -> &str {
        match self {
            ChatEvent::PlayerJoined(identity)
            | ChatEvent::PlayerLeft(identity)
            | ChatEvent::BotSnackReceived(identity)
            | ChatEvent::MessageReceived { identity, .. } => identity,
            ChatEvent::IdentityChanged { new, .. } => new,
        }
    }
}
