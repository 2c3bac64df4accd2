use std::fmt;

/// Action the transport must carry out on behalf of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Post a line to the channel.
    Say {
        /// Target channel.
        channel: String,
        /// Text to post.
        text: String,
    },
    /// Replace the channel topic.
    Topic {
        /// Target channel.
        channel: String,
        /// New topic.
        text: String,
    },
    /// Remove a participant from the channel.
    Kick {
        /// Target channel.
        channel: String,
        /// Participant to remove.
        identity: String,
        /// Reason shown to the channel.
        reason: String,
    },
    /// Operator-facing warning; never shown to players.
    Warning {
        /// Channel the warning relates to.
        channel: String,
        /// What went wrong.
        detail: String,
    },
}

impl Outbound {
    /// Channel the action targets.
    pub fn channel(&self) -> &str {
        match self {
            Outbound::Say { channel, .. }
            | Outbound::Topic { channel, .. }
            | Outbound::Kick { channel, .. }
            | Outbound::Warning { channel, .. } => channel,
        }
    }
}

impl fmt::Display for Outbound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outbound::Say { channel, text } => write!(f, "[{channel}] {text}"),
            Outbound::Topic { channel, text } => write!(f, "[{channel}] topic: {text}"),
            Outbound::Kick {
                channel,
                identity,
                reason,
            } => write!(f, "[{channel}] kick {identity}: {reason}"),
            Outbound::Warning { channel, detail } => write!(f, "[{channel}] warning: {detail}"),
        }
    }
}
