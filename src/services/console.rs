//! Line-oriented console transport used by the binary.
//!
//! Each input line is one chat event for the configured channel:
//!
//! ```text
//! /join alice
//! /part alice          (or /quit alice)
//! /nick alice alicia
//! /snack alice
//! alice: the answer    (or <alice> the answer)
//! ```

use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

use crate::{dto::events::ChatEvent, error::EngineError, state::SharedEngine};

/// A console line that does not describe a chat event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A `/command` the console does not know.
    #[error("unknown console command `/{0}`")]
    UnknownCommand(String),
    /// A `/command` without its arguments.
    #[error("usage: {0}")]
    Usage(&'static str),
    /// A message line without an author.
    #[error("expected `name: text` or `<name> text`")]
    MissingAuthor,
}

/// Parse one console line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<ChatEvent>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(rest) = line.strip_prefix('/') {
        let mut words = rest.split_whitespace();
        let command = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        let event = match (command, args.as_slice()) {
            ("join", [name]) => ChatEvent::PlayerJoined((*name).to_owned()),
            ("part" | "quit", [name]) => ChatEvent::PlayerLeft((*name).to_owned()),
            ("nick", [old, new]) => ChatEvent::IdentityChanged {
                old: (*old).to_owned(),
                new: (*new).to_owned(),
            },
            ("snack", [name]) => ChatEvent::BotSnackReceived((*name).to_owned()),
            ("join", _) => return Err(ParseError::Usage("/join NAME")),
            ("part" | "quit", _) => return Err(ParseError::Usage("/part NAME")),
            ("nick", _) => return Err(ParseError::Usage("/nick OLD NEW")),
            ("snack", _) => return Err(ParseError::Usage("/snack NAME")),
            (other, _) => return Err(ParseError::UnknownCommand(other.to_owned())),
        };
        return Ok(Some(event));
    }

    let (identity, text) = if let Some(rest) = line.strip_prefix('<') {
        rest.split_once('>').ok_or(ParseError::MissingAuthor)?
    } else {
        line.split_once(':').ok_or(ParseError::MissingAuthor)?
    };

    let identity = identity.trim();
    if identity.is_empty() {
        return Err(ParseError::MissingAuthor);
    }

    Ok(Some(ChatEvent::MessageReceived {
        identity: identity.to_owned(),
        text: text.trim().to_owned(),
    }))
}

/// Feed every line of `reader` to the session in `channel` until end of input.
pub async fn run<R>(engine: SharedEngine, channel: &str, reader: R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let event = match parse_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(err) => {
                warn!(error = %err, "ignoring console line");
                continue;
            }
        };

        debug!(identity = event.identity(), ?event, "console event");
        match engine.dispatch(channel, event) {
            Ok(()) => {}
            Err(err @ (EngineError::UnknownChannel(_) | EngineError::SessionClosed(_))) => {
                warn!(error = %err, "session gone; stopping console");
                break;
            }
            Err(err) => warn!(error = %err, "failed to dispatch console event"),
        }
    }

    Ok(())
}
