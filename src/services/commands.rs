//! Chat commands recognised by the bot.

/// Prefix that turns a channel line into a command.
pub const COMMAND_PREFIX: char = '!';

/// A parsed `!command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `!botsnack`: feed the bot.
    BotSnack,
    /// `!score`: current game leaderboard.
    Score,
    /// `!hiscore`: all-time leaderboard.
    HiScore,
    /// `!help`: usage lines.
    Help,
    /// `!skip`: master-only, expire the current question.
    Skip,
    /// Anything else, with the command word as typed.
    Unknown(String),
}

/// Parse `text` as a command; `None` when the line is not a command.
pub fn parse_command(text: &str) -> Option<Command> {
    let rest = text.trim_start().strip_prefix(COMMAND_PREFIX)?;
    let word = rest.split_whitespace().next().unwrap_or_default();

    let command = match word.to_ascii_lowercase().as_str() {
        "botsnack" => Command::BotSnack,
        "score" => Command::Score,
        "hiscore" => Command::HiScore,
        "help" => Command::Help,
        "skip" => Command::Skip,
        _ => Command::Unknown(word.to_owned()),
    };
    Some(command)
}
