//! Localized message templates and hint rendering.

use std::fmt::{self, Display, Write};

use serde::Deserialize;
use tracing::warn;

/// Every message the engine can post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    /// Category and prompt of a new question.
    Question,
    /// Not enough players to start asking.
    Waiting,
    /// The bot ran out of stamina.
    Botsnack,
    /// Partially revealed answer.
    Hint,
    /// Hint for single-character answers.
    HintOne,
    /// Reveal after nobody found the answer.
    RightAnswer,
    /// Consolation after a round without winner.
    WishLuck,
    /// Answer and winner of a round.
    CorrectAnswer,
    /// Winner of a whole game.
    Winner,
    /// Reply to a snack.
    Thanks,
    /// One leaderboard line: rank, identity, points.
    Score,
    /// Channel topic: target score, previous winner, all-time champion and score.
    ChannelTopic,
    /// Rejection of an unacceptable identity.
    InvalidName,
    /// Reason attached to kicks.
    KickMsg,
    /// First help line, naming the channel.
    HelpChannelInfo,
    /// Second help line, naming the bot.
    HelpBotInfo,
    /// Reply to anything the bot does not understand.
    UnknownCmd,
}

impl TemplateKey {
    /// Name of the key in the string tables.
    pub fn name(self) -> &'static str {
        match self {
            TemplateKey::Question => "question",
            TemplateKey::Waiting => "waiting",
            TemplateKey::Botsnack => "botsnack",
            TemplateKey::Hint => "hint",
            TemplateKey::HintOne => "hintone",
            TemplateKey::RightAnswer => "rightanswer",
            TemplateKey::WishLuck => "wishluck",
            TemplateKey::CorrectAnswer => "correctanswer",
            TemplateKey::Winner => "winner",
            TemplateKey::Thanks => "thanks",
            TemplateKey::Score => "score",
            TemplateKey::ChannelTopic => "channeltopic",
            TemplateKey::InvalidName => "invalidname",
            TemplateKey::KickMsg => "kickmsg",
            TemplateKey::HelpChannelInfo => "help_channelinfo",
            TemplateKey::HelpBotInfo => "help_botinfo",
            TemplateKey::UnknownCmd => "unknowncmd",
        }
    }

    /// Number of arguments the template expects.
    pub fn arity(self) -> usize {
        match self {
            TemplateKey::Question | TemplateKey::CorrectAnswer => 2,
            TemplateKey::Score => 3,
            TemplateKey::ChannelTopic => 4,
            TemplateKey::Hint
            | TemplateKey::RightAnswer
            | TemplateKey::Winner
            | TemplateKey::InvalidName
            | TemplateKey::HelpChannelInfo
            | TemplateKey::HelpBotInfo => 1,
            TemplateKey::Waiting
            | TemplateKey::Botsnack
            | TemplateKey::HintOne
            | TemplateKey::WishLuck
            | TemplateKey::Thanks
            | TemplateKey::KickMsg
            | TemplateKey::UnknownCmd => 0,
        }
    }
}

impl Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Language of the message catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// Stock English strings.
    #[default]
    En,
    /// Swiss German overlay on top of the English strings.
    Gsw,
}

const HELP_LINES_GSW: &[&str] = &[
    "!score zeigt di aktuelle Top 5 Quizzer.",
    "!hiscore zeigt di ewigi Top 5 Quizzer.",
    "vill Spass bim Quizze!",
    "(und übrigens, ich ha Hunger, und zwar *immer*.",
    "mit !botsnack chasch mi füettere. bitte. oft.)",
];

const HELP_LINES: &[&str] = &[
    "!score prints the current top 5 quizzers.",
    "!hiscore prints the all time top 5 quizzers.",
    "happy quizzing!",
    "(o, and BTW, I'm hungry, like *all* the freaking time.",
    "you can feed me with !botsnack. please do. often.)",
];

fn english(key: TemplateKey) -> &'static str {
    match key {
        TemplateKey::Question => "TOPIC: %s - Q: %s",
        TemplateKey::Waiting => "Playing alone is no fun. Let's wait for others...",
        TemplateKey::Botsnack => "I'm hungry. Please feed me with !botsnack.",
        TemplateKey::Hint => "HINT: %s",
        TemplateKey::HintOne => "HINT: only one character!",
        TemplateKey::RightAnswer => "the answer was: \"%s\"",
        TemplateKey::WishLuck => "better luck with the next question!",
        TemplateKey::CorrectAnswer => "%s is right! congratulations, %s!",
        TemplateKey::Winner => "congratulations to %s, you're winner!!!",
        TemplateKey::Thanks => "ta. :-)",
        TemplateKey::Score => "%d. %s: %d points",
        TemplateKey::ChannelTopic => {
            "happy quizzing. :-> target score: %d. previous winner: %s. all-time winner: %s (%d)."
        }
        TemplateKey::InvalidName => "not on my watch, %s!",
        TemplateKey::KickMsg => "lol.",
        TemplateKey::HelpChannelInfo => "%s is a quiz channel.",
        TemplateKey::HelpBotInfo => "I am %s, and *I* ask the questions around here! :->",
        TemplateKey::UnknownCmd => "... wat.",
    }
}

fn swiss_german(key: TemplateKey) -> Option<&'static str> {
    let text = match key {
        TemplateKey::Question => "<%s> Q: %s",
        TemplateKey::Botsnack => {
            "Jetzt bin ich hungrig. Fütter mich mit !botsnack damit es weitergeht"
        }
        TemplateKey::Thanks => "yummy. tanketuusig! :-)",
        TemplateKey::Waiting => "Allei isches nöd so lustig. Warte mer uf meh Spieler...",
        TemplateKey::HintOne => "Nur 1 Silbe",
        TemplateKey::RightAnswer => "Sigh. d Antwort wär gsii \"%s\"",
        TemplateKey::WishLuck => "loosers.",
        TemplateKey::CorrectAnswer => "Riiiischtisch! \"%s\" stimmt :) congratz %s!",
        TemplateKey::Winner => "%s, lass dich huldigen - du hesch abgruumt!!!",
        TemplateKey::ChannelTopic => {
            "Do wird quizzd! >> Winner score: %d | Last Winner: %s | All-time Champ: %s (%d)"
        }
        _ => return None,
    };
    Some(text)
}

/// Raw template for `key` in `locale`.
pub fn template(key: TemplateKey, locale: Locale) -> &'static str {
    match locale {
        Locale::En => english(key),
        Locale::Gsw => swiss_german(key).unwrap_or_else(|| english(key)),
    }
}

/// Help lines following the channel and bot info lines.
pub fn help_lines(locale: Locale) -> &'static [&'static str] {
    match locale {
        Locale::En => HELP_LINES,
        Locale::Gsw => HELP_LINES_GSW,
    }
}

/// Render `key` in `locale`, substituting `%s`/`%d` placeholders with `args` in order.
///
/// `%%` renders a literal percent sign. Missing arguments render as nothing.
pub fn render(key: TemplateKey, locale: Locale, args: &[&dyn Display]) -> String {
    if args.len() != key.arity() {
        warn!(
            template = %key,
            expected = key.arity(),
            got = args.len(),
            "template argument count mismatch"
        );
    }

    let source = template(key, locale);
    let mut out = String::with_capacity(source.len() + 16);
    let mut args = args.iter();
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') | Some('d') => {
                chars.next();
                if let Some(arg) = args.next() {
                    let _ = write!(out, "{arg}");
                }
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }

    out
}

/// Reveal the first `revealed` characters of `answer`, masking remaining letters and digits.
pub fn mask_answer(answer: &str, revealed: usize) -> String {
    answer
        .trim()
        .chars()
        .enumerate()
        .map(|(index, c)| {
            if index < revealed || !c.is_alphanumeric() {
                c
            } else {
                '.'
            }
        })
        .collect()
}

/// How many hints a question gets before it expires unanswered.
pub fn hint_limit(answer: &str, max_hints: u32) -> u32 {
    let chars = answer.trim().chars().count();
    let revealable = u32::try_from(chars.saturating_sub(1)).unwrap_or(u32::MAX);
    max_hints.min(revealable).max(1)
}

/// Renders user-visible text for the engine.
pub trait MessageFormatter: Send + Sync {
    /// Text for `key` with its arguments.
    fn render(&self, key: TemplateKey, args: &[&dyn Display]) -> String;

    /// Static help lines.
    fn help(&self) -> Vec<String>;

    /// Text of hint number `revealed` for `answer`.
    fn hint(&self, answer: &str, revealed: usize) -> String {
        if answer.trim().chars().count() <= 1 {
            self.render(TemplateKey::HintOne, &[])
        } else {
            self.render(TemplateKey::Hint, &[&mask_answer(answer, revealed)])
        }
    }
}

/// Stock formatter backed by the built-in string tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog {
    locale: Locale,
}

impl Catalog {
    /// Catalog rendering messages in `locale`.
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }
}

impl MessageFormatter for Catalog {
    fn render(&self, key: TemplateKey, args: &[&dyn Display]) -> String {
        render(key, self.locale, args)
    }

    fn help(&self) -> Vec<String> {
        help_lines(self.locale)
            .iter()
            .map(|line| (*line).to_owned())
            .collect()
    }
}
