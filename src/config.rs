//! Quiz configuration loading.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

use crate::messages::Locale;

/// Default location on disk where the bot looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/quizbot.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZBOT_CONFIG_PATH";
/// Hints are never given sooner than this after a question or the previous hint.
pub const MIN_HINT_PATIENCE: Duration = Duration::from_secs(5);

/// Failure while parsing a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON for [`QuizConfig`].
    #[error("failed to parse config")]
    Parse(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Immutable runtime configuration shared by every channel session.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct QuizConfig {
    /// Channel joined at startup.
    #[validate(length(min = 1))]
    pub channel: String,
    /// Nickname of the bot; players may not use it.
    #[validate(length(min = 1))]
    pub nickname: String,
    /// Identities allowed to run master commands.
    pub masters: Vec<String>,
    /// Questions the bot asks before it needs a snack; also the pause between questions in seconds.
    #[validate(range(min = 1))]
    pub stamina: u32,
    /// Seconds before a hint is given (effective minimum 5).
    #[serde(rename = "hintpatience")]
    pub hint_patience_secs: u64,
    /// Active players required before questions are asked.
    #[serde(rename = "minplayers")]
    #[validate(range(min = 1))]
    pub min_players: usize,
    /// Share of the bank (percent) kept as recently asked.
    #[serde(rename = "qrecyclethreshold")]
    #[validate(range(max = 100))]
    pub recycle_threshold: u8,
    /// Carry scores over identity changes.
    #[serde(rename = "keepscore")]
    pub keep_score: bool,
    /// High score database file.
    #[serde(rename = "hiscoresdb")]
    pub hiscores_db: PathBuf,
    /// Log every asked question with its answer at info level.
    pub verbose: bool,
    /// Session score that wins a game.
    #[serde(rename = "targetscore")]
    #[validate(range(min = 1))]
    pub target_score: u32,
    /// Upper bound of hints per question.
    #[serde(rename = "maxhints")]
    #[validate(range(min = 1))]
    pub max_hints: u32,
    /// Message catalog language.
    pub locale: Locale,
    /// Question bank file.
    pub questions: PathBuf,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            channel: "#quiz".into(),
            nickname: "quizbot".into(),
            masters: Vec::new(),
            stamina: 6,
            hint_patience_secs: 10,
            min_players: 2,
            recycle_threshold: 20,
            keep_score: true,
            hiscores_db: PathBuf::from("hiscores.json"),
            verbose: true,
            target_score: 10,
            max_hints: 3,
            locale: Locale::En,
            questions: PathBuf::from("questions.json"),
        }
    }
}

impl QuizConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), channel = %config.channel, "loaded config");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to load config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse and validate a JSON document. Absent keys take their default value.
    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Delay before a hint, clamped to [`MIN_HINT_PATIENCE`].
    pub fn hint_patience(&self) -> Duration {
        Duration::from_secs(self.hint_patience_secs).max(MIN_HINT_PATIENCE)
    }

    /// Idle delay before the next question is asked.
    pub fn question_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.stamina))
    }

    /// Whether `identity` may run master commands.
    pub fn is_master(&self, identity: &str) -> bool {
        self.masters
            .iter()
            .any(|master| master.eq_ignore_ascii_case(identity.trim()))
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
