//! Trivia question storage and recycling-aware selection.

mod recent;

use std::path::{Path, PathBuf};

use rand::{Rng, seq::IndexedRandom};
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::fs;
use tracing::debug;

pub use self::recent::RecentlyAsked;

/// Identifier of a question inside its bank (1-based, in file order).
pub type QuestionId = u32;

const DEFAULT_CATEGORY: &str = "general";

/// A single trivia item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Position of the question in its source, starting at 1.
    pub id: QuestionId,
    /// Topic announced together with the prompt.
    pub category: String,
    /// Text of the question.
    pub prompt: String,
    /// Expected answer.
    pub answer: String,
    /// Last time this question was drawn by its bank.
    pub last_asked_at: Option<OffsetDateTime>,
}

impl Question {
    /// Whether the question can be answered at all.
    pub fn is_answerable(&self) -> bool {
        !self.answer.trim().is_empty()
    }

    /// Case-insensitive, whitespace-trimmed exact comparison against the answer.
    pub fn is_answered_by(&self, guess: &str) -> bool {
        self.is_answerable() && normalize_answer(guess) == normalize_answer(&self.answer)
    }
}

/// Canonical form used when comparing answers.
pub fn normalize_answer(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Failure while parsing a question set.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The question file could not be read.
    #[error("failed to read question file `{path}`")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The source is not a JSON array of question objects.
    #[error("malformed question data")]
    Parse {
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// An entry lacks a mandatory field.
    #[error("question entry {index} is missing its `{field}`")]
    MissingField {
        /// 0-based index of the offending entry.
        index: usize,
        /// Name of the missing field.
        field: &'static str,
    },
}

/// Failure while drawing from a bank.
#[derive(Debug, Error)]
pub enum BankError {
    /// The bank could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// The bank holds no question at all.
    #[error("question bank is empty")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "prompt")]
    question: Option<String>,
    #[serde(default)]
    answer: Option<String>,
}

/// Full question set plus the recently-asked window used to avoid repeats.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
    recent: RecentlyAsked,
}

impl QuestionBank {
    /// Build a bank from already parsed questions.
    pub fn new(questions: Vec<Question>, recycle_threshold: u8) -> Self {
        let recent = RecentlyAsked::for_bank(questions.len(), recycle_threshold);
        Self { questions, recent }
    }

    /// Parse a JSON array of `{category, question, answer}` objects.
    pub fn load(source: &str, recycle_threshold: u8) -> Result<Self, LoadError> {
        let raw: Vec<RawQuestion> =
            serde_json::from_str(source).map_err(|source| LoadError::Parse { source })?;

        let questions = raw
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let prompt = entry.question.ok_or(LoadError::MissingField {
                    index,
                    field: "question",
                })?;
                let answer = entry.answer.ok_or(LoadError::MissingField {
                    index,
                    field: "answer",
                })?;
                let category = entry
                    .category
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());

                Ok(Question {
                    id: (index + 1) as QuestionId,
                    category,
                    prompt,
                    answer,
                    last_asked_at: None,
                })
            })
            .collect::<Result<Vec<_>, LoadError>>()?;

        Ok(Self::new(questions, recycle_threshold))
    }

    /// Read and parse a question file.
    pub async fn load_file(
        path: impl AsRef<Path>,
        recycle_threshold: u8,
    ) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::load(&contents, recycle_threshold)
    }

    /// Number of questions in the bank.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the bank holds no question.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Recently asked window.
    pub fn recent(&self) -> &RecentlyAsked {
        &self.recent
    }

    /// Look a question up by id.
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Draw a question uniformly among those not asked recently.
    pub fn next(&mut self) -> Result<Question, BankError> {
        self.next_with(&mut rand::rng())
    }

    /// Same as [`QuestionBank::next`] with an explicit random source.
    ///
    /// When every question is excluded the oldest half of the window is
    /// evicted first, so a non-empty bank always yields a question.
    pub fn next_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Question, BankError> {
        if self.questions.is_empty() {
            return Err(BankError::Empty);
        }

        let mut candidates = self.candidates();
        while candidates.is_empty() {
            let evicted = self.recent.evict_oldest_half();
            debug!(evicted, "question pool exhausted; recycling oldest questions");
            candidates = self.candidates();
        }

        let index = *candidates.choose(rng).ok_or(BankError::Empty)?;
        let question = &mut self.questions[index];
        question.last_asked_at = Some(OffsetDateTime::now_utc());
        Ok(question.clone())
    }

    /// Add `id` to the recently asked window.
    pub fn record_asked(&mut self, id: QuestionId) {
        self.recent.record(id);
    }

    fn candidates(&self) -> Vec<usize> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, q)| !self.recent.contains(q.id))
            .map(|(index, _)| index)
            .collect()
    }
}
