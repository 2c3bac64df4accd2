use thiserror::Error;

/// Phases a channel session moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// No question pending and not enough active players.
    Idle,
    /// Enough players; waiting for the next-question timer.
    Waiting,
    /// A question is posted and the hint timer runs.
    Asking,
    /// At least one hint was given for the current question.
    Hinting,
    /// The current round is being closed.
    Resolving,
    /// A player reached the target score.
    Finished,
}

impl GamePhase {
    /// Whether a question is open for answers.
    pub fn is_question_live(self) -> bool {
        matches!(self, GamePhase::Asking | GamePhase::Hinting)
    }
}

/// Why a round closed without a winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryReason {
    /// The hint cutoff was reached.
    HintsExhausted,
    /// Too few active players remain.
    NotEnoughPlayers,
    /// A master skipped the question.
    Skipped,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Active players reached the quorum.
    PlayersSatisfied,
    /// Active players dropped below the quorum.
    PlayersInsufficient,
    /// A question was drawn and posted.
    QuestionDrawn,
    /// The hint timer fired with hints left.
    HintDue,
    /// A player matched the answer.
    CorrectAnswer,
    /// The round closed without winner.
    RoundExpired(ExpiryReason),
    /// The round is closed and the quorum still holds.
    RoundClosed,
    /// The round winner reached the target score.
    TargetReached,
    /// Start over after a finished game.
    NewGame,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

/// Snapshot of the current state machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase of the state machine.
    pub phase: GamePhase,
    /// Version number of the state machine (increments on each transition).
    pub version: usize,
}

/// State machine driving one channel's question cycle.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    phase: GamePhase,
    version: usize,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self {
            phase: GamePhase::Idle,
            version: 0,
        }
    }
}

impl GameStateMachine {
    /// Create a new state machine initialised in the idle state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Create a snapshot of the current state machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
        }
    }

    /// Apply `event`, returning the new phase.
    pub fn apply(&mut self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (GamePhase::Idle, GameEvent::PlayersSatisfied) => GamePhase::Waiting,
            (GamePhase::Waiting, GameEvent::PlayersInsufficient) => GamePhase::Idle,
            (GamePhase::Waiting, GameEvent::QuestionDrawn) => GamePhase::Asking,
            (GamePhase::Asking | GamePhase::Hinting, GameEvent::HintDue) => GamePhase::Hinting,
            (GamePhase::Asking | GamePhase::Hinting, GameEvent::CorrectAnswer) => {
                GamePhase::Resolving
            }
            (GamePhase::Asking | GamePhase::Hinting, GameEvent::RoundExpired(..)) => {
                GamePhase::Resolving
            }
            (GamePhase::Resolving, GameEvent::RoundClosed) => GamePhase::Waiting,
            (GamePhase::Resolving, GameEvent::PlayersInsufficient) => GamePhase::Idle,
            (GamePhase::Resolving, GameEvent::TargetReached) => GamePhase::Finished,
            (GamePhase::Finished, GameEvent::NewGame) => GamePhase::Idle,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut GameStateMachine, event: GameEvent) -> GamePhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_idle() {
        let sm = GameStateMachine::new();
        assert_eq!(sm.phase(), GamePhase::Idle);
        assert_eq!(sm.version(), 0);
    }

    #[test]
    fn full_happy_path_through_game() {
        let mut sm = GameStateMachine::new();

        assert_eq!(apply(&mut sm, GameEvent::PlayersSatisfied), GamePhase::Waiting);
        assert_eq!(apply(&mut sm, GameEvent::QuestionDrawn), GamePhase::Asking);
        assert_eq!(apply(&mut sm, GameEvent::HintDue), GamePhase::Hinting);
        assert_eq!(apply(&mut sm, GameEvent::HintDue), GamePhase::Hinting);
        assert_eq!(apply(&mut sm, GameEvent::CorrectAnswer), GamePhase::Resolving);
        assert_eq!(apply(&mut sm, GameEvent::RoundClosed), GamePhase::Waiting);
        assert_eq!(apply(&mut sm, GameEvent::QuestionDrawn), GamePhase::Asking);
        assert_eq!(apply(&mut sm, GameEvent::CorrectAnswer), GamePhase::Resolving);
        assert_eq!(apply(&mut sm, GameEvent::TargetReached), GamePhase::Finished);
        assert_eq!(apply(&mut sm, GameEvent::NewGame), GamePhase::Idle);
        assert_eq!(sm.version(), 10);
    }

    #[test]
    fn expired_round_resolves_without_winner() {
        let mut sm = GameStateMachine::new();
        apply(&mut sm, GameEvent::PlayersSatisfied);
        apply(&mut sm, GameEvent::QuestionDrawn);

        assert_eq!(
            apply(
                &mut sm,
                GameEvent::RoundExpired(ExpiryReason::NotEnoughPlayers)
            ),
            GamePhase::Resolving
        );
        assert_eq!(
            apply(&mut sm, GameEvent::PlayersInsufficient),
            GamePhase::Idle
        );
    }

    #[test]
    fn questions_are_never_drawn_without_quorum() {
        let mut sm = GameStateMachine::new();
        let err = sm.apply(GameEvent::QuestionDrawn).unwrap_err();
        assert_eq!(err.from, GamePhase::Idle);
        assert_eq!(err.event, GameEvent::QuestionDrawn);

        apply(&mut sm, GameEvent::PlayersSatisfied);
        apply(&mut sm, GameEvent::PlayersInsufficient);
        assert!(sm.apply(GameEvent::QuestionDrawn).is_err());
    }

    #[test]
    fn hints_stop_once_the_round_is_resolving() {
        let mut sm = GameStateMachine::new();
        apply(&mut sm, GameEvent::PlayersSatisfied);
        apply(&mut sm, GameEvent::QuestionDrawn);
        apply(&mut sm, GameEvent::CorrectAnswer);

        assert!(sm.apply(GameEvent::HintDue).is_err());
        assert!(sm.apply(GameEvent::CorrectAnswer).is_err());
    }

    #[test]
    fn invalid_transition_leaves_state_untouched() {
        let mut sm = GameStateMachine::new();
        let before = sm.snapshot();
        assert!(sm.apply(GameEvent::NewGame).is_err());
        assert_eq!(sm.snapshot(), before);
    }
}
