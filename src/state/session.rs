//! One channel's game: the question cycle, its timers and its players.
//!
//! Every chat event and timer firing for a channel goes through a single
//! queue drained by one task, so transitions never interleave.

use std::{fmt::Display, sync::Arc};

use tokio::{
    sync::{
        mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender},
        oneshot,
    },
    task::JoinHandle,
    time::Instant,
};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
    bank::{Question, QuestionBank, QuestionId},
    config::QuizConfig,
    dto::{events::ChatEvent, outbound::Outbound},
    messages::{MessageFormatter, TemplateKey, hint_limit},
    players::{Player, PlayerRegistry},
    services::{
        commands::{Command, parse_command},
        persistence::{RetryPolicy, persist_score},
        validation::validate_identity,
    },
    store::ScoreStore,
};

use super::{
    state_machine::{ExpiryReason, GameEvent, GamePhase, GameStateMachine},
    timer::{PhaseTimer, TimerKind},
};

/// Points awarded for a correct answer.
pub const POINTS_PER_ANSWER: u32 = 1;
/// Entries listed by `!score` and `!hiscore`.
const LEADERBOARD_SIZE: usize = 5;
/// Placeholder used in the topic when nobody holds a title yet.
const NOBODY: &str = "nobody";

/// Messages processed by a session task.
#[derive(Debug)]
pub(crate) enum SessionInput {
    Chat(ChatEvent),
    TimerFired { kind: TimerKind, token: u64 },
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Collaborators shared by every session of an engine.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub(crate) config: Arc<QuizConfig>,
    pub(crate) store: Arc<dyn ScoreStore>,
    pub(crate) formatter: Arc<dyn MessageFormatter>,
    pub(crate) outbound: UnboundedSender<Outbound>,
    pub(crate) retry: RetryPolicy,
}

/// Observable state of a channel session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Unique id of the session, for log correlation.
    pub session_id: Uuid,
    /// Channel the session plays in.
    pub channel: String,
    /// Current phase.
    pub phase: GamePhase,
    /// Number of transitions applied so far.
    pub version: usize,
    /// Question open for answers, if any.
    pub current_question: Option<QuestionId>,
    /// Hints given for the current question.
    pub hints_given: u32,
    /// Players counting towards the quorum.
    pub active_players: usize,
    /// Winner of the latest round.
    pub last_winner: Option<String>,
    /// Whether the bot waits for a snack before asking again.
    pub hungry: bool,
}

/// Per-channel game data.
#[derive(Debug)]
pub struct GameSession {
    /// Unique id of the session.
    pub id: Uuid,
    /// Channel the session plays in.
    pub channel: String,
    machine: GameStateMachine,
    /// Question open for answers.
    pub current_question: Option<Question>,
    /// When the current question was posted.
    pub asked_at: Option<Instant>,
    /// Hints given for the current question.
    pub hints_given: u32,
    /// Session score that wins the game.
    pub target_score: u32,
    /// Winner of the latest round.
    pub last_winner: Option<String>,
}

impl GameSession {
    fn new(channel: String, target_score: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel,
            machine: GameStateMachine::new(),
            current_question: None,
            asked_at: None,
            hints_given: 0,
            target_score,
            last_winner: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.machine.phase()
    }

    fn clear_question(&mut self) -> Option<Question> {
        self.asked_at = None;
        self.hints_given = 0;
        self.current_question.take()
    }
}

/// Stamina bookkeeping: questions and hints spend energy, snacks refill it.
#[derive(Debug, Clone)]
struct Appetite {
    stamina: u32,
    energy: u32,
    announced: bool,
}

impl Appetite {
    fn new(stamina: u32) -> Self {
        Self {
            stamina,
            energy: stamina,
            announced: false,
        }
    }

    fn is_hungry(&self) -> bool {
        self.energy == 0
    }

    fn spend(&mut self) {
        self.energy = self.energy.saturating_sub(1);
    }

    fn feed(&mut self) {
        self.energy = self.stamina;
        self.announced = false;
    }

    /// Returns true the first time it is called while hungry.
    fn announce(&mut self) -> bool {
        !std::mem::replace(&mut self.announced, true)
    }
}

/// Actor owning every piece of mutable state of one channel.
pub(crate) struct ChannelSession {
    ctx: SessionContext,
    game: GameSession,
    bank: QuestionBank,
    players: PlayerRegistry,
    appetite: Appetite,
    timer: Option<PhaseTimer>,
    next_token: u64,
    inbox: WeakUnboundedSender<SessionInput>,
}

impl ChannelSession {
    /// Start the session task for `channel`, returning its queue and task handle.
    pub(crate) fn spawn(
        ctx: SessionContext,
        channel: String,
        bank: QuestionBank,
    ) -> (UnboundedSender<SessionInput>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let game = GameSession::new(channel, ctx.config.target_score);
        let span = info_span!("session", channel = %game.channel, id = %game.id);

        let session = Self {
            players: PlayerRegistry::new(ctx.config.keep_score),
            appetite: Appetite::new(ctx.config.stamina),
            ctx,
            game,
            bank,
            timer: None,
            next_token: 0,
            inbox: tx.downgrade(),
        };

        let handle = tokio::spawn(session.run(rx).instrument(span));
        (tx, handle)
    }

    async fn run(mut self, mut rx: UnboundedReceiver<SessionInput>) {
        info!(questions = self.bank.len(), "session started");
        self.post_topic().await;

        while let Some(input) = rx.recv().await {
            self.handle(input).await;
        }

        debug!("session queue closed");
    }

    async fn handle(&mut self, input: SessionInput) {
        match input {
            SessionInput::Chat(event) => self.on_chat(event).await,
            SessionInput::TimerFired { kind, token } => self.on_timer(kind, token).await,
            SessionInput::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        let machine = self.game.machine.snapshot();
        SessionSnapshot {
            session_id: self.game.id,
            channel: self.game.channel.clone(),
            phase: machine.phase,
            version: machine.version,
            current_question: self.game.current_question.as_ref().map(|q| q.id),
            hints_given: self.game.hints_given,
            active_players: self.players.active_count(),
            last_winner: self.game.last_winner.clone(),
            hungry: self.appetite.is_hungry(),
        }
    }

    async fn on_chat(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::PlayerJoined(identity) => self.on_join(&identity).await,
            ChatEvent::PlayerLeft(identity) => {
                if self.players.leave(&identity) {
                    debug!(%identity, "player left");
                }
                self.reconcile_players().await;
            }
            ChatEvent::IdentityChanged { old, new } => self.on_identity_change(&old, &new).await,
            ChatEvent::MessageReceived { identity, text } => self.on_message(&identity, &text).await,
            ChatEvent::BotSnackReceived(identity) => self.feed(&identity),
        }
    }

    async fn on_join(&mut self, identity: &str) {
        if !self.admit(identity) {
            return;
        }
        self.players.join(identity);
        self.seed_from_store(identity).await;

        if self.players.active_count() < self.ctx.config.min_players {
            self.say(TemplateKey::Waiting, &[]);
        }
        self.reconcile_players().await;
    }

    async fn on_identity_change(&mut self, old: &str, new: &str) {
        if !self.admit(new) {
            self.players.leave(old);
            self.reconcile_players().await;
            return;
        }

        let player = self.players.on_identity_change(old, new);
        debug!(old, new = %player.identity, score = player.session_score, "identity changed");
        if !self.ctx.config.keep_score {
            self.seed_from_store(new).await;
        }
        self.reconcile_players().await;
    }

    async fn on_message(&mut self, identity: &str, text: &str) {
        if let Some(command) = parse_command(text) {
            self.on_command(identity, command).await;
            return;
        }

        let known = self.players.get(identity).is_some_and(|p| p.active);
        if !known {
            if !self.admit(identity) {
                return;
            }
            self.players.join(identity);
            self.seed_from_store(identity).await;
            self.reconcile_players().await;
        }

        let answered = self.game.phase().is_question_live()
            && self
                .game
                .current_question
                .as_ref()
                .is_some_and(|q| q.is_answered_by(text));
        if answered {
            self.resolve_with_winner(identity).await;
        }
    }

    async fn on_command(&mut self, identity: &str, command: Command) {
        match command {
            Command::BotSnack => self.feed(identity),
            Command::Score => {
                let lines: Vec<String> = self
                    .players
                    .standings(LEADERBOARD_SIZE)
                    .into_iter()
                    .enumerate()
                    .map(|(rank, player)| {
                        self.render(
                            TemplateKey::Score,
                            &[&(rank + 1), &player.identity, &player.session_score],
                        )
                    })
                    .collect();
                for line in lines {
                    self.say_text(line);
                }
            }
            Command::HiScore => match self.ctx.store.top(LEADERBOARD_SIZE).await {
                Ok(records) => {
                    for (rank, record) in records.iter().enumerate() {
                        self.say(
                            TemplateKey::Score,
                            &[&(rank + 1), &record.identity, &record.score],
                        );
                    }
                }
                Err(err) => {
                    warn!(error = %err, "failed to read high scores");
                    self.say(TemplateKey::UnknownCmd, &[]);
                }
            },
            Command::Help => {
                let channel = self.game.channel.clone();
                let nickname = self.ctx.config.nickname.clone();
                self.say(TemplateKey::HelpChannelInfo, &[&channel]);
                self.say(TemplateKey::HelpBotInfo, &[&nickname]);
                for line in self.ctx.formatter.help() {
                    self.say_text(line);
                }
            }
            Command::Skip if self.ctx.config.is_master(identity) => {
                if self.game.phase().is_question_live() {
                    info!(identity, "question skipped");
                    self.expire_round(ExpiryReason::Skipped).await;
                }
            }
            Command::Skip | Command::Unknown(_) => self.say(TemplateKey::UnknownCmd, &[]),
        }
    }

    async fn on_timer(&mut self, kind: TimerKind, token: u64) {
        let owned = self
            .timer
            .as_ref()
            .is_some_and(|timer| timer.owns(token) && timer.kind() == kind);
        if !owned {
            debug!(?kind, token, "ignoring stale timer");
            return;
        }
        self.timer = None;

        match kind {
            TimerKind::NextQuestion => self.ask_next().await,
            TimerKind::Hint => self.give_hint().await,
        }
    }

    /// Check `identity`; rejected identities are told off and kicked.
    fn admit(&self, identity: &str) -> bool {
        match validate_identity(identity, &self.ctx.config.nickname) {
            Ok(()) => true,
            Err(err) => {
                info!(identity, code = %err.code, "rejecting identity");
                self.say(TemplateKey::InvalidName, &[&identity]);
                let reason = self.render(TemplateKey::KickMsg, &[]);
                self.emit(Outbound::Kick {
                    channel: self.game.channel.clone(),
                    identity: identity.to_owned(),
                    reason,
                });
                false
            }
        }
    }

    async fn seed_from_store(&mut self, identity: &str) {
        match self.ctx.store.get(identity).await {
            Ok(Some(record)) => self.players.seed_all_time(identity, record.score),
            Ok(None) => {}
            Err(err) => warn!(identity, error = %err, "failed to read stored score"),
        }
    }

    fn feed(&mut self, identity: &str) {
        debug!(identity, "bot fed");
        self.appetite.feed();
        self.say(TemplateKey::Thanks, &[]);

        if self.game.phase() == GamePhase::Waiting {
            self.arm(TimerKind::NextQuestion, self.ctx.config.question_interval());
        }
    }

    /// Move between idle and playing phases according to the player quorum.
    async fn reconcile_players(&mut self) {
        let enough = self.players.active_count() >= self.ctx.config.min_players;

        match (self.game.phase(), enough) {
            (GamePhase::Idle, true) => {
                if self.transition(GameEvent::PlayersSatisfied).is_some() {
                    self.enter_waiting();
                }
            }
            (GamePhase::Waiting, false) => {
                if self.transition(GameEvent::PlayersInsufficient).is_some() {
                    self.say(TemplateKey::Waiting, &[]);
                }
            }
            (GamePhase::Asking | GamePhase::Hinting, false) => {
                self.expire_round(ExpiryReason::NotEnoughPlayers).await;
            }
            _ => {}
        }
    }

    fn enter_waiting(&mut self) {
        if self.appetite.is_hungry() && self.appetite.announced {
            return;
        }
        self.arm(TimerKind::NextQuestion, self.ctx.config.question_interval());
    }

    async fn ask_next(&mut self) {
        if self.game.phase() != GamePhase::Waiting {
            return;
        }

        if self.appetite.is_hungry() {
            if self.appetite.announce() {
                self.say(TemplateKey::Botsnack, &[]);
            }
            return;
        }

        let Some(question) = self.draw_question() else {
            self.arm(TimerKind::NextQuestion, self.ctx.config.question_interval());
            return;
        };

        if self.transition(GameEvent::QuestionDrawn).is_none() {
            return;
        }

        if self.ctx.config.verbose {
            info!(
                category = %question.category,
                prompt = %question.prompt,
                answer = %question.answer,
                "question asked"
            );
        } else {
            debug!(
                category = %question.category,
                prompt = %question.prompt,
                answer = %question.answer,
                "question asked"
            );
        }

        self.appetite.spend();
        self.say(TemplateKey::Question, &[&question.category, &question.prompt]);
        self.game.current_question = Some(question);
        self.game.asked_at = Some(Instant::now());
        self.game.hints_given = 0;
        self.arm(TimerKind::Hint, self.ctx.config.hint_patience());
    }

    /// Draw the next answerable question, skipping broken ones.
    fn draw_question(&mut self) -> Option<Question> {
        for _ in 0..self.bank.len() {
            match self.bank.next() {
                Ok(question) => {
                    self.bank.record_asked(question.id);
                    if question.is_answerable() {
                        return Some(question);
                    }
                    warn!(id = question.id, prompt = %question.prompt, "skipping unanswerable question");
                }
                Err(err) => {
                    warn!(error = %err, "failed to draw a question");
                    return None;
                }
            }
        }

        warn!("no answerable question found; retrying later");
        None
    }

    async fn give_hint(&mut self) {
        let Some(answer) = self.game.current_question.as_ref().map(|q| q.answer.clone()) else {
            return;
        };

        if self.game.hints_given >= hint_limit(&answer, self.ctx.config.max_hints) {
            self.expire_round(ExpiryReason::HintsExhausted).await;
            return;
        }

        if self.transition(GameEvent::HintDue).is_none() {
            return;
        }
        self.game.hints_given += 1;

        let text = self
            .ctx
            .formatter
            .hint(&answer, self.game.hints_given as usize);
        self.say_text(text);
        self.appetite.spend();
        self.arm(TimerKind::Hint, self.ctx.config.hint_patience());
    }

    async fn resolve_with_winner(&mut self, identity: &str) {
        if self.transition(GameEvent::CorrectAnswer).is_none() {
            return;
        }
        let Some(question) = self.game.clear_question() else {
            return;
        };

        let player = self.players.award(identity, POINTS_PER_ANSWER).clone();
        self.persist(&player).await;

        self.say(
            TemplateKey::CorrectAnswer,
            &[&question.answer, &player.identity],
        );
        self.game.last_winner = Some(player.identity.clone());

        if player.session_score >= self.game.target_score {
            self.finish_game(&player.identity).await;
        } else {
            self.close_round();
        }
    }

    async fn expire_round(&mut self, reason: ExpiryReason) {
        if self.transition(GameEvent::RoundExpired(reason)).is_none() {
            return;
        }
        debug!(?reason, "round expired without winner");

        if let Some(question) = self.game.clear_question() {
            self.say(TemplateKey::RightAnswer, &[&question.answer]);
            self.say(TemplateKey::WishLuck, &[]);
        }
        self.close_round();
    }

    /// Leave `Resolving` towards the next round or back to idle.
    fn close_round(&mut self) {
        if self.players.active_count() >= self.ctx.config.min_players {
            if self.transition(GameEvent::RoundClosed).is_some() {
                self.enter_waiting();
            }
        } else if self.transition(GameEvent::PlayersInsufficient).is_some() {
            self.say(TemplateKey::Waiting, &[]);
        }
    }

    async fn finish_game(&mut self, winner: &str) {
        if self.transition(GameEvent::TargetReached).is_none() {
            return;
        }
        info!(winner, target = self.game.target_score, "game finished");

        self.say(TemplateKey::Winner, &[&winner]);
        self.players.reset_session_scores();
        self.post_topic().await;

        if self.transition(GameEvent::NewGame).is_some() {
            self.reconcile_players().await;
        }
    }

    async fn persist(&mut self, player: &Player) {
        let result = persist_score(
            self.ctx.store.as_ref(),
            &player.identity,
            player.all_time_score,
            self.ctx.retry,
        )
        .await;

        match result {
            Ok(outcome) => debug!(identity = %player.identity, ?outcome, "score persisted"),
            Err(err) => {
                warn!(
                    identity = %player.identity,
                    error = %err,
                    "score kept in memory only"
                );
                self.emit(Outbound::Warning {
                    channel: self.game.channel.clone(),
                    detail: format!("failed to persist score of {}: {err}", player.identity),
                });
            }
        }
    }

    async fn post_topic(&mut self) {
        let (champion, champion_score) = match self.ctx.store.top(1).await {
            Ok(records) => records
                .into_iter()
                .next()
                .map(|record| (record.identity, record.score))
                .unwrap_or_else(|| (NOBODY.to_owned(), 0)),
            Err(err) => {
                warn!(error = %err, "failed to read all-time champion");
                (NOBODY.to_owned(), 0)
            }
        };
        let previous = self
            .game
            .last_winner
            .clone()
            .unwrap_or_else(|| NOBODY.to_owned());

        let text = self.render(
            TemplateKey::ChannelTopic,
            &[
                &self.game.target_score,
                &previous,
                &champion,
                &champion_score,
            ],
        );
        self.emit(Outbound::Topic {
            channel: self.game.channel.clone(),
            text,
        });
    }

    /// Apply `event`; a successful transition always disarms the pending timer.
    fn transition(&mut self, event: GameEvent) -> Option<GamePhase> {
        match self.game.machine.apply(event) {
            Ok(next) => {
                self.timer = None;
                debug!(?event, phase = ?next, version = self.game.machine.version(), "transition");
                Some(next)
            }
            Err(err) => {
                warn!(error = %err, "ignoring invalid transition");
                None
            }
        }
    }

    fn arm(&mut self, kind: TimerKind, delay: std::time::Duration) {
        self.next_token += 1;
        let token = self.next_token;
        self.timer = Some(PhaseTimer::arm(
            kind,
            token,
            delay,
            self.inbox.clone(),
            SessionInput::TimerFired { kind, token },
        ));
    }

    fn render(&self, key: TemplateKey, args: &[&dyn Display]) -> String {
        self.ctx.formatter.render(key, args)
    }

    fn say(&self, key: TemplateKey, args: &[&dyn Display]) {
        self.say_text(self.render(key, args));
    }

    fn say_text(&self, text: String) {
        self.emit(Outbound::Say {
            channel: self.game.channel.clone(),
            text,
        });
    }

    fn emit(&self, message: Outbound) {
        if self.ctx.outbound.send(message).is_err() {
            debug!("outbound receiver dropped");
        }
    }
}
