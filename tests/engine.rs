use std::{io, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use quizbot::{
    bank::{Question, QuestionBank},
    config::QuizConfig,
    dto::{events::ChatEvent, outbound::Outbound},
    error::EngineError,
    messages::{Catalog, MessageFormatter, TemplateKey},
    services::persistence::RetryPolicy,
    state::{GamePhase, QuizEngine, SharedEngine},
    store::{MemoryScoreStore, ScoreRecord, ScoreStore, StoreError, StoreResult, UpsertOutcome},
};
use tokio::{
    sync::mpsc::UnboundedReceiver,
    time::{Instant, timeout},
};

const CHANNEL: &str = "#quiz";
const CATEGORY: &str = "geography";
const PROMPT: &str = "Capital of France?";
const ANSWER: &str = "Paris";

fn config() -> QuizConfig {
    QuizConfig {
        stamina: 6,
        hint_patience_secs: 10,
        min_players: 2,
        target_score: 10,
        max_hints: 3,
        verbose: false,
        ..QuizConfig::default()
    }
}

fn bank() -> QuestionBank {
    QuestionBank::new(
        vec![Question {
            id: 1,
            category: CATEGORY.into(),
            prompt: PROMPT.into(),
            answer: ANSWER.into(),
            last_asked_at: None,
        }],
        20,
    )
}

fn start(config: QuizConfig) -> (SharedEngine, UnboundedReceiver<Outbound>) {
    start_with_store(config, Arc::new(MemoryScoreStore::new()), RetryPolicy::default())
}

fn start_with_store(
    config: QuizConfig,
    store: Arc<dyn ScoreStore>,
    retry: RetryPolicy,
) -> (SharedEngine, UnboundedReceiver<Outbound>) {
    let (engine, rx) =
        QuizEngine::new_with_retry(config, store, Arc::new(Catalog::default()), retry);
    engine.join_channel(CHANNEL, bank()).unwrap();
    (engine, rx)
}

async fn recv(rx: &mut UnboundedReceiver<Outbound>) -> Outbound {
    timeout(Duration::from_secs(300), rx.recv())
        .await
        .expect("engine went quiet")
        .expect("outbound stream closed")
}

fn say(key: TemplateKey, args: &[&dyn std::fmt::Display]) -> Outbound {
    Outbound::Say {
        channel: CHANNEL.into(),
        text: Catalog::default().render(key, args),
    }
}

fn question() -> Outbound {
    say(TemplateKey::Question, &[&CATEGORY, &PROMPT])
}

fn chat(engine: &SharedEngine, event: ChatEvent) {
    engine.dispatch(CHANNEL, event).unwrap();
}

fn message(identity: &str, text: &str) -> ChatEvent {
    ChatEvent::MessageReceived {
        identity: identity.into(),
        text: text.into(),
    }
}

/// Join two players and wait for the first question.
async fn open_round(engine: &SharedEngine, rx: &mut UnboundedReceiver<Outbound>) {
    assert!(matches!(recv(rx).await, Outbound::Topic { .. }));
    chat(engine, ChatEvent::PlayerJoined("alice".into()));
    assert_eq!(recv(rx).await, say(TemplateKey::Waiting, &[]));
    chat(engine, ChatEvent::PlayerJoined("bob".into()));
    assert_eq!(recv(rx).await, question());
}

#[tokio::test(start_paused = true)]
async fn questions_wait_for_enough_players() {
    let (engine, mut rx) = start(config());
    assert!(matches!(recv(&mut rx).await, Outbound::Topic { .. }));

    chat(&engine, ChatEvent::PlayerJoined("alice".into()));
    assert_eq!(recv(&mut rx).await, say(TemplateKey::Waiting, &[]));
    let snapshot = engine.snapshot(CHANNEL).await.unwrap();
    assert_eq!(snapshot.phase, GamePhase::Idle);
    assert_eq!(snapshot.active_players, 1);

    assert!(
        timeout(Duration::from_secs(60), rx.recv()).await.is_err(),
        "nothing is asked with a single player"
    );

    let joined = Instant::now();
    chat(&engine, ChatEvent::PlayerJoined("bob".into()));
    assert_eq!(recv(&mut rx).await, question());
    assert!(joined.elapsed() >= Duration::from_secs(6));

    let snapshot = engine.snapshot(CHANNEL).await.unwrap();
    assert_eq!(snapshot.phase, GamePhase::Asking);
    assert_eq!(snapshot.current_question, Some(1));
}

#[tokio::test(start_paused = true)]
async fn hints_respect_patience_floor_and_cutoff() {
    let (engine, mut rx) = start(QuizConfig {
        hint_patience_secs: 3,
        ..config()
    });
    open_round(&engine, &mut rx).await;

    let catalog = Catalog::default();
    for revealed in 1..=3 {
        let asked = Instant::now();
        let hint = recv(&mut rx).await;
        let elapsed = asked.elapsed();
        assert!(elapsed >= Duration::from_secs(5), "hint after {elapsed:?}");
        assert!(elapsed < Duration::from_secs(6), "hint after {elapsed:?}");
        assert_eq!(
            hint,
            Outbound::Say {
                channel: CHANNEL.into(),
                text: catalog.hint(ANSWER, revealed),
            }
        );
    }

    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::RightAnswer, &[&ANSWER])
    );
    assert_eq!(recv(&mut rx).await, say(TemplateKey::WishLuck, &[]));

    let snapshot = engine.snapshot(CHANNEL).await.unwrap();
    assert_eq!(snapshot.phase, GamePhase::Waiting);
    assert_eq!(snapshot.last_winner, None);
    assert_eq!(recv(&mut rx).await, question());
}

#[tokio::test(start_paused = true)]
async fn correct_answer_cancels_pending_hint() {
    let (engine, mut rx) = start(QuizConfig {
        stamina: 30,
        hint_patience_secs: 5,
        ..config()
    });
    open_round(&engine, &mut rx).await;

    chat(&engine, message("alice", "  paris "));
    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::CorrectAnswer, &[&ANSWER, &"alice"])
    );

    let snapshot = engine.snapshot(CHANNEL).await.unwrap();
    assert_eq!(snapshot.phase, GamePhase::Waiting);
    assert_eq!(snapshot.hints_given, 0);
    assert_eq!(snapshot.current_question, None);
    assert_eq!(snapshot.last_winner.as_deref(), Some("alice"));

    assert!(
        timeout(Duration::from_secs(29), rx.recv()).await.is_err(),
        "no hint for an answered question"
    );
    assert_eq!(recv(&mut rx).await, question());
}

#[tokio::test(start_paused = true)]
async fn renamed_player_keeps_score_and_wins() {
    let store = Arc::new(MemoryScoreStore::new());
    let (engine, mut rx) = start_with_store(
        QuizConfig {
            target_score: 2,
            ..config()
        },
        store.clone(),
        RetryPolicy::default(),
    );
    open_round(&engine, &mut rx).await;

    chat(&engine, message("alice", ANSWER));
    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::CorrectAnswer, &[&ANSWER, &"alice"])
    );

    chat(&engine, message("bob", "!score"));
    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::Score, &[&1, &"alice", &1])
    );

    chat(
        &engine,
        ChatEvent::IdentityChanged {
            old: "alice".into(),
            new: "alicia".into(),
        },
    );
    assert_eq!(recv(&mut rx).await, question());

    chat(&engine, message("alicia", ANSWER));
    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::CorrectAnswer, &[&ANSWER, &"alicia"])
    );
    assert_eq!(recv(&mut rx).await, say(TemplateKey::Winner, &[&"alicia"]));
    assert_eq!(
        recv(&mut rx).await,
        Outbound::Topic {
            channel: CHANNEL.into(),
            text: Catalog::default().render(
                TemplateKey::ChannelTopic,
                &[&2, &"alicia", &"alicia", &2]
            ),
        }
    );

    let best = store.top(1).await.unwrap();
    assert_eq!(best[0].identity, "alicia");
    assert_eq!(best[0].score, 2);

    // A new game starts right away with both players still present.
    let snapshot = engine.snapshot(CHANNEL).await.unwrap();
    assert_eq!(snapshot.phase, GamePhase::Waiting);
    assert_eq!(snapshot.active_players, 2);

    chat(&engine, message("bob", "!score"));
    assert_eq!(recv(&mut rx).await, question());
}

#[tokio::test(start_paused = true)]
async fn leaving_below_quorum_abandons_round() {
    let (engine, mut rx) = start(config());
    open_round(&engine, &mut rx).await;

    chat(&engine, ChatEvent::PlayerLeft("bob".into()));
    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::RightAnswer, &[&ANSWER])
    );
    assert_eq!(recv(&mut rx).await, say(TemplateKey::WishLuck, &[]));
    assert_eq!(recv(&mut rx).await, say(TemplateKey::Waiting, &[]));

    let snapshot = engine.snapshot(CHANNEL).await.unwrap();
    assert_eq!(snapshot.phase, GamePhase::Idle);
    assert_eq!(snapshot.current_question, None);

    chat(&engine, message("alice", ANSWER));
    assert!(timeout(Duration::from_secs(60), rx.recv()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn hungry_bot_waits_for_a_snack() {
    let (engine, mut rx) = start(QuizConfig {
        stamina: 1,
        ..config()
    });
    open_round(&engine, &mut rx).await;

    chat(&engine, message("bob", ANSWER));
    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::CorrectAnswer, &[&ANSWER, &"bob"])
    );
    assert_eq!(recv(&mut rx).await, say(TemplateKey::Botsnack, &[]));
    assert!(
        timeout(Duration::from_secs(120), rx.recv()).await.is_err(),
        "hunger is announced once"
    );
    assert!(engine.snapshot(CHANNEL).await.unwrap().hungry);

    chat(&engine, message("alice", "!botsnack"));
    assert_eq!(recv(&mut rx).await, say(TemplateKey::Thanks, &[]));
    assert_eq!(recv(&mut rx).await, question());
}

#[tokio::test(start_paused = true)]
async fn hints_spend_stamina_too() {
    let (engine, mut rx) = start(QuizConfig {
        stamina: 2,
        hint_patience_secs: 5,
        ..config()
    });
    open_round(&engine, &mut rx).await;

    let catalog = Catalog::default();
    for revealed in 1..=3 {
        assert_eq!(
            recv(&mut rx).await,
            Outbound::Say {
                channel: CHANNEL.into(),
                text: catalog.hint(ANSWER, revealed),
            }
        );
    }
    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::RightAnswer, &[&ANSWER])
    );
    assert_eq!(recv(&mut rx).await, say(TemplateKey::WishLuck, &[]));

    let snapshot = engine.snapshot(CHANNEL).await.unwrap();
    assert!(snapshot.hungry);
    assert_eq!(snapshot.phase, GamePhase::Waiting);

    assert_eq!(recv(&mut rx).await, say(TemplateKey::Botsnack, &[]));
    assert!(timeout(Duration::from_secs(60), rx.recv()).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn only_the_first_correct_answer_wins() {
    let (engine, mut rx) = start(config());
    open_round(&engine, &mut rx).await;

    // Both answers are queued before the session handles either of them.
    chat(&engine, message("alice", ANSWER));
    chat(&engine, message("bob", ANSWER));

    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::CorrectAnswer, &[&ANSWER, &"alice"])
    );

    chat(&engine, message("bob", "!score"));
    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::Score, &[&1, &"alice", &1])
    );
    assert!(
        timeout(Duration::from_secs(5), rx.recv()).await.is_err(),
        "the second answer must not score"
    );

    let snapshot = engine.snapshot(CHANNEL).await.unwrap();
    assert_eq!(snapshot.last_winner.as_deref(), Some("alice"));
    assert_eq!(snapshot.phase, GamePhase::Waiting);
}

#[derive(Clone)]
struct BrokenStore;

impl ScoreStore for BrokenStore {
    fn load(&self) -> BoxFuture<'static, StoreResult<Vec<ScoreRecord>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn get(&self, _identity: &str) -> BoxFuture<'static, StoreResult<Option<ScoreRecord>>> {
        Box::pin(async { Ok(None) })
    }

    fn upsert(&self, _identity: &str, _score: u32) -> BoxFuture<'static, StoreResult<UpsertOutcome>> {
        Box::pin(async {
            Err(StoreError::unavailable(
                "disk full".into(),
                io::Error::other("no space left on device"),
            ))
        })
    }

    fn top(&self, _n: usize) -> BoxFuture<'static, StoreResult<Vec<ScoreRecord>>> {
        Box::pin(async { Ok(Vec::new()) })
    }
}

#[tokio::test(start_paused = true)]
async fn failed_persistence_warns_and_round_completes() {
    let retry = RetryPolicy {
        attempts: 2,
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(50),
    };
    let (engine, mut rx) = start_with_store(config(), Arc::new(BrokenStore), retry);
    open_round(&engine, &mut rx).await;

    chat(&engine, message("alice", ANSWER));
    let warning = recv(&mut rx).await;
    assert!(
        matches!(&warning, Outbound::Warning { detail, .. } if detail.contains("alice")),
        "unexpected {warning:?}"
    );
    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::CorrectAnswer, &[&ANSWER, &"alice"])
    );

    let snapshot = engine.snapshot(CHANNEL).await.unwrap();
    assert_eq!(snapshot.phase, GamePhase::Waiting);
    assert_eq!(recv(&mut rx).await, question());
}

#[tokio::test(start_paused = true)]
async fn invalid_identity_is_kicked() {
    let (engine, mut rx) = start(config());
    assert!(matches!(recv(&mut rx).await, Outbound::Topic { .. }));

    chat(&engine, ChatEvent::PlayerJoined("quizbot".into()));
    assert_eq!(
        recv(&mut rx).await,
        say(TemplateKey::InvalidName, &[&"quizbot"])
    );
    assert_eq!(
        recv(&mut rx).await,
        Outbound::Kick {
            channel: CHANNEL.into(),
            identity: "quizbot".into(),
            reason: Catalog::default().render(TemplateKey::KickMsg, &[]),
        }
    );
    assert_eq!(engine.snapshot(CHANNEL).await.unwrap().active_players, 0);
}

#[tokio::test(start_paused = true)]
async fn parting_tears_the_session_down() {
    let (engine, mut rx) = start(config());
    open_round(&engine, &mut rx).await;
    assert_eq!(engine.config().min_players, 2);
    assert_eq!(engine.channels(), vec![CHANNEL.to_owned()]);

    assert!(matches!(
        engine.join_channel("#QUIZ", bank()),
        Err(EngineError::ChannelAlreadyJoined(_))
    ));
    assert!(matches!(
        engine.join_channel("#empty", QuestionBank::new(Vec::new(), 20)),
        Err(EngineError::Bank(_))
    ));

    assert!(engine.part_channel(CHANNEL));
    assert!(!engine.part_channel(CHANNEL));
    assert!(engine.channels().is_empty());
    assert!(engine.snapshot(CHANNEL).await.is_none());
    assert!(matches!(
        engine.dispatch(CHANNEL, message("alice", ANSWER)),
        Err(EngineError::UnknownChannel(_))
    ));

    let late = timeout(Duration::from_secs(120), rx.recv()).await;
    assert!(!matches!(late, Ok(Some(_))), "no output after part: {late:?}");

    engine.join_channel(CHANNEL, bank()).unwrap();
    assert!(matches!(recv(&mut rx).await, Outbound::Topic { .. }));
    engine.shutdown();
    assert!(engine.channels().is_empty());
}
