//! Quizbot binary entrypoint wiring configuration, storage, the engine and the console transport.

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{
    io::BufReader,
    sync::mpsc::UnboundedReceiver,
    task::JoinHandle,
    time::timeout,
};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Registry, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

use quizbot::{
    bank::QuestionBank,
    config::QuizConfig,
    dto::outbound::Outbound,
    messages::Catalog,
    services::console,
    state::QuizEngine,
    store::{JsonFileScoreStore, MemoryScoreStore, ScoreStore},
};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = init_tracing();

    let config = QuizConfig::load();
    apply_verbosity(&filter, config.verbose);

    let store = open_store(&config.hiscores_db).await;
    let bank = QuestionBank::load_file(&config.questions, config.recycle_threshold)
        .await
        .with_context(|| format!("loading questions from {}", config.questions.display()))?;

    let formatter = Arc::new(Catalog::new(config.locale));
    let (engine, outbound) = QuizEngine::new(config, store, formatter);
    let printer = spawn_printer(outbound);
    let channel = engine.config().channel.clone();

    engine
        .join_channel(&channel, bank)
        .context("joining channel")?;
    info!(%channel, "reading chat events from stdin");

    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = console::run(engine.clone(), &channel, stdin) => {
            result.context("reading console input")?;
            info!("console input closed");
        }
        _ = shutdown_signal() => info!("shutdown requested"),
    }

    engine.shutdown();
    drop(engine);
    if timeout(Duration::from_secs(1), printer).await.is_err() {
        warn!("outbound printer did not drain in time");
    }

    Ok(())
}

/// Open the high score file, staying in memory when it cannot be used.
async fn open_store(path: &Path) -> Arc<dyn ScoreStore> {
    match JsonFileScoreStore::open(path).await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!(
                path = %path.display(),
                error = %err,
                "high score file unusable; scores will only be kept in memory"
            );
            Arc::new(MemoryScoreStore::new())
        }
    }
}

/// Print everything the engine wants said until every session is gone.
fn spawn_printer(mut outbound: UnboundedReceiver<Outbound>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            match &message {
                Outbound::Warning { detail, .. } => {
                    warn!(channel = message.channel(), %detail, "engine warning")
                }
                _ => println!("{message}"),
            }
        }
    })
}

/// Configure tracing subscribers; the filter can be tightened once the config is known.
fn init_tracing() -> FilterHandle {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(true).into());
    let (filter, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    handle
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose { "info" } else { "warn,quizbot=info" }
}

/// Apply the configured verbosity unless `RUST_LOG` overrides it.
fn apply_verbosity(handle: &FilterHandle, verbose: bool) {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    if let Err(err) = handle.reload(EnvFilter::new(default_filter(verbose))) {
        warn!(error = %err, "failed to apply log verbosity");
    }
}

/// Wait for Ctrl+C or SIGTERM and stop the bot gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
