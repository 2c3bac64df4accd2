//! JSON file backed score store.
//!
//! The whole table lives in memory and is rewritten on every raised record
//! through a temporary file followed by an atomic rename.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use tokio::{fs, sync::Mutex};
use tracing::{debug, info};

use super::{
    MemoryScoreStore, ScoreRecord, ScoreStore, StoreError, StoreResult, UpsertOutcome, rank,
};

/// Score store persisting records to a JSON document on disk.
#[derive(Clone)]
pub struct JsonFileScoreStore {
    path: Arc<PathBuf>,
    cache: MemoryScoreStore,
    write_gate: Arc<Mutex<()>>,
    dirty: Arc<AtomicBool>,
}

impl JsonFileScoreStore {
    /// Open the store at `path`.
    ///
    /// A missing or empty file yields an empty store; the file is created on
    /// the first raised record. An unreadable or corrupt file is reported as
    /// [`StoreError::Unavailable`] and left untouched.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let records = read_records(&path).await?;
        info!(path = %path.display(), count = records.len(), "loaded high scores");

        Ok(Self {
            path: Arc::new(path),
            cache: MemoryScoreStore::with_records(records),
            write_gate: Arc::new(Mutex::new(())),
            dirty: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current table to disk.
    async fn flush(&self) -> StoreResult<()> {
        let _gate = self.write_gate.lock().await;

        let records = rank(self.cache.snapshot(), usize::MAX);
        let payload = serde_json::to_vec_pretty(&records).map_err(|err| {
            StoreError::unavailable("failed to serialize high scores".into(), err)
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| self.write_error(err))?;
        }

        let tmp = temp_path(&self.path);
        fs::write(&tmp, &payload)
            .await
            .map_err(|err| self.write_error(err))?;
        fs::rename(&tmp, self.path.as_ref())
            .await
            .map_err(|err| self.write_error(err))?;

        self.dirty.store(false, Ordering::SeqCst);
        debug!(path = %self.path.display(), count = records.len(), "high scores written");
        Ok(())
    }

    fn write_error(&self, err: std::io::Error) -> StoreError {
        StoreError::unavailable(format!("failed to write `{}`", self.path.display()), err)
    }
}

impl ScoreStore for JsonFileScoreStore {
    fn load(&self) -> BoxFuture<'static, StoreResult<Vec<ScoreRecord>>> {
        self.cache.load()
    }

    fn get(&self, identity: &str) -> BoxFuture<'static, StoreResult<Option<ScoreRecord>>> {
        self.cache.get(identity)
    }

    fn upsert(&self, identity: &str, score: u32) -> BoxFuture<'static, StoreResult<UpsertOutcome>> {
        let store = self.clone();
        let identity = identity.to_owned();
        Box::pin(async move {
            let outcome = store.cache.raise(&identity, score);
            if outcome == UpsertOutcome::Updated {
                store.dirty.store(true, Ordering::SeqCst);
            }

            // A previous failed write leaves the cache ahead of the file.
            if store.dirty.load(Ordering::SeqCst) {
                store.flush().await?;
            }

            Ok(outcome)
        })
    }

    fn top(&self, n: usize) -> BoxFuture<'static, StoreResult<Vec<ScoreRecord>>> {
        self.cache.top(n)
    }
}

async fn read_records(path: &Path) -> StoreResult<Vec<ScoreRecord>> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(StoreError::unavailable(
                format!("failed to read `{}`", path.display()),
                err,
            ));
        }
    };

    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&contents).map_err(|err| {
        StoreError::unavailable(format!("corrupt high score file `{}`", path.display()), err)
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
