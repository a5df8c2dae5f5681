//! Session checkpointing to disk.
//!
//! # File Format
//! ```text
//! {
//!   "<id>": { "id": "<id>", "data": {..}, "lastOp": "<RFC3339 nanos>", "userName": "" },
//!   ...
//! }
//! ```
//!
//! # Design Decisions
//! - The document is written to a sibling temp file and renamed into place,
//!   so a crash mid-write never leaves a truncated checkpoint behind
//! - Restore is lenient per field; only an unreadable document is an error
//! - At most one checkpoint runs at a time (async mutex shared by the
//!   periodic task and the shutdown path)

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

use crate::observability::metrics;
use crate::session::record::Session;
use crate::session::store::SessionStore;

/// Errors raised while writing or reading a checkpoint.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode checkpoint: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("could not decode checkpoint {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("checkpoint task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One session as stored in the checkpoint document.
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    id: String,
    data: Map<String, Value>,
    #[serde(rename = "lastOp")]
    last_op: String,
    #[serde(rename = "userName")]
    user_name: String,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CheckpointError + '_ {
    move |source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Serialize every session in `store` to `path`. Returns the number of
/// sessions written.
pub fn dump(store: &SessionStore, path: &Path) -> Result<usize, CheckpointError> {
    let document: BTreeMap<String, SessionRecord> = store
        .snapshot()
        .into_iter()
        .map(|(id, state)| {
            let record = SessionRecord {
                id: id.clone(),
                data: state.data.into_iter().collect(),
                last_op: state.last_activity.to_rfc3339_opts(SecondsFormat::Nanos, true),
                user_name: state.user,
            };
            (id, record)
        })
        .collect();

    let tmp = temp_path(path);
    let file = open_private(&tmp).map_err(io_error(&tmp))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &document).map_err(CheckpointError::Encode)?;
    writer.write_all(b"\n").map_err(io_error(&tmp))?;
    writer
        .into_inner()
        .map_err(|e| e.into_error())
        .and_then(|f| f.sync_all())
        .map_err(io_error(&tmp))?;
    fs::rename(&tmp, path).map_err(io_error(path))?;

    Ok(document.len())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn open_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Repopulate `store` from the checkpoint at `path`. Returns the number of
/// sessions restored.
///
/// An empty path is a no-op, and so is a missing file (first start). Entries
/// are inserted without collision checks; call this before serving.
pub fn restore(store: &SessionStore, path: &Path) -> Result<usize, CheckpointError> {
    if path.as_os_str().is_empty() {
        return Ok(0);
    }

    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No session checkpoint found");
            return Ok(0);
        }
        Err(e) => return Err(io_error(path)(e)),
    };

    let document: Map<String, Value> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| CheckpointError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    let mut restored = 0;
    for (key, entry) in document {
        match session_from_entry(&key, entry) {
            Some(session) => {
                store.insert_restored(session);
                restored += 1;
            }
            None => tracing::warn!(key = %key, "Skipping malformed checkpoint entry"),
        }
    }

    Ok(restored)
}

fn session_from_entry(key: &str, entry: Value) -> Option<Session> {
    let Value::Object(mut fields) = entry else {
        return None;
    };

    let id = match fields.remove("id") {
        Some(Value::String(id)) if !id.is_empty() => id,
        _ => key.to_string(),
    };
    if id.is_empty() {
        return None;
    }

    let data: HashMap<String, Value> = match fields.remove("data") {
        Some(Value::Object(map)) => map.into_iter().collect(),
        _ => HashMap::new(),
    };

    let last_activity = fields
        .get("lastOp")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_default();

    let user = match fields.remove("userName") {
        Some(Value::String(user)) => user,
        _ => String::new(),
    };

    Some(Session::from_parts(id, user, last_activity, data))
}

/// Runs checkpoints for one store and file, one at a time.
#[derive(Debug)]
pub struct Checkpointer {
    store: Arc<SessionStore>,
    path: PathBuf,
    guard: Mutex<()>,
}

impl Checkpointer {
    pub fn new(store: Arc<SessionStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one checkpoint. Failures are logged and returned; callers are
    /// free to ignore them.
    pub async fn checkpoint(&self) -> Result<usize, CheckpointError> {
        let _guard = self.guard.lock().await;
        let start = Instant::now();

        let store = self.store.clone();
        let path = self.path.clone();
        let result = tokio::task::spawn_blocking(move || dump(&store, &path))
            .await
            .map_err(CheckpointError::from)
            .and_then(|r| r);

        metrics::record_checkpoint(result.is_ok(), start);
        match &result {
            Ok(count) => tracing::trace!(sessions = count, path = %self.path.display(), "Checkpoint written"),
            Err(e) => tracing::error!(error = %e, "Session checkpoint failed"),
        }
        result
    }

    /// Checkpoint every `interval` until shutdown is signalled. When
    /// `idle_timeout` is set, idle sessions are evicted before each write.
    pub async fn run(
        self: Arc<Self>,
        interval: Duration,
        idle_timeout: Option<Duration>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately; the first checkpoint is one interval in.
        ticker.tick().await;

        tracing::info!(
            path = %self.path.display(),
            interval_ms = interval.as_millis() as u64,
            "Checkpoint task started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(max_idle) = idle_timeout {
                        self.store.evict_idle(max_idle);
                    }
                    let _ = self.checkpoint().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Checkpoint task stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let store = SessionStore::new(24);
        let (alice, _) = store.resolve_or_create("").unwrap();
        store.set_user(&alice, "alice");
        store.set(&alice, "cart", json!({"items": [1, 2, 3]}));
        let (anon, _) = store.resolve_or_create("").unwrap();
        store.set(&anon, "visits", json!(7));

        assert_eq!(dump(&store, &path).unwrap(), 2);

        let restored = SessionStore::new(24);
        assert_eq!(restore(&restored, &path).unwrap(), 2);

        let alice2 = restored.lookup(alice.id()).unwrap();
        assert_eq!(restored.user(&alice2), "alice");
        assert_eq!(restored.last_activity(&alice2), store.last_activity(&alice));
        assert_eq!(restored.get(&alice2, "cart"), Some(json!({"items": [1, 2, 3]})));

        let anon2 = restored.lookup(anon.id()).unwrap();
        assert_eq!(restored.user(&anon2), "");
        assert_eq!(restored.get(&anon2, "visits"), Some(json!(7)));
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let store = SessionStore::new(24).adopt_unknown_ids(true);
        let (s, _) = store.resolve_or_create("fixed").unwrap();
        store.set_user(&s, "bob");
        dump(&store, &path).unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let entry = &doc["fixed"];
        assert_eq!(entry["id"], "fixed");
        assert_eq!(entry["userName"], "bob");
        assert_eq!(entry["data"], json!({}));
        let last_op = entry["lastOp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(last_op).is_ok());
        assert!(!path.with_file_name("sessions.json.tmp").exists());
    }

    #[test]
    fn test_dump_truncates_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        fs::write(&path, "x".repeat(10_000)).unwrap();

        dump(&SessionStore::new(24), &path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[test]
    fn test_restore_is_lenient_per_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        fs::write(
            &path,
            r#"{
                "a": {"id": "a", "data": {"k": 1}, "lastOp": "not a time", "userName": "u"},
                "b": {"data": "nope", "lastOp": "2025-01-02T03:04:05.123456789Z"},
                "c": 42
            }"#,
        )
        .unwrap();

        let store = SessionStore::new(24);
        assert_eq!(restore(&store, &path).unwrap(), 2);

        let a = store.lookup("a").unwrap();
        assert_eq!(store.user(&a), "u");
        assert_eq!(store.last_activity(&a), DateTime::<Utc>::default());

        let b = store.lookup("b").unwrap();
        assert_eq!(store.user(&b), "");
        assert_eq!(
            store.last_activity(&b).to_rfc3339_opts(SecondsFormat::Nanos, true),
            "2025-01-02T03:04:05.123456789Z"
        );
        assert!(store.lookup("c").is_none());
    }

    #[test]
    fn test_restore_empty_path_and_missing_file() {
        let store = SessionStore::new(24);
        assert_eq!(restore(&store, Path::new("")).unwrap(), 0);

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(restore(&store, &dir.path().join("absent.json")).unwrap(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_restore_rejects_garbage_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        fs::write(&path, "{ truncated").unwrap();

        let store = SessionStore::new(24);
        assert!(matches!(restore(&store, &path), Err(CheckpointError::Decode { .. })));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_checkpointer_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let store = Arc::new(SessionStore::new(24));
        store.resolve_or_create("").unwrap();

        let checkpointer = Checkpointer::new(store, &path);
        assert_eq!(checkpointer.checkpoint().await.unwrap(), 1);
        assert!(path.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkpoints_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let store = Arc::new(SessionStore::new(24));
        for n in 0..50 {
            let (session, _) = store.resolve_or_create("").unwrap();
            store.set(&session, "n", json!(n));
            store.set(&session, "blob", json!("x".repeat(4096)));
        }

        let checkpointer = Arc::new(Checkpointer::new(store, &path));
        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let checkpointer = checkpointer.clone();
                tokio::spawn(async move { checkpointer.checkpoint().await })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 50);
        }

        let doc: Map<String, Value> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc.len(), 50);
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_checkpointer_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("sessions.json");
        let checkpointer = Checkpointer::new(Arc::new(SessionStore::new(24)), &path);
        assert!(matches!(
            checkpointer.checkpoint().await,
            Err(CheckpointError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let checkpointer = Arc::new(Checkpointer::new(Arc::new(SessionStore::new(24)), &path));
        let (tx, rx) = broadcast::channel(1);

        let task = tokio::spawn(checkpointer.run(Duration::from_millis(10), None, rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert!(path.exists());
    }
}
