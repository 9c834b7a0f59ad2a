//! Paper-trade history and its persisted document.
//!
//! The orchestrator owns the in-memory history and hands the store a fresh
//! snapshot after every mutation. Snapshots land in a watch channel, which
//! coalesces bursts into "latest wins"; one background task drains it on a
//! fixed cadence. Writes go to a temporary file that is then renamed over the
//! target, so a crash never leaves a half-written document.

use polymarket_core::config::PaperStoreConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auto_trade::PaperFillRule;
use crate::error::StoreError;
use crate::sweep::SweepResult;

pub const PAPER_HISTORY_CAP: usize = 1_000;

/// Records carrying this stop reason or error predate the current policy
/// model and are discarded on load.
const OBSOLETE_MARKER: &str = "not_allowed";

/// One simulated trade with its market context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperTradeRecord {
    pub id: Uuid,
    pub created_at_ms: i64,
    pub suggestion_id: String,
    pub condition_id: String,
    pub token_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    pub fill_rule: PaperFillRule,
    #[serde(default)]
    pub leader_price: Option<Decimal>,
    pub result: SweepResult,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    #[serde(rename = "paperHistory")]
    paper_history: &'a [PaperTradeRecord],
}

/// Read the persisted document. A missing file is an empty history.
pub async fn load_history(path: &Path) -> Result<Vec<PaperTradeRecord>, StoreError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let document: Value = serde_json::from_str(&raw)?;
    Ok(parse_document(&document))
}

/// Extract records from a document, newest first, dropping obsolete and
/// malformed entries and capping at [`PAPER_HISTORY_CAP`].
pub fn parse_document(document: &Value) -> Vec<PaperTradeRecord> {
    let Some(items) = document.get("paperHistory").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut obsolete = 0usize;
    let mut malformed = 0usize;
    let records: Vec<PaperTradeRecord> = items
        .iter()
        .filter(|item| {
            let keep = !is_obsolete(item);
            if !keep {
                obsolete += 1;
            }
            keep
        })
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                malformed += 1;
                debug!(error = %e, "Skipping malformed paper record");
                None
            }
        })
        .take(PAPER_HISTORY_CAP)
        .collect();

    if obsolete > 0 || malformed > 0 {
        info!(obsolete, malformed, kept = records.len(), "Filtered paper history on load");
    }
    records
}

fn is_obsolete(record: &Value) -> bool {
    let marked = |v: Option<&Value>| v.and_then(Value::as_str) == Some(OBSOLETE_MARKER);
    marked(record.get("error"))
        || marked(record.get("stop_reason"))
        || marked(record.pointer("/result/stop_reason"))
        || marked(record.pointer("/result/error"))
}

async fn write_document(path: &Path, records: &[PaperTradeRecord]) -> Result<(), StoreError> {
    let body = serde_json::to_vec_pretty(&DocumentRef {
        paper_history: records,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = tmp_path(path);
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "paper_history.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

type Snapshot = Arc<Vec<PaperTradeRecord>>;

struct Shared {
    path: PathBuf,
    /// Holding this lock is holding the only write slot.
    latest: Mutex<watch::Receiver<Snapshot>>,
    last_error: std::sync::Mutex<Option<String>>,
    writes: AtomicU64,
}

impl Shared {
    /// Persist the newest snapshot if one arrived since the last write.
    async fn write_if_dirty(&self) -> bool {
        let mut latest = self.latest.lock().await;
        if !latest.has_changed().unwrap_or(false) {
            return false;
        }
        let snapshot = latest.borrow_and_update().clone();

        match write_document(&self.path, &snapshot).await {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
                self.set_error(None);
                debug!(path = %self.path.display(), records = snapshot.len(), "Paper history saved");
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to save paper history");
                self.set_error(Some(e.to_string()));
            }
        }
        true
    }

    fn set_error(&self, error: Option<String>) {
        let mut slot = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        *slot = error;
    }
}

/// Debounced, atomic writer for paper-trade history.
pub struct PaperStore {
    shared: Arc<Shared>,
    snapshots: watch::Sender<Snapshot>,
    stop: watch::Sender<bool>,
    task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl PaperStore {
    /// Load the existing document and start the background writer.
    ///
    /// A document that cannot be read is recorded as the store's last error
    /// and trading starts from an empty history.
    pub async fn open(config: &PaperStoreConfig) -> (Self, Vec<PaperTradeRecord>) {
        let (records, load_error) = match load_history(&config.history_path).await {
            Ok(records) => (records, None),
            Err(e) => {
                warn!(path = %config.history_path.display(), error = %e, "Failed to load paper history");
                (Vec::new(), Some(format!("load failed: {e}")))
            }
        };

        let store = Self::start(
            config.history_path.clone(),
            Duration::from_millis(config.flush_interval_ms.max(1)),
        );
        if load_error.is_some() {
            store.shared.set_error(load_error);
        }
        info!(path = %config.history_path.display(), records = records.len(), "Paper history loaded");
        (store, records)
    }

    /// Start a writer for `path` without reading it. Must run inside a tokio runtime.
    pub fn start(path: PathBuf, flush_interval: Duration) -> Self {
        let (snapshots, latest) = watch::channel(Snapshot::default());
        let (stop, stop_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            path,
            latest: Mutex::new(latest),
            last_error: std::sync::Mutex::new(None),
            writes: AtomicU64::new(0),
        });

        let task = tokio::spawn(writer_loop(shared.clone(), stop_rx, flush_interval));

        Self {
            shared,
            snapshots,
            stop,
            task: std::sync::Mutex::new(Some(task)),
        }
    }

    /// Mark the history dirty with its newest contents.
    pub fn schedule(&self, records: Vec<PaperTradeRecord>) {
        self.snapshots.send_replace(Arc::new(records));
    }

    /// Write now if anything is pending. Returns whether a write was attempted.
    pub async fn flush(&self) -> bool {
        self.shared.write_if_dirty().await
    }

    /// Stop the background writer after draining the last snapshot.
    pub async fn shutdown(&self) {
        // Nobody listening just means the writer already exited.
        let _ = self.stop.send(true);
        let handle = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Paper history writer did not exit cleanly");
            }
        }
        self.flush().await;
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Completed writes since start.
    pub fn write_count(&self) -> u64 {
        self.shared.writes.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }
}

async fn writer_loop(shared: Arc<Shared>, mut stop: watch::Receiver<bool>, flush_interval: Duration) {
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                shared.write_if_dirty().await;
            }
            // Explicit stop, or the store itself was dropped.
            _ = stop.changed() => {
                shared.write_if_dirty().await;
                debug!(path = %shared.path.display(), "Paper history writer stopped");
                return;
            }
        }
    }
}
