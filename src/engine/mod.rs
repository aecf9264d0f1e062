mod booking;
mod error;
mod expander;
mod materializer;
mod mutations;
mod queries;
mod reconciler;
mod resolver;
mod store;

pub use error::EngineError;
pub use expander::{expand, expand_window, Candidate, CandidateSet};
pub use reconciler::reconcile;
pub use resolver::{matching_windows, WindowMatch};
pub use store::Store;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::info;

use crate::config::EngineConfig;
use crate::directory::{InMemoryDirectory, PatientDirectory, ResourceDirectory};
use crate::lock::{LocalLockProvider, LockProvider};
use crate::model::Event;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the WAL. Appends that arrive together share one fsync: take the first,
/// drain whatever else is already queued, flush once, answer everyone.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let WalCommand::Append { event, response } = cmd else {
            handle_non_append(&mut wal, cmd);
            continue;
        };
        let mut batch: Vec<PendingAppend> = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                WalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }
        commit_batch(&mut wal, &mut batch);
        if let Some(other) = deferred {
            handle_non_append(&mut wal, other);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    if result.is_ok() {
        result = wal.flush_sync();
    }

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());
    if let Err(ref e) = result {
        tracing::error!(batch = batch.len(), "WAL commit failed: {e}");
        // Every caller is told the batch failed, so none of it may survive
        // into a replay.
        if let Err(e) = wal.rollback() {
            tracing::error!("WAL rollback failed, refusing further appends: {e}");
        }
    }

    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// External systems the engine consults but does not own.
#[derive(Clone)]
pub struct Collaborators {
    pub resources: Arc<dyn ResourceDirectory>,
    pub patients: Arc<dyn PatientDirectory>,
    pub locks: Arc<dyn LockProvider>,
}

impl Collaborators {
    /// One in-memory directory for both registries plus process-local locks.
    pub fn local(directory: Arc<InMemoryDirectory>) -> Self {
        Self {
            resources: directory.clone(),
            patients: directory,
            locks: Arc::new(LocalLockProvider::new()),
        }
    }
}

pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) store: Store,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    /// Commits hold it shared; compaction holds it exclusively so the snapshot
    /// and the log swap see the same set of committed events.
    pub(super) commit_gate: RwLock<()>,
    pub(super) resources: Arc<dyn ResourceDirectory>,
    pub(super) patients: Arc<dyn PatientDirectory>,
    pub(super) locks: Arc<dyn LockProvider>,
}

impl Engine {
    /// Replay the WAL at `wal_path` and start its writer task. Must run inside a tokio runtime.
    pub fn new(
        wal_path: PathBuf,
        config: EngineConfig,
        collaborators: Collaborators,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Store::new();
        for event in &events {
            store.apply_event(event);
        }
        info!(path = %wal_path.display(), events = events.len(), "engine state replayed");

        Ok(Self {
            config,
            store,
            wal_tx,
            commit_gate: RwLock::new(()),
            resources: collaborators.resources,
            patients: collaborators.patients,
            locks: collaborators.locks,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// Durably log `event`, then apply it. Nothing is applied if the log write fails.
    pub(super) async fn persist_and_apply(&self, event: &Event) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        self.wal_append(event).await?;
        self.store.apply_event(event);
        Ok(())
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let events = self.store.snapshot_events();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
