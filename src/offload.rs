//! Execution Offload Coordinator.
//!
//! Match Engine and Importer work runs either on a dedicated background
//! worker thread or, when the worker cannot be established, synchronously in
//! the caller's context. Both implementations sit behind the same async
//! [`TaskExecutor`] contract; callers cannot tell which one executed beyond
//! latency. The worker owns a private copy of the catalog snapshot; the only
//! channel between the two sides is message passing with copy semantics.

use crate::catalog::StoreData;
use crate::error::{Error, Result};
use crate::importer::{parse_swagger, ImportResult};
use crate::matcher::{find_match, MatchResult, RequestDescriptor};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// How long a caller waits for the background worker before giving up.
/// Expiry is the only cancellation mechanism; a late reply is orphaned.
pub const TASK_TIMEOUT: Duration = Duration::from_secs(5);

/// Unit of offloadable work.
#[derive(Debug, Clone)]
pub enum Task {
    FindMatch(RequestDescriptor),
    ParseSwagger { project_id: String, document: Value },
}

#[derive(Debug, Clone)]
pub enum TaskOutput {
    Match(Option<MatchResult>),
    Import(ImportResult),
}

/// Common contract for running engine work, possibly off the main thread.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Execute a task against the executor's current snapshot.
    async fn run(&self, task: Task) -> Result<TaskOutput>;
    /// Push a fresh catalog snapshot. Wired to the store's data observers so
    /// every mutation refreshes the executor's private copy.
    fn sync(&self, snapshot: StoreData);
}

/// Build the best available executor: a background worker when it can be
/// spawned, otherwise the in-process fallback. The degrade is silent by
/// design; it is logged for diagnostics only.
pub fn spawn_executor() -> Arc<dyn TaskExecutor> {
    match WorkerExecutor::spawn() {
        Ok(worker) => Arc::new(worker),
        Err(err) => {
            warn!(error = %err, "background worker unavailable, running tasks in-process");
            Arc::new(InProcessExecutor::new())
        }
    }
}

fn execute(data: &StoreData, task: Task) -> TaskOutput {
    match task {
        Task::FindMatch(request) => TaskOutput::Match(find_match(data, &request)),
        Task::ParseSwagger {
            project_id,
            document,
        } => TaskOutput::Import(parse_swagger(&project_id, &document)),
    }
}

/// Synchronous executor wrapped in the async contract.
pub struct InProcessExecutor {
    mirror: RwLock<StoreData>,
}

impl InProcessExecutor {
    pub fn new() -> Self {
        Self {
            mirror: RwLock::new(StoreData::default()),
        }
    }
}

impl Default for InProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskExecutor for InProcessExecutor {
    async fn run(&self, task: Task) -> Result<TaskOutput> {
        Ok(execute(&self.mirror.read(), task))
    }

    fn sync(&self, snapshot: StoreData) {
        *self.mirror.write() = snapshot;
    }
}

enum WorkerMsg {
    Sync(StoreData),
    Run { id: u64, task: Task },
}

struct WorkerReply {
    id: u64,
    output: TaskOutput,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<TaskOutput>>>>;

/// Executor backed by a dedicated worker thread.
///
/// Each request gets a correlation id and a one-shot callback registered
/// under it; the reply pump resolves the callback when the worker answers.
/// On timeout the callback is removed, so a late reply finds nothing and is
/// dropped.
pub struct WorkerExecutor {
    commands: mpsc::UnboundedSender<WorkerMsg>,
    pending: PendingMap,
    next_id: AtomicU64,
    /// Last synced snapshot, used to run synchronously when the worker
    /// channel is found dead.
    fallback: RwLock<StoreData>,
    timeout: Duration,
}

impl WorkerExecutor {
    /// Spawn the worker thread and its reply pump. Requires a running tokio
    /// runtime; fails (for the caller to degrade) when the thread cannot be
    /// created or no runtime is active.
    pub fn spawn() -> anyhow::Result<Self> {
        Self::spawn_with_timeout(TASK_TIMEOUT)
    }

    /// Like [`spawn`](Self::spawn), with a caller-chosen wait limit.
    pub fn spawn_with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let handle = tokio::runtime::Handle::try_current()?;

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<WorkerMsg>();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel::<WorkerReply>();

        std::thread::Builder::new()
            .name("castlemock-worker".to_string())
            .spawn(move || {
                let mut state = StoreData::default();
                while let Some(msg) = command_rx.blocking_recv() {
                    match msg {
                        WorkerMsg::Sync(snapshot) => state = snapshot,
                        WorkerMsg::Run { id, task } => {
                            let output = execute(&state, task);
                            if reply_tx.send(WorkerReply { id, output }).is_err() {
                                break;
                            }
                        }
                    }
                }
                debug!("worker thread shutting down");
            })?;

        Ok(Self::connect(command_tx, reply_rx, timeout, handle))
    }

    /// Wire an executor over already-created channels. The far side of
    /// `commands` is expected to answer `Run` messages on the reply channel.
    fn connect(
        commands: mpsc::UnboundedSender<WorkerMsg>,
        mut replies: mpsc::UnboundedReceiver<WorkerReply>,
        timeout: Duration,
        handle: tokio::runtime::Handle,
    ) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let pump_pending = Arc::clone(&pending);
        handle.spawn(async move {
            while let Some(reply) = replies.recv().await {
                match pump_pending.lock().remove(&reply.id) {
                    Some(sender) => {
                        let _ = sender.send(reply.output);
                    }
                    None => debug!(id = reply.id, "orphaned worker reply, request timed out"),
                }
            }
        });

        Self {
            commands,
            pending,
            next_id: AtomicU64::new(1),
            fallback: RwLock::new(StoreData::default()),
            timeout,
        }
    }
}

#[async_trait]
impl TaskExecutor for WorkerExecutor {
    async fn run(&self, task: Task) -> Result<TaskOutput> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        if self
            .commands
            .send(WorkerMsg::Run {
                id,
                task: task.clone(),
            })
            .is_err()
        {
            // Worker died after spawn: availability fallback, not an error.
            self.pending.lock().remove(&id);
            warn!("worker channel closed, executing task in-process");
            return Ok(execute(&self.fallback.read(), task));
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(_)) => {
                // Reply pump dropped the sender without answering.
                self.pending.lock().remove(&id);
                warn!(id, "worker reply channel closed, executing task in-process");
                Ok(execute(&self.fallback.read(), task))
            }
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(Error::WorkerTimeout)
            }
        }
    }

    fn sync(&self, snapshot: StoreData) {
        *self.fallback.write() = snapshot.clone();
        // A closed channel here is handled at run() time.
        let _ = self.commands.send(WorkerMsg::Sync(snapshot));
    }
}
