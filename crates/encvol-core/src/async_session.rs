//! Tokio front-end that runs session operations off the caller's task.
//!
//! [`AsyncVolumeSession`] wraps a [`VolumeSession`] with one operation slot:
//!
//! - **Queries** (listing, lookup, existence) take the slot shared and may run
//!   alongside each other.
//! - **Mutations** (create, mkdir, delete, move, copy, rename, paste, import,
//!   export, sync) take it exclusively, so no mutation overlaps any other
//!   operation on the same session.
//!
//! Each call claims its place in the session's queue before returning an
//! [`OperationHandle`]: a single dispatcher task grants the slot in the order
//! calls were issued, so `make_dir(d)` followed by `create_file(d/x)` always
//! runs in that order, and [`close`](AsyncVolumeSession::close) runs after
//! everything issued before it. The work itself runs on a blocking worker
//! (`spawn_blocking`) once the slot is granted, reporting progress into the
//! handle's [`OperationTracker`].
//!
//! Operations cannot be cancelled. Dropping a handle detaches it; the worker
//! still runs to completion.
//!
//! # Panics
//!
//! [`AsyncVolumeSession::new`] and every method that returns an
//! [`OperationHandle`] spawn onto the current Tokio runtime and panic when
//! called outside one.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::clipboard::{Clipboard, PasteOutcome};
use crate::cursor::Listing;
use crate::engine::{DeleteStats, TransferStats};
use crate::error::VolumeError;
use crate::node::FileNode;
use crate::operation::{OperationStatus, OperationTracker};
use crate::path::LogicalPath;
use crate::progress::ProgressReporter;
use crate::session::VolumeSession;

#[derive(Debug, Clone, Copy)]
enum SlotMode {
    Shared,
    Exclusive,
}

/// Held by the worker for the whole operation.
enum SlotGuard {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

impl SlotGuard {
    fn release(self) {
        match self {
            SlotGuard::Shared(guard) => drop(guard),
            SlotGuard::Exclusive(guard) => drop(guard),
        }
    }
}

/// A queued request for the slot.
struct SlotRequest {
    mode: SlotMode,
    grant: oneshot::Sender<SlotGuard>,
}

/// Grants slot guards strictly in request order.
///
/// Consecutive shared requests are granted together; an exclusive request
/// waits for every earlier guard to be released, and later requests wait
/// behind it.
async fn dispatch(slot: Arc<RwLock<()>>, mut requests: mpsc::UnboundedReceiver<SlotRequest>) {
    while let Some(request) = requests.recv().await {
        let guard = match request.mode {
            SlotMode::Shared => SlotGuard::Shared(Arc::clone(&slot).read_owned().await),
            SlotMode::Exclusive => SlotGuard::Exclusive(Arc::clone(&slot).write_owned().await),
        };
        trace!(mode = ?request.mode, "Slot granted");
        // A detached requester just drops the guard again.
        if let Err(guard) = request.grant.send(guard) {
            guard.release();
        }
    }
    debug!("Operation dispatcher stopped");
}

/// A running (or finished) operation.
#[derive(Debug)]
pub struct OperationHandle<T> {
    tracker: Arc<OperationTracker>,
    join: JoinHandle<Result<T, VolumeError>>,
}

impl<T> OperationHandle<T> {
    pub fn tracker(&self) -> &Arc<OperationTracker> {
        &self.tracker
    }

    /// Snapshot of the operation's state and progress.
    pub fn status(&self) -> OperationStatus {
        self.tracker.status()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the terminal result.
    pub async fn wait(self) -> Result<T, VolumeError> {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => Err(VolumeError::failed_plain(format!(
                "Operation '{}' did not complete: {e}",
                self.tracker.label()
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AsyncVolumeSession {
    session: Arc<VolumeSession>,
    queue: mpsc::UnboundedSender<SlotRequest>,
}

impl AsyncVolumeSession {
    /// Wrap `session` and start its dispatcher on the current runtime.
    pub fn new(session: VolumeSession) -> Self {
        let (queue, requests) = mpsc::unbounded_channel();
        tokio::spawn(dispatch(Arc::new(RwLock::new(())), requests));
        AsyncVolumeSession {
            session: Arc::new(session),
            queue,
        }
    }

    /// The wrapped session, for synchronous queries that need no slot
    /// (resolving paths, reading the root handle).
    pub fn session(&self) -> &Arc<VolumeSession> {
        &self.session
    }

    /// Close the session once every operation issued before this call has
    /// finished. Operations issued afterwards fail with
    /// [`VolumeError::SessionClosed`].
    ///
    /// The place in the queue is taken when `close` is called, not when the
    /// returned future is first polled.
    pub fn close(&self) -> impl Future<Output = ()> + Send + use<> {
        let handle = self.spawn("close", SlotMode::Exclusive, |session, _| {
            session.close();
            Ok(())
        });
        async move {
            let _ = handle.wait().await;
        }
    }

    fn spawn<T, F>(&self, label: &str, mode: SlotMode, work: F) -> OperationHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&VolumeSession, &dyn ProgressReporter) -> Result<T, VolumeError>
            + Send
            + 'static,
    {
        let tracker = Arc::new(OperationTracker::new(label));
        let worker_tracker = Arc::clone(&tracker);
        let session = Arc::clone(&self.session);

        let (grant, granted) = oneshot::channel();
        let queued = self.queue.send(SlotRequest { mode, grant }).is_ok();

        let join = tokio::spawn(async move {
            let slot = if queued { granted.await.ok() } else { None };
            let Some(guard) = slot else {
                return worker_tracker.run(|_| {
                    Err(VolumeError::failed_plain(format!(
                        "Operation '{}' could not be scheduled: dispatcher stopped",
                        worker_tracker.label()
                    )))
                });
            };
            debug!(label = %worker_tracker.label(), ?mode, "Operation slot acquired");

            let worker = tokio::task::spawn_blocking(move || {
                let outcome = worker_tracker.run(|progress| work(session.as_ref(), progress));
                guard.release();
                outcome
            });
            match worker.await {
                Ok(outcome) => outcome,
                Err(e) => Err(VolumeError::failed_plain(format!(
                    "Operation worker failed: {e}"
                ))),
            }
        });

        OperationHandle { tracker, join }
    }

    pub fn list(&self, dir: FileNode) -> OperationHandle<Listing> {
        self.spawn("list", SlotMode::Shared, move |session, _| session.list(&dir))
    }

    pub fn lookup(&self, path: LogicalPath) -> OperationHandle<FileNode> {
        self.spawn("lookup", SlotMode::Shared, move |session, _| {
            session.lookup(&path)
        })
    }

    pub fn path_exists(&self, path: LogicalPath) -> OperationHandle<bool> {
        self.spawn("exists", SlotMode::Shared, move |session, _| {
            session.path_exists(&path)
        })
    }

    pub fn create_file(&self, path: LogicalPath) -> OperationHandle<FileNode> {
        self.spawn("create", SlotMode::Exclusive, move |session, _| {
            session.create_file(&path)
        })
    }

    pub fn make_dir(&self, path: LogicalPath) -> OperationHandle<FileNode> {
        self.spawn("mkdir", SlotMode::Exclusive, move |session, _| {
            session.make_dir(&path)
        })
    }

    pub fn delete(&self, path: LogicalPath, recursive: bool) -> OperationHandle<DeleteStats> {
        self.spawn("delete", SlotMode::Exclusive, move |session, progress| {
            session.delete(&path, recursive, progress)
        })
    }

    pub fn move_path(&self, src: LogicalPath, dst: LogicalPath) -> OperationHandle<FileNode> {
        self.spawn("move", SlotMode::Exclusive, move |session, progress| {
            session.move_path(&src, &dst, progress)
        })
    }

    pub fn copy_path(&self, src: LogicalPath, dst: LogicalPath) -> OperationHandle<TransferStats> {
        self.spawn("copy", SlotMode::Exclusive, move |session, progress| {
            session.copy_path(&src, &dst, progress)
        })
    }

    pub fn rename(&self, node: FileNode, new_name: String) -> OperationHandle<FileNode> {
        self.spawn("rename", SlotMode::Exclusive, move |session, progress| {
            session.rename(&node, &new_name, progress)
        })
    }

    /// Take the clipboard's entry now and paste it on a worker.
    ///
    /// The clipboard is empty when this returns, even if the paste later fails.
    pub fn paste(
        &self,
        clipboard: &mut Clipboard,
        target_dir: FileNode,
    ) -> Result<OperationHandle<PasteOutcome>, VolumeError> {
        let entry = clipboard.take().ok_or(VolumeError::ClipboardEmpty)?;
        Ok(self.spawn("paste", SlotMode::Exclusive, move |session, progress| {
            session.paste_entry(entry, &target_dir, progress)
        }))
    }

    pub fn import(&self, local: PathBuf, dst: LogicalPath) -> OperationHandle<TransferStats> {
        self.spawn("import", SlotMode::Exclusive, move |session, progress| {
            session.import(&local, &dst, progress)
        })
    }

    pub fn export(&self, src: LogicalPath, local: PathBuf) -> OperationHandle<TransferStats> {
        self.spawn("export", SlotMode::Exclusive, move |session, progress| {
            session.export(&src, &local, progress)
        })
    }

    pub fn sync_file(&self, local: PathBuf, dst: LogicalPath) -> OperationHandle<u64> {
        self.spawn("sync", SlotMode::Exclusive, move |session, progress| {
            session.sync_file(&local, &dst, progress)
        })
    }
}
