//! Thread-affine executor
//!
//! Marshals work from any thread onto one owner thread. Work is sent over an
//! unbounded channel; the owner thread calls `drain` once per tick of its
//! own loop, and the executor never schedules itself.
//!
//! ## Draining
//!
//! ```text
//!  any thread                      owner thread, once per tick
//! ┌──────────────┐   WorkItem    ┌──────────────────────────────┐
//! │ExecutorHandle│ ────────────> │ drain():                     │
//! │  enqueue()   │   channel     │   run items queued at start  │
//! └──────────────┘               │   run re-entrant items       │
//!        ▲                       │   resume suspended sequences │
//!        │                       └──────────────────────────────┘
//!        └────── items may enqueue more work; it runs this pass
//! ```
//!
//! A drain runs the items queued when it starts. Items enqueued on the owner
//! thread while it is draining (typically by an item being run) join the
//! same pass and execute before `drain` returns. Items other threads enqueue
//! mid-drain wait for the next drain, so a busy producer cannot stall the
//! owner's tick. A sequence that yields resumes on the next drain, after
//! that drain's items have run.
//!
//! ## Instance
//!
//! `ThreadAffineExecutor::install` registers the first installed executor as
//! the process-wide instance that `ExecutorHandle::instance()` returns.
//! Dropping that executor clears the instance.

pub mod completion;
pub mod work;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

pub use completion::Completion;
pub use work::{Sequence, Stages, Step, WorkItem};

use crate::error::{panic_message, ExecutorError};

const LOG_TARGET: &str = "catalog_dispatch::executor";

static INSTANCE: RwLock<Option<ExecutorHandle>> = parking_lot::const_rwlock(None);

/// Sending side of an executor; cheap to clone and usable from any thread
#[derive(Clone, Debug)]
pub struct ExecutorHandle {
    sender: Sender<WorkItem>,
    shared: Arc<DrainState>,
}

/// State shared between an executor and its handles
#[derive(Debug)]
struct DrainState {
    owner: ThreadId,
    draining: AtomicBool,
    /// Items enqueued on the owner thread during the current drain
    reentrant: Mutex<VecDeque<WorkItem>>,
}

impl DrainState {
    fn routes_reentrant(&self) -> bool {
        self.draining.load(Ordering::Acquire) && thread::current().id() == self.owner
    }
}

/// Clears the draining flag even when an item panics
struct DrainingFlag(Arc<DrainState>);

impl DrainingFlag {
    fn raise(state: &Arc<DrainState>) -> Self {
        state.draining.store(true, Ordering::Release);
        Self(Arc::clone(state))
    }
}

impl Drop for DrainingFlag {
    fn drop(&mut self) {
        self.0.draining.store(false, Ordering::Release);
    }
}

impl ExecutorHandle {
    /// The installed executor's handle
    ///
    /// Fails (and logs an error) when no executor has been installed: work
    /// cannot be queued without an owner thread.
    pub fn instance() -> Result<ExecutorHandle, ExecutorError> {
        match INSTANCE.read().as_ref() {
            Some(handle) => Ok(handle.clone()),
            None => {
                tracing::error!(target: LOG_TARGET, "No thread-affine executor instance");
                Err(ExecutorError::NotInitialized)
            }
        }
    }

    /// Whether an executor is currently installed
    pub fn exists() -> bool {
        INSTANCE.read().is_some()
    }

    /// Queue `work` to run on the owner thread during its next drain
    pub fn enqueue(&self, work: impl FnOnce() + Send + 'static) {
        self.enqueue_item(WorkItem::once(work));
    }

    /// Queue a resumable sequence; its first step runs on the next drain
    pub fn enqueue_sequence(&self, sequence: impl Sequence + 'static) {
        self.enqueue_item(WorkItem::sequence(sequence));
    }

    /// Queue `work` and get a handle to its outcome
    ///
    /// A panic inside `work` is captured into the completion instead of
    /// unwinding out of the owner thread's drain.
    pub fn enqueue_async<T, F>(&self, work: F) -> Completion<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (completer, completion) = Completion::pair();
        self.enqueue(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(work)).map_err(|payload| {
                let message = panic_message(payload.as_ref());
                tracing::warn!(target: LOG_TARGET, "Queued work panicked: {}", message);
                ExecutorError::WorkPanicked(message)
            });
            // the caller may have dropped the completion
            let _ = completer.send(outcome);
        });
        completion
    }

    pub fn enqueue_item(&self, item: WorkItem) {
        if self.shared.routes_reentrant() {
            self.shared.reentrant.lock().push_back(item);
            return;
        }
        if self.sender.send(item).is_err() {
            tracing::warn!(target: LOG_TARGET, "Executor is gone; work item dropped");
        }
    }

    /// Items queued and not yet run
    pub fn pending(&self) -> usize {
        self.sender.len() + self.shared.reentrant.lock().len()
    }
}

/// Counters for one `drain` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items run: those queued when the drain started plus the ones work on
    /// the owner thread enqueued during it
    pub items_run: usize,
    /// Sequences from earlier drains resumed in this pass
    pub sequences_resumed: usize,
    /// Sequences waiting for the next drain
    pub suspended: usize,
}

/// Receiving side, owned by and drained on a single thread
pub struct ThreadAffineExecutor {
    receiver: Receiver<WorkItem>,
    handle: ExecutorHandle,
    suspended: VecDeque<Box<dyn Sequence>>,
    installed: bool,
}

impl ThreadAffineExecutor {
    /// Create an executor owned by the calling thread
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        let shared = Arc::new(DrainState {
            owner: thread::current().id(),
            draining: AtomicBool::new(false),
            reentrant: Mutex::new(VecDeque::new()),
        });
        Self {
            receiver,
            handle: ExecutorHandle { sender, shared },
            suspended: VecDeque::new(),
            installed: false,
        }
    }

    /// Create an executor on the calling thread and make it the instance if
    /// none is installed yet
    pub fn install() -> Self {
        let mut executor = Self::new();
        let mut instance = INSTANCE.write();
        if instance.is_none() {
            *instance = Some(executor.handle.clone());
            executor.installed = true;
            tracing::info!(
                target: LOG_TARGET,
                "Thread-affine executor installed on {:?}",
                executor.owner()
            );
        } else {
            tracing::warn!(
                target: LOG_TARGET,
                "An executor is already installed; this one will not be the instance"
            );
        }
        drop(instance);
        executor
    }

    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    pub fn owner(&self) -> ThreadId {
        self.handle.shared.owner
    }

    /// Whether this executor is the process-wide instance
    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn suspended(&self) -> usize {
        self.suspended.len()
    }

    /// Run the work queued so far, then resume sequences suspended by
    /// earlier drains. Must be called on the owner thread.
    ///
    /// Work the owner thread enqueues during the pass runs in the same pass;
    /// work other threads enqueue meanwhile waits for the next drain.
    /// A panic from a plain work item unwinds to the caller; items still
    /// queued stay queued for the next drain.
    pub fn drain(&mut self) -> Result<DrainReport, ExecutorError> {
        if thread::current().id() != self.owner() {
            tracing::error!(target: LOG_TARGET, "drain called off the owner thread");
            return Err(ExecutorError::NotOwnerThread);
        }

        let mut report = DrainReport::default();
        let due = self.suspended.len();
        let queued = self.receiver.len();
        let shared = Arc::clone(&self.handle.shared);
        let flag = DrainingFlag::raise(&shared);

        for _ in 0..queued {
            let Ok(item) = self.receiver.try_recv() else {
                break;
            };
            self.run(item, &mut report);
        }
        loop {
            let next = shared.reentrant.lock().pop_front();
            let Some(item) = next else {
                break;
            };
            self.run(item, &mut report);
        }
        drop(flag);

        for _ in 0..due {
            let Some(mut sequence) = self.suspended.pop_front() else {
                break;
            };
            report.sequences_resumed += 1;
            if sequence.resume() == Step::Yield {
                self.suspended.push_back(sequence);
            }
        }

        report.suspended = self.suspended.len();
        if report.items_run > 0 || report.sequences_resumed > 0 {
            tracing::trace!(
                target: LOG_TARGET,
                items = report.items_run,
                resumed = report.sequences_resumed,
                suspended = report.suspended,
                "drain"
            );
        }
        Ok(report)
    }

    fn run(&mut self, item: WorkItem, report: &mut DrainReport) {
        report.items_run += 1;
        match item {
            WorkItem::Once(work) => work(),
            WorkItem::Sequence(mut sequence) => {
                if sequence.resume() == Step::Yield {
                    self.suspended.push_back(sequence);
                }
            }
        }
    }
}

impl Default for ThreadAffineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadAffineExecutor {
    fn drop(&mut self) {
        self.handle.shared.reentrant.lock().clear();
        if self.installed {
            *INSTANCE.write() = None;
            tracing::info!(target: LOG_TARGET, "Thread-affine executor uninstalled");
        }
    }
}

impl std::fmt::Debug for ThreadAffineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadAffineExecutor")
            .field("owner", &self.owner())
            .field("pending", &self.receiver.len())
            .field("suspended", &self.suspended.len())
            .field("installed", &self.installed)
            .finish()
    }
}
