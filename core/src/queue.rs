//! Request queue: FIFO work list drained by one dedicated worker thread.
//!
//! # Design
//! All mutable state (pending descriptors, lifecycle, worker handle) sits
//! behind a single mutex, so enqueue, start and shutdown are each one
//! critical section. `start` checks and transitions under that lock, which
//! is what keeps racing producers from spawning two workers.
//!
//! The worker blocks on a condition variable when the queue is empty and
//! only exits on shutdown. It runs one descriptor at a time, so requests
//! start and complete in enqueue order. A failing or panicking request is
//! reported through the async bridge and the loop carries on.
//!
//! A request that failed before it could be described (a bad URL, say)
//! still goes through the queue as a failed job, so its callback runs on
//! the worker in FIFO order like every other outcome.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::bridge::{self, panic_message, Callback};
use crate::error::GatewayError;
use crate::gateway;
use crate::request::RequestDescriptor;

/// Lifecycle of a [`RequestQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Accepting work; no worker yet.
    Idle,
    /// Worker running.
    Running,
    /// Shut down for good.
    ShutDown,
}

/// Returned by [`RequestQueue::add`] after shutdown. Carries the rejected
/// descriptor back so its callback can still be notified.
#[derive(Debug, Error)]
#[error("request queue has been shut down")]
pub struct Rejected {
    descriptor: RequestDescriptor,
}

impl Rejected {
    pub fn into_descriptor(self) -> RequestDescriptor {
        self.descriptor
    }
}

enum Job {
    Request(RequestDescriptor),
    Failed {
        callback: Box<dyn Callback>,
        error: GatewayError,
    },
}

impl Job {
    /// Deliver `error` without running the job. A failed job keeps its own
    /// error.
    fn abandon(self, error: GatewayError) {
        match self {
            Job::Request(descriptor) => {
                warn!(id = %descriptor.id(), %error, "dropping queued request");
                bridge::complete(descriptor, Err(error));
            }
            Job::Failed { callback, error: own } => {
                bridge::deliver(callback, Err(own));
            }
        }
    }
}

struct QueueState {
    pending: VecDeque<Job>,
    lifecycle: Lifecycle,
    worker: Option<JoinHandle<()>>,
    workers_spawned: usize,
}

struct QueueShared {
    name: String,
    state: Mutex<QueueState>,
    available: Condvar,
}

/// Cloneable handle to a request queue. Clones share the same queue.
#[derive(Clone)]
pub struct RequestQueue {
    shared: Arc<QueueShared>,
}

impl RequestQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                name: name.into(),
                state: Mutex::new(QueueState {
                    pending: VecDeque::new(),
                    lifecycle: Lifecycle::Idle,
                    worker: None,
                    workers_spawned: 0,
                }),
                available: Condvar::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Append to the tail. Never blocks on depth; fails only after shutdown.
    pub fn add(&self, descriptor: RequestDescriptor) -> Result<(), Rejected> {
        let mut state = self.shared.state.lock();
        if state.lifecycle == Lifecycle::ShutDown {
            return Err(Rejected { descriptor });
        }
        debug!(queue = %self.shared.name, id = %descriptor.id(), depth = state.pending.len() + 1, "request enqueued");
        state.pending.push_back(Job::Request(descriptor));
        drop(state);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Queue an outcome that is already known to be a failure. The worker
    /// hands `error` to `callback` when the job reaches the head of the
    /// queue. After shutdown both are handed back.
    pub(crate) fn add_failed(
        &self,
        callback: Box<dyn Callback>,
        error: GatewayError,
    ) -> Result<(), (Box<dyn Callback>, GatewayError)> {
        let mut state = self.shared.state.lock();
        if state.lifecycle == Lifecycle::ShutDown {
            return Err((callback, error));
        }
        debug!(queue = %self.shared.name, %error, "failed request enqueued");
        state.pending.push_back(Job::Failed { callback, error });
        drop(state);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Start the worker if it is not running. Returns `true` if this call
    /// spawned it.
    ///
    /// If the worker thread cannot be spawned, every pending job fails with
    /// [`GatewayError::WorkerSpawn`] and the queue stays idle, so a later
    /// `start` may try again.
    pub fn start(&self) -> Result<bool, GatewayError> {
        let mut state = self.shared.state.lock();
        let lifecycle = state.lifecycle;
        match lifecycle {
            Lifecycle::Running => Ok(false),
            Lifecycle::ShutDown => Err(GatewayError::QueueShutdown),
            Lifecycle::Idle => {
                let shared = Arc::clone(&self.shared);
                let spawned = thread::Builder::new()
                    .name(format!("request-queue-{}", self.shared.name))
                    .spawn(move || run_worker(shared));
                let handle = match spawned {
                    Ok(handle) => handle,
                    Err(cause) => {
                        drop(state);
                        self.fail_pending(&cause);
                        return Err(GatewayError::WorkerSpawn(cause));
                    }
                };
                state.worker = Some(handle);
                state.lifecycle = Lifecycle::Running;
                state.workers_spawned += 1;
                info!(queue = %self.shared.name, "request queue worker started");
                Ok(true)
            }
        }
    }

    /// Stop the queue. The in-flight request finishes; every request still
    /// pending fails with `QueueShutdown`; later `add` calls are rejected.
    /// Joins the worker unless called from the worker itself.
    pub fn shutdown(&self) {
        let (drained, worker) = {
            let mut state = self.shared.state.lock();
            if state.lifecycle == Lifecycle::ShutDown {
                return;
            }
            state.lifecycle = Lifecycle::ShutDown;
            (std::mem::take(&mut state.pending), state.worker.take())
        };
        self.shared.available.notify_all();
        info!(queue = %self.shared.name, drained = drained.len(), "request queue shutting down");

        for job in drained {
            job.abandon(GatewayError::QueueShutdown);
        }

        if let Some(handle) = worker {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(queue = %self.shared.name, "request queue worker exited by panic");
            }
        }
    }

    /// Fail every pending job because no worker could be started for it.
    fn fail_pending(&self, cause: &io::Error) -> usize {
        let drained = std::mem::take(&mut self.shared.state.lock().pending);
        error!(queue = %self.shared.name, %cause, failed = drained.len(), "could not spawn request queue worker");
        let count = drained.len();
        for job in drained {
            job.abandon(GatewayError::WorkerSpawn(io::Error::new(cause.kind(), cause.to_string())));
        }
        count
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state.lock().lifecycle
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Running
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifecycle() == Lifecycle::ShutDown
    }

    /// Requests waiting to start. The one in flight is not counted.
    pub fn len(&self) -> usize {
        self.shared.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// How many worker threads this queue has ever spawned (0 or 1).
    pub fn workers_spawned(&self) -> usize {
        self.shared.state.lock().workers_spawned
    }

    pub fn ptr_eq(&self, other: &RequestQueue) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("RequestQueue")
            .field("name", &self.shared.name)
            .field("lifecycle", &state.lifecycle)
            .field("pending", &state.pending.len())
            .finish()
    }
}

fn run_worker(shared: Arc<QueueShared>) {
    loop {
        let job = {
            let mut state = shared.state.lock();
            loop {
                if state.lifecycle == Lifecycle::ShutDown {
                    info!(queue = %shared.name, "request queue worker stopped");
                    return;
                }
                if let Some(job) = state.pending.pop_front() {
                    break job;
                }
                shared.available.wait(&mut state);
            }
        };
        match job {
            Job::Request(descriptor) => process(descriptor),
            Job::Failed { callback, error } => {
                debug!(%error, "delivering request that failed before enqueue");
                bridge::deliver(callback, Err(error));
            }
        }
    }
}

fn process(descriptor: RequestDescriptor) {
    let span = info_span!(
        "request",
        id = %descriptor.id(),
        method = %descriptor.method(),
        url = %descriptor.url()
    );
    let _entered = span.enter();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| gateway::execute_queued(&descriptor)))
        .unwrap_or_else(|payload| {
            Err(GatewayError::connection(format!(
                "transport panicked: {}",
                panic_message(&*payload)
            )))
        });
    match &outcome {
        Ok(response) => debug!(status = response.status, "queued request completed"),
        Err(error) => warn!(%error, "queued request failed"),
    }
    bridge::complete(descriptor, outcome);
}
