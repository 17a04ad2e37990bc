//! Process-wide default request queue.
//!
//! Gateways that are not given their own queue share this one, so at most
//! one async request is in flight across all of them. The queue is created
//! on first use. [`shutdown_services`] stops and discards it; the next
//! [`shared_queue`] call creates a fresh one.

use parking_lot::{const_mutex, Mutex};
use tracing::info;

use crate::queue::RequestQueue;

static SHARED_QUEUE: Mutex<Option<RequestQueue>> = const_mutex(None);

pub fn shared_queue() -> RequestQueue {
    SHARED_QUEUE
        .lock()
        .get_or_insert_with(|| RequestQueue::new("shared"))
        .clone()
}

/// Stop the shared queue's worker. Call once at process teardown.
pub fn shutdown_services() {
    let queue = SHARED_QUEUE.lock().take();
    if let Some(queue) = queue {
        info!("shutting down shared request queue");
        queue.shutdown();
    }
}
