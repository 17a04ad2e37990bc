//! Request descriptors and the handles callers keep for them.
//!
//! # Design
//! A `RequestDescriptor` is built once, either for an immediate synchronous
//! call or to sit in a [`RequestQueue`](crate::RequestQueue). Its fields are
//! private and exposed read-only; the only consuming operation is taking the
//! callback out when the outcome is delivered. The originating gateway is
//! held weakly: the descriptor reads the gateway's transport and pinning
//! flag at execution time but never keeps the gateway alive.

use std::fmt;
use std::sync::Weak;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::bridge::Callback;
use crate::gateway::GatewayShared;
use crate::http::HttpMethod;

/// One request: method, resolved URL, optional body and, in async mode,
/// the callback that receives its outcome.
pub struct RequestDescriptor {
    id: Uuid,
    method: HttpMethod,
    url: Url,
    body: Option<String>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
    callback: Option<Box<dyn Callback>>,
    origin: Weak<GatewayShared>,
}

impl RequestDescriptor {
    /// The body is kept only when `method` carries a payload.
    pub(crate) fn new(
        method: HttpMethod,
        url: Url,
        body: Option<String>,
        timeout: Option<Duration>,
        origin: Weak<GatewayShared>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            url,
            body: body.filter(|_| method.carries_body()),
            deadline: timeout.map(|t| Instant::now() + t),
            cancel: CancellationToken::new(),
            callback: None,
            origin,
        }
    }

    pub(crate) fn with_callback(mut self, callback: Box<dyn Callback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Absolute URL, already resolved against the gateway base.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` means no deadline; a zero
    /// duration means it has already passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_async(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn handle(&self) -> RequestHandle {
        RequestHandle {
            id: self.id,
            cancel: self.cancel.clone(),
        }
    }

    pub(crate) fn origin(&self) -> &Weak<GatewayShared> {
        &self.origin
    }

    pub(crate) fn take_callback(&mut self) -> Option<Box<dyn Callback>> {
        self.callback.take()
    }
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("body", &self.body)
            .field("deadline", &self.deadline)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("async", &self.callback.is_some())
            .finish()
    }
}

/// Returned by async entry points. Identifies the queued request and lets
/// the caller cancel it before the worker starts it.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: Uuid,
    cancel: CancellationToken,
}

impl RequestHandle {
    /// Handle for a request that failed before it could be queued.
    pub(crate) fn detached() -> Self {
        Self {
            id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cancel the request. A request already handed to the transport runs
    /// to completion; one still queued fails with `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
