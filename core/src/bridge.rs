//! Async bridge: turns a finished request into exactly one callback call.
//!
//! # Design
//! `Callback` methods consume `Box<Self>`, so a callback can be invoked once
//! and only once by construction. Any `FnOnce(Result<..>)` closure is a
//! callback. [`PendingResponse`] is the future-shaped alternative: its
//! callback half sends the outcome over a oneshot channel.
//!
//! Delivery runs under `catch_unwind`; a panicking callback is logged and
//! swallowed so the queue worker moves on to the next request.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use tracing::{debug, error};

use crate::error::GatewayError;
use crate::http::HttpResponse;
use crate::request::{RequestDescriptor, RequestHandle};

/// Receiver of a single async request outcome.
pub trait Callback: Send + 'static {
    fn on_success(self: Box<Self>, response: HttpResponse);
    fn on_failure(self: Box<Self>, error: GatewayError);
}

impl<F> Callback for F
where
    F: FnOnce(Result<HttpResponse, GatewayError>) + Send + 'static,
{
    fn on_success(self: Box<Self>, response: HttpResponse) {
        (*self)(Ok(response))
    }

    fn on_failure(self: Box<Self>, error: GatewayError) {
        (*self)(Err(error))
    }
}

/// Hand `outcome` to `callback`. Returns `false` if the callback panicked.
pub fn deliver(callback: Box<dyn Callback>, outcome: Result<HttpResponse, GatewayError>) -> bool {
    let result = panic::catch_unwind(AssertUnwindSafe(move || match outcome {
        Ok(response) => callback.on_success(response),
        Err(error) => callback.on_failure(error),
    }));
    match result {
        Ok(()) => true,
        Err(payload) => {
            error!(panic = %panic_message(&*payload), "callback panicked while receiving request outcome");
            false
        }
    }
}

/// Deliver the outcome of `descriptor` to its callback, if it has one.
pub(crate) fn complete(mut descriptor: RequestDescriptor, outcome: Result<HttpResponse, GatewayError>) {
    match descriptor.take_callback() {
        Some(callback) => {
            deliver(callback, outcome);
        }
        None => debug!(id = %descriptor.id(), "descriptor finished without a callback"),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

type Outcome = Result<HttpResponse, GatewayError>;

/// Callback half of a [`PendingResponse`].
pub(crate) fn outcome_channel() -> (Box<dyn Callback>, oneshot::Receiver<Outcome>) {
    let (tx, rx) = oneshot::channel();
    let callback = move |outcome: Outcome| {
        if tx.send(outcome).is_err() {
            debug!("pending response dropped before its outcome arrived");
        }
    };
    (Box::new(callback), rx)
}

/// A queued request whose outcome can be awaited or waited on.
#[derive(Debug)]
pub struct PendingResponse {
    handle: RequestHandle,
    receiver: oneshot::Receiver<Outcome>,
}

impl PendingResponse {
    pub(crate) fn new(handle: RequestHandle, receiver: oneshot::Receiver<Outcome>) -> Self {
        Self { handle, receiver }
    }

    pub fn handle(&self) -> &RequestHandle {
        &self.handle
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Block the current thread until the outcome arrives.
    pub fn wait(self) -> Outcome {
        futures::executor::block_on(self)
    }
}

impl Future for PendingResponse {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(GatewayError::OutcomeLost)))
    }
}
