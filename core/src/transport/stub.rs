//! Scripted in-memory transport for tests and offline use.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use super::{CertPinning, Transport};
use crate::error::GatewayError;
use crate::http::{HttpMethod, HttpResponse};
use crate::request::RequestDescriptor;

#[derive(Debug, Clone)]
enum Reply {
    Respond(HttpResponse),
    Fail(String),
    Panic(String),
}

/// One call seen by a [`StubTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<String>,
    pub cert_pinning: bool,
}

/// Shared view of the calls a [`StubTransport`] has executed, in order.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<RecordedCall>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.0.lock().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.0.lock().iter().map(|c| c.url.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Answers from a queue of scripted replies, then repeats a fallback reply.
#[derive(Debug)]
pub struct StubTransport {
    scripted: VecDeque<Reply>,
    fallback: Reply,
    delay: Option<Duration>,
    cert_pinning: bool,
    log: CallLog,
}

impl StubTransport {
    /// Every call succeeds with status 200 and `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::with_fallback(Reply::Respond(HttpResponse::new(200, body)))
    }

    /// Every call fails with a connection error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_fallback(Reply::Fail(message.into()))
    }

    fn with_fallback(fallback: Reply) -> Self {
        Self {
            scripted: VecDeque::new(),
            fallback,
            delay: None,
            cert_pinning: false,
            log: CallLog::default(),
        }
    }

    /// Answer the next unscripted call with `response`.
    pub fn then_respond(mut self, response: HttpResponse) -> Self {
        self.scripted.push_back(Reply::Respond(response));
        self
    }

    /// Fail the next unscripted call with a connection error.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.scripted.push_back(Reply::Fail(message.into()));
        self
    }

    /// Panic inside the next unscripted call.
    pub fn then_panic(mut self, message: impl Into<String>) -> Self {
        self.scripted.push_back(Reply::Panic(message.into()));
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }
}

impl Transport for StubTransport {
    fn execute_request(&mut self, request: &RequestDescriptor) -> Result<HttpResponse, GatewayError> {
        self.log.0.lock().push(RecordedCall {
            method: request.method(),
            url: request.url().to_string(),
            body: request.body().map(str::to_string),
            cert_pinning: self.cert_pinning,
        });
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let reply = self.scripted.pop_front().unwrap_or_else(|| self.fallback.clone());
        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::Fail(message) => Err(GatewayError::Connection(message)),
            Reply::Panic(message) => panic!("{message}"),
        }
    }

    fn cert_pinning(&mut self) -> Option<&mut dyn CertPinning> {
        Some(self)
    }
}

impl CertPinning for StubTransport {
    fn set_cert_pinning(&mut self, enabled: bool) {
        self.cert_pinning = enabled;
    }

    fn cert_pinning_enabled(&self) -> bool {
        self.cert_pinning
    }
}
