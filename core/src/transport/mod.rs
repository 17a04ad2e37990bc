//! Transport capability.
//!
//! # Design
//! The gateway never opens sockets itself: a [`Transport`] turns a
//! [`RequestDescriptor`] into an [`HttpResponse`]. Transports are stateful
//! and not assumed to be thread-safe, so a gateway keeps its transport in a
//! [`SharedTransport`] and every call, whether from a synchronous caller or
//! the queue worker, goes through that one lock.
//!
//! Certificate pinning is an optional capability. A transport that supports
//! it returns itself from [`Transport::cert_pinning`]; the gateway pushes
//! its flag through that hook before each call and otherwise leaves the
//! transport alone.

mod stub;
mod ureq_transport;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::GatewayError;
use crate::http::HttpResponse;
use crate::request::RequestDescriptor;

pub use stub::{CallLog, RecordedCall, StubTransport};
pub use ureq_transport::UreqTransport;

/// Performs the network I/O for one request.
pub trait Transport: Send {
    /// Execute `request` and return the response. Network, TLS and
    /// protocol failures are `GatewayError::Connection`.
    fn execute_request(&mut self, request: &RequestDescriptor) -> Result<HttpResponse, GatewayError>;

    /// The pinning capability, if this transport has one.
    fn cert_pinning(&mut self) -> Option<&mut dyn CertPinning> {
        None
    }
}

/// Optional capability: restrict trust to pinned certificates.
pub trait CertPinning {
    fn set_cert_pinning(&mut self, enabled: bool);
    fn cert_pinning_enabled(&self) -> bool;
}

/// A transport shared between a gateway's synchronous callers and the
/// queue worker.
pub type SharedTransport = Arc<Mutex<Box<dyn Transport>>>;

pub fn share(transport: impl Transport + 'static) -> SharedTransport {
    Arc::new(Mutex::new(Box::new(transport)))
}
