//! Error type for the gateway core.
//!
//! # Design
//! One enum covers every failure a caller can observe, whether it comes back
//! from a synchronous call or arrives through a callback. The first four
//! variants are the request-level kinds (configuration, connection,
//! unsupported operation, decode); the rest describe the queue and
//! request lifecycle.

use thiserror::Error;

/// Errors returned by [`Gateway`](crate::Gateway) operations and delivered
/// to async callbacks.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A URL could not be joined, normalized or resolved, or the gateway
    /// configuration is incomplete.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The transport failed: unreachable host, TLS or pinning rejection,
    /// timeout, or a protocol error.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The requested decode shape is not supported (a list-shaped body into
    /// a single object, or any decode into a list target).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The response body could not be decoded by the parser.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request queue was shut down before the request could run.
    #[error("request queue has been shut down")]
    QueueShutdown,

    /// The request was cancelled through its handle before it started.
    #[error("request was cancelled")]
    Cancelled,

    /// The request deadline passed before the request could start.
    #[error("request deadline elapsed")]
    DeadlineExceeded,

    /// The gateway that queued the request was dropped before it ran.
    #[error("originating gateway was dropped before the request ran")]
    GatewayDropped,

    /// The operating system refused to start the queue worker thread.
    #[error("failed to spawn request queue worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// The outcome channel of a pending response closed without a value.
    #[error("request outcome was lost")]
    OutcomeLost,
}

impl GatewayError {
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        GatewayError::Configuration(msg.into())
    }

    pub(crate) fn connection(msg: impl Into<String>) -> Self {
        GatewayError::Connection(msg.into())
    }
}
