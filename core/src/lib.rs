//! Client-side request execution for a remote HTTP API.
//!
//! # Overview
//! A [`Gateway`] holds the configuration for one endpoint (base URL, default
//! method, body, pinning flag) and dispatches requests either synchronously
//! on the caller's thread or asynchronously through a [`RequestQueue`],
//! whose single worker thread runs queued requests in order and reports each
//! outcome to a [`Callback`].
//!
//! # Design
//! - Network I/O is behind the [`Transport`] trait; [`UreqTransport`] is the
//!   default and [`StubTransport`] is a scripted stand-in.
//! - A callback argument is the only switch into async mode.
//! - Queues are injected; gateways without one share the process-wide queue
//!   from [`registry`], stopped with [`registry::shutdown_services`].
//! - Sync calls return `Result`; async failures always reach the callback,
//!   exactly once, on the worker thread.

pub mod bridge;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod object;
pub mod parser;
pub mod queue;
pub mod registry;
pub mod request;
pub mod transport;
pub mod urls;

pub use bridge::{Callback, PendingResponse};
pub use config::{GatewayBuilder, GatewayConfig};
pub use error::GatewayError;
pub use gateway::Gateway;
pub use http::{HttpMethod, HttpResponse};
pub use object::{PropertyBag, Record};
pub use parser::{Decoded, JsonParser, Parser};
pub use queue::{Lifecycle, Rejected, RequestQueue};
pub use request::{RequestDescriptor, RequestHandle};
pub use transport::{CertPinning, SharedTransport, StubTransport, Transport, UreqTransport};
