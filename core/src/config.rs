//! Gateway configuration and the fluent builder.
//!
//! `GatewayConfig` is plain data and can be loaded from JSON. Validation
//! happens once, in [`Gateway::new`]; the builder funnels into it.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::GatewayError;
use crate::gateway::Gateway;
use crate::http::HttpMethod;
use crate::parser::Parser;
use crate::queue::RequestQueue;
use crate::transport::{self, SharedTransport, Transport};

/// Endpoint configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub base_url: Option<String>,
    pub method: Option<HttpMethod>,
    pub use_cert_pinning: bool,
    /// Payload sent with POST requests.
    pub body: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl GatewayConfig {
    pub fn from_json(raw: &str) -> Result<Self, GatewayError> {
        serde_json::from_str(raw)
            .map_err(|e| GatewayError::configuration(format!("invalid gateway config: {e}")))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Fluent construction of a [`Gateway`].
#[derive(Default)]
pub struct GatewayBuilder {
    config: GatewayConfig,
    transport: Option<SharedTransport>,
    parser: Option<Arc<dyn Parser>>,
    queue: Option<RequestQueue>,
}

impl GatewayBuilder {
    /// Start from an existing configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.config.method = Some(method);
        self
    }

    pub fn use_cert_pinning(mut self, enabled: bool) -> Self {
        self.config.use_cert_pinning = enabled;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.config.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = Some(timeout.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(transport::share(transport));
        self
    }

    /// Use a transport that other gateways may also hold.
    pub fn shared_transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn parser(mut self, parser: impl Parser + 'static) -> Self {
        self.parser = Some(Arc::new(parser));
        self
    }

    /// Send async requests to `queue` instead of the shared queue.
    pub fn queue(mut self, queue: RequestQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn build(self) -> Result<Gateway, GatewayError> {
        Gateway::from_parts(self.config, self.transport, self.parser, self.queue)
    }
}
