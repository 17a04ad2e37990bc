//! Default transport backed by `ureq`.
//!
//! A fresh agent is configured per call so the timeout derived from the
//! request deadline and the current pinning state always apply. 4xx/5xx
//! responses come back as data; only transport-level failures are errors.

use std::time::Duration;

use tracing::debug;
use ureq::tls::{Certificate, RootCerts, TlsConfig};
use ureq::Agent;

use super::{CertPinning, Transport};
use crate::error::GatewayError;
use crate::http::{HttpMethod, HttpResponse};
use crate::request::RequestDescriptor;

#[derive(Default)]
pub struct UreqTransport {
    cert_pinning: bool,
    pinned_roots: Vec<Certificate<'static>>,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add PEM-encoded root certificates to trust when pinning is enabled.
    pub fn with_pinned_roots_pem(mut self, pem: &[u8]) -> Result<Self, GatewayError> {
        let cert = Certificate::from_pem(pem)
            .map_err(|e| GatewayError::configuration(format!("invalid pinned certificate: {e}")))?;
        self.pinned_roots.push(cert);
        Ok(self)
    }

    pub fn pinned_root_count(&self) -> usize {
        self.pinned_roots.len()
    }

    fn agent(&self, timeout: Option<Duration>) -> Result<Agent, GatewayError> {
        let mut config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout);
        if self.cert_pinning {
            // Pinning with nothing pinned would silently fall back to the
            // platform roots.
            if self.pinned_roots.is_empty() {
                return Err(GatewayError::configuration(
                    "certificate pinning is enabled but no pinned roots are configured",
                ));
            }
            let tls = TlsConfig::builder()
                .root_certs(RootCerts::new_with_certs(&self.pinned_roots))
                .build();
            config = config.tls_config(tls);
        }
        Ok(config.build().new_agent())
    }
}

impl Transport for UreqTransport {
    fn execute_request(&mut self, request: &RequestDescriptor) -> Result<HttpResponse, GatewayError> {
        if request.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        let timeout = request.remaining();
        if timeout == Some(Duration::ZERO) {
            return Err(GatewayError::DeadlineExceeded);
        }
        let agent = self.agent(timeout)?;
        let url = request.url().as_str();
        debug!(method = %request.method(), url, "executing request");

        let result = match (request.method(), request.body()) {
            (HttpMethod::Get, _) => agent.get(url).call(),
            (HttpMethod::Delete, _) => agent.delete(url).call(),
            (HttpMethod::Post, Some(body)) => {
                agent.post(url).content_type("application/json").send(body.as_bytes())
            }
            (HttpMethod::Post, None) => agent.post(url).send_empty(),
            (HttpMethod::Put, Some(body)) => {
                agent.put(url).content_type("application/json").send(body.as_bytes())
            }
            (HttpMethod::Put, None) => agent.put(url).send_empty(),
        };
        let mut response = result.map_err(|e| GatewayError::connection(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| GatewayError::connection(format!("failed to read response body: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn cert_pinning(&mut self) -> Option<&mut dyn CertPinning> {
        Some(self)
    }
}

impl CertPinning for UreqTransport {
    fn set_cert_pinning(&mut self, enabled: bool) {
        self.cert_pinning = enabled;
    }

    fn cert_pinning_enabled(&self) -> bool {
        self.cert_pinning
    }
}
