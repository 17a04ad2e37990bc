//! Gateway facade: per-endpoint configuration plus the sync and async entry
//! points.
//!
//! # Design
//! The presence of a callback is the only thing that selects async mode.
//! Synchronous forms run the transport on the caller's thread and return a
//! `Result`. Async forms build a [`RequestDescriptor`], push it onto the
//! gateway's [`RequestQueue`], make sure the worker is running, and return a
//! [`RequestHandle`] at once; every failure, including a bad URL, reaches
//! the callback on the worker thread instead. The one exception is a queue
//! that has already been shut down: with no worker left, the callback runs
//! on the caller's thread before the entry point returns.
//!
//! Configuration lives in `GatewayShared` behind a lock and is reachable
//! from queued descriptors through a weak reference, so a setter called
//! after enqueue is seen by the worker when the request runs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};
use url::Url;

use crate::bridge::{self, outcome_channel, Callback, PendingResponse};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::{HttpMethod, HttpResponse};
use crate::object::{self, PropertyBag, Record};
use crate::parser::{JsonParser, Parser};
use crate::queue::RequestQueue;
use crate::registry;
use crate::request::{RequestDescriptor, RequestHandle};
use crate::transport::{self, SharedTransport, UreqTransport};
use crate::urls;

struct Settings {
    base_url: String,
    method: HttpMethod,
    body: Option<String>,
    use_cert_pinning: bool,
    timeout: Option<Duration>,
}

/// Gateway state that queued descriptors read at execution time.
pub(crate) struct GatewayShared {
    settings: RwLock<Settings>,
    transport: Mutex<Option<SharedTransport>>,
    parser: RwLock<Arc<dyn Parser>>,
    last_response: Mutex<Option<HttpResponse>>,
}

impl GatewayShared {
    fn transport(&self) -> SharedTransport {
        self.transport
            .lock()
            .get_or_insert_with(|| transport::share(UreqTransport::new()))
            .clone()
    }

    fn descriptor(
        this: &Arc<Self>,
        target: Option<&str>,
        method: Option<HttpMethod>,
    ) -> Result<RequestDescriptor, GatewayError> {
        let settings = this.settings.read();
        let url = urls::resolve(&settings.base_url, target.unwrap_or(""))?;
        Ok(RequestDescriptor::new(
            method.unwrap_or(settings.method),
            url,
            settings.body.clone(),
            settings.timeout,
            Arc::downgrade(this),
        ))
    }

    /// Push the pinning flag, then run the transport under its lock.
    fn perform(&self, descriptor: &RequestDescriptor) -> Result<HttpResponse, GatewayError> {
        let pinning = self.settings.read().use_cert_pinning;
        let transport = self.transport();
        let outcome = {
            let mut transport = transport.lock();
            if let Some(capability) = transport.cert_pinning() {
                capability.set_cert_pinning(pinning);
            }
            transport.execute_request(descriptor)
        };
        *self.last_response.lock() = outcome.as_ref().ok().cloned();
        outcome
    }
}

/// Run a queued descriptor against its originating gateway.
pub(crate) fn execute_queued(descriptor: &RequestDescriptor) -> Result<HttpResponse, GatewayError> {
    if descriptor.is_cancelled() {
        return Err(GatewayError::Cancelled);
    }
    if descriptor.remaining() == Some(Duration::ZERO) {
        return Err(GatewayError::DeadlineExceeded);
    }
    let origin = descriptor
        .origin()
        .upgrade()
        .ok_or(GatewayError::GatewayDropped)?;
    origin.perform(descriptor)
}

/// Client for one logical endpoint.
pub struct Gateway {
    shared: Arc<GatewayShared>,
    queue: Mutex<Option<RequestQueue>>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.shared.settings.read();
        f.debug_struct("Gateway")
            .field("url", &settings.base_url)
            .field("method", &settings.method)
            .field("use_cert_pinning", &settings.use_cert_pinning)
            .field("timeout", &settings.timeout)
            .finish_non_exhaustive()
    }
}

impl Gateway {
    pub fn builder() -> crate::config::GatewayBuilder {
        crate::config::GatewayBuilder::default()
    }

    /// Validating constructor. A missing, blank or unparseable base URL is
    /// a configuration error; a missing method defaults to GET.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        Self::from_parts(config, None, None, None)
    }

    pub(crate) fn from_parts(
        config: GatewayConfig,
        transport: Option<SharedTransport>,
        parser: Option<Arc<dyn Parser>>,
        queue: Option<RequestQueue>,
    ) -> Result<Self, GatewayError> {
        let timeout = config.timeout();
        let base_url = config
            .base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| GatewayError::configuration("gateway requires a base URL"))?;
        Url::parse(&base_url)
            .map_err(|e| GatewayError::configuration(format!("invalid base URL {base_url:?}: {e}")))?;

        Ok(Self {
            shared: Arc::new(GatewayShared {
                settings: RwLock::new(Settings {
                    base_url,
                    method: config.method.unwrap_or_default(),
                    body: config.body,
                    use_cert_pinning: config.use_cert_pinning,
                    timeout,
                }),
                transport: Mutex::new(transport),
                parser: RwLock::new(parser.unwrap_or_else(|| Arc::new(JsonParser))),
                last_response: Mutex::new(None),
            }),
            queue: Mutex::new(queue),
        })
    }

    pub fn url(&self) -> String {
        self.shared.settings.read().base_url.clone()
    }

    /// Replace the base URL outright.
    pub fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.shared.settings.write().base_url = url.trim_end_matches('/').to_string();
    }

    /// Join `path` onto the base URL and normalize. On failure the base URL
    /// is left exactly as it was.
    pub fn set_relative_url(&self, path: &str) -> Result<(), GatewayError> {
        let mut settings = self.shared.settings.write();
        let updated = urls::join_relative(&settings.base_url, path)?;
        debug!(from = %settings.base_url, to = %updated, "base URL updated");
        settings.base_url = updated;
        Ok(())
    }

    pub fn method(&self) -> HttpMethod {
        self.shared.settings.read().method
    }

    pub fn set_method(&self, method: HttpMethod) {
        self.shared.settings.write().method = method;
    }

    pub fn body(&self) -> Option<String> {
        self.shared.settings.read().body.clone()
    }

    /// Payload sent with POST requests.
    pub fn set_body(&self, body: Option<String>) {
        self.shared.settings.write().body = body;
    }

    pub fn use_cert_pinning(&self) -> bool {
        self.shared.settings.read().use_cert_pinning
    }

    pub fn set_use_cert_pinning(&self, enabled: bool) {
        self.shared.settings.write().use_cert_pinning = enabled;
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.shared.settings.read().timeout
    }

    /// Per-request deadline, measured from when the request is created.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        self.shared.settings.write().timeout = timeout;
    }

    /// The transport, created as a [`UreqTransport`] on first use.
    pub fn transport(&self) -> SharedTransport {
        self.shared.transport()
    }

    pub fn set_transport(&self, transport: impl transport::Transport + 'static) {
        self.set_shared_transport(transport::share(transport));
    }

    pub fn set_shared_transport(&self, transport: SharedTransport) {
        *self.shared.transport.lock() = Some(transport);
    }

    pub fn set_parser(&self, parser: impl Parser + 'static) {
        *self.shared.parser.write() = Arc::new(parser);
    }

    /// The queue async requests go to: the one set on this gateway, or the
    /// process-wide shared queue.
    pub fn queue(&self) -> RequestQueue {
        self.queue.lock().clone().unwrap_or_else(registry::shared_queue)
    }

    pub fn set_queue(&self, queue: RequestQueue) {
        *self.queue.lock() = Some(queue);
    }

    /// Shut down the process-wide shared queue.
    pub fn shutdown_services() {
        registry::shutdown_services();
    }

    /// Run the default method against the base URL.
    pub fn execute(&self) -> Result<HttpResponse, GatewayError> {
        self.connect(None, None)
    }

    /// Run the default method against `url`, absolute or relative to the base.
    pub fn execute_url(&self, url: &str) -> Result<HttpResponse, GatewayError> {
        self.connect(Some(url), None)
    }

    pub fn execute_method(&self, method: HttpMethod) -> Result<HttpResponse, GatewayError> {
        self.connect(None, Some(method))
    }

    pub fn get(&self) -> Result<HttpResponse, GatewayError> {
        self.connect(None, Some(HttpMethod::Get))
    }

    pub fn get_url(&self, url: &str) -> Result<HttpResponse, GatewayError> {
        self.connect(Some(url), Some(HttpMethod::Get))
    }

    pub fn post(&self) -> Result<HttpResponse, GatewayError> {
        self.connect(None, Some(HttpMethod::Post))
    }

    pub fn post_url(&self, url: &str) -> Result<HttpResponse, GatewayError> {
        self.connect(Some(url), Some(HttpMethod::Post))
    }

    fn connect(&self, target: Option<&str>, method: Option<HttpMethod>) -> Result<HttpResponse, GatewayError> {
        let descriptor = GatewayShared::descriptor(&self.shared, target, method)?;
        debug!(id = %descriptor.id(), method = %descriptor.method(), url = %descriptor.url(), "executing synchronously");
        let outcome = self.shared.perform(&descriptor);
        if let Err(error) = &outcome {
            warn!(id = %descriptor.id(), %error, "request failed");
        }
        outcome
    }

    /// Queue the default method against `url`; `callback` gets the outcome
    /// on the queue worker.
    pub fn execute_async(&self, url: &str, callback: impl Callback) -> RequestHandle {
        self.enqueue(Some(url), None, Box::new(callback))
    }

    /// Queue a GET against the base URL.
    pub fn get_async(&self, callback: impl Callback) -> RequestHandle {
        self.enqueue(None, Some(HttpMethod::Get), Box::new(callback))
    }

    pub fn get_url_async(&self, url: &str, callback: impl Callback) -> RequestHandle {
        self.enqueue(Some(url), Some(HttpMethod::Get), Box::new(callback))
    }

    /// Queue a request and get its outcome as a future.
    pub fn submit(&self, url: Option<&str>, method: Option<HttpMethod>) -> PendingResponse {
        let (callback, receiver) = outcome_channel();
        let handle = self.enqueue(url, method, callback);
        PendingResponse::new(handle, receiver)
    }

    fn enqueue(
        &self,
        target: Option<&str>,
        method: Option<HttpMethod>,
        callback: Box<dyn Callback>,
    ) -> RequestHandle {
        let queue = self.queue();
        let descriptor = match GatewayShared::descriptor(&self.shared, target, method) {
            Ok(descriptor) => descriptor.with_callback(callback),
            Err(error) => {
                warn!(%error, "could not build queued request");
                match queue.add_failed(callback, error) {
                    Ok(()) => Self::ensure_worker(&queue),
                    Err((callback, error)) => {
                        bridge::deliver(callback, Err(error));
                    }
                }
                return RequestHandle::detached();
            }
        };
        let handle = descriptor.handle();

        if let Err(rejected) = queue.add(descriptor) {
            warn!(queue = queue.name(), id = %handle.id(), "queue is shut down; request rejected");
            bridge::complete(rejected.into_descriptor(), Err(GatewayError::QueueShutdown));
            return handle;
        }
        Self::ensure_worker(&queue);
        handle
    }

    // A shutdown racing with the enqueue has already drained and failed the
    // job; a spawn failure has failed every pending job.
    fn ensure_worker(queue: &RequestQueue) {
        if let Err(error) = queue.start() {
            if !matches!(error, GatewayError::QueueShutdown) {
                error!(queue = queue.name(), %error, "could not start request queue worker");
            }
        }
    }

    /// The response from the most recent successful request, if any.
    pub fn read_response(&self) -> Option<HttpResponse> {
        self.shared.last_response.lock().clone()
    }

    /// Decode the last response as a flat object into `target`.
    ///
    /// Returns the number of fields set. A missing or undecodable response
    /// sets nothing; a list-shaped body is `UnsupportedOperation`.
    pub fn read_response_object<T: PropertyBag + ?Sized>(&self, target: &mut T) -> Result<usize, GatewayError> {
        let Some(response) = self.read_response() else {
            return Ok(0);
        };
        let parser = self.shared.parser.read().clone();
        object::populate(parser.as_ref(), &response.body, target)
    }

    /// Decoding into a list of objects is not implemented.
    pub fn read_response_list(&self, _target: &mut Vec<Record>) -> Result<usize, GatewayError> {
        Err(GatewayError::UnsupportedOperation(
            "decoding a response into a list of objects is not implemented".to_string(),
        ))
    }

    #[cfg(test)]
    pub(crate) fn downgrade(&self) -> std::sync::Weak<GatewayShared> {
        Arc::downgrade(&self.shared)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{mpsc, Barrier};
    use std::thread;

    use super::*;
    use crate::transport::{CallLog, StubTransport};

    const WAIT: Duration = Duration::from_secs(5);

    type Outcome = Result<HttpResponse, GatewayError>;

    fn stub_gateway(url: &str, stub: StubTransport) -> (Gateway, CallLog) {
        let log = stub.log();
        let gw = Gateway::builder()
            .url(url)
            .transport(stub)
            .queue(RequestQueue::new("test"))
            .build()
            .unwrap();
        (gw, log)
    }

    fn sender_callback(tx: mpsc::Sender<Outcome>) -> impl Callback {
        move |outcome: Outcome| {
            let _ = tx.send(outcome);
        }
    }

    #[test]
    fn execute_returns_and_caches_response() {
        let (gw, log) = stub_gateway("http://localhost", StubTransport::ok("testing123"));

        let response = gw.execute().unwrap();
        assert_eq!(response.body, "testing123");
        assert_eq!(gw.read_response().unwrap().body, "testing123");
        assert_eq!(log.urls(), vec!["http://localhost/"]);
    }

    #[test]
    fn failed_sync_call_surfaces_error_and_caches_nothing() {
        let (gw, _log) = stub_gateway(
            "http://localhost",
            StubTransport::failing("refused").then_respond(HttpResponse::new(200, "first")),
        );

        gw.get().unwrap();
        let err = gw.get().unwrap_err();
        assert!(matches!(err, GatewayError::Connection(ref m) if m == "refused"));
        assert!(gw.read_response().is_none());
    }

    #[test]
    fn explicit_url_overrides_base_without_mutating_it() {
        let (gw, log) = stub_gateway("http://h/api", StubTransport::ok(""));

        gw.execute_url("users/7").unwrap();
        gw.get_url("https://elsewhere/x").unwrap();

        assert_eq!(log.urls(), vec!["http://h/api/users/7", "https://elsewhere/x"]);
        assert_eq!(gw.url(), "http://h/api");
    }

    #[test]
    fn method_override_and_body_only_on_post() {
        let (gw, log) = stub_gateway("http://h", StubTransport::ok(""));
        gw.set_body(Some("payload".to_string()));

        gw.execute().unwrap();
        gw.post().unwrap();
        gw.execute_method(HttpMethod::Put).unwrap();
        gw.post_url("items").unwrap();

        let calls = log.calls();
        assert_eq!(calls[0].method, HttpMethod::Get);
        assert_eq!(calls[0].body, None);
        assert_eq!(calls[1].method, HttpMethod::Post);
        assert_eq!(calls[1].body.as_deref(), Some("payload"));
        assert_eq!(calls[2].method, HttpMethod::Put);
        assert_eq!(calls[2].body, None);
        assert_eq!(calls[3].url, "http://h/items");
        assert_eq!(calls[3].body.as_deref(), Some("payload"));
    }

    #[test]
    fn pinning_flag_is_pushed_before_each_call() {
        let (gw, log) = stub_gateway("http://h", StubTransport::ok(""));

        gw.get().unwrap();
        gw.set_use_cert_pinning(true);
        gw.get().unwrap();

        let flags: Vec<bool> = log.calls().iter().map(|c| c.cert_pinning).collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn transport_without_pinning_capability_is_left_alone() {
        struct Plain;
        impl transport::Transport for Plain {
            fn execute_request(&mut self, _request: &RequestDescriptor) -> Result<HttpResponse, GatewayError> {
                Ok(HttpResponse::new(200, "plain"))
            }
        }

        let gw = Gateway::builder()
            .url("http://h")
            .use_cert_pinning(true)
            .transport(Plain)
            .build()
            .unwrap();
        assert_eq!(gw.get().unwrap().body, "plain");
    }

    #[test]
    fn unparseable_base_is_rejected_at_construction() {
        let err = Gateway::builder().url("not a url").build().unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[test]
    fn unparseable_base_fails_sync_call_with_configuration_error() {
        let (gw, log) = stub_gateway("http://h", StubTransport::ok(""));
        gw.set_url("not a url");
        assert!(matches!(gw.execute(), Err(GatewayError::Configuration(_))));
        assert!(log.is_empty());
    }

    #[test]
    fn relative_url_accumulates_and_normalizes() {
        let (gw, _log) = stub_gateway("http://h/x", StubTransport::ok(""));

        gw.set_relative_url("a/b").unwrap();
        assert_eq!(gw.url(), "http://h/x/a/b");
        gw.set_relative_url("..").unwrap();
        assert_eq!(gw.url(), "http://h/x/a");
    }

    #[test]
    fn relative_navigation_keeps_query_after_path() {
        let (gw, _log) = stub_gateway("http://h/x", StubTransport::ok(""));

        gw.set_relative_url("items?page=2").unwrap();
        gw.set_relative_url("7").unwrap();
        assert_eq!(gw.url(), "http://h/x/items/7?page=2");
    }

    #[test]
    fn target_with_colon_stays_on_endpoint() {
        let (gw, log) = stub_gateway("http://h/api", StubTransport::ok(""));

        gw.execute_url("projects:list").unwrap();
        assert_eq!(log.urls(), vec!["http://h/api/projects:list"]);
    }

    #[test]
    fn invalid_relative_url_leaves_base_untouched() {
        let (gw, _log) = stub_gateway("http://h", StubTransport::ok(""));
        gw.set_url("not a url");

        let err = gw.set_relative_url("x").unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
        assert_eq!(gw.url(), "not a url");
    }

    #[test]
    fn flat_object_response_populates_record() {
        let (gw, _log) = stub_gateway("http://h", StubTransport::ok(r#"{"a":"1","b":"2"}"#));
        gw.execute().unwrap();

        let mut record = Record::new();
        assert_eq!(gw.read_response_object(&mut record).unwrap(), 2);
        assert_eq!(record.get("a"), Some("1"));
        assert_eq!(record.get("b"), Some("2"));
    }

    #[test]
    fn list_response_into_object_is_unsupported() {
        let (gw, _log) = stub_gateway("http://h", StubTransport::ok(r#"[{"a":"1"}]"#));
        gw.execute().unwrap();

        let mut record = Record::new();
        let err = gw.read_response_object(&mut record).unwrap_err();
        assert!(matches!(err, GatewayError::UnsupportedOperation(_)));
        assert!(record.is_empty());

        let mut list = Vec::new();
        assert!(matches!(
            gw.read_response_list(&mut list),
            Err(GatewayError::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn undecodable_or_missing_response_populates_nothing() {
        let (gw, _log) = stub_gateway("http://h", StubTransport::ok("testing123"));
        let mut record = Record::new();
        assert_eq!(gw.read_response_object(&mut record).unwrap(), 0);

        gw.execute().unwrap();
        assert_eq!(gw.read_response_object(&mut record).unwrap(), 0);
        assert!(record.is_empty());
    }

    #[test]
    fn async_get_delivers_on_worker_thread() {
        let (gw, log) = stub_gateway("http://h", StubTransport::ok("async"));
        let (tx, rx) = mpsc::channel();

        gw.get_async(move |outcome: Outcome| {
            tx.send((thread::current().id(), outcome)).unwrap();
        });

        let (thread_id, outcome) = rx.recv_timeout(WAIT).unwrap();
        assert_ne!(thread_id, thread::current().id());
        assert_eq!(outcome.unwrap().body, "async");
        assert_eq!(log.len(), 1);
        gw.queue().shutdown();
    }

    #[test]
    fn async_transport_error_reaches_callback() {
        let (gw, _log) = stub_gateway("http://h", StubTransport::failing("unreachable"));
        let (tx, rx) = mpsc::channel();

        gw.execute_async("items", sender_callback(tx));

        let outcome = rx.recv_timeout(WAIT).unwrap();
        assert!(matches!(outcome, Err(GatewayError::Connection(_))));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        gw.queue().shutdown();
    }

    #[test]
    fn async_construction_error_reaches_callback_on_worker() {
        let (gw, log) = stub_gateway("http://h", StubTransport::ok(""));
        gw.set_url("not a url");
        let (tx, rx) = mpsc::channel();

        gw.get_url_async("items", move |outcome: Outcome| {
            tx.send((thread::current().id(), outcome)).unwrap();
        });

        let (thread_id, outcome) = rx.recv_timeout(WAIT).unwrap();
        assert_ne!(thread_id, thread::current().id());
        assert!(matches!(outcome, Err(GatewayError::Configuration(_))));
        assert!(log.is_empty());
        gw.queue().shutdown();
    }

    #[test]
    fn construction_error_keeps_its_place_in_queue_order() {
        let (gw, _log) = stub_gateway("http://h", StubTransport::ok("fine"));
        let (tx, rx) = mpsc::channel();

        for (tag, target) in [("before", "a"), ("bad", "http://[::1"), ("after", "b")] {
            let tx = tx.clone();
            gw.execute_async(target, move |outcome: Outcome| {
                tx.send((tag, outcome.is_ok())).unwrap();
            });
        }

        let order: Vec<(&str, bool)> = (0..3).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(order, vec![("before", true), ("bad", false), ("after", true)]);
        gw.queue().shutdown();
    }

    #[test]
    fn construction_error_after_shutdown_fails_fast() {
        let (gw, _log) = stub_gateway("http://h", StubTransport::ok(""));
        gw.queue().shutdown();
        gw.set_url("not a url");
        let (tx, rx) = mpsc::channel();

        gw.get_async(sender_callback(tx));

        assert!(matches!(rx.try_recv().unwrap(), Err(GatewayError::Configuration(_))));
    }

    #[test]
    fn enqueue_after_shutdown_fails_fast() {
        let (gw, log) = stub_gateway("http://h", StubTransport::ok(""));
        gw.queue().shutdown();
        let (tx, rx) = mpsc::channel();

        gw.get_async(sender_callback(tx));

        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(500)).unwrap(),
            Err(GatewayError::QueueShutdown)
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn racing_first_async_calls_spawn_one_worker() {
        let queue = RequestQueue::new("race");
        let gw = Arc::new(
            Gateway::builder()
                .url("http://h")
                .transport(StubTransport::ok(""))
                .queue(queue.clone())
                .build()
                .unwrap(),
        );
        let barrier = Arc::new(Barrier::new(2));
        let (tx, rx) = mpsc::channel();

        let callers: Vec<_> = (0..2)
            .map(|_| {
                let gw = Arc::clone(&gw);
                let barrier = Arc::clone(&barrier);
                let tx = tx.clone();
                thread::spawn(move || {
                    barrier.wait();
                    gw.get_async(sender_callback(tx));
                })
            })
            .collect();
        for caller in callers {
            caller.join().unwrap();
        }

        for _ in 0..2 {
            rx.recv_timeout(WAIT).unwrap().unwrap();
        }
        assert_eq!(queue.workers_spawned(), 1);
        queue.shutdown();
    }

    #[test]
    fn submit_resolves_pending_response() {
        let (gw, _log) = stub_gateway("http://h", StubTransport::ok("future"));

        let pending = gw.submit(Some("things"), Some(HttpMethod::Delete));
        let response = pending.wait().unwrap();
        assert_eq!(response.body, "future");
        gw.queue().shutdown();
    }

    #[test]
    fn cancelled_request_never_reaches_transport() {
        let (gw, log) = stub_gateway(
            "http://h",
            StubTransport::ok("").with_delay(Duration::from_millis(200)),
        );

        let first = gw.submit(Some("slow"), None);
        let second = gw.submit(Some("cancelled"), None);
        second.cancel();

        assert!(first.wait().is_ok());
        assert!(matches!(second.wait(), Err(GatewayError::Cancelled)));
        assert_eq!(log.urls(), vec!["http://h/slow"]);
        gw.queue().shutdown();
    }

    #[test]
    fn expired_deadline_fails_before_transport() {
        let (gw, log) = stub_gateway(
            "http://h",
            StubTransport::ok("").with_delay(Duration::from_millis(200)),
        );
        gw.set_timeout(Some(Duration::from_millis(50)));

        let first = gw.submit(Some("slow"), None);
        let second = gw.submit(Some("late"), None);

        assert!(first.wait().is_ok());
        assert!(matches!(second.wait(), Err(GatewayError::DeadlineExceeded)));
        assert_eq!(log.len(), 1);
        gw.queue().shutdown();
    }

    #[test]
    fn dropped_gateway_fails_its_queued_requests() {
        let queue = RequestQueue::new("dropped");
        let busy = Gateway::builder()
            .url("http://busy")
            .transport(StubTransport::ok("").with_delay(Duration::from_millis(200)))
            .queue(queue.clone())
            .build()
            .unwrap();
        let doomed = Gateway::builder()
            .url("http://doomed")
            .transport(StubTransport::ok(""))
            .queue(queue.clone())
            .build()
            .unwrap();

        let first = busy.submit(None, None);
        let second = doomed.submit(None, None);
        assert!(doomed.downgrade().upgrade().is_some());
        drop(doomed);

        assert!(first.wait().is_ok());
        assert!(matches!(second.wait(), Err(GatewayError::GatewayDropped)));
        queue.shutdown();
    }

    #[test]
    fn async_success_updates_last_response() {
        let (gw, _log) = stub_gateway("http://h", StubTransport::ok(r#"{"id":"9"}"#));

        gw.submit(None, None).wait().unwrap();

        let mut record = Record::new();
        gw.read_response_object(&mut record).unwrap();
        assert_eq!(record.get("id"), Some("9"));
        gw.queue().shutdown();
    }
}
