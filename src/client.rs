//! Caller-facing test client.
//!
//! # Usage
//!
//! ```rust,ignore
//! let client = TestClient::new(MyApp::default())?;
//!
//! // Blocking mode (default): the exchange completes before `send` returns.
//! let resp = client.get("/health").send().into_response()?;
//! assert_eq!(resp.status, 200);
//!
//! // Deferred mode: `send` hands back the in-flight exchange.
//! client.set_deferred(true);
//! let resp = client.block_on(async {
//!     client.post("/login").form([("user", "ann")]).send().await
//! })?;
//! ```

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Method;
use tokio::runtime::Runtime;

use crate::config::{HarnessConfig, Mode};
use crate::driver::{exchange, Application};
use crate::error::{Error, Result};
use crate::headers::HeaderMultiMap;
use crate::payload::PayloadSource;
use crate::request::{encode_form, Body, IntoTarget, RawMessage, RequestSpec};
use crate::response::Response;

/// An exchange that has been prepared but not yet run to completion.
#[must_use = "a pending response does nothing unless awaited"]
pub struct PendingResponse {
    inner: Pin<Box<dyn Future<Output = Result<Response>> + Send>>,
}

impl PendingResponse {
    fn new(fut: impl Future<Output = Result<Response>> + Send + 'static) -> Self {
        Self { inner: Box::pin(fut) }
    }

    fn ready(result: Result<Response>) -> Self {
        Self::new(std::future::ready(result))
    }
}

impl Future for PendingResponse {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl std::fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingResponse").finish_non_exhaustive()
    }
}

/// Result of [`RequestBuilder::send`], shaped by the client's mode.
#[derive(Debug)]
pub enum Dispatch {
    /// Blocking mode: the exchange already ran.
    Completed(Result<Response>),
    /// Deferred mode: the exchange runs when awaited.
    Pending(PendingResponse),
}

impl Dispatch {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// The finished response. Fails with [`Error::ModeMismatch`] if pending.
    pub fn into_response(self) -> Result<Response> {
        match self {
            Self::Completed(result) => result,
            Self::Pending(_) => Err(Error::ModeMismatch(
                "exchange is pending; await it or switch the client to blocking mode",
            )),
        }
    }

    /// The in-flight exchange. Fails with [`Error::ModeMismatch`] if completed.
    pub fn into_pending(self) -> Result<PendingResponse> {
        match self {
            Self::Pending(pending) => Ok(pending),
            Self::Completed(_) => Err(Error::ModeMismatch(
                "exchange already completed in blocking mode",
            )),
        }
    }
}

impl IntoFuture for Dispatch {
    type Output = Result<Response>;
    type IntoFuture = PendingResponse;

    fn into_future(self) -> PendingResponse {
        match self {
            Self::Completed(result) => PendingResponse::ready(result),
            Self::Pending(pending) => pending,
        }
    }
}

/// In-process client that drives an [`Application`] without sockets.
pub struct TestClient<A: Application> {
    app: Arc<A>,
    config: HarnessConfig,
    deferred: AtomicBool,
    // Taken only in `Drop`.
    runtime: Option<Runtime>,
}

impl<A: Application> TestClient<A> {
    pub fn new(app: A) -> Result<Self> {
        Self::with_config(app, HarnessConfig::default())
    }

    /// Create a client with explicit settings.
    ///
    /// The client owns a current-thread runtime used to complete exchanges
    /// in blocking mode.
    pub fn with_config(app: A, config: HarnessConfig) -> Result<Self> {
        Self::from_shared(Arc::new(app), config)
    }

    pub fn from_shared(app: Arc<A>, config: HarnessConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            app,
            deferred: AtomicBool::new(config.mode.is_deferred()),
            config,
            runtime: Some(runtime),
        })
    }

    pub fn app(&self) -> &Arc<A> {
        &self.app
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        if self.deferred.load(Ordering::Acquire) {
            Mode::Deferred
        } else {
            Mode::Blocking
        }
    }

    /// Switch mode for every subsequent `send`.
    pub fn set_mode(&self, mode: Mode) {
        self.deferred.store(mode.is_deferred(), Ordering::Release);
    }

    pub fn set_deferred(&self, deferred: bool) {
        self.deferred.store(deferred, Ordering::Release);
    }

    pub fn is_deferred(&self) -> bool {
        self.mode().is_deferred()
    }

    /// Run a future to completion on the client's runtime.
    ///
    /// Panics if called from inside another async runtime; await a deferred
    /// dispatch there instead.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        match &self.runtime {
            Some(runtime) => runtime.block_on(fut),
            None => unreachable!("client runtime is only released on drop"),
        }
    }

    pub fn get(&self, target: impl IntoTarget) -> RequestBuilder<'_, A> {
        self.request(Method::GET, target)
    }

    pub fn head(&self, target: impl IntoTarget) -> RequestBuilder<'_, A> {
        self.request(Method::HEAD, target)
    }

    pub fn delete(&self, target: impl IntoTarget) -> RequestBuilder<'_, A> {
        self.request(Method::DELETE, target)
    }

    pub fn options(&self, target: impl IntoTarget) -> RequestBuilder<'_, A> {
        self.request(Method::OPTIONS, target)
    }

    /// `POST` with an empty body unless one is supplied.
    pub fn post(&self, target: impl IntoTarget) -> RequestBuilder<'_, A> {
        self.request(Method::POST, target).body(Body::empty())
    }

    /// `PUT` with an empty body unless one is supplied.
    pub fn put(&self, target: impl IntoTarget) -> RequestBuilder<'_, A> {
        self.request(Method::PUT, target).body(Body::empty())
    }

    /// `PATCH` with an empty body unless one is supplied.
    pub fn patch(&self, target: impl IntoTarget) -> RequestBuilder<'_, A> {
        self.request(Method::PATCH, target).body(Body::empty())
    }

    pub fn request(&self, method: Method, target: impl IntoTarget) -> RequestBuilder<'_, A> {
        RequestBuilder::new(self, Ok(method), target)
    }

    /// Request with a method given as text; an invalid token surfaces on `send`.
    pub fn request_str(&self, method: &str, target: impl IntoTarget) -> RequestBuilder<'_, A> {
        let method = Method::from_bytes(method.as_bytes()).map_err(Error::from);
        RequestBuilder::new(self, method, target)
    }

    fn dispatch(&self, prepared: Result<(RawMessage, PayloadSource)>, config: HarnessConfig) -> Dispatch {
        let (message, payload) = match prepared {
            Ok(parts) => parts,
            Err(e) => {
                return match self.mode() {
                    Mode::Blocking => Dispatch::Completed(Err(e)),
                    Mode::Deferred => Dispatch::Pending(PendingResponse::ready(Err(e))),
                };
            }
        };

        let app = self.app.clone();
        let fut = async move { exchange(&*app, &config, message, payload).await };

        match self.mode() {
            Mode::Blocking if in_async_context() => Dispatch::Completed(Err(Error::ModeMismatch(
                "blocking send inside an async runtime; switch the client to deferred mode",
            ))),
            Mode::Blocking => Dispatch::Completed(self.block_on(fut)),
            Mode::Deferred => Dispatch::Pending(PendingResponse::new(fut)),
        }
    }
}

impl<A: Application> Drop for TestClient<A> {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.take() else {
            return;
        };
        if in_async_context() {
            tracing::debug!("client dropped inside an async runtime, shutting its runtime down in the background");
            runtime.shutdown_background();
        }
    }
}

fn in_async_context() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}

impl<A: Application> std::fmt::Debug for TestClient<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("config", &self.config)
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

/// Builder for one request against a [`TestClient`].
#[must_use = "a request builder does nothing until `send` is called"]
pub struct RequestBuilder<'a, A: Application> {
    client: &'a TestClient<A>,
    method: Result<Method>,
    target: String,
    headers: HeaderMultiMap,
    body: Option<Body>,
    form: Option<String>,
    error: Option<Error>,
    peer_addr: Option<SocketAddr>,
}

impl<'a, A: Application> RequestBuilder<'a, A> {
    fn new(client: &'a TestClient<A>, method: Result<Method>, target: impl IntoTarget) -> Self {
        Self {
            client,
            method,
            target: target.into_target(),
            headers: HeaderMultiMap::new(),
            body: None,
            form: None,
            error: None,
            peer_addr: None,
        }
    }

    /// Append a header; repeated names are all sent.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(headers);
        self
    }

    /// Set the request body. Text is sent as UTF-8.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Form data, url-encoded into the body when no non-empty body is set.
    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.form = Some(encode_form(pairs));
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                if !self.headers.contains("Content-Type") {
                    self.headers.append("Content-Type", "application/json");
                }
                self.body = Some(Body::from(bytes));
            }
            Err(e) => self.error = Some(Error::from(e)),
        }
        self
    }

    /// Report a different peer address for this request only.
    pub fn peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Produce the message and payload this request would hand the handler.
    pub fn build(self) -> Result<(RawMessage, PayloadSource)> {
        let config = self.effective_config();
        self.into_spec()?.into_raw(&config)
    }

    /// Run the exchange according to the client's current mode.
    ///
    /// In blocking mode inside an async runtime the exchange is not run and
    /// the dispatch carries [`Error::ModeMismatch`].
    pub fn send(self) -> Dispatch {
        let client = self.client;
        let config = self.effective_config();
        let prepared = self.into_spec().and_then(|spec| spec.into_raw(&config));
        client.dispatch(prepared, config)
    }

    fn effective_config(&self) -> HarnessConfig {
        let mut config = self.client.config.clone();
        if let Some(addr) = self.peer_addr {
            config.peer_addr = addr;
        }
        config
    }

    fn into_spec(self) -> Result<RequestSpec> {
        if let Some(e) = self.error {
            return Err(e);
        }
        let mut headers = self.headers;
        let mut body = self.body;
        if let Some(form) = self.form.filter(|f| !f.is_empty()) {
            if body.as_ref().map_or(true, Body::is_empty) {
                headers.set_default("Content-Type", "application/x-www-form-urlencoded");
                body = Some(Body::from(form));
            }
        }
        Ok(RequestSpec {
            method: self.method?,
            target: self.target,
            headers,
            body,
        })
    }
}

impl<A: Application> IntoFuture for RequestBuilder<'_, A> {
    type Output = Result<Response>;
    type IntoFuture = PendingResponse;

    fn into_future(self) -> PendingResponse {
        self.send().into_future()
    }
}
