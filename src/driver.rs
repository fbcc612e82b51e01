//! Connection lifecycle against the application under test.
//!
//! One exchange is: make a handler, `connection_made` with a fresh
//! [`SyntheticTransport`], await `handle_request`, `connection_lost(None)`,
//! then parse what the handler wrote. The only suspension point is the
//! `handle_request` future.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::Method;

use crate::config::HarnessConfig;
use crate::error::{BoxError, Error, Result};
use crate::parser::ResponseParser;
use crate::payload::PayloadSource;
use crate::request::RawMessage;
use crate::response::Response;
use crate::transport::{SyntheticTransport, TransportHandle, WrittenBytesLog};

/// Future returned by [`RequestHandler::handle_request`].
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = std::result::Result<(), BoxError>> + Send + 'a>>;

/// Future returned by [`Application::cleanup`].
pub type CleanupFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Per-connection protocol object produced by an [`Application`].
pub trait RequestHandler: Send {
    /// Called once with the transport the handler writes its response to.
    fn connection_made(&mut self, transport: TransportHandle);

    /// Process one request. Must resolve only after the full response has
    /// been written to the transport.
    fn handle_request(&mut self, message: RawMessage, payload: PayloadSource) -> HandlerFuture<'_>;

    /// Called after the request completes; `None` means a clean close.
    fn connection_lost(&mut self, _error: Option<Error>) {}
}

/// Application under test: a factory of request handlers.
pub trait Application: Send + Sync + 'static {
    type Handler: RequestHandler;

    fn make_handler(&self) -> Self::Handler;

    /// Release application resources at teardown.
    fn cleanup(&self) -> CleanupFuture<'_> {
        Box::pin(async {})
    }
}

impl<A: Application> Application for Arc<A> {
    type Handler = A::Handler;

    fn make_handler(&self) -> Self::Handler {
        (**self).make_handler()
    }

    fn cleanup(&self) -> CleanupFuture<'_> {
        (**self).cleanup()
    }
}

/// Run one handler through connect, handle and disconnect.
///
/// Returns the bytes written to `transport`. A handler failure is returned
/// as [`Error::Handler`] before the disconnect hook is invoked.
pub async fn drive<A: Application + ?Sized>(
    app: &A,
    transport: Arc<SyntheticTransport>,
    message: RawMessage,
    payload: PayloadSource,
) -> Result<WrittenBytesLog> {
    let mut handler = app.make_handler();

    tracing::trace!("handler connection_made");
    handler.connection_made(transport.clone());

    tracing::trace!(method = %message.method, path = %message.path, "handler handle_request");
    handler
        .handle_request(message, payload)
        .await
        .map_err(Error::Handler)?;

    tracing::trace!("handler connection_lost");
    handler.connection_lost(None);

    let log = transport.take_log();
    tracing::debug!(writes = log.len(), bytes = log.total_len(), "handler finished");
    Ok(log)
}

/// Drive a prepared request over a fresh transport and parse the result.
pub async fn exchange<A: Application + ?Sized>(
    app: &A,
    config: &HarnessConfig,
    message: RawMessage,
    payload: PayloadSource,
) -> Result<Response> {
    let method: Method = message.method.clone();
    let transport = Arc::new(SyntheticTransport::new(config));
    let log = drive(app, transport, message, payload).await?;
    ResponseParser::new(method).parse(&log.concat())
}
