use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde_json::json;
use wiretest::{
    Application, BoxError, CleanupFuture, Error, HandlerFuture, PayloadSource, RawMessage, RequestHandler,
    TransportHandle,
};

/// Replies with a JSON description of the request it received.
#[derive(Default)]
pub struct EchoApp {
    pub handled: Arc<AtomicUsize>,
    pub cleanups: Arc<AtomicUsize>,
}

pub struct EchoHandler {
    handled: Arc<AtomicUsize>,
    transport: Option<TransportHandle>,
}

impl Application for EchoApp {
    type Handler = EchoHandler;

    fn make_handler(&self) -> EchoHandler {
        EchoHandler {
            handled: self.handled.clone(),
            transport: None,
        }
    }

    fn cleanup(&self) -> CleanupFuture<'_> {
        Box::pin(async move {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        })
    }
}

impl RequestHandler for EchoHandler {
    fn connection_made(&mut self, transport: TransportHandle) {
        self.transport = Some(transport);
    }

    fn handle_request(&mut self, message: RawMessage, mut payload: PayloadSource) -> HandlerFuture<'_> {
        Box::pin(async move {
            let transport = self.transport.as_ref().ok_or("no transport")?;
            let body = payload.read_to_end();
            let peer = transport
                .get_extra_info("peername")
                .and_then(|info| info.as_addr())
                .map(|addr| addr.to_string());
            let headers: Vec<(String, String)> = message
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            let doc = json!({
                "method": message.method.as_str(),
                "path": message.path_only(),
                "query": message.query_pairs(),
                "headers": headers,
                "body": String::from_utf8_lossy(&body),
                "peer": peer,
                "should_close": message.should_close,
            });
            let out = serde_json::to_vec(&doc)?;
            let head = format!(
                "HTTP/1.0 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
                out.len()
            );
            transport.write(head.as_bytes());
            transport.write(&out);
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok::<(), BoxError>(())
        })
    }

    fn connection_lost(&mut self, _error: Option<Error>) {
        self.transport = None;
    }
}

/// Writes a fixed sequence of chunks regardless of the request.
pub struct RawApp {
    chunks: Vec<Bytes>,
}

impl RawApp {
    pub fn new<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }
}

pub struct RawHandler {
    chunks: Vec<Bytes>,
    transport: Option<TransportHandle>,
}

impl Application for RawApp {
    type Handler = RawHandler;

    fn make_handler(&self) -> RawHandler {
        RawHandler {
            chunks: self.chunks.clone(),
            transport: None,
        }
    }
}

impl RequestHandler for RawHandler {
    fn connection_made(&mut self, transport: TransportHandle) {
        self.transport = Some(transport);
    }

    fn handle_request(&mut self, _message: RawMessage, _payload: PayloadSource) -> HandlerFuture<'_> {
        Box::pin(async move {
            let transport = self.transport.as_ref().ok_or("no transport")?;
            for chunk in &self.chunks {
                transport.write(chunk);
                tokio::task::yield_now().await;
            }
            Ok::<(), BoxError>(())
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("database unavailable")]
pub struct Unavailable;

/// Fails every request after writing a partial head.
pub struct FailingApp;

pub struct FailingHandler {
    transport: Option<TransportHandle>,
}

impl Application for FailingApp {
    type Handler = FailingHandler;

    fn make_handler(&self) -> FailingHandler {
        FailingHandler { transport: None }
    }
}

impl RequestHandler for FailingHandler {
    fn connection_made(&mut self, transport: TransportHandle) {
        self.transport = Some(transport);
    }

    fn handle_request(&mut self, _message: RawMessage, _payload: PayloadSource) -> HandlerFuture<'_> {
        Box::pin(async move {
            if let Some(transport) = &self.transport {
                transport.write(b"HTTP/1.0 500 ");
            }
            Err::<(), BoxError>(Box::new(Unavailable))
        })
    }

    fn connection_lost(&mut self, _error: Option<Error>) {
        panic!("disconnect must not run after a handler failure");
    }
}
