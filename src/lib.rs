//! # Wiretest
//!
//! In-process HTTP/1.0 test harness.
//!
//! Wiretest builds a request, hands it to an [`Application`]'s handler over a
//! synthetic transport that only records writes, and parses the captured
//! bytes back into a [`Response`] with status, headers, body and cookies.
//! No sockets are opened.

// Request side
pub mod config;
pub mod headers;
pub mod payload;
pub mod request;

// Exchange
pub mod driver;
pub mod transport;

// Response side
pub mod cookie;
pub mod parser;
pub mod response;

// Test-facing surface
pub mod client;
pub mod fixture;
pub mod overrides;

pub mod error;

// Re-exports
pub use client::{Dispatch, PendingResponse, RequestBuilder, TestClient};
pub use config::{HarnessConfig, Mode};
pub use cookie::{Cookie, CookieJar};
pub use driver::{Application, CleanupFuture, HandlerFuture, RequestHandler};
pub use error::{BoxError, Error, Result};
pub use fixture::TestFixture;
pub use headers::HeaderMultiMap;
pub use overrides::{Override, Setting};
pub use parser::{parse_response, ParseState, ResponseParser};
pub use payload::{PayloadItem, PayloadSource};
pub use request::{Body, RawMessage, RequestSpec};
pub use response::Response;
pub use transport::{ExtraInfo, SyntheticTransport, Transport, TransportHandle, WrittenBytesLog};
