//! Synthetic request construction.
//!
//! A [`RequestSpec`] is what the caller asked for; [`RequestSpec::into_raw`]
//! turns it into the [`RawMessage`] and [`PayloadSource`] a handler consumes.
//! The message is always HTTP/1.0 with close-after-response and no content
//! coding negotiation.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use http::{Method, Version};

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::headers::HeaderMultiMap;
use crate::payload::PayloadSource;

/// Request body bytes. Text is encoded as UTF-8; binary passes through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body(Bytes);

impl Body {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

impl From<&[u8]> for Body {
    fn from(b: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(b))
    }
}

impl<const N: usize> From<&[u8; N]> for Body {
    fn from(b: &[u8; N]) -> Self {
        Self(Bytes::copy_from_slice(b))
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Self(Bytes::from(b))
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Self(b)
    }
}

/// Values usable as a request target.
///
/// Strings pass through; path-like and URI values go through their string
/// conversion first.
pub trait IntoTarget {
    fn into_target(self) -> String;
}

impl IntoTarget for &str {
    fn into_target(self) -> String {
        self.to_string()
    }
}

impl IntoTarget for String {
    fn into_target(self) -> String {
        self
    }
}

impl IntoTarget for &String {
    fn into_target(self) -> String {
        self.clone()
    }
}

impl IntoTarget for &Path {
    fn into_target(self) -> String {
        self.to_string_lossy().into_owned()
    }
}

impl IntoTarget for PathBuf {
    fn into_target(self) -> String {
        self.to_string_lossy().into_owned()
    }
}

impl IntoTarget for &PathBuf {
    fn into_target(self) -> String {
        self.to_string_lossy().into_owned()
    }
}

impl IntoTarget for http::Uri {
    fn into_target(self) -> String {
        self.to_string()
    }
}

impl IntoTarget for &http::Uri {
    fn into_target(self) -> String {
        self.to_string()
    }
}

/// Encode key/value pairs as `application/x-www-form-urlencoded`.
///
/// Pair order is preserved; spaces become `+`.
pub fn encode_form<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish()
}

/// What the caller asked for, before wire normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: Method,
    pub target: String,
    pub headers: HeaderMultiMap,
    pub body: Option<Body>,
}

impl RequestSpec {
    pub fn new(method: Method, target: impl IntoTarget) -> Self {
        Self {
            method,
            target: target.into_target(),
            headers: HeaderMultiMap::new(),
            body: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Normalize headers and split into message and payload.
    ///
    /// Inserts `Host` when absent and, when a body is present, a
    /// `Content-Length` matching its byte length unless the caller set one.
    pub fn into_raw(self, config: &HarnessConfig) -> Result<(RawMessage, PayloadSource)> {
        let Self { method, target, mut headers, body } = self;

        headers.set_default("Host", config.default_host.as_str());
        if let Some(body) = &body {
            headers.set_default("Content-Length", body.len().to_string());
        }
        headers.validate()?;

        let payload = match body {
            Some(body) => PayloadSource::buffered(body.into_bytes()),
            None => PayloadSource::empty(),
        };

        tracing::debug!(
            method = %method,
            target = %target,
            body_len = payload.total_len(),
            "built synthetic request"
        );

        let raw_headers = headers.to_raw();
        let message = RawMessage {
            method,
            path: target,
            version: Version::HTTP_10,
            headers,
            raw_headers,
            should_close: true,
            compression: None,
            upgrade: false,
            chunked: false,
        };
        Ok((message, payload))
    }
}

/// Wire-level decomposition of a request, handed to the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub method: Method,
    /// Request target as sent, including any query string.
    pub path: String,
    pub version: Version,
    pub headers: HeaderMultiMap,
    /// Header byte pairs with the caller's casing.
    pub raw_headers: Vec<(Bytes, Bytes)>,
    /// Always true: one request per synthetic connection.
    pub should_close: bool,
    /// Always `None`: no content coding is negotiated.
    pub compression: Option<String>,
    pub upgrade: bool,
    pub chunked: bool,
}

impl RawMessage {
    /// Target without the query string.
    pub fn path_only(&self) -> &str {
        self.path.split_once('?').map(|(p, _)| p).unwrap_or(&self.path)
    }

    /// Raw query string, if any.
    pub fn query(&self) -> Option<&str> {
        self.path.split_once('?').map(|(_, q)| q)
    }

    /// Decoded query parameters in order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("Content-Length").and_then(|v| v.trim().parse().ok())
    }

    /// Serialize the request line and header block as a client would send it.
    pub fn head_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(self.method.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.path.as_bytes());
        out.extend_from_slice(b" HTTP/1.0\r\n");
        for (name, value) in &self.raw_headers {
            out.extend_from_slice(name);
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn config() -> HarnessConfig {
        HarnessConfig::default()
    }

    #[test]
    fn host_is_injected_when_absent() {
        let (msg, mut payload) = RequestSpec::new(Method::GET, "/").into_raw(&config()).unwrap();
        assert_eq!(msg.header("host"), Some("localhost"));
        assert!(msg.header("content-length").is_none());
        assert!(payload.read_to_end().is_empty());
        assert_eq!(msg.version, Version::HTTP_10);
        assert!(msg.should_close);
        assert!(msg.compression.is_none());
    }

    #[test]
    fn explicit_host_is_kept() {
        let (msg, _) = RequestSpec::new(Method::GET, "/")
            .header("HOST", "api.example")
            .into_raw(&config())
            .unwrap();
        assert_eq!(msg.headers.get_all("host"), vec!["api.example"]);
    }

    #[test]
    fn content_length_matches_encoded_body() {
        let (msg, mut payload) = RequestSpec::new(Method::POST, "/submit")
            .body("héllo")
            .into_raw(&config())
            .unwrap();
        assert_eq!(msg.content_length(), Some(6));
        assert_eq!(&payload.read_to_end()[..], "héllo".as_bytes());
    }

    #[test]
    fn explicit_content_length_is_not_overridden() {
        let (msg, _) = RequestSpec::new(Method::PUT, "/")
            .header("content-length", "99")
            .body(vec![1u8, 2, 3])
            .into_raw(&config())
            .unwrap();
        assert_eq!(msg.headers.get_all("Content-Length"), vec!["99"]);
    }

    #[test]
    fn present_empty_body_gets_zero_length() {
        let (msg, _) = RequestSpec::new(Method::POST, "/")
            .body(Body::empty())
            .into_raw(&config())
            .unwrap();
        assert_eq!(msg.content_length(), Some(0));
    }

    #[test]
    fn raw_headers_keep_casing() {
        let (msg, _) = RequestSpec::new(Method::GET, "/")
            .header("X-Trace-ID", "1")
            .into_raw(&config())
            .unwrap();
        assert_eq!(msg.raw_headers[0].0, Bytes::from_static(b"X-Trace-ID"));
        assert_eq!(msg.raw_headers[1].0, Bytes::from_static(b"Host"));
    }

    #[test]
    fn path_like_targets_are_stringified() {
        let spec = RequestSpec::new(Method::GET, Path::new("/static/app.js"));
        assert_eq!(spec.target, "/static/app.js");
        let uri: http::Uri = "/search?q=rust".parse().unwrap();
        let spec = RequestSpec::new(Method::GET, uri);
        assert_eq!(spec.target, "/search?q=rust");
    }

    #[test]
    fn query_helpers() {
        let (msg, _) = RequestSpec::new(Method::GET, "/items?page=2&tag=a+b")
            .into_raw(&config())
            .unwrap();
        assert_eq!(msg.path_only(), "/items");
        assert_eq!(msg.query(), Some("page=2&tag=a+b"));
        assert_eq!(
            msg.query_pairs(),
            vec![("page".into(), "2".into()), ("tag".into(), "a b".into())]
        );
    }

    #[test]
    fn form_encoding_preserves_order() {
        assert_eq!(encode_form([("a", "1"), ("b", "x y")]), "a=1&b=x+y");
        assert_eq!(encode_form([("z", "&"), ("a", "é")]), "z=%26&a=%C3%A9");
    }

    #[test]
    fn invalid_header_fails_construction() {
        let err = RequestSpec::new(Method::GET, "/")
            .header("X-Bad", "a\r\nb")
            .into_raw(&config())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn head_bytes_render_request() {
        let (msg, _) = RequestSpec::new(Method::DELETE, "/items/7")
            .into_raw(&config())
            .unwrap();
        assert_eq!(
            msg.head_bytes(),
            b"DELETE /items/7 HTTP/1.0\r\nHost: localhost\r\n\r\n".to_vec()
        );
    }
}
