//! Structured response reconstructed from captured bytes.

use std::io::Read;

use bytes::Bytes;
use http::Version;

use crate::cookie::{Cookie, CookieJar};
use crate::error::{Error, Result};
use crate::headers::HeaderMultiMap;

/// Response as a client would have observed it.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub reason: String,
    pub version: Version,
    pub headers: HeaderMultiMap,
    pub cookies: CookieJar,
    body: Bytes,
    text: Option<String>,
}

impl Response {
    /// Assemble a response and derive its text form when decodable.
    pub fn new(
        status: u16,
        reason: impl Into<String>,
        version: Version,
        headers: HeaderMultiMap,
        cookies: CookieJar,
        body: Bytes,
    ) -> Self {
        let mut resp = Self {
            status,
            reason: reason.into(),
            version,
            headers,
            cookies,
            body,
            text: None,
        };
        resp.text = resp.decode_text();
        resp
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Body decoded as text, if it was decodable.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.get_header("Location")
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn get_headers(&self, name: &str) -> Vec<&str> {
        self.headers.get_all(name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_header("Content-Type")
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.get_header("Content-Encoding")
    }

    pub fn content_length(&self) -> Option<usize> {
        self.get_header("Content-Length").and_then(|v| v.trim().parse().ok())
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    /// `charset` parameter of `Content-Type`, lowercased.
    pub fn charset(&self) -> Option<String> {
        self.content_type()?
            .split(';')
            .skip(1)
            .filter_map(|param| param.split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("charset"))
            .map(|(_, v)| v.trim().trim_matches('"').to_ascii_lowercase())
    }

    /// Decode body based on the declared Content-Encoding (gzip, deflate).
    pub fn decoded_body(&self) -> Result<Bytes> {
        match self.content_encoding().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("gzip") | Some("x-gzip") => decode_gzip(&self.body),
            Some("deflate") => decode_deflate(&self.body),
            // Undeclared coding is never guessed from the bytes.
            None | Some("identity") | Some("") => Ok(self.body.clone()),
            Some(other) => Err(Error::decode(format!("unsupported content-encoding: {}", other))),
        }
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let decoded = self.decoded_body()?;
        serde_json::from_slice(&decoded).map_err(Error::from)
    }

    fn decode_text(&self) -> Option<String> {
        let decoded = match self.decoded_body() {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!(error = %e, "body not decodable, text left unset");
                return None;
            }
        };
        let charset = self.charset();
        match decode_charset(&decoded, charset.as_deref()) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(error = %e, "body is not text, text left unset");
                None
            }
        }
    }
}

fn decode_charset(data: &[u8], charset: Option<&str>) -> Result<String> {
    match charset {
        Some("iso-8859-1") | Some("latin1") | Some("latin-1") | Some("l1") => {
            Ok(data.iter().map(|&b| char::from(b)).collect())
        }
        Some("us-ascii") | Some("ascii") => {
            if data.is_ascii() {
                Ok(String::from_utf8_lossy(data).into_owned())
            } else {
                Err(Error::decode("non-ASCII byte in us-ascii body"))
            }
        }
        _ => std::str::from_utf8(data)
            .map(str::to_string)
            .map_err(|e| Error::decode(format!("UTF-8 decode error: {}", e))),
    }
}

fn decode_gzip(data: &[u8]) -> Result<Bytes> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| Error::decode(format!("gzip: {}", e)))?;
    Ok(Bytes::from(decoded))
}

fn decode_deflate(data: &[u8]) -> Result<Bytes> {
    let mut decoded = Vec::new();
    if flate2::read::ZlibDecoder::new(data).read_to_end(&mut decoded).is_ok() {
        return Ok(Bytes::from(decoded));
    }
    decoded.clear();
    flate2::read::DeflateDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| Error::decode(format!("deflate: {}", e)))?;
    Ok(Bytes::from(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn response(headers: &[(&str, &str)], body: &[u8]) -> Response {
        Response::new(
            200,
            "OK",
            Version::HTTP_10,
            headers.iter().copied().collect(),
            CookieJar::new(),
            Bytes::copy_from_slice(body),
        )
    }

    #[test]
    fn text_is_derived_from_utf8_body() {
        let resp = response(&[("Content-Type", "text/plain")], "héllo".as_bytes());
        assert_eq!(resp.text(), Some("héllo"));
        assert!(resp.is_success());
    }

    #[test]
    fn invalid_utf8_leaves_text_unset() {
        let resp = response(&[], &[0xff, 0xfe, 0x00]);
        assert_eq!(resp.text(), None);
        assert_eq!(&resp.body()[..], &[0xff, 0xfe, 0x00]);
    }

    #[test]
    fn latin1_charset_is_honoured() {
        let resp = response(&[("Content-Type", "text/plain; charset=ISO-8859-1")], &[0x63, 0x61, 0x66, 0xe9]);
        assert_eq!(resp.charset().as_deref(), Some("iso-8859-1"));
        assert_eq!(resp.text(), Some("café"));
    }

    #[test]
    fn gzip_body_is_decoded_for_text() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"compressed hello").unwrap();
        let gz = encoder.finish().unwrap();
        let resp = response(&[("Content-Encoding", "gzip")], &gz);
        assert_eq!(resp.text(), Some("compressed hello"));
        assert_eq!(resp.body().len(), gz.len());
    }

    #[test]
    fn undeclared_gzip_bytes_stay_binary() {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"secret").unwrap();
        let gz = encoder.finish().unwrap();
        let resp = response(&[("Content-Type", "application/octet-stream")], &gz);
        assert_eq!(resp.text(), None);
        assert_eq!(&resp.decoded_body().unwrap()[..], &gz[..]);
    }

    #[test]
    fn unsupported_encoding_leaves_text_unset() {
        let resp = response(&[("Content-Encoding", "br")], b"opaque");
        assert!(resp.text().is_none());
        assert!(matches!(resp.decoded_body(), Err(Error::Decode(_))));
    }

    #[test]
    fn json_helper_deserializes() {
        let resp = response(&[("Content-Type", "application/json")], br#"{"ok":true}"#);
        let value: serde_json::Value = resp.json().unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn header_helpers() {
        let resp = response(&[("Location", "/next"), ("Content-Length", "0"), ("Vary", "A"), ("vary", "B")], b"");
        assert_eq!(resp.redirect_url(), Some("/next"));
        assert_eq!(resp.content_length(), Some(0));
        assert_eq!(resp.get_headers("VARY"), vec!["A", "B"]);
        assert_eq!(resp.text(), Some(""));
    }
}
