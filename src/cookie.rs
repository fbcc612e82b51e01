//! `Set-Cookie` parsing and the per-response cookie jar.
//!
//! The jar is keyed by cookie name only: a synthetic exchange has no
//! request URL to scope cookies against. Repeated occurrences of a name are
//! merged, later attributes overriding earlier ones.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use crate::error::{Error, Result};

/// `SameSite` attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "lax" => Some(Self::Lax),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// A cookie and the attributes its `Set-Cookie` line carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub max_age: Option<i64>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
    pub comment: Option<String>,
    pub version: Option<String>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
            comment: None,
            version: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(normalize_domain(&domain.into()));
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Parse the value of one `Set-Cookie` header.
    ///
    /// Fails only when the leading `name=value` pair is unusable. Attributes
    /// that cannot be interpreted are dropped.
    pub fn parse(header: &str) -> Result<Self> {
        let mut parts = header.split(';').map(str::trim);
        let pair = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::CookieParse("Empty cookie header".to_string()))?;

        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::CookieParse(format!("No = in cookie: {:?}", pair)))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::CookieParse("Empty cookie name".to_string()));
        }

        let mut cookie = Cookie::new(name, unquote(value.trim()));
        for attr in parts.filter(|a| !a.is_empty()) {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), Some(v.trim())),
                None => (attr, None),
            };
            match (key.to_ascii_lowercase().as_str(), val) {
                ("secure", _) => cookie.secure = true,
                ("httponly", _) => cookie.http_only = true,
                ("domain", Some(v)) if !v.is_empty() => cookie.domain = Some(normalize_domain(v)),
                ("path", Some(v)) if !v.is_empty() => cookie.path = Some(v.to_string()),
                ("expires", Some(v)) => match parse_cookie_date(v) {
                    Some(dt) => cookie.expires = Some(dt),
                    None => tracing::debug!(cookie = %cookie.name, value = v, "dropping unparseable Expires"),
                },
                ("max-age", Some(v)) => match v.parse::<i64>() {
                    Ok(secs) => cookie.max_age = Some(secs),
                    Err(_) => tracing::debug!(cookie = %cookie.name, value = v, "dropping invalid Max-Age"),
                },
                ("samesite", Some(v)) => match SameSite::parse(v) {
                    Some(ss) => cookie.same_site = Some(ss),
                    None => tracing::debug!(cookie = %cookie.name, value = v, "dropping unknown SameSite"),
                },
                ("comment", Some(v)) => cookie.comment = Some(unquote(v).to_string()),
                ("version", Some(v)) => cookie.version = Some(v.to_string()),
                _ => tracing::trace!(cookie = %cookie.name, attr, "ignoring cookie attribute"),
            }
        }
        Ok(cookie)
    }

    /// Fold a later occurrence of the same cookie into this one.
    ///
    /// The value is replaced; attributes present on `later` win, absent ones
    /// keep their earlier setting.
    pub fn merge(&mut self, later: Cookie) {
        self.value = later.value;
        if later.domain.is_some() {
            self.domain = later.domain;
        }
        if later.path.is_some() {
            self.path = later.path;
        }
        if later.expires.is_some() {
            self.expires = later.expires;
        }
        if later.max_age.is_some() {
            self.max_age = later.max_age;
        }
        if later.same_site.is_some() {
            self.same_site = later.same_site;
        }
        if later.comment.is_some() {
            self.comment = later.comment;
        }
        if later.version.is_some() {
            self.version = later.version;
        }
        self.secure |= later.secure;
        self.http_only |= later.http_only;
    }

    /// True when `Max-Age` or `Expires` places the cookie in the past.
    pub fn is_expired(&self) -> bool {
        if let Some(max_age) = self.max_age {
            return max_age <= 0;
        }
        self.expires.is_some_and(|dt| dt < Utc::now())
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Cookies set by one response, keyed by name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a cookie under its name.
    pub fn store(&mut self, cookie: Cookie) {
        match self.cookies.get_mut(&cookie.name) {
            Some(existing) => existing.merge(cookie),
            None => {
                self.cookies.insert(cookie.name.clone(), cookie);
            }
        }
    }

    /// Parse and store every `Set-Cookie` value; malformed ones are skipped.
    pub fn store_from_headers<'a>(&mut self, values: impl IntoIterator<Item = &'a str>) {
        for value in values {
            match Cookie::parse(value) {
                Ok(cookie) => self.store(cookie),
                Err(e) => tracing::debug!(error = %e, "dropping malformed Set-Cookie"),
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    /// Cookie value by name.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|c| c.value.as_str())
    }

    pub fn remove(&mut self, name: &str) -> Option<Cookie> {
        self.cookies.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.cookies.keys().map(String::as_str).collect()
    }

    /// Format the jar as a `Cookie` header for a follow-up request.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .values()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.strip_prefix('.').unwrap_or(domain).to_lowercase()
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

fn parse_cookie_date(date_str: &str) -> Option<DateTime<Utc>> {
    for fmt in [
        "%a, %d %b %Y %H:%M:%S GMT",
        "%a, %d-%b-%Y %H:%M:%S GMT",
        "%a, %d-%b-%y %H:%M:%S GMT",
        "%A, %d-%b-%y %H:%M:%S GMT",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(date_str, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        return Some(dt.with_timezone(&Utc));
    }
    date_str.parse::<i64>().ok().and_then(|ts| Utc.timestamp_opt(ts, 0).single())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn parses_attributes() {
        let cookie = Cookie::parse(
            "sid=abc123; Path=/app; Domain=.Example.COM; Max-Age=3600; Secure; HttpOnly; SameSite=Lax",
        )
        .unwrap();
        assert_eq!(cookie.name, "sid");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.path.as_deref(), Some("/app"));
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
        assert_eq!(cookie.max_age, Some(3600));
        assert!(cookie.secure);
        assert!(cookie.http_only);
        assert_eq!(cookie.same_site, Some(SameSite::Lax));
    }

    #[test]
    fn parses_expires_formats() {
        let cookie = Cookie::parse("a=1; Expires=Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(cookie.expires.map(|d| d.year()), Some(2015));
        assert!(cookie.is_expired());

        let cookie = Cookie::parse("a=1; expires=Sunday, 06-Nov-94 08:49:37 GMT").unwrap();
        assert_eq!(cookie.expires.map(|d| d.month()), Some(11));
    }

    #[test]
    fn malformed_attributes_are_dropped() {
        let cookie = Cookie::parse("a=1; Max-Age=soon; Expires=never; SameSite=Sometimes; Path=/").unwrap();
        assert_eq!(cookie.max_age, None);
        assert_eq!(cookie.expires, None);
        assert_eq!(cookie.same_site, None);
        assert_eq!(cookie.path.as_deref(), Some("/"));
    }

    #[test]
    fn quoted_values_are_unquoted() {
        let cookie = Cookie::parse("token=\"x y\"; Comment=\"hello\"").unwrap();
        assert_eq!(cookie.value, "x y");
        assert_eq!(cookie.comment.as_deref(), Some("hello"));
    }

    #[test]
    fn empty_value_is_allowed() {
        let cookie = Cookie::parse("logout=; Max-Age=0").unwrap();
        assert_eq!(cookie.value, "");
        assert!(cookie.is_expired());
    }

    #[test]
    fn rejects_unusable_pairs() {
        assert!(Cookie::parse("").is_err());
        assert!(Cookie::parse("novalue").is_err());
        assert!(Cookie::parse("=orphan").is_err());
    }

    #[test]
    fn jar_merges_same_name_last_wins() {
        let mut jar = CookieJar::new();
        jar.store_from_headers(["a=1; Path=/; HttpOnly", "a=2; Path=/v2", "b=3"]);
        assert_eq!(jar.len(), 2);
        let a = jar.get("a").unwrap();
        assert_eq!(a.value, "2");
        assert_eq!(a.path.as_deref(), Some("/v2"));
        assert!(a.http_only);
        assert_eq!(jar.value("b"), Some("3"));
    }

    #[test]
    fn jar_skips_malformed_values() {
        let mut jar = CookieJar::new();
        jar.store_from_headers(["garbage", "ok=yes"]);
        assert_eq!(jar.names(), vec!["ok"]);
    }

    #[test]
    fn cookie_header_joins_pairs() {
        let mut jar = CookieJar::new();
        assert!(jar.cookie_header().is_none());
        jar.store(Cookie::new("b", "2"));
        jar.store(Cookie::new("a", "1").with_secure(true));
        assert_eq!(jar.cookie_header().as_deref(), Some("a=1; b=2"));
        assert!(jar.remove("a").is_some());
        assert_eq!(jar.len(), 1);
    }
}
