//! Set-Cookie collection (RFC 6265 Section 5.2, parsed leniently).

mod helpers;

use chrono::{TimeZone, Utc};
use helpers::apps::RawApp;
use http::Method;
use wiretest::cookie::SameSite;
use wiretest::{parse_response, Cookie, CookieJar, TestClient};

#[test]
fn test_two_set_cookie_headers_fill_jar() {
    let client = TestClient::new(RawApp::new([&b"HTTP/1.0 200 OK\r\n\
Set-Cookie: session=abc123; Path=/; HttpOnly\r\n\
Set-Cookie: theme=dark; Max-Age=3600\r\n\
Content-Length: 0\r\n\r\n"[..]]))
    .unwrap();
    let resp = client.get("/").send().into_response().unwrap();
    assert_eq!(resp.cookies.len(), 2);
    assert_eq!(resp.cookies.value("session"), Some("abc123"));
    assert_eq!(resp.cookies.value("theme"), Some("dark"));

    let session = resp.cookie("session").unwrap();
    assert_eq!(session.path.as_deref(), Some("/"));
    assert!(session.http_only);
    assert_eq!(resp.cookie("theme").unwrap().max_age, Some(3600));
}

#[test]
fn test_repeated_name_merges_attributes() {
    let resp = parse_response(
        &Method::GET,
        b"HTTP/1.0 200 OK\r\nSet-Cookie: id=1; Domain=.example.com\r\nSet-Cookie: id=2; Secure\r\n\r\n",
    )
    .unwrap();
    let id = resp.cookie("id").unwrap();
    assert_eq!(id.value, "2");
    assert_eq!(id.domain.as_deref(), Some("example.com"));
    assert!(id.secure);
    assert_eq!(resp.cookies.len(), 1);
}

#[test]
fn test_malformed_cookie_is_skipped() {
    helpers::init_tracing();
    let resp = parse_response(
        &Method::GET,
        b"HTTP/1.0 200 OK\r\nSet-Cookie: novalue\r\nSet-Cookie: ok=yes\r\n\r\n",
    )
    .unwrap();
    assert_eq!(resp.cookies.names(), vec!["ok"]);
}

#[test]
fn test_expires_and_samesite_attributes() {
    let cookie = Cookie::parse("sid=\"quoted\"; Expires=Wed, 21 Oct 2015 07:28:00 GMT; SameSite=Lax").unwrap();
    assert_eq!(cookie.value, "quoted");
    assert_eq!(cookie.expires, Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap()));
    assert_eq!(cookie.same_site, Some(SameSite::Lax));
    assert!(cookie.is_expired());
}

#[test]
fn test_unparseable_attribute_keeps_cookie() {
    let cookie = Cookie::parse("a=b; Expires=someday; Max-Age=soon; SameSite=Sometimes").unwrap();
    assert_eq!(cookie.value, "b");
    assert!(cookie.expires.is_none());
    assert!(cookie.max_age.is_none());
    assert!(cookie.same_site.is_none());
}

#[test]
fn test_jar_cookie_header_for_follow_up() {
    let mut jar = CookieJar::new();
    assert!(jar.cookie_header().is_none());
    jar.store(Cookie::new("b", "2"));
    jar.store(Cookie::new("a", "1"));
    assert_eq!(jar.cookie_header().as_deref(), Some("a=1; b=2"));
}
