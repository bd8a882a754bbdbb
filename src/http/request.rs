//! Best-effort, line-oriented HTTP/1.x request parsing.
//!
//! The parser never rejects a request for bad syntax. Fields it cannot make
//! sense of are left empty, and header, cookie, and query fragments that do not
//! split into exactly one key and one value are dropped. The only hard failure
//! is a buffer with no blank line, since there is then no body to delimit.
//!
//! Only the head is decoded as text. The body keeps the bytes exactly as read.

use std::borrow::Cow;
use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method, Response, Version};

type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Separates the request head from the body.
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Errors that can occur while parsing a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("malformed request: no blank line separating headers from body")]
    Malformed,
}

/// A parsed HTTP request.
///
/// Created by [`Request::parse`] from the bytes of a single socket read.
///
/// # Examples
///
/// ```
/// use chc::http::{Method, Request};
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\nCookie: s=1\r\n\r\n";
/// let request = Request::parse(raw, None).unwrap();
///
/// assert_eq!(request.method(), Some(Method::Get));
/// assert_eq!(request.url(), "/hello");
/// assert_eq!(request.param("name"), Some("world"));
/// assert_eq!(request.header("host"), Some("localhost"));
/// assert_eq!(request.cookie("s"), Some("1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Option<Method>,
    url: String,
    version: Option<Version>,
    headers: Headers,
    cookies: HashMap<String, String>,
    params: HashMap<String, String>,
    body: Bytes,
    peer_addr: Option<SocketAddr>,
}

impl Request {
    /// Parses a raw request buffer received from `peer_addr`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Malformed`] if `buf` contains no `\r\n\r\n`.
    pub fn parse(buf: &[u8], peer_addr: Option<SocketAddr>) -> Result<Self, RequestError> {
        let split = buf
            .windows(HEAD_TERMINATOR.len())
            .position(|window| window == HEAD_TERMINATOR)
            .ok_or(RequestError::Malformed)?;
        let head = String::from_utf8_lossy(&buf[..split]);
        let body = &buf[split + HEAD_TERMINATOR.len()..];

        let lines: Vec<&str> = head
            .split('\n')
            .filter(|line| !line.is_empty() && *line != "\r")
            .collect();

        let (method, version, target) = match lines.first() {
            Some(line) => parse_request_line(line),
            None => (None, None, String::new()),
        };
        let (url, params) = split_query(&target);

        Ok(Self {
            method,
            url,
            version,
            headers: parse_headers(&lines),
            cookies: parse_cookies(&lines),
            params,
            body: Bytes::copy_from_slice(body),
            peer_addr,
        })
    }

    /// Returns the request method, or `None` if the request line started with
    /// an unrecognized token.
    pub fn method(&self) -> Option<Method> {
        self.method
    }

    /// Returns the request path without its query string.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the declared protocol version, if the request line carried one.
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    /// Returns the protocol token, or `""` when none was declared.
    pub fn protocol(&self) -> &'static str {
        self.version.map(|v| v.as_str()).unwrap_or("")
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Returns a query parameter value by key.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns everything after the first blank line, verbatim.
    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Returns the body as text. Invalid UTF-8 sequences become U+FFFD.
    pub fn body(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Returns the address of the peer this request was read from.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Creates an empty `200` response that answers with this request's protocol.
    pub fn new_response(&self) -> Response {
        Response::new().with_version(self.version.unwrap_or_default())
    }

    /// Decodes the body as JSON into any deserializable type.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(&self.body)
    }

    /// Decodes the body as a JSON array of objects.
    pub fn json_array(&self) -> Result<Vec<JsonObject>, serde_json::Error> {
        self.json()
    }

    /// Decodes a `key=value&key2=value2` body.
    ///
    /// Pairs that do not split into exactly two parts are skipped.
    pub fn form_data(&self) -> HashMap<String, String> {
        parse_pairs(&self.body(), '&')
    }
}

// Only the request line is consulted for method, protocol, and target. A line
// with an unrecognized method yields nothing at all.
fn parse_request_line(line: &str) -> (Option<Method>, Option<Version>, String) {
    let Some(method) = Method::from_prefix(line) else {
        return (None, None, String::new());
    };
    let version = Version::find_in(line);

    let mut target = line.replacen(method.as_str(), "", 1);
    if let Some(version) = version {
        target = target.replacen(version.as_str(), "", 1);
    }

    (Some(method), version, target.trim().to_owned())
}

fn parse_headers(lines: &[&str]) -> Headers {
    let mut headers = Headers::new();
    for line in lines {
        let Some((name, value)) = split_exact(line, ':') else {
            continue;
        };
        let name = name.trim();
        if name == "Cookie" {
            continue;
        }
        headers.insert(name, value.trim());
    }
    headers
}

// First line mentioning `Cookie:` wins; later cookie lines are ignored.
fn parse_cookies(lines: &[&str]) -> HashMap<String, String> {
    let Some(&line) = lines.iter().find(|line| line.contains("Cookie:")) else {
        return HashMap::new();
    };
    let line = line.strip_prefix("Cookie:").unwrap_or(line).trim();

    line.split(';')
        .filter_map(|piece| split_exact(piece.trim(), '='))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

// Returns the clean path and its query parameters. A target without any of
// `?`, `=`, `&` is returned untouched.
fn split_query(target: &str) -> (String, HashMap<String, String>) {
    if !target.contains(['?', '=', '&']) {
        return (target.to_owned(), HashMap::new());
    }
    match target.split_once('?') {
        Some((path, query)) => (path.to_owned(), parse_pairs(query, '&')),
        None => (target.to_owned(), HashMap::new()),
    }
}

fn parse_pairs(input: &str, separator: char) -> HashMap<String, String> {
    input
        .split(separator)
        .filter_map(|pair| split_exact(pair, '='))
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

/// Splits `input` on `sep`, succeeding only when there are exactly two parts.
fn split_exact(input: &str, sep: char) -> Option<(&str, &str)> {
    let mut parts = input.split(sep);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(key), Some(value), None) => Some((key, value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Request {
        Request::parse(raw.as_bytes(), None).unwrap()
    }

    #[test]
    fn parse_simple_get() {
        let req = parse("GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        assert_eq!(req.method(), Some(Method::Get));
        assert_eq!(req.url(), "/");
        assert_eq!(req.version(), Some(Version::Http11));
        assert_eq!(req.protocol(), "HTTP/1.1");
        assert_eq!(req.header("Host"), Some("localhost"));
        assert_eq!(req.body(), "");
    }

    #[test]
    fn every_method_is_recognized() {
        for method in Method::ALL {
            let req = parse(&format!("{method} /x HTTP/1.0\r\n\r\n"));
            assert_eq!(req.method(), Some(method));
            assert_eq!(req.url(), "/x");
            assert_eq!(req.version(), Some(Version::Http10));
        }
    }

    #[test]
    fn unknown_method_leaves_fields_empty() {
        let req = parse("BREW /pot HTTP/1.1\r\nHost: a\r\n\r\n");
        assert_eq!(req.method(), None);
        assert_eq!(req.url(), "");
        assert_eq!(req.version(), None);
        assert_eq!(req.header("host"), Some("a"));
    }

    #[test]
    fn missing_protocol_keeps_target() {
        let req = parse("GET /legacy\r\n\r\n");
        assert_eq!(req.method(), Some(Method::Get));
        assert_eq!(req.version(), None);
        assert_eq!(req.protocol(), "");
        assert_eq!(req.url(), "/legacy");
    }

    #[test]
    fn missing_separator_is_malformed() {
        let err = Request::parse(b"GET / HTTP/1.1\r\nHost: localhost\r\n", None).unwrap_err();
        assert_eq!(err, RequestError::Malformed);
    }

    #[test]
    fn query_string_is_split_from_path() {
        let req = parse("GET /path?a=1&b=2 HTTP/1.1\r\n\r\n");
        assert_eq!(req.url(), "/path");
        assert_eq!(req.query_params().len(), 2);
        assert_eq!(req.param("a"), Some("1"));
        assert_eq!(req.param("b"), Some("2"));
    }

    #[test]
    fn malformed_query_pair_is_dropped() {
        let req = parse("GET /path?a=1&c=1=2&flag HTTP/1.1\r\n\r\n");
        assert_eq!(req.url(), "/path");
        assert_eq!(req.param("a"), Some("1"));
        assert_eq!(req.param("c"), None);
        assert_eq!(req.param("flag"), None);
    }

    #[test]
    fn target_without_question_mark_keeps_equals() {
        let req = parse("GET /a=b HTTP/1.1\r\n\r\n");
        assert_eq!(req.url(), "/a=b");
        assert!(req.query_params().is_empty());
    }

    #[test]
    fn cookies_are_parsed_and_excluded_from_headers() {
        let req = parse("GET / HTTP/1.1\r\nCookie: x=1; y=2\r\nAccept: */*\r\n\r\n");
        assert_eq!(req.cookies().len(), 2);
        assert_eq!(req.cookie("x"), Some("1"));
        assert_eq!(req.cookie("y"), Some("2"));
        assert!(!req.headers().contains("Cookie"));
        assert_eq!(req.header("Accept"), Some("*/*"));
    }

    #[test]
    fn only_first_cookie_line_counts() {
        let req = parse("GET / HTTP/1.1\r\nCookie: a=1\r\nCookie: b=2\r\n\r\n");
        assert_eq!(req.cookie("a"), Some("1"));
        assert_eq!(req.cookie("b"), None);
    }

    #[test]
    fn no_cookie_line_yields_empty_map() {
        let req = parse("GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        assert!(req.cookies().is_empty());
    }

    #[test]
    fn header_with_extra_colon_is_dropped() {
        let req = parse("GET / HTTP/1.1\r\nHost: localhost:8080\r\nX-Ok: yes\r\n\r\n");
        assert_eq!(req.header("Host"), None);
        assert_eq!(req.header("X-Ok"), Some("yes"));
    }

    #[test]
    fn body_is_everything_after_first_blank_line() {
        let req = parse("POST /submit HTTP/1.1\r\nContent-Type: text/plain\r\n\r\nline one\r\n\r\nline two");
        assert_eq!(req.method(), Some(Method::Post));
        assert_eq!(req.body(), "line one\r\n\r\nline two");
    }

    #[test]
    fn binary_body_is_kept_verbatim() {
        let mut raw = b"POST /up HTTP/1.1\r\nContent-Type: image/png\r\n\r\n".to_vec();
        raw.extend_from_slice(&[0x89, b'P', b'N', b'G', 0xff, 0x00]);

        let req = Request::parse(&raw, None).unwrap();
        assert_eq!(req.url(), "/up");
        assert_eq!(req.header("Content-Type"), Some("image/png"));
        assert_eq!(req.body_bytes(), &[0x89, b'P', b'N', b'G', 0xff, 0x00]);
    }

    #[test]
    fn character_cut_by_read_boundary_survives_in_bytes() {
        // First byte of a two-byte "é".
        let raw = b"POST /t HTTP/1.1\r\n\r\ncaf\xc3";
        let req = Request::parse(raw, None).unwrap();
        assert_eq!(req.body_bytes(), b"caf\xc3");
        assert_eq!(req.body(), "caf\u{fffd}");
    }

    #[test]
    fn body_lines_are_not_parsed_as_headers() {
        let req = parse("POST / HTTP/1.1\r\n\r\nX-Injected: nope");
        assert_eq!(req.header("X-Injected"), None);
    }

    #[test]
    fn parsing_is_idempotent() {
        let raw = b"PUT /items?id=7 HTTP/1.1\r\nHost: h\r\nCookie: k=v\r\n\r\n{\"a\":1}";
        let first = Request::parse(raw, None).unwrap();
        let second = Request::parse(raw, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn json_body() {
        let req = parse("POST /j HTTP/1.1\r\n\r\n{\"name\":\"chc\",\"n\":3}");
        let value: serde_json::Value = req.json().unwrap();
        assert_eq!(value["name"], "chc");
        assert_eq!(value["n"], 3);

        let bad = parse("POST /j HTTP/1.1\r\n\r\nnot json");
        assert!(bad.json::<serde_json::Value>().is_err());
    }

    #[test]
    fn json_array_body() {
        let req = parse("POST /j HTTP/1.1\r\n\r\n[{\"id\":1},{\"id\":2}]");
        let items = req.json_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["id"], 2);

        let object = parse("POST /j HTTP/1.1\r\n\r\n{\"id\":1}");
        assert!(object.json_array().is_err());
    }

    #[test]
    fn form_data_body() {
        let req = parse("POST /f HTTP/1.1\r\n\r\nuser=ann&role=admin&broken");
        let form = req.form_data();
        assert_eq!(form.get("user").map(String::as_str), Some("ann"));
        assert_eq!(form.get("role").map(String::as_str), Some("admin"));
        assert_eq!(form.len(), 2);
    }

    #[test]
    fn new_response_inherits_protocol() {
        let req = parse("GET / HTTP/1.0\r\n\r\n");
        assert_eq!(req.new_response().version(), Version::Http10);
    }
}
