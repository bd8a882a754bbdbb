//! HTTP/1.x response builder.
//!
//! A [`Response`] accumulates status, headers, cookies, and body while
//! middleware and handlers work on it, and is serialized exactly once by
//! [`Response::into_bytes`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use thiserror::Error;

use super::{Headers, StatusCode, Version};

/// Errors produced while filling in a response body.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("failed to encode JSON body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An HTTP response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use chc::http::{Response, StatusCode};
///
/// let response = Response::new()
///     .status(StatusCode::CREATED)
///     .header("X-Test", "v")
///     .cookie("s", "1")
///     .body("hi");
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
/// assert!(text.contains("Set-Cookie: s=1\r\n"));
/// assert!(text.ends_with("\r\n\r\nhi"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    version: Version,
    status: StatusCode,
    headers: Headers,
    cookies: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl Response {
    /// Creates an empty `200 OK` response.
    pub fn new() -> Self {
        Self {
            version: Version::Http11,
            status: StatusCode::OK,
            headers: Headers::new(),
            cookies: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    // Canned plain-text replies written by the dispatcher.
    pub(crate) fn plain(status: StatusCode, body: &str) -> Self {
        Self::new()
            .status(status)
            .header("Content-Type", "text/plain")
            .body(body)
    }

    #[must_use]
    pub fn status(mut self, status: impl Into<StatusCode>) -> Self {
        self.status = status.into();
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Sets the body without touching `Content-Type`.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the protocol written on the status line.
    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn set_status_code(&mut self, status: impl Into<StatusCode>) {
        self.status = status.into();
    }

    /// Sets a header in-place, replacing any previous value.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    pub fn set_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Sets the body from raw bytes or text, verbatim.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    /// Sets a text body with `Content-Type: text/plain`.
    pub fn set_string_body(&mut self, body: impl Into<String>) {
        self.body = body.into().into_bytes();
        self.headers.insert("Content-Type", "text/plain");
    }

    /// Encodes `value` as the body with `Content-Type: application/json`.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::Serialization`] if `value` cannot be encoded;
    /// the response is left unchanged in that case.
    pub fn set_json_body<T>(&mut self, value: &T) -> Result<(), ResponseError>
    where
        T: Serialize + ?Sized,
    {
        self.body = serde_json::to_vec(value)?;
        self.headers.insert("Content-Type", "application/json");
        Ok(())
    }

    /// Points the client at `url` via the `Location` header.
    ///
    /// The status code is left alone; set a 3xx code separately.
    pub fn set_redirect(&mut self, url: impl Into<String>) {
        self.headers.insert("Location", url);
    }

    /// Loads an HTML file as the body with `Content-Type: text/html`.
    pub async fn load_html_file(&mut self, path: impl AsRef<Path>) -> Result<(), ResponseError> {
        self.body = read_file(path.as_ref()).await?;
        self.headers.insert("Content-Type", "text/html");
        Ok(())
    }

    /// Loads an image file as the body with `Content-Type: image/png`.
    pub async fn load_image_file(&mut self, path: impl AsRef<Path>) -> Result<(), ResponseError> {
        self.body = read_file(path.as_ref()).await?;
        self.headers.insert("Content-Type", "image/png");
        Ok(())
    }

    /// Reads an image file without attaching it to a response.
    pub async fn image_bytes(path: impl AsRef<Path>) -> Result<Vec<u8>, ResponseError> {
        read_file(path.as_ref()).await
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response into its wire format.
    ///
    /// Nothing is added beyond what was set: no `Content-Length` and no
    /// `Connection` header, since every connection closes after one response.
    pub fn into_bytes(self) -> BytesMut {
        let estimated_size =
            64 + (self.headers.len() + self.cookies.len()) * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "{} {} {}\r\n",
                self.version,
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        buf.put(self.headers.to_string().as_bytes());

        for (name, value) in &self.cookies {
            buf.put(format!("Set-Cookie: {name}={value}\r\n").as_bytes());
        }

        buf.put(&b"\r\n"[..]);
        buf.put(self.body.as_slice());

        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_file(path: &Path) -> Result<Vec<u8>, ResponseError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| ResponseError::Io {
            path: path.to_path_buf(),
            source,
        })
}
