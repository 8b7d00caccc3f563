//! Buffered HTTP response and the transports it is flushed to.

use std::collections::HashMap;
use std::io::{self, Write};

use serde::Serialize;

use crate::error::Result;
use crate::request::Method;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// The value most recently buffered into a [`Response`].
///
/// Lets middleware inspect what the inner handler produced before the
/// router flushes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// Nothing has been sent.
    #[default]
    Empty,
    /// Raw bytes from [`Response::send_bytes`].
    Bytes,
    /// Text from [`Response::send_string`].
    Text(String),
    /// The value given to [`Response::send_json`].
    Json(serde_json::Value),
}

/// A response under construction.
///
/// Nothing reaches the transport until the router flushes it after the
/// whole middleware and handler chain has returned. Status and body are
/// last-write-wins.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HashMap<String, String>,
    body: Vec<u8>,
    payload: Payload,
}

impl Response {
    /// Creates a new response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
            payload: Payload::Empty,
        }
    }

    /// Creates a 200 OK response.
    pub fn ok() -> Self {
        Self::new(200)
    }

    /// Creates a redirect response.
    pub fn redirect(url: impl Into<String>) -> Self {
        let mut res = Self::new(302);
        res.set_header("Location", url);
        res
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        let mut res = Self::new(404);
        res.send_string("404 page not found\n");
        res
    }

    /// Creates a 405 Method Not Allowed response.
    ///
    /// `allowed` becomes the `Allow` header unless it is empty.
    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let mut res = Self::new(405);
        if !allowed.is_empty() {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            res.set_header("Allow", allow);
        }
        res
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_server_error() -> Self {
        let mut res = Self::new(500);
        res.send_string("Internal Server Error");
        res
    }

    /// Sets the pending status code.
    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }

    /// Returns the pending status code.
    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// Sets a header, replacing any existing value under a case-insensitive match.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&key));
        self.headers.insert(key, value.into());
        self
    }

    /// Gets a header value.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns all headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Buffers raw bytes as the body.
    pub fn send_bytes(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        self.payload = Payload::Bytes;
    }

    /// Buffers text as the body, defaulting the content type to plain text.
    pub fn send_string(&mut self, body: impl Into<String>) {
        let body = body.into();
        if self.get_header("Content-Type").is_none() {
            self.set_header("Content-Type", TEXT_PLAIN);
        }
        self.body = body.clone().into_bytes();
        self.payload = Payload::Text(body);
    }

    /// Serializes `value` as JSON and buffers it as the body.
    ///
    /// On error the previous body is left untouched.
    pub fn send_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let body = serde_json::to_vec(&value)?;
        self.set_header("Content-Type", APPLICATION_JSON);
        self.body = body;
        self.payload = Payload::Json(value);
        Ok(())
    }

    /// Like [`Response::send_json`], but panics when serialization fails.
    ///
    /// # Panics
    ///
    /// Panics when `value` cannot be represented as JSON.
    pub fn must_send_json<T: Serialize + ?Sized>(&mut self, value: &T) {
        if let Err(e) = self.send_json(value) {
            panic!("failed to send json: {e}");
        }
    }

    /// Returns what was most recently buffered.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Returns the buffered body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns the body as a string.
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Returns the status text for the current status code.
    pub fn status_text(&self) -> &'static str {
        status_text(self.status)
    }

    /// Writes the head, then the body. Consumes the buffer so a response
    /// cannot be flushed twice.
    pub(crate) fn flush<T: Transport + ?Sized>(self, transport: &mut T) -> io::Result<()> {
        transport.write_head(self.status, &self.headers, self.body.len())?;
        transport.write_body(&self.body)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

/// Reason phrase for a status code.
pub fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// The connection side a response is flushed to.
///
/// The router calls `write_head` then `write_body`, once each, per request.
pub trait Transport {
    /// Writes the status line and headers.
    fn write_head(
        &mut self,
        status: u16,
        headers: &HashMap<String, String>,
        content_length: usize,
    ) -> io::Result<()>;

    /// Writes the body.
    fn write_body(&mut self, body: &[u8]) -> io::Result<()>;
}

/// In-memory transport that records what was flushed.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    /// Status written by the last flush.
    pub status: Option<u16>,
    /// Headers written by the last flush.
    pub headers: HashMap<String, String>,
    /// Body bytes written.
    pub body: Vec<u8>,
    /// Number of heads written.
    pub flushes: usize,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a recorded header value.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the recorded body as a string.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl Transport for Recorder {
    fn write_head(
        &mut self,
        status: u16,
        headers: &HashMap<String, String>,
        _content_length: usize,
    ) -> io::Result<()> {
        self.status = Some(status);
        self.headers.clone_from(headers);
        self.flushes += 1;
        Ok(())
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(body);
        Ok(())
    }
}

/// Serializes responses as HTTP/1.1 onto any byte stream.
#[derive(Debug)]
pub struct Http1Writer<W> {
    inner: W,
}

impl<W: Write> Http1Writer<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Transport for Http1Writer<W> {
    fn write_head(
        &mut self,
        status: u16,
        headers: &HashMap<String, String>,
        content_length: usize,
    ) -> io::Result<()> {
        let mut head = format!("HTTP/1.1 {status} {}\r\n", status_text(status));
        let mut sorted: Vec<_> = headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("Content-Length"))
            .collect();
        sorted.sort();
        for (key, value) in sorted {
            head.push_str(&format!("{key}: {value}\r\n"));
        }
        head.push_str(&format!("Content-Length: {content_length}\r\n\r\n"));
        self.inner.write_all(head.as_bytes())
    }

    fn write_body(&mut self, body: &[u8]) -> io::Result<()> {
        self.inner.write_all(body)?;
        self.inner.flush()
    }
}
