//! HTTP request type.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::{Result, RouterError};
use crate::path::{extract_params, PARAM_SIGIL};

/// HTTP request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// GET method
    Get,
    /// POST method
    Post,
    /// PUT method
    Put,
    /// PATCH method
    Patch,
    /// DELETE method
    Delete,
    /// HEAD method
    Head,
    /// OPTIONS method
    Options,
}

impl Method {
    /// Returns the method as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl FromStr for Method {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(RouterError::UnknownMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path parameters extracted from the URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: HashMap<String, String>,
}

impl PathParams {
    /// Creates new empty path params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Gets a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Parses a parameter as a specific type.
    pub fn parse<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Returns an iterator over the parameters.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Raw request body bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body(Vec<u8>);

impl Body {
    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the body as UTF-8 text, if valid.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Deserializes the body as JSON.
    pub fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.0)?)
    }

    /// Deserializes the body as JSON, panicking on malformed input.
    ///
    /// # Panics
    ///
    /// Panics when the body is not valid JSON for `T`.
    pub fn must_bind<T: DeserializeOwned>(&self) -> T {
        self.bind()
            .unwrap_or_else(|e| panic!("failed to bind request body: {e}"))
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// An HTTP request as seen by handlers.
///
/// The router fills in the matched route template before calling the
/// handler chain. Path parameters and the body are produced on first access
/// and cached for the rest of the request.
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Escaped request path, without the query string.
    pub path: String,
    /// Query string parameters.
    pub query: HashMap<String, String>,
    /// Request headers.
    pub headers: HashMap<String, String>,
    route: Option<Arc<str>>,
    params: OnceCell<PathParams>,
    body: Body,
    reader: Option<Box<dyn Read + Send>>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("route", &self.route)
            .finish_non_exhaustive()
    }
}

impl Request {
    /// Creates a new request from a method and request target.
    ///
    /// Anything after `?` is decoded into [`Request::query`]; the path itself
    /// is kept escaped, exactly as it is matched.
    pub fn new(method: Method, target: impl AsRef<str>) -> Self {
        let target = target.as_ref();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Self::parse_query_string(query)),
            None => (target, HashMap::new()),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            headers: HashMap::new(),
            route: None,
            params: OnceCell::new(),
            body: Body::default(),
            reader: None,
        }
    }

    /// Creates a GET request.
    pub fn get(target: impl AsRef<str>) -> Self {
        Self::new(Method::Get, target)
    }

    /// Creates a POST request.
    pub fn post(target: impl AsRef<str>) -> Self {
        Self::new(Method::Post, target)
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets an in-memory body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Body(body.into());
        self.reader = None;
        self
    }

    /// Sets a body that is read only when a handler asks for it.
    #[must_use]
    pub fn body_reader(mut self, reader: impl Read + Send + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    /// Gets a header value.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Gets a query parameter.
    pub fn get_query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Returns the template of the matched route, e.g. `/users/:id`.
    ///
    /// `None` until the router has resolved the request.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub(crate) fn set_route(&mut self, route: Option<Arc<str>>) {
        self.route = route;
        self.params = OnceCell::new();
    }

    /// Returns the path parameters, computing them on first call.
    ///
    /// Empty when the matched template has no parameters.
    pub fn params(&self) -> &PathParams {
        self.params.get_or_init(|| match self.route.as_deref() {
            Some(route) if route.contains(PARAM_SIGIL) => extract_params(route, &self.path),
            _ => PathParams::new(),
        })
    }

    /// Gets a single path parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params().get(key)
    }

    /// Returns the body, reading it from its source on first call.
    ///
    /// A failed read leaves the body empty and returns the I/O error.
    pub fn parse_body(&mut self) -> Result<&Body> {
        if let Some(mut reader) = self.reader.take() {
            let mut bytes = Vec::new();
            let read = reader.read_to_end(&mut bytes);
            self.body = Body(bytes);
            read?;
        }
        Ok(&self.body)
    }

    /// Returns the body, panicking if it cannot be read.
    ///
    /// # Panics
    ///
    /// Panics when the body source fails.
    pub fn must_parse_body(&mut self) -> &Body {
        self.parse_body()
            .unwrap_or_else(|e| panic!("failed to read request body: {e}"))
    }

    /// Parses query parameters from a query string.
    pub fn parse_query_string(query: &str) -> HashMap<String, String> {
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter_map(|pair| {
                let mut parts = pair.splitn(2, '=');
                let key = parts.next()?;
                let value = parts.next().unwrap_or("");
                Some((urlencoding_decode(key), urlencoding_decode(value)))
            })
            .collect()
    }
}

/// Simple URL decoding for query components.
fn urlencoding_decode(s: &str) -> String {
    let mut bytes = Vec::with_capacity(s.len());
    let mut rest = s.as_bytes();

    while let Some((&b, tail)) = rest.split_first() {
        match b {
            b'%' => {
                let decoded = tail
                    .get(..2)
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = decoded {
                    bytes.push(byte);
                    rest = &tail[2..];
                    continue;
                }
                bytes.push(b'%');
            }
            b'+' => bytes.push(b' '),
            _ => bytes.push(b),
        }
        rest = tail;
    }

    String::from_utf8_lossy(&bytes).into_owned()
}
