//! Incoming HTTP request.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Method};

/// The read-only half of a [`Context`](crate::Context): method, path,
/// headers and the peer address. The body is handed over once to the body
/// parser and then lives in the context's storage.
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Bytes>,
    pub(crate) remote: Option<SocketAddr>,
}

impl Request {
    pub(crate) fn from_http(req: http::Request<Bytes>, remote: Option<SocketAddr>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body: Some(body),
            remote,
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Hands the raw body over exactly once.
    pub(crate) fn take_body(&mut self) -> Bytes {
        self.body.take().unwrap_or_default()
    }
}
