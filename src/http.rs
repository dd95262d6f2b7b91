//! Minimal request/response values consumed by the router
//!
//! Transport concerns (wire parsing, header canonicalization, body
//! buffering) belong to the server that builds these values.

use serde::Serialize;
use std::collections::HashMap;

use crate::context::Context;
use crate::route::Method;

/// Status codes the router itself emits.
pub mod status {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const METHOD_NOT_ALLOWED: u16 = 405;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}

/// An inbound request.
#[derive(Debug, Default)]
pub struct Request {
    pub method: Method,
    /// URL path, without the query string
    pub path: String,
    /// Raw query string, without the leading `?`
    pub query: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: String,
    /// Per-request typed store shared by middlewares and handlers
    pub context: Context,
}

impl Request {
    /// Creates a request for `uri`, splitting off any `?query`.
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (uri, None),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            ..Default::default()
        }
    }

    /// Builder-style header setter.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Builder-style body setter.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}

/// An outbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: status::OK,
            headers: HashMap::new(),
            body: String::new(),
        }
    }
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the body.
    pub fn write(&mut self, body: &str) {
        self.body.push_str(body);
    }

    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(key.into(), value.into());
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Serializes `value` as the body and marks it as JSON.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        let body = serde_json::to_string(value)?;
        self.set_header("Content-Type", "application/json");
        self.write(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_splits_query() {
        let req = Request::new(Method::GET, "/search?q=rust&page=2");
        assert_eq!(req.path, "/search");
        assert_eq!(req.query.as_deref(), Some("q=rust&page=2"));

        let req = Request::new(Method::GET, "/plain");
        assert_eq!(req.path, "/plain");
        assert!(req.query.is_none());
    }

    #[test]
    fn test_response_defaults_to_ok() {
        let mut resp = Response::new();
        assert_eq!(resp.status, status::OK);
        resp.write("a");
        resp.write("b");
        assert_eq!(resp.body, "ab");
    }

    #[test]
    fn test_write_json() {
        let mut resp = Response::new();
        resp.write_json(&serde_json::json!({"code": 400})).unwrap();
        assert_eq!(resp.header("Content-Type"), Some("application/json"));
        assert_eq!(resp.body, r#"{"code":400}"#);
    }
}
