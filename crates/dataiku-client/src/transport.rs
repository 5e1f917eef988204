//! Request plumbing shared by the real HTTP client and test doubles.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::Result;

/// How the response body should be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    /// Parse as JSON; non-JSON bodies come back as `Value::String`.
    #[default]
    Json,
    /// Always return the raw body as `Value::String`.
    Text,
}

/// One call against the public API, relative to `/public/api`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub response: ResponseKind,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            response: ResponseKind::Json,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn text(mut self) -> Self {
        self.response = ResponseKind::Text;
        self
    }
}

/// Something that can execute [`ApiRequest`]s.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value>;
}

/// Percent-encode a single path segment (object names may contain spaces).
pub fn segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_collects_parts() {
        let req = ApiRequest::delete("/projects/P/datasets/d")
            .query("dropData", true)
            .json(json!({"a": 1}));
        assert_eq!(req.method, Method::DELETE);
        assert_eq!(req.query, vec![("dropData".to_string(), "true".to_string())]);
        assert_eq!(req.body, Some(json!({"a": 1})));
        assert_eq!(req.response, ResponseKind::Json);
        assert_eq!(ApiRequest::get("/x").text().response, ResponseKind::Text);
    }

    #[test]
    fn segment_escapes_reserved_characters() {
        assert_eq!(segment("my dataset/v2"), "my%20dataset%2Fv2");
        assert_eq!(segment("plain_name-1.0"), "plain_name-1.0");
    }
}
