//! In-memory transport for exercising the client and its consumers
//! without a DSS instance.
//!
//! Routes are keyed by method and path. Each route holds a queue of
//! replies; the last reply is sticky so polling loops settle on it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::client::DssClient;
use crate::error::{Error, Result};
use crate::transport::{ApiRequest, Transport};

#[derive(Debug, Clone)]
enum Reply {
    Ok(Value),
    Fail { status: u16, message: String },
}

#[derive(Default)]
struct Inner {
    routes: HashMap<(Method, String), VecDeque<Reply>>,
    requests: Vec<ApiRequest>,
}

/// Scriptable [`Transport`]. Cloning shares the same routes and log.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, reply: Reply) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .routes
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Queue a JSON reply for `method path`.
    pub fn on(&self, method: Method, path: &str, body: Value) -> &Self {
        self.push(method, path, Reply::Ok(body));
        self
    }

    pub fn on_get(&self, path: &str, body: Value) -> &Self {
        self.on(Method::GET, path, body)
    }

    pub fn on_post(&self, path: &str, body: Value) -> &Self {
        self.on(Method::POST, path, body)
    }

    pub fn on_put(&self, path: &str, body: Value) -> &Self {
        self.on(Method::PUT, path, body)
    }

    pub fn on_delete(&self, path: &str, body: Value) -> &Self {
        self.on(Method::DELETE, path, body)
    }

    /// Queue an API failure for `method path`.
    pub fn fail(&self, method: Method, path: &str, status: u16, message: &str) -> &Self {
        self.push(
            method,
            path,
            Reply::Fail {
                status,
                message: message.to_string(),
            },
        );
        self
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .requests
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .requests
            .len()
    }

    /// Requests matching a method and path.
    pub fn requests_to(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    /// Body of the last request to `method path`.
    pub fn last_body(&self, method: Method, path: &str) -> Option<Value> {
        self.requests_to(method, path)
            .into_iter()
            .last()
            .and_then(|r| r.body)
    }

    /// A [`DssClient`] wired to this transport with no poll delay.
    pub fn client(&self) -> DssClient {
        DssClient::with_transport(Arc::new(self.clone()))
            .with_poll_interval(std::time::Duration::ZERO)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.requests.push(request.clone());

        let key = (request.method.clone(), request.path.clone());
        let reply = match inner.routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        match reply {
            Some(Reply::Ok(value)) => Ok(value),
            Some(Reply::Fail { status, message }) => Err(Error::Api { status, message }),
            None => Err(Error::Api {
                status: 404,
                message: format!("no mock for {} {}", request.method, request.path),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn last_reply_is_sticky() {
        let mock = MockTransport::new();
        mock.on_get("/a", json!(1)).on_get("/a", json!(2));

        assert_eq!(mock.send(ApiRequest::get("/a")).await.unwrap(), json!(1));
        assert_eq!(mock.send(ApiRequest::get("/a")).await.unwrap(), json!(2));
        assert_eq!(mock.send(ApiRequest::get("/a")).await.unwrap(), json!(2));
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn unknown_route_fails_with_404() {
        let mock = MockTransport::new();
        let err = mock.send(ApiRequest::get("/missing")).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn failures_surface_as_api_errors() {
        let mock = MockTransport::new();
        mock.fail(Method::DELETE, "/x", 500, "boom");
        let err = mock.send(ApiRequest::delete("/x")).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
