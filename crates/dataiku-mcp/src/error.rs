//! Error type for tool handlers and the `{status, message}` envelope.
//!
//! Tool handlers never propagate failures to the protocol layer. Every
//! error is folded into a JSON object with `"status": "error"`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Result type for MCP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Problem-details style error carried through tool handlers.
#[derive(Debug, Error, Serialize, Deserialize, Clone)]
#[error("{message}")]
pub struct Error {
    /// HTTP status-like code (400 caller mistake, 502 DSS failure, 500 ours)
    pub code: i32,

    /// Human-readable error message
    pub message: String,

    /// Machine-readable problem type URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// Additional error context (parameter name, object name, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl Error {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            r#type: None,
            context: None,
        }
    }

    pub fn with_type(mut self, type_uri: impl Into<String>) -> Self {
        self.r#type = Some(type_uri.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Caller supplied an unusable argument. The message is shown verbatim.
    pub fn invalid_param(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(400, message)
            .with_type("https://dataiku-mcp.local/errors/invalid-parameter")
            .with_context(json!({ "parameter": param.into() }))
    }

    /// A named object or index does not exist. The message is shown verbatim.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(404, message).with_type("https://dataiku-mcp.local/errors/not-found")
    }

    /// The DSS instance rejected or failed a call.
    pub fn upstream(err: dataiku_client::Error) -> Self {
        let status = err.status();
        let err = Self::new(502, err.to_string())
            .with_type("https://dataiku-mcp.local/errors/upstream");
        match status {
            Some(status) => err.with_context(json!({ "dss_status": status })),
            None => err,
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(500, reason).with_type("https://dataiku-mcp.local/errors/internal")
    }

    /// Whether the message should be shown without an operation prefix.
    pub fn is_caller_facing(&self) -> bool {
        matches!(self.code, 400 | 404)
    }

    /// Fold into `{"status": "error", "message": ...}`.
    ///
    /// Upstream and internal failures get `context` as a prefix, e.g.
    /// `Failed to delete recipe 'r': <cause>`.
    pub fn envelope(&self, context: &str) -> Value {
        let message = if self.is_caller_facing() || context.is_empty() {
            self.message.clone()
        } else {
            format!("{context}: {}", self.message)
        };
        json!({ "status": "error", "message": message })
    }
}

impl From<dataiku_client::Error> for Error {
    fn from(err: dataiku_client::Error) -> Self {
        Error::upstream(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::internal(format!("JSON error: {err}"))
    }
}

/// Collapse a handler result into the value returned to the caller.
pub fn into_response(result: Result<Value>, context: &str) -> Value {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(code = err.code, error = %err.message, "{context}");
            err.envelope(context)
        }
    }
}

/// Convenience for handlers that answer with an error without failing.
pub fn failure(message: impl Into<String>) -> Value {
    json!({ "status": "error", "message": message.into() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_keep_their_message() {
        let env = Error::invalid_param("build_mode", "Invalid build_mode.").envelope("Failed to run");
        assert_eq!(env, json!({"status": "error", "message": "Invalid build_mode."}));
    }

    #[test]
    fn upstream_errors_are_prefixed() {
        let err: Error = dataiku_client::Error::Api {
            status: 500,
            message: "boom".into(),
        }
        .into();
        assert_eq!(err.code, 502);
        let env = err.envelope("Failed to delete recipe 'r'");
        let msg = env["message"].as_str().unwrap();
        assert!(msg.starts_with("Failed to delete recipe 'r': "));
        assert!(msg.contains("boom"));
        assert_eq!(err.context, Some(json!({"dss_status": 500})));
    }

    #[test]
    fn into_response_passes_success_through() {
        let ok = into_response(Ok(json!({"status": "ok"})), "ctx");
        assert_eq!(ok["status"], "ok");
        let err = into_response(Err(Error::internal("x")), "");
        assert_eq!(err, json!({"status": "error", "message": "x"}));
    }

    #[test]
    fn test_error_serialization() {
        let err = Error::new(400, "test")
            .with_type("test/type")
            .with_context(json!({"key": "value"}));
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("400"));
        assert!(json.contains("test/type"));
    }
}
