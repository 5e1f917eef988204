use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::transport::{ApiRequest, ResponseKind, Transport};

/// [`Transport`] backed by `reqwest`, authenticating with the API key.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("dataiku-mcp/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure_tls)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, path = %request.path, "dss request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .basic_auth(&self.api_key, Some(""))
            .header(ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("json"))
            .unwrap_or(false);
        let body = response.text().await?;

        if !status.is_success() {
            let message = extract_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            warn!(status = status.as_u16(), path = %request.path, %message, "dss request failed");
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(decode_body(body, request.response, is_json))
    }
}

/// DSS error payloads carry a `message` field. `detailedMessage` is used
/// only when `message` is missing.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("detailedMessage"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn decode_body(body: String, kind: ResponseKind, is_json: bool) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    match kind {
        ResponseKind::Text => Value::String(body),
        ResponseKind::Json => match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(err) => {
                if is_json {
                    warn!(error = %err, "response advertised JSON but did not parse");
                }
                Value::String(body)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_message_prefers_message_field() {
        let body = r#"{"message":"short","detailedMessage":"long form"}"#;
        assert_eq!(extract_message(body).as_deref(), Some("short"));
        let body = r#"{"detailedMessage":"long form"}"#;
        assert_eq!(extract_message(body).as_deref(), Some("long form"));
        assert_eq!(extract_message("<html>"), None);
    }

    #[test]
    fn bodies_decode_by_kind() {
        assert_eq!(
            decode_body("{\"a\":1}".into(), ResponseKind::Json, true),
            json!({"a": 1})
        );
        assert_eq!(
            decode_body("1\t2\n".into(), ResponseKind::Text, false),
            json!("1\t2\n")
        );
        assert_eq!(
            decode_body("plain text".into(), ResponseKind::Json, false),
            json!("plain text")
        );
        assert_eq!(decode_body("  ".into(), ResponseKind::Json, false), Value::Null);
    }
}
