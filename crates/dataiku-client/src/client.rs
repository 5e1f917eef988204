use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::HttpTransport;
use crate::project::Project;
use crate::transport::{segment, ApiRequest, Transport};

/// Entry point to a DSS instance.
///
/// Cheap to clone; every handle it hands out shares the same transport.
#[derive(Clone)]
pub struct DssClient {
    transport: Arc<dyn Transport>,
    poll_interval: Duration,
}

impl DssClient {
    /// Build an HTTP client for `config` and verify it with a round-trip to
    /// `/instance-info`.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let wrap = |source: Error| Error::Connection {
            host: config.host.clone(),
            source: Box::new(source),
        };

        let transport = HttpTransport::new(&config).map_err(wrap)?;
        let client = Self {
            transport: Arc::new(transport),
            poll_interval: config.poll_interval,
        };

        let info = client.instance_info().await.map_err(wrap)?;
        let version = dss_version(&info);
        info!(host = %config.host, %version, "connected to DSS");
        Ok(client)
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub(crate) async fn send(&self, request: ApiRequest) -> Result<Value> {
        self.transport.send(request).await
    }

    pub(crate) async fn get(&self, path: impl Into<String>) -> Result<Value> {
        self.send(ApiRequest::get(path)).await
    }

    pub(crate) async fn get_list(&self, path: impl Into<String>) -> Result<Vec<Value>> {
        as_list(self.get(path).await?)
    }

    pub(crate) async fn put(&self, path: impl Into<String>, body: Value) -> Result<Value> {
        self.send(ApiRequest::put(path).json(body)).await
    }

    pub async fn instance_info(&self) -> Result<Value> {
        self.get("/instance-info").await
    }

    /// Identity behind the API key: `authIdentifier`, `groups`, ...
    pub async fn auth_info(&self) -> Result<Value> {
        self.get("/auth/info").await
    }

    pub async fn list_projects(&self) -> Result<Vec<Value>> {
        self.get_list("/projects/").await
    }

    pub async fn list_project_keys(&self) -> Result<Vec<String>> {
        let projects = self.list_projects().await?;
        Ok(projects
            .iter()
            .filter_map(|p| p.get("projectKey").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    pub fn project(&self, key: impl Into<String>) -> Project {
        Project::new(self.clone(), key.into())
    }

    pub async fn create_project(
        &self,
        key: &str,
        name: &str,
        owner: &str,
        description: Option<&str>,
    ) -> Result<Project> {
        let mut body = json!({
            "projectKey": key,
            "name": name,
            "owner": owner,
        });
        if let Some(description) = description {
            body["description"] = json!(description);
        }
        self.send(ApiRequest::post("/projects/").json(body)).await?;
        debug!(project_key = %key, "created project");
        Ok(self.project(key))
    }

    pub async fn list_code_envs(&self) -> Result<Vec<Value>> {
        self.get_list("/admin/code-envs/").await
    }

    pub async fn code_env(&self, lang: &str, name: &str) -> Result<Value> {
        self.get(format!(
            "/admin/code-envs/{}/{}",
            segment(lang),
            segment(name)
        ))
        .await
    }

    /// Connections keyed by name come back as a map; flatten them into a list
    /// where each entry carries its `name`.
    pub async fn list_connections(&self) -> Result<Vec<Value>> {
        match self.get("/admin/connections/").await? {
            Value::Object(map) => Ok(map
                .into_iter()
                .map(|(name, def)| with_name(name, def))
                .collect()),
            other => as_list(other),
        }
    }

    pub async fn connection(&self, name: &str) -> Result<Value> {
        self.get(format!("/admin/connections/{}", segment(name))).await
    }
}

fn with_name(name: String, def: Value) -> Value {
    let mut obj = match def {
        Value::Object(obj) => obj,
        other => {
            let mut obj = Map::new();
            obj.insert("definition".into(), other);
            obj
        }
    };
    obj.entry("name").or_insert(Value::String(name));
    Value::Object(obj)
}

/// Coerce a list endpoint's body into a vector.
pub(crate) fn as_list(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        other => Err(Error::InvalidResponse(format!(
            "expected a list, got {}",
            kind_of(&other)
        ))),
    }
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// The `dssVersion` reported by `/instance-info`.
fn dss_version(info: &Value) -> &str {
    info.get("dssVersion")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;

    #[test]
    fn version_is_read_from_instance_info() {
        assert_eq!(dss_version(&json!({"dssVersion": "13.2.0"})), "13.2.0");
        assert_eq!(dss_version(&json!({"dssVersion": 13})), "unknown");
        assert_eq!(dss_version(&json!({})), "unknown");
    }

    #[tokio::test]
    async fn project_keys_come_from_project_list() {
        let mock = MockTransport::new();
        mock.on_get(
            "/projects/",
            json!([{"projectKey": "A", "name": "a"}, {"projectKey": "B"}, {"name": "orphan"}]),
        );
        let keys = mock.client().list_project_keys().await.unwrap();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn connections_map_is_flattened() {
        let mock = MockTransport::new();
        mock.on_get(
            "/admin/connections/",
            json!({"pg": {"type": "PostgreSQL"}, "fs": {"type": "Filesystem"}}),
        );
        let conns = mock.client().list_connections().await.unwrap();
        assert_eq!(conns.len(), 2);
        assert!(conns
            .iter()
            .any(|c| c["name"] == "pg" && c["type"] == "PostgreSQL"));
    }

    #[tokio::test]
    async fn create_project_posts_key_and_owner() {
        let mock = MockTransport::new();
        mock.on_post("/projects/", json!({"projectKey": "NEW"}));
        let project = mock
            .client()
            .create_project("NEW", "New", "admin", Some("copy"))
            .await
            .unwrap();
        assert_eq!(project.key(), "NEW");
        let body = mock
            .last_body(reqwest::Method::POST, "/projects/")
            .unwrap();
        assert_eq!(body["owner"], "admin");
        assert_eq!(body["description"], "copy");
    }

    #[test]
    fn non_list_body_is_rejected() {
        assert!(as_list(json!({"a": 1})).is_err());
        assert!(as_list(Value::Null).unwrap().is_empty());
    }
}
