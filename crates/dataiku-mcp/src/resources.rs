//! MCP resources
//!
//! - `projects://`: keys of every project the API key can see
//! - `project://{project_key}`: name and description of one project

use crate::server::McpServerState;
use crate::Result;
use serde_json::{json, Value};

pub const PROJECTS_URI: &str = "projects://";
pub const PROJECT_URI_PREFIX: &str = "project://";
pub const PROJECT_URI_TEMPLATE: &str = "project://{project_key}";

/// Project key addressed by a `project://` URI.
pub fn project_key_from_uri(uri: &str) -> Option<&str> {
    uri.strip_prefix(PROJECT_URI_PREFIX)
        .map(|key| key.trim_end_matches('/'))
        .filter(|key| !key.is_empty())
}

/// Project listing resource
pub struct ProjectsResource;

impl ProjectsResource {
    pub async fn read(state: &McpServerState) -> Result<String> {
        let keys = state.client().await?.list_project_keys().await?;
        Ok(json!({ "projects": keys }).to_string())
    }
}

/// Single project resource
///
/// Failures are reported inside the document as `{"error": ...}` rather
/// than as a protocol error.
pub struct ProjectResource;

impl ProjectResource {
    pub async fn read(state: &McpServerState, project_key: &str) -> String {
        match Self::describe(state, project_key).await {
            Ok(info) => info.to_string(),
            Err(err) => json!({ "error": err.message }).to_string(),
        }
    }

    async fn describe(state: &McpServerState, project_key: &str) -> Result<Value> {
        let metadata = state.client().await?.project(project_key).metadata().await?;
        Ok(json!({
            "key": project_key,
            "name": metadata.get("name").and_then(Value::as_str).unwrap_or(project_key),
            "description": metadata.get("description").and_then(Value::as_str).unwrap_or(""),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataiku_client::test_utils::MockTransport;

    #[test]
    fn project_uris_yield_keys() {
        assert_eq!(project_key_from_uri("project://SALES"), Some("SALES"));
        assert_eq!(project_key_from_uri("project://SALES/"), Some("SALES"));
        assert_eq!(project_key_from_uri("project://"), None);
        assert_eq!(project_key_from_uri("projects://"), None);
    }

    #[tokio::test]
    async fn projects_resource_lists_keys() {
        let mock = MockTransport::new();
        mock.on_get("/projects/", json!([{"projectKey": "A"}, {"projectKey": "B"}]));
        let state = McpServerState::with_client(mock.client());

        let text = ProjectsResource::read(&state).await.unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"projects": ["A", "B"]}));
    }

    #[tokio::test]
    async fn project_resource_reports_errors_inline() {
        let mock = MockTransport::new();
        mock.on_get("/projects/A/metadata", json!({"name": "Alpha"}));
        let state = McpServerState::with_client(mock.client());

        let value: Value = serde_json::from_str(&ProjectResource::read(&state, "A").await).unwrap();
        assert_eq!(value, json!({"key": "A", "name": "Alpha", "description": ""}));

        let value: Value = serde_json::from_str(&ProjectResource::read(&state, "MISSING").await).unwrap();
        assert!(value["error"].is_string());
    }
}
