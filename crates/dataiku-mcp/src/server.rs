//! MCP server state shared by every tool handler.
//!
//! The DSS connection is opened lazily on the first tool call that needs it
//! and then reused for the lifetime of the process. Handlers receive the
//! state explicitly, so tests can inject a client wired to a mock transport.

use dataiku_client::{ClientConfig, DssClient};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::info;

/// Runtime state holding the (lazily created) DSS client.
pub struct McpServerState {
    /// Explicit configuration; `None` means read it from the environment.
    config: Option<ClientConfig>,

    client: OnceCell<DssClient>,

    /// Server initialization timestamp
    pub initialized_at: chrono::DateTime<chrono::Utc>,
}

/// Descriptor for MCP resources exposed by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub uri: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

impl McpServerState {
    /// State that reads `DSS_HOST`/`DSS_API_KEY` on first use.
    pub fn new() -> Self {
        Self {
            config: None,
            client: OnceCell::new(),
            initialized_at: chrono::Utc::now(),
        }
    }

    /// State bound to an explicit configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::new()
        }
    }

    /// State around an already connected client.
    pub fn with_client(client: DssClient) -> Self {
        Self {
            config: None,
            client: OnceCell::new_with(Some(client)),
            initialized_at: chrono::Utc::now(),
        }
    }

    /// Whether a connection has been established yet.
    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    /// The shared client, connecting on first call.
    ///
    /// A failed connection attempt is not cached; the next call retries.
    pub async fn client(&self) -> crate::Result<&DssClient> {
        let client = self
            .client
            .get_or_try_init(|| async {
                let config = match &self.config {
                    Some(config) => config.clone(),
                    None => ClientConfig::from_env()?,
                };
                info!(host = %config.host, "connecting to DSS");
                DssClient::connect(config).await
            })
            .await?;
        Ok(client)
    }

    /// List MCP resources exposed by this server
    pub fn resources(&self) -> Vec<ResourceDescriptor> {
        vec![ResourceDescriptor {
            uri: crate::resources::PROJECTS_URI,
            title: "Projects",
            description: "Keys of every project visible to the API key",
        }]
    }
}

impl Default for McpServerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataiku_client::test_utils::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn injected_client_is_used_without_connecting() {
        let mock = MockTransport::new();
        mock.on_get("/projects/", json!([]));
        let state = McpServerState::with_client(mock.client());
        assert!(state.is_connected());

        let client = state.client().await.unwrap();
        assert!(client.list_projects().await.unwrap().is_empty());
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn missing_environment_is_reported_and_not_cached() {
        let state = McpServerState::with_config(ClientConfig::new("", ""));
        // An empty host cannot be reached; the error must surface, not panic.
        assert!(state.client().await.is_err());
        assert!(!state.is_connected());
    }

    #[test]
    fn test_resources_descriptor() {
        let resources = McpServerState::new().resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].uri, "projects://");
    }
}
