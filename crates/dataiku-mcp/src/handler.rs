//! rmcp glue: exposes every tool and resource over the Model Context Protocol.
//!
//! Tool bodies live in [`crate::tools`]; this module only routes calls and
//! turns their JSON answers into text content.

use std::sync::Arc;

use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{
        AnnotateAble, CallToolResult, Content, Implementation, ListResourceTemplatesResult,
        ListResourcesResult, PaginatedRequestParam, RawResource, ReadResourceRequestParam,
        ReadResourceResult, ResourceContents, ResourceTemplate, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router, ErrorData as McpError, RoleServer, ServerHandler,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::resources::{
    project_key_from_uri, ProjectResource, ProjectsResource, PROJECTS_URI, PROJECT_URI_TEMPLATE,
};
use crate::server::McpServerState;
use crate::tools::{
    advanced_scenarios::{CloneScenarioTool, ScenarioLogsTool, ScenarioStepsTool},
    code::{DryRunTool, RecipeCodeTool, ValidateSyntaxTool},
    datasets::{
        BuildDatasetTool, CheckMetricsTool, ClearDatasetTool, CreateDatasetTool, DatasetInfoTool,
        DeleteDatasetTool, InspectSchemaTool, ListDatasetsTool, PostWriteStatementsTool,
        UpdateDatasetTool,
    },
    environment::{CodeEnvironmentsTool, ConnectionsTool, ProjectVariablesTool},
    exploration::{DatasetSampleTool, ProjectFlowTool, SearchTool},
    monitoring::{CancelJobsTool, JobDetailsTool, RecentRunsTool},
    productivity::{BatchUpdateTool, DuplicateProjectTool, ExportConfigTool},
    recipes::{
        CreateRecipeTool, DeleteRecipeTool, ListRecipesTool, RecipeInfoTool, RunRecipeTool,
        UpdateRecipeTool,
    },
    scenarios::{
        AddTriggerTool, CreateScenarioTool, DeleteScenarioTool, ListScenariosTool,
        RemoveTriggerTool, RunHistoryTool, RunScenarioTool, ScenarioInfoTool, UpdateScenarioTool,
    },
};
use crate::types::*;

const INSTRUCTIONS: &str = "Manage Dataiku DSS projects: datasets, recipes, scenarios, \
jobs and project configuration. Connection settings come from DSS_HOST and \
DSS_API_KEY. Every tool answers with a JSON object whose `status` is \"ok\" \
or \"error\".";

/// Wrap a tool's JSON answer as MCP text content.
fn respond(value: Value) -> Result<CallToolResult, McpError> {
    let text = serde_json::to_string_pretty(&value)
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

/// MCP server for a DSS instance.
#[derive(Clone)]
pub struct DataikuMcpServer {
    state: Arc<McpServerState>,
    tool_router: ToolRouter<Self>,
}

impl DataikuMcpServer {
    pub fn new(state: McpServerState) -> Self {
        Self::with_state(Arc::new(state))
    }

    pub fn with_state(state: Arc<McpServerState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }

    pub fn state(&self) -> &McpServerState {
        &self.state
    }

    /// Names of every registered tool, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        names
    }

    /// Text of the resource at `uri`.
    pub async fn read_resource_text(&self, uri: &str) -> Result<String, McpError> {
        if uri == PROJECTS_URI {
            return ProjectsResource::read(&self.state)
                .await
                .map_err(|err| McpError::internal_error(err.message, None));
        }
        match project_key_from_uri(uri) {
            Some(key) => Ok(ProjectResource::read(&self.state, key).await),
            None => Err(McpError::resource_not_found(
                format!("Unknown resource: {uri}"),
                None,
            )),
        }
    }
}

#[tool_router]
impl DataikuMcpServer {
    // ------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------

    #[tool(description = "Create a dataset in a project. Supports filesystem, SQL (PostgreSQL, MySQL, ...), cloud storage (S3, GCS, Azure) and uploaded files datasets.")]
    async fn create_dataset(
        &self,
        Parameters(input): Parameters<CreateDatasetInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(CreateDatasetTool::execute(&self.state, input).await)
    }

    #[tool(description = "Update a dataset's metadata, format, connection, location or schema.")]
    async fn update_dataset(
        &self,
        Parameters(input): Parameters<UpdateDatasetInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(UpdateDatasetTool::execute(&self.state, input).await)
    }

    #[tool(description = "Delete a dataset, optionally dropping its underlying data.")]
    async fn delete_dataset(
        &self,
        Parameters(input): Parameters<DeleteDatasetInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(DeleteDatasetTool::execute(&self.state, input).await)
    }

    #[tool(description = "Build a dataset and wait for the job. A job that does not end DONE is reported as an error.")]
    async fn build_dataset(
        &self,
        Parameters(input): Parameters<BuildDatasetInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(BuildDatasetTool::execute(&self.state, input).await)
    }

    #[tool(description = "Inspect a dataset's schema: every column with its type, meaning, comment and type-specific fields.")]
    async fn inspect_dataset_schema(
        &self,
        Parameters(input): Parameters<DatasetRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(InspectSchemaTool::execute(&self.state, input).await)
    }

    #[tool(description = "Read the latest computed metrics of a dataset (record count, size, ...).")]
    async fn check_dataset_metrics(
        &self,
        Parameters(input): Parameters<DatasetRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(CheckMetricsTool::execute(&self.state, input).await)
    }

    #[tool(description = "Get the SQL statements a SQL dataset runs after each write.")]
    async fn get_dataset_post_write_statements(
        &self,
        Parameters(input): Parameters<DatasetRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(PostWriteStatementsTool::execute(&self.state, input).await)
    }

    #[tool(description = "List the datasets of a project, optionally filtered by type.")]
    async fn list_datasets(
        &self,
        Parameters(input): Parameters<ListDatasetsInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(ListDatasetsTool::execute(&self.state, input).await)
    }

    #[tool(description = "Get a dataset's type, metadata, flow options and storage settings (format, connection, path, table).")]
    async fn get_dataset_info(
        &self,
        Parameters(input): Parameters<DatasetRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(DatasetInfoTool::execute(&self.state, input).await)
    }

    #[tool(description = "Clear the data of a dataset, or of some of its partitions.")]
    async fn clear_dataset(
        &self,
        Parameters(input): Parameters<ClearDatasetInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(ClearDatasetTool::execute(&self.state, input).await)
    }

    // ------------------------------------------------------------------
    // Recipes
    // ------------------------------------------------------------------

    #[tool(description = "Create a recipe (python, sql, r, sync, join, ...). Missing output datasets are created as managed datasets.")]
    async fn create_recipe(
        &self,
        Parameters(input): Parameters<CreateRecipeInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(CreateRecipeTool::execute(&self.state, input).await)
    }

    #[tool(description = "Update a recipe's code, metadata, engine or container settings.")]
    async fn update_recipe(
        &self,
        Parameters(input): Parameters<UpdateRecipeInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(UpdateRecipeTool::execute(&self.state, input).await)
    }

    #[tool(description = "Delete a recipe.")]
    async fn delete_recipe(
        &self,
        Parameters(input): Parameters<RecipeRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(DeleteRecipeTool::execute(&self.state, input).await)
    }

    #[tool(description = "Run a recipe by building its outputs and wait for the job. A job that does not end DONE is reported as an error.")]
    async fn run_recipe(
        &self,
        Parameters(input): Parameters<RunRecipeInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(RunRecipeTool::execute(&self.state, input).await)
    }

    #[tool(description = "List the recipes of a project, optionally filtered by type.")]
    async fn list_recipes(
        &self,
        Parameters(input): Parameters<ListRecipesInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(ListRecipesTool::execute(&self.state, input).await)
    }

    #[tool(description = "Get a recipe's type, inputs, outputs and metadata.")]
    async fn get_recipe_info(
        &self,
        Parameters(input): Parameters<RecipeRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(RecipeInfoTool::execute(&self.state, input).await)
    }

    // ------------------------------------------------------------------
    // Scenarios
    // ------------------------------------------------------------------

    #[tool(description = "Create a step-based or custom python scenario.")]
    async fn create_scenario(
        &self,
        Parameters(input): Parameters<CreateScenarioInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(CreateScenarioTool::execute(&self.state, input).await)
    }

    #[tool(description = "Update a scenario's name, metadata, activation, definition or step script.")]
    async fn update_scenario(
        &self,
        Parameters(input): Parameters<UpdateScenarioInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(UpdateScenarioTool::execute(&self.state, input).await)
    }

    #[tool(description = "Delete a scenario.")]
    async fn delete_scenario(
        &self,
        Parameters(input): Parameters<ScenarioRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(DeleteScenarioTool::execute(&self.state, input).await)
    }

    #[tool(description = "Add a trigger to a scenario: periodic, hourly, daily, monthly or dataset.")]
    async fn add_scenario_trigger(
        &self,
        Parameters(input): Parameters<AddTriggerInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(AddTriggerTool::execute(&self.state, input).await)
    }

    #[tool(description = "Remove a scenario trigger by its index.")]
    async fn remove_scenario_trigger(
        &self,
        Parameters(input): Parameters<RemoveTriggerInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(RemoveTriggerTool::execute(&self.state, input).await)
    }

    #[tool(description = "Run a scenario, by default waiting for it to finish.")]
    async fn run_scenario(
        &self,
        Parameters(input): Parameters<RunScenarioInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(RunScenarioTool::execute(&self.state, input).await)
    }

    #[tool(description = "Get a scenario's settings, triggers and last run.")]
    async fn get_scenario_info(
        &self,
        Parameters(input): Parameters<ScenarioRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(ScenarioInfoTool::execute(&self.state, input).await)
    }

    #[tool(description = "List the scenarios of a project, optionally filtered by type or activation.")]
    async fn list_scenarios(
        &self,
        Parameters(input): Parameters<ListScenariosInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(ListScenariosTool::execute(&self.state, input).await)
    }

    #[tool(description = "Get the recent runs of a scenario: outcome, timing, duration and trigger of each.")]
    async fn get_scenario_run_history(
        &self,
        Parameters(input): Parameters<RunHistoryInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(RunHistoryTool::execute(&self.state, input).await)
    }

    // ------------------------------------------------------------------
    // Advanced scenarios
    // ------------------------------------------------------------------

    #[tool(description = "Get the logs of a scenario run (latest run by default): the scenario log, step logs and the logs of jobs the run started.")]
    async fn get_scenario_logs(
        &self,
        Parameters(input): Parameters<ScenarioLogsInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(ScenarioLogsTool::execute(&self.state, input).await)
    }

    #[tool(description = "Describe the steps of a scenario, including the script of custom python steps.")]
    async fn get_scenario_steps(
        &self,
        Parameters(input): Parameters<ScenarioRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(ScenarioStepsTool::execute(&self.state, input).await)
    }

    #[tool(description = "Clone a scenario under a new name, with optional modifications.")]
    async fn clone_scenario(
        &self,
        Parameters(input): Parameters<CloneScenarioInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(CloneScenarioTool::execute(&self.state, input).await)
    }

    // ------------------------------------------------------------------
    // Code
    // ------------------------------------------------------------------

    #[tool(description = "Get the code of a code recipe with basic statistics.")]
    async fn get_recipe_code(
        &self,
        Parameters(input): Parameters<RecipeRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(RecipeCodeTool::execute(&self.state, input).await)
    }

    #[tool(description = "Check a recipe's code (or supplied code) for syntax problems.")]
    async fn validate_recipe_syntax(
        &self,
        Parameters(input): Parameters<ValidateSyntaxInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(ValidateSyntaxTool::execute(&self.state, input).await)
    }

    #[tool(description = "Check a recipe's inputs, outputs and code without running it.")]
    async fn test_recipe_dry_run(
        &self,
        Parameters(input): Parameters<DryRunInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(DryRunTool::execute(&self.state, input).await)
    }

    // ------------------------------------------------------------------
    // Exploration
    // ------------------------------------------------------------------

    #[tool(description = "Get the project flow: datasets, recipes and the edges between them.")]
    async fn get_project_flow(
        &self,
        Parameters(input): Parameters<ProjectRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(ProjectFlowTool::execute(&self.state, input).await)
    }

    #[tool(description = "Search datasets, recipes and scenarios by name, description or tags.")]
    async fn search_project_objects(
        &self,
        Parameters(input): Parameters<SearchInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(SearchTool::execute(&self.state, input).await)
    }

    #[tool(description = "Read sample rows of a dataset with per-column statistics.")]
    async fn get_dataset_sample(
        &self,
        Parameters(input): Parameters<DatasetSampleInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(DatasetSampleTool::execute(&self.state, input).await)
    }

    // ------------------------------------------------------------------
    // Environment
    // ------------------------------------------------------------------

    #[tool(description = "List code environments, and a project's code environment settings when a project key is given.")]
    async fn get_code_environments(
        &self,
        Parameters(input): Parameters<OptionalProjectRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(CodeEnvironmentsTool::execute(&self.state, input).await)
    }

    #[tool(description = "Get a project's variables, metadata and settings summary. Secret-looking values are hidden.")]
    async fn get_project_variables(
        &self,
        Parameters(input): Parameters<ProjectRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(ProjectVariablesTool::execute(&self.state, input).await)
    }

    #[tool(description = "List connections, and their usage by a project when a project key is given.")]
    async fn get_connections(
        &self,
        Parameters(input): Parameters<OptionalProjectRef>,
    ) -> Result<CallToolResult, McpError> {
        respond(ConnectionsTool::execute(&self.state, input).await)
    }

    // ------------------------------------------------------------------
    // Monitoring
    // ------------------------------------------------------------------

    #[tool(description = "List recent job and scenario runs of a project, newest first.")]
    async fn get_recent_runs(
        &self,
        Parameters(input): Parameters<RecentRunsInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(RecentRunsTool::execute(&self.state, input).await)
    }

    #[tool(description = "Get a job's status, log, activities and timeline.")]
    async fn get_job_details(
        &self,
        Parameters(input): Parameters<JobDetailsInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(JobDetailsTool::execute(&self.state, input).await)
    }

    #[tool(description = "Abort running jobs and report which ones stopped.")]
    async fn cancel_running_jobs(
        &self,
        Parameters(input): Parameters<CancelJobsInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(CancelJobsTool::execute(&self.state, input).await)
    }

    // ------------------------------------------------------------------
    // Productivity
    // ------------------------------------------------------------------

    #[tool(description = "Copy a project's datasets, recipes, scenarios and variables into another project.")]
    async fn duplicate_project_structure(
        &self,
        Parameters(input): Parameters<DuplicateProjectInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(DuplicateProjectTool::execute(&self.state, input).await)
    }

    #[tool(description = "Export a project's configuration as JSON or YAML.")]
    async fn export_project_config(
        &self,
        Parameters(input): Parameters<ExportConfigInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(ExportConfigTool::execute(&self.state, input).await)
    }

    #[tool(description = "Apply the same updates to every dataset, recipe or scenario whose name matches a pattern.")]
    async fn batch_update_objects(
        &self,
        Parameters(input): Parameters<BatchUpdateInput>,
    ) -> Result<CallToolResult, McpError> {
        respond(BatchUpdateTool::execute(&self.state, input).await)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for DataikuMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        let resources = self
            .state
            .resources()
            .into_iter()
            .map(|descriptor| {
                let mut raw = RawResource::new(descriptor.uri, descriptor.title);
                raw.description = Some(descriptor.description.to_string());
                raw.mime_type = Some("application/json".to_string());
                raw.no_annotation()
            })
            .collect();
        Ok(ListResourcesResult::with_all_items(resources))
    }

    async fn list_resource_templates(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourceTemplatesResult, McpError> {
        let template: ResourceTemplate = serde_json::from_value(json!({
            "uriTemplate": PROJECT_URI_TEMPLATE,
            "name": "project",
            "description": "Name and description of one project",
            "mimeType": "application/json",
        }))
        .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(ListResourceTemplatesResult::with_all_items(vec![template]))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        debug!(uri = %request.uri, "reading resource");
        let text = self.read_resource_text(&request.uri).await?;
        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataiku_client::test_utils::MockTransport;

    fn server(mock: &MockTransport) -> DataikuMcpServer {
        DataikuMcpServer::new(McpServerState::with_client(mock.client()))
    }

    #[test]
    fn every_tool_is_registered() {
        let names = server(&MockTransport::new()).tool_names();
        assert_eq!(names.len(), 43);
        for name in [
            "create_dataset",
            "get_dataset_post_write_statements",
            "add_scenario_trigger",
            "clone_scenario",
            "test_recipe_dry_run",
            "search_project_objects",
            "get_connections",
            "cancel_running_jobs",
            "batch_update_objects",
        ] {
            assert!(names.iter().any(|n| n == name), "missing tool {name}");
        }
    }

    #[test]
    fn server_info_advertises_tools_and_resources() {
        let info = server(&MockTransport::new()).get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
        assert!(info.instructions.is_some());
        assert_eq!(info.server_info.name, "dataiku-mcp");
    }

    #[tokio::test]
    async fn resources_are_read_by_uri() {
        let mock = MockTransport::new();
        mock.on_get("/projects/", json!([{"projectKey": "A"}]));
        mock.on_get("/projects/A/metadata", json!({"name": "Alpha", "description": "first"}));
        let server = server(&mock);

        let projects: Value =
            serde_json::from_str(&server.read_resource_text("projects://").await.unwrap()).unwrap();
        assert_eq!(projects["projects"], json!(["A"]));

        let project: Value =
            serde_json::from_str(&server.read_resource_text("project://A").await.unwrap()).unwrap();
        assert_eq!(project["description"], "first");

        assert!(server.read_resource_text("files://x").await.is_err());
    }

    #[test]
    fn tool_answers_are_pretty_text() {
        let result = respond(json!({"status": "ok"})).unwrap();
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.content.len(), 1);
    }
}
