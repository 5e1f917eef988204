//! Whole-project tools: duplication, configuration export and batch updates.

use dataiku_client::recipe::{self, recipe_body, ref_names};
use dataiku_client::{Project, RecipeCreation, RecipeOutput};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::{field_or, str_or, tags_of};
use crate::error::into_response;
use crate::matcher::Matcher;
use crate::patch::{as_object_mut, merge_object, steps, steps_mut, triggers, triggers_mut};
use crate::server::McpServerState;
use crate::types::*;
use crate::{Error, Result};

/// Recipe types whose payload is source code.
const CODE_TYPES: [&str; 6] = ["python", "r", "sql", "pyspark", "scala", "shell"];

/// Owner used for new projects when the API key's identity is unknown.
const FALLBACK_OWNER: &str = "admin";

fn names_of(variables: &Value, kind: &str) -> Vec<String> {
    variables
        .get(kind)
        .and_then(Value::as_object)
        .map(|vars| vars.keys().cloned().collect())
        .unwrap_or_default()
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// What one duplication run copied, and what it could not.
#[derive(Debug, Default)]
struct Copied {
    datasets: Vec<Value>,
    recipes: Vec<Value>,
    scenarios: Vec<Value>,
    variables: Vec<String>,
    errors: Vec<String>,
}

/// Copy a project's variables, datasets, recipes and scenarios into another
/// project, creating it when needed.
pub struct DuplicateProjectTool;

impl DuplicateProjectTool {
    pub async fn execute(state: &McpServerState, input: DuplicateProjectInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to duplicate project structure")
    }

    async fn target_project(state: &McpServerState, input: &DuplicateProjectInput) -> Result<Project> {
        let client = state.client().await?;
        let name = input
            .target_project_name
            .as_deref()
            .unwrap_or(&input.target_project_key);
        let owner = match client.auth_info().await {
            Ok(auth) => str_or(&auth, "authIdentifier", FALLBACK_OWNER).to_string(),
            Err(err) => {
                debug!(error = %err, "auth info unavailable, using fallback owner");
                FALLBACK_OWNER.to_string()
            }
        };
        match client
            .create_project(&input.target_project_key, name, &owner, None)
            .await
        {
            Ok(project) => Ok(project),
            Err(err) if err.is_already_exists() => {
                info!(project_key = %input.target_project_key, "target project exists, reusing it");
                Ok(client.project(&input.target_project_key))
            }
            Err(err) => Err(Error::upstream(err)
                .with_context(json!({ "target_project_key": input.target_project_key }))),
        }
    }

    async fn copy_datasets(source: &Project, target: &Project, copied: &mut Copied) -> Result<usize> {
        let datasets = source.list_datasets().await?;
        for listed in &datasets {
            let name = str_or(listed, "name", "");
            let dataset_type = str_or(listed, "type", "");
            if dataset_type == "UploadedFiles" {
                copied.errors.push(format!("Skipped uploaded file dataset: {name}"));
                continue;
            }
            let handle = source.dataset(name);
            let outcome = async {
                let definition = handle.definition().await?;
                let schema = handle.schema().await?;
                let created = target
                    .create_dataset(
                        name,
                        dataset_type,
                        field_or(&definition, "params", json!({})),
                        Some(str_or(&definition, "formatType", "csv")),
                        definition.get("formatParams").cloned(),
                    )
                    .await?;
                created.set_schema(schema).await
            }
            .await;
            match outcome {
                Ok(()) => copied.datasets.push(json!({
                    "name": name,
                    "type": dataset_type,
                    "data_copied": false,
                })),
                Err(err) => copied.errors.push(format!("Failed to copy dataset {name}: {err}")),
            }
        }
        Ok(datasets.len())
    }

    async fn copy_recipes(source: &Project, target: &Project, copied: &mut Copied) -> Result<usize> {
        let recipes = source.list_recipes().await?;
        for listed in &recipes {
            let name = str_or(listed, "name", "");
            let recipe_type = str_or(listed, "type", "");
            let definition = match source.recipe(name).definition().await {
                Ok(definition) => definition,
                Err(err) => {
                    copied.errors.push(format!("Failed to copy recipe {name}: {err}"));
                    continue;
                }
            };
            let inputs = ref_names(&recipe::inputs(&definition));
            let outputs = ref_names(&recipe::outputs(&definition));
            let creation = RecipeCreation {
                recipe_type: recipe_type.to_string(),
                name: name.to_string(),
                inputs: inputs.clone(),
                outputs: outputs.iter().map(RecipeOutput::existing).collect(),
            };
            let created = match target.create_recipe(&creation).await {
                Ok(created) => created,
                Err(err) => {
                    copied.errors.push(format!("Failed to copy recipe {name}: {err}"));
                    continue;
                }
            };

            let saved = async {
                let mut target_definition = created.definition().await?;
                if CODE_TYPES.contains(&recipe_type) {
                    as_object_mut(&mut target_definition)
                        .insert("payload".into(), field_or(&definition, "payload", json!("")));
                }
                let params = field_or(recipe_body(&definition), "params", json!({}));
                let body = as_object_mut(&mut target_definition)
                    .entry("recipe")
                    .or_insert_with(|| json!({}));
                as_object_mut(body).insert("params".into(), params);
                created.save_definition(target_definition).await
            }
            .await;
            if let Err(err) = saved {
                copied
                    .errors
                    .push(format!("Failed to copy code and parameters for recipe {name}: {err}"));
            }
            copied.recipes.push(json!({
                "name": name,
                "type": recipe_type,
                "inputs": inputs,
                "outputs": outputs,
            }));
        }
        Ok(recipes.len())
    }

    async fn copy_scenarios(source: &Project, target: &Project, copied: &mut Copied) -> Result<usize> {
        let scenarios = source.list_scenarios().await?;
        for listed in &scenarios {
            let id = str_or(listed, "id", "");
            let name = str_or(listed, "name", id);
            let scenario_type = str_or(listed, "type", "step_based");
            let outcome = async {
                let handle = source.scenario(id);
                let settings = handle.settings().await?;
                let metadata = handle.metadata().await?;
                let created = target
                    .create_scenario(
                        name,
                        scenario_type,
                        json!({ "params": field_or(&settings, "params", json!({})) }),
                    )
                    .await?;
                let mut target_settings = created.settings().await?;
                *steps_mut(&mut target_settings) = steps(&settings).to_vec();
                *triggers_mut(&mut target_settings) = triggers(&settings).to_vec();
                as_object_mut(&mut target_settings)
                    .insert("active".into(), field_or(&settings, "active", json!(false)));
                created.save_settings(target_settings).await?;
                created.set_metadata(metadata).await?;
                Ok::<_, dataiku_client::Error>(json!({
                    "name": name,
                    "type": scenario_type,
                    "id": created.id(),
                    "steps": steps(&settings).len(),
                    "triggers": triggers(&settings).len(),
                }))
            }
            .await;
            match outcome {
                Ok(entry) => copied.scenarios.push(entry),
                Err(err) => copied.errors.push(format!("Failed to copy scenario {name}: {err}")),
            }
        }
        Ok(scenarios.len())
    }

    async fn run(state: &McpServerState, input: DuplicateProjectInput) -> Result<Value> {
        let target = Self::target_project(state, &input).await?;
        let client = state.client().await?;
        let source = client.project(&input.source_project_key);
        let mut copied = Copied::default();

        match source.variables().await {
            Ok(variables) => match target.set_variables(variables.clone()).await {
                Ok(()) => {
                    copied.variables = names_of(&variables, "standard");
                    copied.variables.extend(names_of(&variables, "local"));
                }
                Err(err) => copied.errors.push(format!("Failed to copy variables: {err}")),
            },
            Err(err) => copied.errors.push(format!("Failed to copy variables: {err}")),
        }

        let total_source = Self::copy_datasets(&source, &target, &mut copied).await?
            + Self::copy_recipes(&source, &target, &mut copied).await?
            + Self::copy_scenarios(&source, &target, &mut copied).await?;
        let total_copied = copied.datasets.len() + copied.recipes.len() + copied.scenarios.len();

        if !copied.errors.is_empty() {
            warn!(source = %input.source_project_key, target = %input.target_project_key, errors = copied.errors.len(), "project duplicated with errors");
        }
        info!(source = %input.source_project_key, target = %input.target_project_key, total_copied, "project duplicated");
        Ok(json!({
            "status": "ok",
            "duplication_summary": {
                "source_project": input.source_project_key,
                "target_project": input.target_project_key,
                "include_data": input.include_data,
                "datasets_copied": copied.datasets.len(),
                "recipes_copied": copied.recipes.len(),
                "scenarios_copied": copied.scenarios.len(),
                "variables_copied": copied.variables.len(),
                "total_errors": copied.errors.len(),
                "success_rate": percentage(total_copied, total_source),
            },
            "copied_objects": {
                "datasets": copied.datasets,
                "recipes": copied.recipes,
                "scenarios": copied.scenarios,
                "variables": copied.variables,
                "connections": [],
                "errors": copied.errors,
            },
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
    Json,
    Yaml,
}

impl ExportFormat {
    fn parse(format: &str) -> Result<Self> {
        match format.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(Error::invalid_param(
                "format",
                "Invalid format. Must be one of: json, yaml",
            )),
        }
    }

    fn render(self, config: &Value) -> Result<String> {
        match self {
            Self::Json => Ok(serde_json::to_string_pretty(config)?),
            Self::Yaml => serde_yaml::to_string(config)
                .map_err(|err| Error::internal(format!("Failed to format as YAML: {err}"))),
        }
    }

    fn content_type(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }
}

fn exported_count(items: &[Value]) -> usize {
    items.iter().filter(|item| item.get("error").is_none()).count()
}

pub struct ExportConfigTool;

impl ExportConfigTool {
    pub async fn execute(state: &McpServerState, input: ExportConfigInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to export project configuration")
    }

    async fn export_datasets(project: &Project) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        for listed in project.list_datasets().await? {
            let name = str_or(&listed, "name", "");
            let handle = project.dataset(name);
            let exported = async {
                let settings = handle.definition().await?;
                let schema = handle.schema().await?;
                Ok::<_, dataiku_client::Error>(json!({
                    "name": name,
                    "type": field_or(&listed, "type", Value::Null),
                    "description": str_or(&listed, "description", ""),
                    "tags": tags_of(&listed),
                    "settings": settings,
                    "schema": schema,
                }))
            }
            .await;
            out.push(exported.unwrap_or_else(|err| {
                json!({ "name": name, "error": format!("Failed to export dataset: {err}") })
            }));
        }
        Ok(out)
    }

    async fn export_recipes(project: &Project) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        for listed in project.list_recipes().await? {
            let name = str_or(&listed, "name", "");
            let recipe_type = str_or(&listed, "type", "");
            match project.recipe(name).definition().await {
                Ok(definition) => {
                    let mut config = json!({
                        "name": name,
                        "type": recipe_type,
                        "description": str_or(&listed, "description", ""),
                        "tags": tags_of(&listed),
                        "settings": recipe_body(&definition),
                        "definition": definition,
                    });
                    if CODE_TYPES.contains(&recipe_type) {
                        config["code"] = match definition.get("payload").and_then(Value::as_str) {
                            Some(code) => json!(code),
                            None => json!("# Could not retrieve code"),
                        };
                    }
                    out.push(config);
                }
                Err(err) => out.push(json!({
                    "name": name,
                    "error": format!("Failed to export recipe: {err}"),
                })),
            }
        }
        Ok(out)
    }

    async fn export_scenarios(project: &Project) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        for listed in project.list_scenarios().await? {
            let id = str_or(&listed, "id", "");
            let handle = project.scenario(id);
            let exported = async {
                let settings = handle.settings().await?;
                let metadata = handle.metadata().await?;
                Ok::<_, dataiku_client::Error>(json!({
                    "id": id,
                    "name": field_or(&listed, "name", json!(id)),
                    "type": field_or(&listed, "type", Value::Null),
                    "description": str_or(&listed, "description", ""),
                    "tags": tags_of(&listed),
                    "active": field_or(&listed, "active", json!(false)),
                    "metadata": metadata,
                    "steps": steps(&settings),
                    "triggers": triggers(&settings),
                    "settings": settings,
                }))
            }
            .await;
            out.push(exported.unwrap_or_else(|err| {
                json!({
                    "id": id,
                    "name": field_or(&listed, "name", json!(id)),
                    "error": format!("Failed to export scenario: {err}"),
                })
            }));
        }
        Ok(out)
    }

    async fn run(state: &McpServerState, input: ExportConfigInput) -> Result<Value> {
        let format = ExportFormat::parse(&input.format)?;
        let client = state.client().await?;
        let project = client.project(&input.project_key);

        let metadata = project.metadata().await?;
        let variables = project.variables().await?;
        let settings = project.settings().await?;
        let datasets = Self::export_datasets(&project).await?;
        let recipes = Self::export_recipes(&project).await?;
        let scenarios = Self::export_scenarios(&project).await?;

        let standard = field_or(&variables, "standard", json!({}));
        let local = field_or(&variables, "local", json!({}));
        let variable_count = standard.as_object().map_or(0, Map::len) + local.as_object().map_or(0, Map::len);
        let mut stats = json!({
            "project_key": input.project_key,
            "format": format.content_type(),
            "datasets_exported": exported_count(&datasets),
            "recipes_exported": exported_count(&recipes),
            "scenarios_exported": exported_count(&scenarios),
            "variables_exported": variable_count,
            "total_objects": datasets.len() + recipes.len() + scenarios.len(),
        });

        let config = json!({
            "project_info": {
                "key": input.project_key,
                "name": str_or(&metadata, "name", &input.project_key),
                "description": str_or(&metadata, "description", ""),
                "tags": tags_of(&metadata),
                "owner": str_or(&metadata, "owner", "unknown"),
                "custom_fields": field_or(&metadata, "customFields", json!({})),
                "creation_date": field_or(&metadata, "creationDate", json!("")),
                "export_date": chrono::Utc::now().to_rfc3339(),
            },
            "variables": { "standard": standard, "local": local },
            "settings": {
                "code_env_settings": settings
                    .get("settings")
                    .and_then(|s| s.get("codeEnvs"))
                    .cloned()
                    .unwrap_or(json!({})),
                "bundle_export_options": field_or(&settings, "bundleExportOptions", json!({})),
                "git_reference": field_or(&settings, "gitReference", json!({})),
                "flow_display_settings": field_or(&settings, "flowDisplaySettings", json!({})),
            },
            "datasets": datasets,
            "recipes": recipes,
            "scenarios": scenarios,
            "connections": [],
        });
        let output = format.render(&config)?;

        stats["export_size"] = json!(output.chars().count());
        debug!(project_key = %input.project_key, format = format.content_type(), size = output.len(), "project configuration exported");
        Ok(json!({
            "status": "ok",
            "export_stats": stats,
            "config": config,
            "config_output": output,
            "content_type": format.content_type(),
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchTarget {
    Datasets,
    Recipes,
    Scenarios,
}

impl BatchTarget {
    fn parse(object_type: &str) -> Result<Self> {
        match object_type.to_lowercase().as_str() {
            "datasets" => Ok(Self::Datasets),
            "recipes" => Ok(Self::Recipes),
            "scenarios" => Ok(Self::Scenarios),
            _ => Err(Error::invalid_param(
                "object_type",
                format!(
                    "Unsupported object type: {object_type}. Supported types: datasets, recipes, scenarios"
                ),
            )),
        }
    }

    fn singular(self) -> &'static str {
        match self {
            Self::Datasets => "dataset",
            Self::Recipes => "recipe",
            Self::Scenarios => "scenario",
        }
    }
}

/// Copy the metadata fields present in `updates` onto `metadata`.
/// Returns whether anything changed.
fn patch_metadata(metadata: &mut Value, updates: &JsonObject) -> bool {
    let mut changed = false;
    for key in ["description", "tags"] {
        if let Some(value) = updates.get(key) {
            as_object_mut(metadata).insert(key.into(), value.clone());
            changed = true;
        }
    }
    changed
}

fn touches_metadata(updates: &JsonObject) -> bool {
    updates.contains_key("description") || updates.contains_key("tags")
}

/// Apply the same changes to every object whose name matches a pattern.
pub struct BatchUpdateTool;

impl BatchUpdateTool {
    pub async fn execute(state: &McpServerState, input: BatchUpdateInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to batch update objects")
    }

    async fn update_dataset(project: &Project, name: &str, updates: &JsonObject) -> Result<()> {
        let dataset = project.dataset(name);
        if touches_metadata(updates) {
            let mut metadata = dataset.metadata().await?;
            patch_metadata(&mut metadata, updates);
            dataset.set_metadata(metadata).await?;
        }
        if let Some(settings) = updates.get("settings") {
            let patch = settings.as_object().cloned().ok_or_else(|| {
                Error::invalid_param("updates", "'settings' must be an object")
            })?;
            let mut definition = dataset.definition().await?;
            merge_object(&mut definition, patch);
            dataset.save_definition(definition).await?;
        }
        Ok(())
    }

    async fn update_recipe(
        project: &Project,
        name: &str,
        recipe_type: &str,
        updates: &JsonObject,
    ) -> Result<()> {
        let recipe = project.recipe(name);
        if touches_metadata(updates) {
            let mut metadata = recipe.metadata().await?;
            patch_metadata(&mut metadata, updates);
            recipe.set_metadata(metadata).await?;
        }
        let code = updates
            .get("code")
            .filter(|_| CODE_TYPES.contains(&recipe_type));
        let params = updates.get("recipe_params");
        if code.is_some() || params.is_some() {
            let mut definition = recipe.definition().await?;
            if let Some(code) = code {
                as_object_mut(&mut definition).insert("payload".into(), code.clone());
            }
            if let Some(params) = params {
                let body = as_object_mut(&mut definition)
                    .entry("recipe")
                    .or_insert_with(|| json!({}));
                as_object_mut(body).insert("params".into(), params.clone());
            }
            recipe.save_definition(definition).await?;
        }
        Ok(())
    }

    async fn update_scenario(project: &Project, id: &str, updates: &JsonObject) -> Result<()> {
        let scenario = project.scenario(id);
        if touches_metadata(updates) {
            let mut metadata = scenario.metadata().await?;
            patch_metadata(&mut metadata, updates);
            scenario.set_metadata(metadata).await?;
        }
        if let Some(active) = updates.get("active") {
            let mut settings = scenario.settings().await?;
            as_object_mut(&mut settings).insert("active".into(), active.clone());
            scenario.save_settings(settings).await?;
        }
        Ok(())
    }

    async fn run(state: &McpServerState, input: BatchUpdateInput) -> Result<Value> {
        let target = BatchTarget::parse(&input.object_type)?;
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let matcher = Matcher::new(&input.pattern);
        let applied: Vec<&String> = input.updates.keys().collect();

        let listed = match target {
            BatchTarget::Datasets => project.list_datasets().await?,
            BatchTarget::Recipes => project.list_recipes().await?,
            BatchTarget::Scenarios => project.list_scenarios().await?,
        };

        let mut updated = Vec::new();
        let mut failed = Vec::new();
        for object in listed
            .iter()
            .filter(|o| matcher.is_match(str_or(o, "name", "")))
        {
            let name = str_or(object, "name", "");
            let id = str_or(object, "id", name);
            let outcome = match target {
                BatchTarget::Datasets => Self::update_dataset(&project, name, &input.updates).await,
                BatchTarget::Recipes => {
                    Self::update_recipe(&project, name, str_or(object, "type", ""), &input.updates).await
                }
                BatchTarget::Scenarios => Self::update_scenario(&project, id, &input.updates).await,
            };
            let mut entry = json!({ "name": name, "type": target.singular() });
            if target == BatchTarget::Scenarios {
                entry["id"] = json!(id);
            }
            match outcome {
                Ok(()) => {
                    entry["updates_applied"] = json!(applied);
                    updated.push(entry);
                }
                Err(err) => {
                    entry["error"] = json!(err.message);
                    failed.push(entry);
                }
            }
        }

        info!(project_key = %input.project_key, object_type = target.singular(), updated = updated.len(), failed = failed.len(), "batch update finished");
        Ok(json!({
            "status": "ok",
            "project_key": input.project_key,
            "update_summary": {
                "object_type": input.object_type,
                "pattern": input.pattern,
                "updates_requested": input.updates,
                "objects_updated": updated.len(),
                "objects_failed": failed.len(),
                "success_rate": percentage(updated.len(), updated.len() + failed.len()),
            },
            "updated_objects": updated,
            "failed_updates": failed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_format_is_checked() {
        assert_eq!(ExportFormat::parse("YAML").unwrap(), ExportFormat::Yaml);
        assert_eq!(ExportFormat::parse("json").unwrap(), ExportFormat::Json);
        let err = ExportFormat::parse("xml").unwrap_err();
        assert_eq!(err.code, 400);
    }

    #[test]
    fn yaml_rendering_keeps_structure() {
        let out = ExportFormat::Yaml
            .render(&json!({"project_info": {"key": "P"}, "datasets": []}))
            .unwrap();
        assert!(out.contains("project_info:"));
        assert!(out.contains("key: P"));
    }

    #[test]
    fn batch_target_rejects_unknown_types() {
        assert_eq!(BatchTarget::parse("Recipes").unwrap(), BatchTarget::Recipes);
        let err = BatchTarget::parse("notebooks").unwrap_err();
        assert_eq!(
            err.message,
            "Unsupported object type: notebooks. Supported types: datasets, recipes, scenarios"
        );
    }

    #[test]
    fn metadata_patch_only_touches_requested_fields() {
        let updates: JsonObject = serde_json::from_value(json!({"tags": ["gold"], "active": true})).unwrap();
        let mut metadata = json!({"description": "keep", "tags": []});
        assert!(patch_metadata(&mut metadata, &updates));
        assert_eq!(metadata, json!({"description": "keep", "tags": ["gold"]}));
        assert!(!touches_metadata(&serde_json::from_value(json!({"active": false})).unwrap()));
    }

    #[test]
    fn exported_count_skips_errors() {
        let items = vec![json!({"name": "a"}), json!({"name": "b", "error": "x"})];
        assert_eq!(exported_count(&items), 1);
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(0, 0), 0.0);
    }
}
