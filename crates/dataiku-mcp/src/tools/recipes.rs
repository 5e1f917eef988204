//! Recipe tools.

use dataiku_client::recipe::{self, recipe_body, CODE_RECIPE_TYPES};
use dataiku_client::{RecipeCreation, RecipeOutput};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{ensure_job_done, field_or, str_or, tags_of, validate_build_mode};
use crate::error::into_response;
use crate::patch::{apply_metadata, as_object_mut};
use crate::server::McpServerState;
use crate::types::*;
use crate::{Error, Result};

/// Turn requested outputs into creation outputs, rejecting specs without a
/// usable name.
fn resolve_outputs(outputs: &[OutputSpec]) -> Result<Vec<RecipeOutput>> {
    outputs
        .iter()
        .map(|spec| match spec {
            OutputSpec::Name(name) => Ok(RecipeOutput::existing(name)),
            OutputSpec::Spec {
                name,
                new,
                connection,
                append,
            } => {
                let name = name.as_deref().filter(|n| !n.is_empty()).ok_or_else(|| {
                    Error::invalid_param("outputs", "Output specification must include 'name' field")
                })?;
                let mut output = RecipeOutput::existing(name);
                output.create = *new;
                output.append = *append && !*new;
                if let Some(connection) = connection {
                    output.connection = connection.clone();
                }
                Ok(output)
            }
            OutputSpec::Other(value) => Err(Error::invalid_param(
                "outputs",
                format!("Invalid output specification: {value}"),
            )),
        })
        .collect()
}

/// Inputs/outputs of a definition as `{name, project}` pairs.
fn refs_with_project(items: &[Value], project_key: &str) -> Vec<Value> {
    items
        .iter()
        .map(|item| {
            json!({
                "name": field_or(item, "ref", Value::Null),
                "project": str_or(item, "projectKey", project_key),
            })
        })
        .collect()
}

pub struct CreateRecipeTool;

impl CreateRecipeTool {
    pub async fn execute(state: &McpServerState, input: CreateRecipeInput) -> Value {
        let context = format!("Failed to create recipe '{}'", input.recipe_name);
        into_response(Self::run(state, input).await, &context)
    }

    fn validate_input(input: &CreateRecipeInput) -> Result<RecipeCreation> {
        Ok(RecipeCreation {
            recipe_type: input.recipe_type.clone(),
            name: input.recipe_name.clone(),
            inputs: input.inputs.clone(),
            outputs: resolve_outputs(&input.outputs)?,
        })
    }

    async fn run(state: &McpServerState, input: CreateRecipeInput) -> Result<Value> {
        let creation = Self::validate_input(&input)?;
        let client = state.client().await?;
        let recipe = client
            .project(&input.project_key)
            .create_recipe(&creation)
            .await?;

        if let Some(code) = input.code.as_deref().filter(|c| !c.is_empty()) {
            if CODE_RECIPE_TYPES.contains(&input.recipe_type.as_str()) {
                let mut definition = recipe.definition().await?;
                as_object_mut(&mut definition).insert("payload".into(), json!(code));
                recipe.save_definition(definition).await?;
            }
        }

        info!(project_key = %input.project_key, recipe = %recipe.name(), recipe_type = %input.recipe_type, "recipe created");
        let outputs: Vec<&str> = creation.outputs.iter().map(|o| o.name.as_str()).collect();
        Ok(json!({
            "status": "ok",
            "recipe_id": recipe.name(),
            "recipe_name": input.recipe_name,
            "recipe_type": input.recipe_type,
            "inputs": input.inputs,
            "outputs": outputs,
        }))
    }
}

pub struct UpdateRecipeTool;

impl UpdateRecipeTool {
    pub async fn execute(state: &McpServerState, input: UpdateRecipeInput) -> Value {
        let context = format!("Failed to update recipe '{}'", input.recipe_name);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: UpdateRecipeInput) -> Result<Value> {
        let client = state.client().await?;
        let recipe = client.project(&input.project_key).recipe(&input.recipe_name);
        let mut updated: Vec<&str> = Vec::new();

        if let Some(code) = &input.code {
            let mut definition = recipe.definition().await?;
            as_object_mut(&mut definition).insert("payload".into(), json!(code));
            recipe.save_definition(definition).await?;
            updated.push("code");
        }

        if input.description.is_some() || input.tags.is_some() || input.custom_fields.is_some() {
            let mut metadata = recipe.metadata().await?;
            updated.extend(apply_metadata(
                &mut metadata,
                input.description.as_deref(),
                input.tags.as_deref(),
                input.custom_fields.as_ref(),
            ));
            recipe.set_metadata(metadata).await?;
        }

        if input.engine_type.is_some()
            || input.container_conf.is_some()
            || input.resource_settings.is_some()
        {
            let mut definition = recipe.definition().await?;
            let body = as_object_mut(&mut definition)
                .entry("recipe")
                .or_insert_with(|| json!({}));
            let params = as_object_mut(
                as_object_mut(body)
                    .entry("params")
                    .or_insert_with(|| json!({})),
            );
            if let Some(engine) = &input.engine_type {
                params.insert("engineType".into(), json!(engine));
                updated.push("engine_type");
            }
            if let Some(conf) = &input.container_conf {
                params.insert(
                    "containerSelection".into(),
                    json!({ "containerMode": "EXPLICIT_CONTAINER", "containerConf": conf }),
                );
                updated.push("container_conf");
            }
            if let Some(resources) = &input.resource_settings {
                params.insert("resourceSettings".into(), object(resources.clone()));
                updated.push("resource_settings");
            }
            recipe.save_definition(definition).await?;
        }

        debug!(project_key = %input.project_key, recipe = %input.recipe_name, ?updated, "recipe updated");
        Ok(json!({
            "status": "ok",
            "recipe_name": input.recipe_name,
            "updated_fields": updated,
            "message": format!("Recipe '{}' updated successfully", input.recipe_name),
        }))
    }
}

pub struct DeleteRecipeTool;

impl DeleteRecipeTool {
    pub async fn execute(state: &McpServerState, input: RecipeRef) -> Value {
        let context = format!("Failed to delete recipe '{}'", input.recipe_name);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: RecipeRef) -> Result<Value> {
        let client = state.client().await?;
        let recipe = client.project(&input.project_key).recipe(&input.recipe_name);
        let definition = recipe.definition().await?;
        let recipe_type = field_or(recipe_body(&definition), "type", json!("unknown"));
        recipe.delete().await?;
        info!(project_key = %input.project_key, recipe = %input.recipe_name, "recipe deleted");
        Ok(json!({
            "status": "ok",
            "deleted_recipe": {
                "id": recipe.name(),
                "type": recipe_type,
                "name": input.recipe_name,
            },
            "message": format!("Recipe '{}' deleted successfully", input.recipe_name),
        }))
    }
}

/// Run a recipe's first output and wait for the job.
pub struct RunRecipeTool;

impl RunRecipeTool {
    pub async fn execute(state: &McpServerState, input: RunRecipeInput) -> Value {
        let context = format!("Failed to run recipe '{}'", input.recipe_name);
        into_response(Self::run(state, input).await, &context)
    }

    fn validate_input(input: &RunRecipeInput) -> Result<()> {
        validate_build_mode("build_mode", "build_mode", input.build_mode.as_deref())
    }

    async fn run(state: &McpServerState, input: RunRecipeInput) -> Result<Value> {
        Self::validate_input(&input)?;
        let client = state.client().await?;
        let result = client
            .project(&input.project_key)
            .recipe(&input.recipe_name)
            .run(input.build_mode.as_deref())
            .await?;
        info!(project_key = %input.project_key, recipe = %input.recipe_name, job_id = %result.id, outcome = %result.outcome(), "recipe run finished");
        ensure_job_done(&result)?;
        Ok(json!({
            "status": "ok",
            "recipe_name": input.recipe_name,
            "job_id": result.id,
            "job_status": result.outcome(),
            "job_start_time": result.start_time(),
            "job_end_time": result.end_time(),
            "message": format!("Recipe '{}' executed successfully", input.recipe_name),
        }))
    }
}

pub struct RecipeInfoTool;

impl RecipeInfoTool {
    pub async fn execute(state: &McpServerState, input: RecipeRef) -> Value {
        let context = format!("Failed to get recipe info for '{}'", input.recipe_name);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: RecipeRef) -> Result<Value> {
        let client = state.client().await?;
        let handle = client.project(&input.project_key).recipe(&input.recipe_name);
        let metadata = handle.metadata().await?;
        let definition = handle.definition().await?;
        let key = input.project_key.as_str();

        Ok(json!({
            "status": "ok",
            "recipe_info": {
                "id": handle.name(),
                "name": input.recipe_name,
                "type": field_or(recipe_body(&definition), "type", json!("unknown")),
                "description": field_or(&metadata, "description", json!("")),
                "tags": tags_of(&metadata),
                "inputs": refs_with_project(&recipe::inputs(&definition), key),
                "outputs": refs_with_project(&recipe::outputs(&definition), key),
                "creation_date": field_or(&metadata, "creationDate", Value::Null),
                "last_modified": field_or(&metadata, "lastModifiedDate", Value::Null),
                "last_modified_by": metadata
                    .get("lastModifiedBy")
                    .and_then(|m| m.get("login"))
                    .cloned(),
                "custom_fields": field_or(&metadata, "customFields", json!({})),
            },
        }))
    }
}

pub struct ListRecipesTool;

impl ListRecipesTool {
    pub async fn execute(state: &McpServerState, input: ListRecipesInput) -> Value {
        let context = format!("Failed to list recipes in project '{}'", input.project_key);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: ListRecipesInput) -> Result<Value> {
        let client = state.client().await?;
        let recipes: Vec<Value> = client
            .project(&input.project_key)
            .list_recipes()
            .await?
            .iter()
            .filter(|r| match &input.recipe_type {
                Some(t) => r.get("type").and_then(Value::as_str) == Some(t.as_str()),
                None => true,
            })
            .map(|r| {
                json!({
                    "name": field_or(r, "name", Value::Null),
                    "type": field_or(r, "type", Value::Null),
                    "id": r.get("id").or_else(|| r.get("name")).cloned(),
                    "inputs": field_or(r, "inputs", json!([])),
                    "outputs": field_or(r, "outputs", json!([])),
                })
            })
            .collect();
        Ok(json!({
            "status": "ok",
            "total_count": recipes.len(),
            "recipes": recipes,
            "project_key": input.project_key,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(value: Value) -> Vec<OutputSpec> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn outputs_resolve_names_and_specs() {
        let outputs = resolve_outputs(&specs(json!([
            "existing",
            {"name": "fresh", "new": true, "connection": "s3_conn"},
            {"name": "appended", "append": true}
        ])))
        .unwrap();
        assert_eq!(outputs[0], RecipeOutput::existing("existing"));
        assert!(outputs[1].create);
        assert_eq!(outputs[1].connection, "s3_conn");
        assert!(outputs[2].append);
        assert!(!outputs[2].create);
    }

    #[test]
    fn output_spec_without_name_is_rejected() {
        let err = resolve_outputs(&specs(json!([{"new": true}]))).unwrap_err();
        assert_eq!(err.message, "Output specification must include 'name' field");
        let err = resolve_outputs(&specs(json!([42]))).unwrap_err();
        assert_eq!(err.message, "Invalid output specification: 42");
    }

    #[test]
    fn refs_default_to_own_project() {
        let refs = refs_with_project(
            &[json!({"ref": "a"}), json!({"ref": "b", "projectKey": "SHARED"})],
            "P",
        );
        assert_eq!(refs[0], json!({"name": "a", "project": "P"}));
        assert_eq!(refs[1]["project"], "SHARED");
    }
}
