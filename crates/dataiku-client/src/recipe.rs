use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::job::JobResult;
use crate::project::Project;
use crate::transport::{segment, ApiRequest};

/// Job type DSS uses when running a single recipe.
pub const DEFAULT_RUN_MODE: &str = "NON_RECURSIVE_FORCED_BUILD";

/// Recipe types whose payload is source code.
pub const CODE_RECIPE_TYPES: [&str; 6] = ["python", "r", "sql", "pyspark", "sparkr", "sparksql"];

#[derive(Clone)]
pub struct Recipe {
    project: Project,
    name: String,
}

/// One output of a recipe being created.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeOutput {
    pub name: String,
    /// Create the dataset as a managed dataset before the recipe.
    pub create: bool,
    pub connection: String,
    pub append: bool,
}

impl RecipeOutput {
    pub fn existing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            create: false,
            connection: "filesystem_managed".into(),
            append: false,
        }
    }
}

/// Everything needed to create a recipe.
#[derive(Debug, Clone)]
pub struct RecipeCreation {
    pub recipe_type: String,
    pub name: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<RecipeOutput>,
}

impl RecipeCreation {
    pub(crate) fn to_body(&self) -> Value {
        let inputs: Vec<Value> = self
            .inputs
            .iter()
            .map(|i| json!({ "ref": i, "deps": [] }))
            .collect();
        let outputs: Vec<Value> = self
            .outputs
            .iter()
            .map(|o| json!({ "ref": o.name, "appendMode": o.append }))
            .collect();
        json!({
            "recipePrototype": {
                "type": self.recipe_type,
                "name": self.name,
                "inputs": { "main": { "items": inputs } },
                "outputs": { "main": { "items": outputs } },
            },
            "creationSettings": {},
        })
    }
}

impl Recipe {
    pub(crate) fn new(project: Project, name: String) -> Self {
        Self { project, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn path(&self, rest: &str) -> String {
        self.project
            .path(&format!("/recipes/{}{}", segment(&self.name), rest))
    }

    /// `{"recipe": {...}, "payload": "..."}` as returned by DSS.
    pub async fn definition(&self) -> Result<Value> {
        self.project.client().get(self.path("")).await
    }

    pub async fn save_definition(&self, definition: Value) -> Result<()> {
        self.project.client().put(self.path(""), definition).await?;
        Ok(())
    }

    pub async fn metadata(&self) -> Result<Value> {
        self.project.client().get(self.path("/metadata")).await
    }

    pub async fn set_metadata(&self, metadata: Value) -> Result<()> {
        self.project.client().put(self.path("/metadata"), metadata).await?;
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        self.project
            .client()
            .send(ApiRequest::delete(self.path("")))
            .await?;
        Ok(())
    }

    /// Build the recipe's first output with `job_type` and wait for the job.
    pub async fn run(&self, job_type: Option<&str>) -> Result<JobResult> {
        let definition = self.definition().await?;
        let outputs = outputs(&definition);
        let first = outputs
            .first()
            .and_then(|o| o.get("ref"))
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse(format!("recipe '{}' has no outputs", self.name)))?;

        let job = self
            .project
            .start_job(json!({
                "type": job_type.unwrap_or(DEFAULT_RUN_MODE),
                "outputs": [{ "projectKey": self.project.key(), "id": first, "type": "DATASET" }],
            }))
            .await?;
        job.wait_for_completion().await
    }
}

fn role_items(roles: Option<&Value>) -> Vec<Value> {
    roles
        .and_then(Value::as_object)
        .map(|roles| {
            roles
                .values()
                .filter_map(|role| role.get("items").and_then(Value::as_array))
                .flatten()
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Input references of a recipe definition, across all roles.
pub fn inputs(definition: &Value) -> Vec<Value> {
    role_items(recipe_body(definition).get("inputs"))
}

/// Output references of a recipe definition, across all roles.
pub fn outputs(definition: &Value) -> Vec<Value> {
    role_items(recipe_body(definition).get("outputs"))
}

/// The `recipe` object of a definition, or the value itself when it is
/// already a bare recipe.
pub fn recipe_body(definition: &Value) -> &Value {
    definition.get("recipe").unwrap_or(definition)
}

/// Names referenced by input or output items.
pub fn ref_names(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| i.get("ref").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;
    use reqwest::Method;

    fn definition() -> Value {
        json!({
            "recipe": {
                "type": "python",
                "inputs": {"main": {"items": [{"ref": "raw"}]}},
                "outputs": {"main": {"items": [{"ref": "clean"}, {"ref": "rejects"}]}}
            },
            "payload": "print('hi')"
        })
    }

    #[test]
    fn refs_are_flattened_across_roles() {
        let def = definition();
        assert_eq!(ref_names(&inputs(&def)), vec!["raw"]);
        assert_eq!(ref_names(&outputs(&def)), vec!["clean", "rejects"]);
    }

    #[test]
    fn creation_body_lists_inputs_and_outputs() {
        let creation = RecipeCreation {
            recipe_type: "python".into(),
            name: "compute_clean".into(),
            inputs: vec!["raw".into()],
            outputs: vec![RecipeOutput::existing("clean")],
        };
        let body = creation.to_body();
        assert_eq!(body["recipePrototype"]["inputs"]["main"]["items"][0]["ref"], "raw");
        assert_eq!(
            body["recipePrototype"]["outputs"]["main"]["items"][0]["appendMode"],
            false
        );
    }

    #[tokio::test]
    async fn run_builds_first_output() {
        let mock = MockTransport::new();
        mock.on_get("/projects/P/recipes/r", definition())
            .on_post("/projects/P/jobs/", json!({"id": "j"}))
            .on_get("/projects/P/jobs/j/", json!({"baseStatus": {"state": "DONE"}}));

        let result = mock.client().project("P").recipe("r").run(None).await.unwrap();
        assert_eq!(result.outcome(), "DONE");
        let body = mock.last_body(Method::POST, "/projects/P/jobs/").unwrap();
        assert_eq!(body["outputs"][0]["id"], "clean");
        assert_eq!(body["type"], DEFAULT_RUN_MODE);
    }
}
