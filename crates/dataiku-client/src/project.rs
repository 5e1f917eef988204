//! Project handle and the object collections it owns.

use serde_json::{json, Value};
use tracing::debug;

use crate::client::DssClient;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::job::Job;
use crate::recipe::{Recipe, RecipeCreation};
use crate::scenario::Scenario;
use crate::transport::{segment, ApiRequest};

/// A project on the instance, addressed by key.
#[derive(Clone)]
pub struct Project {
    client: DssClient,
    key: String,
}

impl Project {
    pub(crate) fn new(client: DssClient, key: String) -> Self {
        Self { client, key }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn client(&self) -> &DssClient {
        &self.client
    }

    pub(crate) fn path(&self, rest: &str) -> String {
        format!("/projects/{}{}", segment(&self.key), rest)
    }

    pub async fn metadata(&self) -> Result<Value> {
        self.client.get(self.path("/metadata")).await
    }

    pub async fn set_metadata(&self, metadata: Value) -> Result<()> {
        self.client.put(self.path("/metadata"), metadata).await?;
        Ok(())
    }

    /// Project variables as `{"standard": {...}, "local": {...}}`.
    pub async fn variables(&self) -> Result<Value> {
        self.client.get(self.path("/variables/")).await
    }

    pub async fn set_variables(&self, variables: Value) -> Result<()> {
        self.client.put(self.path("/variables/"), variables).await?;
        Ok(())
    }

    pub async fn settings(&self) -> Result<Value> {
        self.client.get(self.path("/settings")).await
    }

    pub async fn permissions(&self) -> Result<Value> {
        self.client.get(self.path("/permissions")).await
    }

    // ----- datasets -----

    pub async fn list_datasets(&self) -> Result<Vec<Value>> {
        self.client.get_list(self.path("/datasets/")).await
    }

    pub fn dataset(&self, name: impl Into<String>) -> Dataset {
        Dataset::new(self.clone(), name.into())
    }

    /// Create a dataset from a raw type and params block.
    pub async fn create_dataset(
        &self,
        name: &str,
        dataset_type: &str,
        params: Value,
        format_type: Option<&str>,
        format_params: Option<Value>,
    ) -> Result<Dataset> {
        let mut body = json!({
            "projectKey": self.key,
            "name": name,
            "type": dataset_type,
            "params": params,
        });
        if let Some(format_type) = format_type {
            body["formatType"] = json!(format_type);
            body["formatParams"] = format_params.unwrap_or_else(|| json!({}));
        }
        self.client
            .send(ApiRequest::post(self.path("/datasets/")).json(body))
            .await?;
        debug!(project_key = %self.key, dataset = %name, %dataset_type, "created dataset");
        Ok(self.dataset(name))
    }

    /// Create a managed dataset stored on `connection`.
    pub async fn create_managed_dataset(
        &self,
        name: &str,
        connection: &str,
        format_option: Option<&str>,
    ) -> Result<Dataset> {
        let mut creation = json!({
            "connectionId": connection,
            "specificSettings": {},
        });
        if let Some(format) = format_option {
            creation["specificSettings"]["formatOptionId"] = json!(format);
        }
        let body = json!({ "name": name, "creationSettings": creation });
        self.client
            .send(ApiRequest::post(self.path("/datasets/managed")).json(body))
            .await?;
        debug!(project_key = %self.key, dataset = %name, %connection, "created managed dataset");
        Ok(self.dataset(name))
    }

    pub async fn create_upload_dataset(
        &self,
        name: &str,
        connection: Option<&str>,
    ) -> Result<Dataset> {
        let params = match connection {
            Some(conn) => json!({ "uploadConnection": conn }),
            None => json!({}),
        };
        self.create_dataset(name, "UploadedFiles", params, None, None)
            .await
    }

    // ----- recipes -----

    pub async fn list_recipes(&self) -> Result<Vec<Value>> {
        self.client.get_list(self.path("/recipes/")).await
    }

    pub fn recipe(&self, name: impl Into<String>) -> Recipe {
        Recipe::new(self.clone(), name.into())
    }

    /// Create a recipe. Outputs flagged as new are created as managed
    /// datasets first.
    pub async fn create_recipe(&self, creation: &RecipeCreation) -> Result<Recipe> {
        for output in creation.outputs.iter().filter(|o| o.create) {
            self.create_managed_dataset(&output.name, &output.connection, None)
                .await?;
        }
        let response = self
            .client
            .send(ApiRequest::post(self.path("/recipes/")).json(creation.to_body()))
            .await?;
        let name = response
            .get("name")
            .or_else(|| response.get("id"))
            .and_then(Value::as_str)
            .unwrap_or(&creation.name)
            .to_string();
        debug!(project_key = %self.key, recipe = %name, "created recipe");
        Ok(self.recipe(name))
    }

    // ----- scenarios -----

    pub async fn list_scenarios(&self) -> Result<Vec<Value>> {
        self.client.get_list(self.path("/scenarios/")).await
    }

    pub fn scenario(&self, id: impl Into<String>) -> Scenario {
        Scenario::new(self.clone(), id.into())
    }

    /// Create a scenario; `definition` is merged under `name`/`type`.
    pub async fn create_scenario(
        &self,
        name: &str,
        scenario_type: &str,
        definition: Value,
    ) -> Result<Scenario> {
        let mut body = match definition {
            Value::Object(map) => Value::Object(map),
            _ => json!({}),
        };
        body["name"] = json!(name);
        body["type"] = json!(scenario_type);
        let response = self
            .client
            .send(ApiRequest::post(self.path("/scenarios/")).json(body))
            .await?;
        let id = response
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string();
        debug!(project_key = %self.key, scenario = %id, "created scenario");
        Ok(self.scenario(id))
    }

    // ----- jobs -----

    pub async fn list_jobs(&self) -> Result<Vec<Value>> {
        self.client.get_list(self.path("/jobs/")).await
    }

    pub fn job(&self, id: impl Into<String>) -> Job {
        Job::new(self.clone(), id.into())
    }

    /// Start a build job from a raw job definition.
    pub async fn start_job(&self, definition: Value) -> Result<Job> {
        let response = self
            .client
            .send(ApiRequest::post(self.path("/jobs/")).json(definition))
            .await?;
        let id = response
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                crate::Error::InvalidResponse("job start response has no id".into())
            })?;
        debug!(project_key = %self.key, job_id = %id, "started job");
        Ok(self.job(id))
    }
}
