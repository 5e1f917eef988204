//! Type definitions for MCP tool inputs
//!
//! Every tool takes one of these structs as its `Parameters`. Field doc
//! comments become the descriptions in the generated JSON Schema, so they are
//! written for the calling assistant.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

/// Free-form JSON object argument.
pub type JsonObject = BTreeMap<String, Value>;

/// Turn a free-form argument into a JSON object value.
pub fn object(map: JsonObject) -> Value {
    Value::Object(map.into_iter().collect())
}

fn default_true() -> bool {
    true
}

// ============================================================================
// SHARED REFERENCES
// ============================================================================

/// A project, addressed by key.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ProjectRef {
    /// Project key (e.g. "SALES_ANALYTICS")
    pub project_key: String,
}

/// A project key that may be omitted for instance-wide queries.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct OptionalProjectRef {
    /// Project key; when set, project-level usage is added to the answer
    #[serde(default)]
    pub project_key: Option<String>,
}

/// A dataset inside a project.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DatasetRef {
    /// Project key
    pub project_key: String,

    /// Dataset name
    pub dataset_name: String,
}

/// A recipe inside a project.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RecipeRef {
    /// Project key
    pub project_key: String,

    /// Recipe name
    pub recipe_name: String,
}

/// A scenario inside a project.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ScenarioRef {
    /// Project key
    pub project_key: String,

    /// Scenario id
    pub scenario_id: String,
}

// ============================================================================
// DATASET INPUTS
// ============================================================================

/// Input for the create_dataset tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateDatasetInput {
    pub project_key: String,

    /// Name of the new dataset
    pub dataset_name: String,

    /// "managed", "filesystem", "sql", "s3", "uploaded", or any raw DSS type
    pub dataset_type: String,

    /// Type-specific parameters: store_into, connection, path, table,
    /// schema, catalog, bucket, format_type, format_params
    #[serde(default)]
    pub params: JsonObject,
}

/// Input for the update_dataset tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateDatasetInput {
    pub project_key: String,
    pub dataset_name: String,

    /// New description
    pub description: Option<String>,

    /// Replacement tag list
    pub tags: Option<Vec<String>>,

    /// Custom fields merged into the existing ones
    pub custom_fields: Option<JsonObject>,

    /// Storage format (e.g. "csv", "parquet")
    pub format_type: Option<String>,

    /// Format parameters
    pub format_params: Option<JsonObject>,

    /// Connection name
    pub connection: Option<String>,

    /// Path inside the connection (file-based datasets)
    pub path: Option<String>,

    /// Table name (SQL datasets)
    pub table: Option<String>,

    /// Database schema (SQL datasets)
    pub schema: Option<String>,
}

/// Input for the delete_dataset tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteDatasetInput {
    pub project_key: String,
    pub dataset_name: String,

    /// Also drop the stored data (default: false)
    #[serde(default)]
    pub drop_data: bool,
}

/// Input for the build_dataset tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BuildDatasetInput {
    pub project_key: String,
    pub dataset_name: String,

    /// RECURSIVE_BUILD, NON_RECURSIVE_FORCED_BUILD or RECURSIVE_FORCED_BUILD
    pub mode: Option<String>,

    /// Partition to build (partitioned datasets only)
    pub partition: Option<String>,
}

/// Input for the list_datasets tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListDatasetsInput {
    pub project_key: String,

    /// Only return datasets of this DSS type (e.g. "Filesystem")
    pub dataset_type: Option<String>,
}

/// Input for the clear_dataset tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClearDatasetInput {
    pub project_key: String,
    pub dataset_name: String,

    /// Only clear this partition
    pub partition: Option<String>,
}

// ============================================================================
// RECIPE INPUTS
// ============================================================================

/// One recipe output: a bare dataset name or a detailed specification.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OutputSpec {
    /// Existing dataset name
    Name(String),

    /// Detailed output
    Spec {
        /// Dataset name
        name: Option<String>,

        /// Create the dataset as a new managed dataset
        #[serde(default)]
        new: bool,

        /// Connection for a new dataset (default: filesystem_managed)
        connection: Option<String>,

        /// Append instead of overwrite
        #[serde(default)]
        append: bool,
    },

    /// Anything else is rejected
    Other(Value),
}

/// Input for the create_recipe tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateRecipeInput {
    pub project_key: String,

    /// Recipe type (python, sql, sync, join, ...)
    pub recipe_type: String,

    pub recipe_name: String,

    /// Input dataset names
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Outputs: dataset names or {name, new, connection, append}
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,

    /// Source code for code recipes
    pub code: Option<String>,
}

/// Input for the update_recipe tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateRecipeInput {
    pub project_key: String,
    pub recipe_name: String,

    /// Replacement source code
    pub code: Option<String>,

    pub description: Option<String>,
    pub tags: Option<Vec<String>>,

    /// Custom fields merged into the existing ones
    pub custom_fields: Option<JsonObject>,

    /// Execution engine (e.g. "DSS", "SPARK", "SQL")
    pub engine_type: Option<String>,

    /// Container execution configuration name
    pub container_conf: Option<String>,

    /// Resource settings block
    pub resource_settings: Option<JsonObject>,
}

/// Input for the run_recipe tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunRecipeInput {
    pub project_key: String,
    pub recipe_name: String,

    /// RECURSIVE_BUILD, NON_RECURSIVE_FORCED_BUILD or RECURSIVE_FORCED_BUILD
    pub build_mode: Option<String>,
}

/// Input for the list_recipes tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListRecipesInput {
    pub project_key: String,

    /// Only return recipes of this type
    pub recipe_type: Option<String>,
}

// ============================================================================
// SCENARIO INPUTS
// ============================================================================

/// Input for the create_scenario tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateScenarioInput {
    pub project_key: String,
    pub scenario_name: String,

    /// "step_based" or "custom_python"
    pub scenario_type: String,

    /// Initial definition (default: {"params": {}})
    pub definition: Option<JsonObject>,
}

/// Input for the update_scenario tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateScenarioInput {
    pub project_key: String,
    pub scenario_id: String,

    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
    pub tags: Option<Vec<String>>,

    /// Custom fields merged into the existing ones
    pub custom_fields: Option<JsonObject>,

    /// Keys merged into the scenario settings
    pub definition: Option<JsonObject>,

    /// New script for a custom_python step
    pub step_script: Option<String>,

    /// Step receiving `step_script` (default: 0)
    #[serde(default)]
    pub step_index: usize,
}

/// Input for the add_scenario_trigger tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddTriggerInput {
    pub project_key: String,
    pub scenario_id: String,

    /// periodic, hourly, daily, monthly or dataset
    pub trigger_type: String,

    /// Display name of the trigger
    pub trigger_name: Option<String>,

    /// periodic: minutes between runs (default: 60)
    pub every_minutes: Option<u32>,

    /// hourly: first hour of the day (default: 0)
    pub starting_hour: Option<u32>,

    /// hourly: minute within the hour (default: 0)
    pub minute_of_hour: Option<u32>,

    /// hourly/daily: repeat every N units (default: 1)
    pub repeat_every: Option<u32>,

    /// daily/monthly: hour of day (default: 2)
    pub hour: Option<u32>,

    /// daily/monthly: minute (default: 0)
    pub minute: Option<u32>,

    /// daily: start date day; monthly: day of month (default: 1)
    pub day: Option<u32>,

    /// Start date month
    pub month: Option<u32>,

    /// Start date year
    pub year: Option<i32>,

    /// daily: timezone (default: SERVER)
    pub timezone: Option<String>,

    /// dataset: dataset whose change fires the scenario
    pub dataset_name: Option<String>,

    /// dataset: project of that dataset (default: the scenario's project)
    pub dataset_project_key: Option<String>,
}

/// Input for the remove_scenario_trigger tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RemoveTriggerInput {
    pub project_key: String,
    pub scenario_id: String,

    /// Zero-based trigger index
    pub trigger_idx: i64,
}

/// Input for the run_scenario tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunScenarioInput {
    pub project_key: String,
    pub scenario_id: String,

    /// Wait for the run to finish (default: true)
    #[serde(default = "default_true")]
    pub wait: bool,

    /// Report a failed run as ok (default: false)
    #[serde(default)]
    pub no_fail: bool,
}

/// Input for the list_scenarios tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListScenariosInput {
    pub project_key: String,

    /// Only "step_based" or only "custom_python"
    pub scenario_type: Option<String>,

    /// Only active scenarios (default: false)
    #[serde(default)]
    pub active_only: bool,
}

/// Input for the get_scenario_run_history tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunHistoryInput {
    pub project_key: String,
    pub scenario_id: String,

    /// Maximum number of runs (default: 10)
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    10
}

// ============================================================================
// ADVANCED SCENARIO INPUTS
// ============================================================================

/// Input for the get_scenario_logs tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ScenarioLogsInput {
    pub project_key: String,
    pub scenario_id: String,

    /// Run to inspect (default: the most recent)
    pub run_id: Option<String>,
}

/// Changes applied to one step of a cloned scenario.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct StepChanges {
    /// Keys merged into the step params
    pub params: Option<JsonObject>,

    /// New script (custom_python steps only)
    pub code: Option<String>,

    pub name: Option<String>,
    pub enabled: Option<bool>,
}

/// Modifications applied while cloning a scenario.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct CloneModifications {
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub active: Option<bool>,

    /// Step index (as a string key) to changes
    pub step_modifications: Option<BTreeMap<String, StepChanges>>,

    /// Trigger index (as a string key) to keys merged into the trigger
    pub trigger_modifications: Option<BTreeMap<String, JsonObject>>,

    /// Raw triggers appended after the copied ones
    pub new_triggers: Option<Vec<Value>>,

    /// Trigger indices to delete
    pub remove_triggers: Option<Vec<usize>>,
}

impl CloneModifications {
    /// Names of the modification groups present, in a stable order.
    pub fn applied(&self) -> Vec<&'static str> {
        let mut applied = Vec::new();
        if self.description.is_some() {
            applied.push("description");
        }
        if self.tags.is_some() {
            applied.push("tags");
        }
        if self.active.is_some() {
            applied.push("active");
        }
        if self.step_modifications.is_some() {
            applied.push("step_modifications");
        }
        if self.trigger_modifications.is_some() {
            applied.push("trigger_modifications");
        }
        if self.new_triggers.is_some() {
            applied.push("new_triggers");
        }
        if self.remove_triggers.is_some() {
            applied.push("remove_triggers");
        }
        applied
    }
}

/// Input for the clone_scenario tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CloneScenarioInput {
    pub project_key: String,
    pub source_scenario_id: String,
    pub new_scenario_name: String,

    #[serde(default)]
    pub modifications: Option<CloneModifications>,
}

// ============================================================================
// CODE DEVELOPMENT INPUTS
// ============================================================================

/// Input for the validate_recipe_syntax tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ValidateSyntaxInput {
    pub project_key: String,
    pub recipe_name: String,

    /// Code to check instead of the recipe's stored code
    pub code: Option<String>,
}

/// Input for the test_recipe_dry_run tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DryRunInput {
    pub project_key: String,
    pub recipe_name: String,

    /// Rows sampled from each input (default: 100)
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

fn default_sample_rows() -> usize {
    100
}

// ============================================================================
// EXPLORATION INPUTS
// ============================================================================

/// Input for the search_project_objects tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchInput {
    pub project_key: String,

    /// Regex or plain text, matched case-insensitively
    pub search_term: String,

    /// Any of "datasets", "recipes", "scenarios" (default: all three)
    pub object_types: Option<Vec<String>>,
}

/// Input for the get_dataset_sample tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DatasetSampleInput {
    pub project_key: String,
    pub dataset_name: String,

    /// Number of rows (default: 100)
    #[serde(default = "default_sample_rows")]
    pub rows: usize,

    /// Restrict to these columns
    pub columns: Option<Vec<String>>,
}

// ============================================================================
// MONITORING INPUTS
// ============================================================================

/// Input for the get_recent_runs tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RecentRunsInput {
    pub project_key: String,

    /// Maximum number of runs (default: 50)
    #[serde(default = "default_recent_limit")]
    pub limit: usize,

    /// Only runs with this outcome (SUCCESS, FAILED, DONE, ...)
    pub status_filter: Option<String>,
}

fn default_recent_limit() -> usize {
    50
}

/// Input for the get_job_details tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct JobDetailsInput {
    pub project_key: String,
    pub job_id: String,
}

/// Input for the cancel_running_jobs tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CancelJobsInput {
    pub project_key: String,

    /// Jobs to abort
    pub job_ids: Vec<String>,
}

// ============================================================================
// PRODUCTIVITY INPUTS
// ============================================================================

/// Input for the duplicate_project_structure tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DuplicateProjectInput {
    pub source_project_key: String,
    pub target_project_key: String,

    /// Display name of the new project (default: the target key)
    pub target_project_name: Option<String>,

    /// Record that data should follow; only the structure is copied
    #[serde(default)]
    pub include_data: bool,
}

/// Input for the export_project_config tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExportConfigInput {
    pub project_key: String,

    /// "json" (default) or "yaml"
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "json".into()
}

/// Input for the batch_update_objects tool
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BatchUpdateInput {
    pub project_key: String,

    /// "datasets", "recipes" or "scenarios"
    pub object_type: String,

    /// Regex or plain text matched against object names
    pub pattern: String,

    /// description, tags, settings, code, recipe_params, active
    pub updates: JsonObject,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_specs_accept_names_and_objects() {
        let outputs: Vec<OutputSpec> =
            serde_json::from_value(json!(["a", {"name": "b", "new": true}, 3])).unwrap();
        assert!(matches!(&outputs[0], OutputSpec::Name(n) if n == "a"));
        assert!(matches!(&outputs[1], OutputSpec::Spec { name: Some(n), new: true, .. } if n == "b"));
        assert!(matches!(&outputs[2], OutputSpec::Other(_)));
    }

    #[test]
    fn run_scenario_waits_by_default() {
        let input: RunScenarioInput =
            serde_json::from_value(json!({"project_key": "P", "scenario_id": "S"})).unwrap();
        assert!(input.wait);
        assert!(!input.no_fail);
    }

    #[test]
    fn clone_modifications_report_their_keys() {
        let mods: CloneModifications =
            serde_json::from_value(json!({"tags": [], "remove_triggers": [2, 0]})).unwrap();
        assert_eq!(mods.applied(), vec!["tags", "remove_triggers"]);
    }
}
