//! Code environments, project variables and connections.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{field_or, str_or, tags_of};
use crate::error::into_response;
use crate::server::McpServerState;
use crate::types::*;
use crate::Result;

const HIDDEN: &str = "***HIDDEN***";

/// Variable names whose values are never shown.
const SECRET_VARIABLES: [&str; 4] = ["password", "secret", "key", "token"];

/// Fragments marking a connection parameter as a credential.
const SECRET_PARAM_FRAGMENTS: [&str; 5] = ["password", "secret", "key", "token", "credentials"];

/// How many package names are listed per environment.
const SAMPLE_PACKAGES: usize = 10;

/// Installed packages of an environment, one requirement per line.
fn installed_packages(env: &Value) -> Vec<String> {
    ["actualPackageList", "specPackageList"]
        .iter()
        .filter_map(|key| env.get(*key).and_then(Value::as_str))
        .find(|list| !list.trim().is_empty())
        .map(|list| {
            list.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// A setting that DSS keeps either at the top level of an environment or
/// under its `desc` block.
fn env_setting(env: &Value, key: &str, default: &str) -> Value {
    env.get(key)
        .or_else(|| env.get("desc").and_then(|d| d.get(key)))
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| json!(default))
}

fn project_env_info(project_key: &str, settings: &Value) -> Value {
    let code_envs = settings
        .get("settings")
        .and_then(|s| s.get("codeEnvs"))
        .unwrap_or(&Value::Null);
    let python = code_envs.get("python").unwrap_or(&Value::Null);
    let r = code_envs.get("r").unwrap_or(&Value::Null);
    let overrides = field_or(code_envs, "envOverrides", json!({}));
    let override_count = match &overrides {
        Value::Object(map) => map.len(),
        Value::Array(items) => items.len(),
        _ => 0,
    };
    json!({
        "project_key": project_key,
        "default_python_env": str_or(python, "defaultEnv", "INHERIT"),
        "default_r_env": str_or(r, "defaultEnv", "INHERIT"),
        "use_builtin_python": str_or(python, "mode", "INHERIT") == "INHERIT",
        "use_builtin_r": str_or(r, "mode", "INHERIT") == "INHERIT",
        "environment_overrides": overrides,
        "override_count": override_count,
    })
}

pub struct CodeEnvironmentsTool;

impl CodeEnvironmentsTool {
    pub async fn execute(state: &McpServerState, input: OptionalProjectRef) -> Value {
        into_response(Self::run(state, input).await, "Failed to get code environments")
    }

    async fn run(state: &McpServerState, input: OptionalProjectRef) -> Result<Value> {
        let client = state.client().await?;

        let listed = match client.list_code_envs().await {
            Ok(listed) => listed,
            Err(err) => {
                warn!(error = %err, "could not list code environments");
                Vec::new()
            }
        };
        let mut environments = Vec::with_capacity(listed.len());
        for env in &listed {
            let name = str_or(env, "envName", "");
            let lang = str_or(env, "envLang", "");
            let mut info = json!({
                "name": name,
                "language": lang,
                "type": field_or(env, "deploymentMode", Value::Null),
                "owner": str_or(env, "owner", "unknown"),
                "usable": field_or(env, "usable", json!(false)),
                "description": str_or(env, "description", ""),
            });
            match client.code_env(lang, name).await {
                Ok(details) => {
                    let packages = installed_packages(&details);
                    info["python_interpreter"] = env_setting(&details, "pythonInterpreter", "unknown");
                    info["conda_environment"] = env_setting(&details, "condaEnvironment", "");
                    info["desc"] = match details.get("desc") {
                        Some(Value::String(desc)) => json!(desc),
                        _ => json!(""),
                    };
                    info["package_count"] = json!(packages.len());
                    info["sample_packages"] = json!(&packages[..packages.len().min(SAMPLE_PACKAGES)]);
                }
                Err(err) => info["error"] = json!(format!("Could not get detailed info: {err}")),
            }
            environments.push(info);
        }

        let mut result = json!({
            "status": "ok",
            "global_environment_count": environments.len(),
            "global_environments": environments,
        });

        if let Some(key) = &input.project_key {
            match client.project(key).settings().await {
                Ok(settings) => result["project_environment_info"] = project_env_info(key, &settings),
                Err(err) => {
                    result["project_environment_error"] =
                        json!(format!("Could not get project environment settings: {err}"))
                }
            }
        }
        Ok(result)
    }
}

/// Type name of a variable value, as a dynamically typed caller sees it.
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "NoneType",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Wrap each variable with its type, masking secret ones.
fn describe_variables(variables: Option<&Value>) -> Map<String, Value> {
    variables
        .and_then(Value::as_object)
        .map(|vars| {
            vars.iter()
                .map(|(key, value)| {
                    let shown = if SECRET_VARIABLES.contains(&key.to_lowercase().as_str()) {
                        json!(HIDDEN)
                    } else {
                        value.clone()
                    };
                    (key.clone(), json!({ "type": type_name(value), "value": shown }))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn len_of(value: Option<&Value>) -> usize {
    match value {
        Some(Value::Object(map)) => map.len(),
        Some(Value::Array(items)) => items.len(),
        _ => 0,
    }
}

pub struct ProjectVariablesTool;

impl ProjectVariablesTool {
    pub async fn execute(state: &McpServerState, input: ProjectRef) -> Value {
        into_response(Self::run(state, input).await, "Failed to get project variables")
    }

    async fn run(state: &McpServerState, input: ProjectRef) -> Result<Value> {
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let variables = project.variables().await?;
        let metadata = project.metadata().await?;

        let settings_summary = match project.settings().await {
            Ok(raw) => json!({
                "bundle_export_options": field_or(&raw, "bundleExportOptions", json!({})),
                "git_reference": field_or(&raw, "gitReference", json!({})),
                "flow_display_settings": field_or(&raw, "flowDisplaySettings", json!({})),
                "notebook_exports": field_or(&raw, "notebookExports", json!({})),
            }),
            Err(err) => {
                debug!(project_key = %input.project_key, error = %err, "project settings unavailable");
                json!({ "error": "Settings not available (requires admin permission)" })
            }
        };
        let permissions = project
            .permissions()
            .await
            .unwrap_or_else(|_| json!({ "error": "Permissions not available" }));

        let standard = variables.get("standard");
        let custom = variables.get("local");
        let custom_fields = field_or(&metadata, "customFields", json!({}));
        let tags = tags_of(&metadata);

        Ok(json!({
            "status": "ok",
            "project_info": {
                "key": input.project_key,
                "name": str_or(&metadata, "name", &input.project_key),
                "description": str_or(&metadata, "description", ""),
                "short_description": str_or(&metadata, "shortDesc", ""),
                "tags": tags,
                "owner": str_or(&metadata, "owner", "unknown"),
                "creation_date": field_or(&metadata, "creationDate", json!("")),
                "last_modified": metadata
                    .get("versionTag")
                    .and_then(|v| v.get("lastModified"))
                    .cloned()
                    .unwrap_or(json!("")),
            },
            "variables": {
                "standard": describe_variables(standard),
                "custom": describe_variables(custom),
            },
            "variable_stats": {
                "standard_variable_count": len_of(standard),
                "custom_variable_count": len_of(custom),
                "total_variables": len_of(standard) + len_of(custom),
                "custom_fields_count": len_of(Some(&custom_fields)),
                "tag_count": tags.len(),
            },
            "metadata": {
                "custom_fields": custom_fields,
                "tags": tags,
                "checklists": field_or(&metadata, "checklists", json!([])),
            },
            "settings_summary": settings_summary,
            "permissions": permissions,
        }))
    }
}

/// Connection parameters with credentials masked.
fn safe_params(params: &Value) -> Map<String, Value> {
    params
        .as_object()
        .map(|params| {
            params
                .iter()
                .map(|(key, value)| {
                    let lower = key.to_lowercase();
                    let shown = if SECRET_PARAM_FRAGMENTS.iter().any(|f| lower.contains(f)) {
                        json!(HIDDEN)
                    } else {
                        value.clone()
                    };
                    (key.clone(), shown)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Connection a dataset definition stores into.
fn dataset_connection(definition: &Value) -> String {
    definition
        .get("params")
        .and_then(|p| p.get("connection"))
        .and_then(Value::as_str)
        .unwrap_or("default")
        .to_string()
}

#[derive(Debug, Default)]
struct ConnectionUsage {
    datasets: Vec<Value>,
    used_by_recipes: Option<Vec<String>>,
}

impl ConnectionUsage {
    fn to_json(&self) -> Value {
        let mut usage = json!({ "datasets": self.datasets, "count": self.datasets.len() });
        if let Some(recipes) = &self.used_by_recipes {
            usage["used_by_recipes"] = json!(recipes);
        }
        usage
    }
}

pub struct ConnectionsTool;

impl ConnectionsTool {
    pub async fn execute(state: &McpServerState, input: OptionalProjectRef) -> Value {
        into_response(Self::run(state, input).await, "Failed to get connections")
    }

    async fn project_usage(state: &McpServerState, project_key: &str) -> Result<Value> {
        let client = state.client().await?;
        let project = client.project(project_key);
        let datasets = project.list_datasets().await?;

        let mut usage: BTreeMap<String, ConnectionUsage> = BTreeMap::new();
        let mut dataset_connections: BTreeMap<String, String> = BTreeMap::new();
        for listed in &datasets {
            let name = str_or(listed, "name", "");
            let Ok(definition) = project.dataset(name).definition().await else {
                continue;
            };
            let connection = dataset_connection(&definition);
            usage
                .entry(connection.clone())
                .or_default()
                .datasets
                .push(json!({ "name": name, "type": field_or(listed, "type", Value::Null) }));
            dataset_connections.insert(name.to_string(), connection);
        }

        let recipes = project.list_recipes().await?;
        for listed in &recipes {
            let name = str_or(listed, "name", "");
            let Ok(definition) = project.recipe(name).definition().await else {
                continue;
            };
            let refs = dataiku_client::recipe::inputs(&definition)
                .into_iter()
                .chain(dataiku_client::recipe::outputs(&definition));
            for item in refs {
                let Some(connection) = item
                    .get("ref")
                    .and_then(Value::as_str)
                    .and_then(|r| dataset_connections.get(r))
                else {
                    continue;
                };
                if let Some(entry) = usage.get_mut(connection) {
                    let users = entry.used_by_recipes.get_or_insert_with(Vec::new);
                    if !users.iter().any(|u| u == name) {
                        users.push(name.to_string());
                    }
                }
            }
        }

        let connection_usage: Map<String, Value> = usage
            .iter()
            .map(|(name, usage)| (name.clone(), usage.to_json()))
            .collect();
        Ok(json!({
            "project_key": project_key,
            "unique_connections_used": connection_usage.len(),
            "connection_usage": connection_usage,
            "total_datasets": datasets.len(),
            "total_recipes": recipes.len(),
        }))
    }

    async fn run(state: &McpServerState, input: OptionalProjectRef) -> Result<Value> {
        let client = state.client().await?;

        let listed = match client.list_connections().await {
            Ok(listed) => listed,
            Err(err) => {
                warn!(error = %err, "could not list connections");
                Vec::new()
            }
        };
        let mut connections = Vec::with_capacity(listed.len());
        let mut by_type: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for conn in &listed {
            let name = str_or(conn, "name", "");
            let conn_type = str_or(conn, "type", "unknown");
            let mut info = json!({
                "name": name,
                "type": conn_type,
                "usable": field_or(conn, "usable", json!(false)),
                "allow_write": field_or(conn, "allowWrite", json!(false)),
                "allow_managed_datasets": field_or(conn, "allowManagedDatasets", json!(false)),
                "description": str_or(conn, "description", ""),
            });
            match client.connection(name).await {
                Ok(details) => {
                    info["parameters"] = Value::Object(safe_params(details.get("params").unwrap_or(&Value::Null)));
                    info["description"] = json!(str_or(&details, "description", ""));
                }
                Err(err) => info["error"] = json!(format!("Could not get detailed info: {err}")),
            }
            by_type
                .entry(conn_type.to_string())
                .or_default()
                .push(name.to_string());
            connections.push(info);
        }

        let mut result = json!({
            "status": "ok",
            "global_connection_count": connections.len(),
            "global_connections": connections,
        });

        if let Some(key) = &input.project_key {
            match Self::project_usage(state, key).await {
                Ok(usage) => result["project_connection_info"] = usage,
                Err(err) => {
                    result["project_connection_error"] =
                        json!(format!("Could not get project connection info: {err}"))
                }
            }
        }

        result["connection_type_count"] = json!(by_type.len());
        result["connection_types"] = json!(by_type);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_variables_are_masked_by_exact_name() {
        let vars = json!({"token": "abc", "TOKEN_URL": "https://x", "retries": 3, "ratio": 0.5});
        let described = describe_variables(Some(&vars));
        assert_eq!(described["token"], json!({"type": "str", "value": HIDDEN}));
        assert_eq!(described["TOKEN_URL"]["value"], "https://x");
        assert_eq!(described["retries"]["type"], "int");
        assert_eq!(described["ratio"]["type"], "float");
        assert!(describe_variables(None).is_empty());
    }

    #[test]
    fn credential_params_are_masked_by_fragment() {
        let params = json!({"host": "db", "password": "p", "accessKeyId": "k", "awsCredentialsMode": "ENV"});
        let safe = safe_params(&params);
        assert_eq!(safe["host"], "db");
        assert_eq!(safe["password"], HIDDEN);
        assert_eq!(safe["accessKeyId"], HIDDEN);
        assert_eq!(safe["awsCredentialsMode"], HIDDEN);
    }

    #[test]
    fn packages_come_from_actual_list() {
        let env = json!({"actualPackageList": "pandas==2.0\n\n# pinned\nnumpy\n", "specPackageList": "x"});
        assert_eq!(installed_packages(&env), vec!["pandas==2.0", "numpy"]);
        assert_eq!(installed_packages(&json!({"specPackageList": "scipy"})), vec!["scipy"]);
        assert!(installed_packages(&json!({})).is_empty());
    }

    #[test]
    fn project_env_defaults_to_inherit() {
        let info = project_env_info("P", &json!({}));
        assert_eq!(info["default_python_env"], "INHERIT");
        assert_eq!(info["use_builtin_r"], true);
        assert_eq!(info["override_count"], 0);

        let settings = json!({"settings": {"codeEnvs": {
            "python": {"mode": "EXPLICIT_ENV", "defaultEnv": "py39"},
            "envOverrides": {"recipe_a": "py311"}
        }}});
        let info = project_env_info("P", &settings);
        assert_eq!(info["default_python_env"], "py39");
        assert_eq!(info["use_builtin_python"], false);
        assert_eq!(info["override_count"], 1);
    }

    #[test]
    fn connection_usage_lists_recipes_only_when_seen() {
        let mut usage = ConnectionUsage::default();
        usage.datasets.push(json!({"name": "d"}));
        assert!(usage.to_json().get("used_by_recipes").is_none());
        usage.used_by_recipes = Some(vec!["r".into()]);
        assert_eq!(usage.to_json()["used_by_recipes"], json!(["r"]));
        assert_eq!(usage.to_json()["count"], 1);
    }
}
