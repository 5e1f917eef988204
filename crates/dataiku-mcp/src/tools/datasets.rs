//! Dataset tools: create, update, delete, build, inspect.

use dataiku_client::recipe::DEFAULT_RUN_MODE;
use dataiku_client::Dataset;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::{ensure_job_done, field_or, str_or, tags_of, validate_build_mode};
use crate::error::into_response;
use crate::patch::{apply_metadata, as_object_mut};
use crate::server::McpServerState;
use crate::types::*;
use crate::{Error, Result};

const DEFAULT_CONNECTION: &str = "filesystem_managed";

/// How a dataset gets created, resolved from the requested type.
#[derive(Debug, Clone, PartialEq)]
enum Creation {
    Managed {
        store_into: String,
    },
    Filesystem {
        connection: String,
        path: String,
    },
    Sql {
        connection: String,
        table: String,
        schema: Option<String>,
        catalog: Option<String>,
    },
    S3 {
        connection: String,
        path: String,
        bucket: Option<String>,
    },
    Uploaded {
        connection: Option<String>,
    },
    Generic,
}

/// Non-empty string parameter.
fn param<'a>(params: &'a JsonObject, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn owned(params: &JsonObject, key: &str) -> Option<String> {
    param(params, key).map(str::to_string)
}

/// Create a dataset of a well-known kind, or pass raw params through for
/// any other DSS type.
pub struct CreateDatasetTool;

impl CreateDatasetTool {
    pub async fn execute(state: &McpServerState, input: CreateDatasetInput) -> Value {
        let context = format!("Failed to create dataset '{}'", input.dataset_name);
        into_response(Self::run(state, input).await, &context)
    }

    fn validate_input(input: &CreateDatasetInput) -> Result<Creation> {
        let params = &input.params;
        let creation = match input.dataset_type.to_lowercase().as_str() {
            "managed" => Creation::Managed {
                store_into: owned(params, "store_into").unwrap_or_else(|| DEFAULT_CONNECTION.into()),
            },
            "filesystem" => Creation::Filesystem {
                connection: owned(params, "connection").unwrap_or_else(|| DEFAULT_CONNECTION.into()),
                path: owned(params, "path").ok_or_else(|| {
                    Error::invalid_param("params.path", "Path is required for filesystem datasets")
                })?,
            },
            "sql" => match (owned(params, "connection"), owned(params, "table")) {
                (Some(connection), Some(table)) => Creation::Sql {
                    connection,
                    table,
                    schema: owned(params, "schema"),
                    catalog: owned(params, "catalog"),
                },
                _ => {
                    return Err(Error::invalid_param(
                        "params",
                        "Connection and table are required for SQL datasets",
                    ))
                }
            },
            "s3" => match (owned(params, "connection"), owned(params, "path")) {
                (Some(connection), Some(path)) => Creation::S3 {
                    connection,
                    path,
                    bucket: owned(params, "bucket"),
                },
                _ => {
                    return Err(Error::invalid_param(
                        "params",
                        "Connection and path are required for S3 datasets",
                    ))
                }
            },
            "uploaded" => Creation::Uploaded {
                connection: owned(params, "connection"),
            },
            _ => Creation::Generic,
        };
        Ok(creation)
    }

    async fn run(state: &McpServerState, input: CreateDatasetInput) -> Result<Value> {
        let creation = Self::validate_input(&input)?;
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let name = input.dataset_name.as_str();
        let format_type = param(&input.params, "format_type");
        let format_params = input.params.get("format_params").cloned();

        let dataset = match &creation {
            Creation::Managed { store_into } => {
                let dataset = project
                    .create_managed_dataset(name, store_into, format_type)
                    .await?;
                if let Some(format_params) = &format_params {
                    set_format(&dataset, None, Some(format_params)).await?;
                }
                dataset
            }
            Creation::Filesystem { connection, path } => {
                project
                    .create_dataset(
                        name,
                        "Filesystem",
                        json!({ "connection": connection, "path": path }),
                        None,
                        None,
                    )
                    .await?
            }
            Creation::Sql {
                connection,
                table,
                schema,
                catalog,
            } => {
                // SQL datasets are typed by their database flavour.
                let sql_type = match client.connection(connection).await {
                    Ok(def) => str_or(&def, "type", "sql").to_string(),
                    Err(err) => {
                        debug!(%connection, error = %err, "connection lookup failed, using generic sql type");
                        "sql".to_string()
                    }
                };
                let mut params = json!({ "connection": connection, "mode": "table", "table": table });
                if let Some(schema) = schema {
                    params["schema"] = json!(schema);
                }
                if let Some(catalog) = catalog {
                    params["catalog"] = json!(catalog);
                }
                project
                    .create_dataset(name, &sql_type, params, None, None)
                    .await?
            }
            Creation::S3 {
                connection,
                path,
                bucket,
            } => {
                let mut params = json!({ "connection": connection, "path": path });
                if let Some(bucket) = bucket {
                    params["bucket"] = json!(bucket);
                }
                project
                    .create_dataset(name, "S3", params, None, None)
                    .await?
            }
            Creation::Uploaded { connection } => {
                project
                    .create_upload_dataset(name, connection.as_deref())
                    .await?
            }
            Creation::Generic => {
                project
                    .create_dataset(
                        name,
                        &input.dataset_type,
                        object(input.params.clone()),
                        format_type,
                        format_params.clone(),
                    )
                    .await?
            }
        };

        let needs_format = !matches!(creation, Creation::Managed { .. } | Creation::Generic);
        if needs_format && format_type.is_some() {
            set_format(&dataset, format_type, format_params.as_ref()).await?;
        }

        info!(project_key = %input.project_key, dataset = %name, dataset_type = %input.dataset_type, "dataset created");
        Ok(json!({
            "status": "ok",
            "dataset_name": name,
            "dataset_type": input.dataset_type,
            "dataset_id": dataset.name(),
            "project_key": input.project_key,
            "message": format!("Dataset '{name}' created successfully"),
        }))
    }
}

/// Write format type and/or params into a dataset definition.
async fn set_format(
    dataset: &Dataset,
    format_type: Option<&str>,
    format_params: Option<&Value>,
) -> Result<()> {
    let mut definition = dataset.definition().await?;
    let map = as_object_mut(&mut definition);
    if let Some(format_type) = format_type {
        map.insert("formatType".into(), json!(format_type));
    }
    if let Some(format_params) = format_params {
        map.insert("formatParams".into(), format_params.clone());
    }
    dataset.save_definition(definition).await?;
    Ok(())
}

pub struct UpdateDatasetTool;

impl UpdateDatasetTool {
    pub async fn execute(state: &McpServerState, input: UpdateDatasetInput) -> Value {
        let context = format!("Failed to update dataset '{}'", input.dataset_name);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: UpdateDatasetInput) -> Result<Value> {
        let client = state.client().await?;
        let dataset = client
            .project(&input.project_key)
            .dataset(&input.dataset_name);
        let mut updated: Vec<&str> = Vec::new();

        if input.description.is_some() || input.tags.is_some() || input.custom_fields.is_some() {
            let mut metadata = dataset.metadata().await?;
            updated.extend(apply_metadata(
                &mut metadata,
                input.description.as_deref(),
                input.tags.as_deref(),
                input.custom_fields.as_ref(),
            ));
            dataset.set_metadata(metadata).await?;
        }

        let touches_settings = input.format_type.is_some()
            || input.format_params.is_some()
            || input.connection.is_some()
            || input.path.is_some()
            || input.table.is_some()
            || input.schema.is_some();
        if touches_settings {
            let mut definition = dataset.definition().await?;
            let current = definition.get("params").cloned().unwrap_or_else(|| json!({}));
            let map = as_object_mut(&mut definition);
            if let Some(format_type) = &input.format_type {
                map.insert("formatType".into(), json!(format_type));
                updated.push("format_type");
            }
            if let Some(format_params) = &input.format_params {
                map.insert("formatParams".into(), object(format_params.clone()));
                updated.push("format_params");
            }

            let params = as_object_mut(map.entry("params").or_insert_with(|| json!({})));
            if let Some(connection) = &input.connection {
                params.insert("connection".into(), json!(connection));
                updated.push("connection");
            }
            if let Some(path) = &input.path {
                params.insert("path".into(), json!(path));
                updated.push("path");
            }
            if input.table.is_some() || input.schema.is_some() {
                let connection = current
                    .get("connection")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| input.connection.clone());
                let table = input
                    .table
                    .clone()
                    .or_else(|| current.get("table").and_then(Value::as_str).map(str::to_string));
                let schema = input
                    .schema
                    .clone()
                    .or_else(|| current.get("schema").and_then(Value::as_str).map(str::to_string));
                if let (Some(_), Some(table)) = (connection, table) {
                    params.insert("table".into(), json!(table));
                    params.insert("schema".into(), json!(schema));
                    updated.extend(["table", "schema"]);
                }
            }
            dataset.save_definition(definition).await?;
        }

        debug!(project_key = %input.project_key, dataset = %input.dataset_name, ?updated, "dataset updated");
        Ok(json!({
            "status": "ok",
            "dataset_name": input.dataset_name,
            "updated_fields": updated,
            "message": format!("Dataset '{}' updated successfully", input.dataset_name),
        }))
    }
}

pub struct DeleteDatasetTool;

impl DeleteDatasetTool {
    pub async fn execute(state: &McpServerState, input: DeleteDatasetInput) -> Value {
        let context = format!("Failed to delete dataset '{}'", input.dataset_name);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: DeleteDatasetInput) -> Result<Value> {
        let client = state.client().await?;
        let dataset = client
            .project(&input.project_key)
            .dataset(&input.dataset_name);
        let definition = dataset.definition().await?;
        dataset.delete(input.drop_data).await?;
        info!(project_key = %input.project_key, dataset = %input.dataset_name, drop_data = input.drop_data, "dataset deleted");
        Ok(json!({
            "status": "ok",
            "deleted_dataset": {
                "name": input.dataset_name,
                "type": field_or(&definition, "type", json!("unknown")),
                "id": input.dataset_name,
            },
            "drop_data": input.drop_data,
            "message": format!("Dataset '{}' deleted successfully", input.dataset_name),
        }))
    }
}

/// Build a dataset and wait for the job.
pub struct BuildDatasetTool;

impl BuildDatasetTool {
    pub async fn execute(state: &McpServerState, input: BuildDatasetInput) -> Value {
        let context = format!("Failed to build dataset '{}'", input.dataset_name);
        into_response(Self::run(state, input).await, &context)
    }

    fn validate_input(input: &BuildDatasetInput) -> Result<()> {
        validate_build_mode("mode", "build mode", input.mode.as_deref())
    }

    async fn run(state: &McpServerState, input: BuildDatasetInput) -> Result<Value> {
        Self::validate_input(&input)?;
        let client = state.client().await?;
        let dataset = client
            .project(&input.project_key)
            .dataset(&input.dataset_name);
        let job_type = input.mode.as_deref().unwrap_or(DEFAULT_RUN_MODE);
        let result = dataset.build(job_type, input.partition.as_deref()).await?;
        info!(project_key = %input.project_key, dataset = %input.dataset_name, job_id = %result.id, outcome = %result.outcome(), "dataset build finished");
        ensure_job_done(&result)?;
        Ok(json!({
            "status": "ok",
            "dataset_name": input.dataset_name,
            "job_id": result.id,
            "job_status": result.outcome(),
            "job_start_time": result.start_time(),
            "job_end_time": result.end_time(),
            "build_mode": input.mode,
            "partition": input.partition,
            "message": format!("Dataset '{}' built successfully", input.dataset_name),
        }))
    }
}

/// Describe one schema column, with the extra fields its type carries.
fn describe_column(col: &Value) -> Value {
    let mut info = json!({
        "name": field_or(col, "name", Value::Null),
        "type": field_or(col, "type", Value::Null),
        "meaning": field_or(col, "meaning", Value::Null),
        "comment": field_or(col, "comment", json!("")),
        "nullable": field_or(col, "nullable", json!(true)),
    });
    match col.get("type").and_then(Value::as_str) {
        Some("string") => info["max_length"] = field_or(col, "maxLength", Value::Null),
        Some("int" | "bigint" | "float" | "double") => {
            info["min_value"] = field_or(col, "minValue", Value::Null);
            info["max_value"] = field_or(col, "maxValue", Value::Null);
        }
        Some("array") => info["array_type"] = field_or(col, "arrayType", Value::Null),
        Some("map") => {
            info["key_type"] = field_or(col, "keyType", Value::Null);
            info["value_type"] = field_or(col, "valueType", Value::Null);
        }
        Some("object") => info["object_fields"] = field_or(col, "objectFields", json!([])),
        _ => {}
    }
    info
}

pub struct InspectSchemaTool;

impl InspectSchemaTool {
    pub async fn execute(state: &McpServerState, input: DatasetRef) -> Value {
        let context = format!("Failed to inspect schema for dataset '{}'", input.dataset_name);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: DatasetRef) -> Result<Value> {
        let client = state.client().await?;
        let schema = client
            .project(&input.project_key)
            .dataset(&input.dataset_name)
            .schema()
            .await?;
        let columns: Vec<Value> = schema
            .get("columns")
            .and_then(Value::as_array)
            .map(|cols| cols.iter().map(describe_column).collect())
            .unwrap_or_default();
        Ok(json!({
            "status": "ok",
            "dataset_name": input.dataset_name,
            "schema": {
                "column_count": columns.len(),
                "columns": columns,
                "user_modified": field_or(&schema, "userModified", json!(false)),
            },
            "message": format!("Schema for dataset '{}' retrieved successfully", input.dataset_name),
        }))
    }
}

fn metric_value(group: &Value, key: &str) -> Value {
    group
        .get(key)
        .and_then(|m| m.get("value"))
        .cloned()
        .unwrap_or(Value::Null)
}

/// Reshape a last-values document into basic, validity and column groups.
fn summarize_metrics(metrics: &Value) -> Value {
    let mut out = Map::new();
    if let Some(basic) = metrics.get("basic") {
        out.insert(
            "basic".into(),
            json!({
                "record_count": metric_value(basic, "COUNT_RECORDS"),
                "column_count": metric_value(basic, "COUNT_COLUMNS"),
                "file_size": metric_value(basic, "SIZE_BYTES"),
                "file_count": metric_value(basic, "COUNT_FILES"),
            }),
        );
    }
    if let Some(validity) = metrics.get("validity").and_then(Value::as_object) {
        let checks: Map<String, Value> = validity
            .iter()
            .map(|(name, data)| {
                (
                    name.clone(),
                    json!({
                        "value": field_or(data, "value", Value::Null),
                        "valid": field_or(data, "valid", json!(true)),
                    }),
                )
            })
            .collect();
        out.insert("validity".into(), Value::Object(checks));
    }
    if let Some(columns) = metrics.get("columnStats").and_then(Value::as_object) {
        let stats: Map<String, Value> = columns
            .iter()
            .map(|(name, s)| {
                (
                    name.clone(),
                    json!({
                        "min": metric_value(s, "min"),
                        "max": metric_value(s, "max"),
                        "avg": metric_value(s, "avg"),
                        "std": metric_value(s, "std"),
                        "count_distinct": metric_value(s, "countDistinct"),
                        "count_non_null": metric_value(s, "countNonNull"),
                    }),
                )
            })
            .collect();
        out.insert("column_stats".into(), Value::Object(stats));
    }
    Value::Object(out)
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

pub struct CheckMetricsTool;

impl CheckMetricsTool {
    pub async fn execute(state: &McpServerState, input: DatasetRef) -> Value {
        let context = format!("Failed to check metrics for dataset '{}'", input.dataset_name);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: DatasetRef) -> Result<Value> {
        let client = state.client().await?;
        let metrics = client
            .project(&input.project_key)
            .dataset(&input.dataset_name)
            .last_metric_values(None)
            .await?;
        Ok(json!({
            "status": "ok",
            "dataset_name": input.dataset_name,
            "metrics": summarize_metrics(&metrics),
            "has_metrics": is_present(&metrics),
            "message": format!("Metrics for dataset '{}' retrieved successfully", input.dataset_name),
        }))
    }
}

pub struct PostWriteStatementsTool;

impl PostWriteStatementsTool {
    pub async fn execute(state: &McpServerState, input: DatasetRef) -> Value {
        let context = format!(
            "Failed to get post-write statements for dataset '{}'",
            input.dataset_name
        );
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: DatasetRef) -> Result<Value> {
        let client = state.client().await?;
        let definition = client
            .project(&input.project_key)
            .dataset(&input.dataset_name)
            .definition()
            .await?;
        let params = definition.get("params").unwrap_or(&Value::Null);
        let pre = field_or(params, "customPreWriteStatements", json!([]));
        let post = field_or(params, "customPostWriteStatements", json!([]));
        Ok(json!({
            "status": "ok",
            "dataset_name": input.dataset_name,
            "project_key": input.project_key,
            "has_pre_write": is_present(&pre),
            "has_post_write": is_present(&post),
            "pre_write_statements": pre,
            "post_write_statements": post,
            "message": format!(
                "Post-write statements for dataset '{}' retrieved successfully",
                input.dataset_name
            ),
        }))
    }
}

pub struct ListDatasetsTool;

impl ListDatasetsTool {
    pub async fn execute(state: &McpServerState, input: ListDatasetsInput) -> Value {
        let context = format!("Failed to list datasets in project '{}'", input.project_key);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: ListDatasetsInput) -> Result<Value> {
        let client = state.client().await?;
        let all = client.project(&input.project_key).list_datasets().await?;
        let datasets: Vec<Value> = all
            .iter()
            .filter(|d| match &input.dataset_type {
                Some(t) => d.get("type").and_then(Value::as_str) == Some(t.as_str()),
                None => true,
            })
            .map(|d| {
                json!({
                    "name": field_or(d, "name", Value::Null),
                    "type": field_or(d, "type", Value::Null),
                    "id": d.get("id").or_else(|| d.get("name")).cloned(),
                    "tags": tags_of(d),
                    "managed": field_or(d, "managed", json!(false)),
                    "flow_options": field_or(d, "flowOptions", json!({})),
                    "connection": d.get("params").and_then(|p| p.get("connection")).cloned(),
                })
            })
            .collect();
        Ok(json!({
            "status": "ok",
            "total_count": datasets.len(),
            "datasets": datasets,
            "project_key": input.project_key,
        }))
    }
}

pub struct DatasetInfoTool;

impl DatasetInfoTool {
    pub async fn execute(state: &McpServerState, input: DatasetRef) -> Value {
        let context = format!("Failed to get dataset info for '{}'", input.dataset_name);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: DatasetRef) -> Result<Value> {
        let client = state.client().await?;
        let dataset = client
            .project(&input.project_key)
            .dataset(&input.dataset_name);
        let metadata = dataset.metadata().await?;
        let definition = dataset.definition().await?;
        let params = definition.get("params").unwrap_or(&Value::Null);
        let dataset_type = field_or(&definition, "type", json!("unknown"));
        let managed = definition
            .get("managed")
            .and_then(Value::as_bool)
            .unwrap_or(dataset_type == "Managed");

        Ok(json!({
            "status": "ok",
            "dataset_info": {
                "name": input.dataset_name,
                "type": dataset_type,
                "id": input.dataset_name,
                "description": field_or(&metadata, "description", json!("")),
                "tags": tags_of(&metadata),
                "managed": managed,
                "creation_date": field_or(&metadata, "creationDate", Value::Null),
                "last_modified": field_or(&metadata, "lastModifiedDate", Value::Null),
                "last_modified_by": metadata
                    .get("lastModifiedBy")
                    .and_then(|m| m.get("login"))
                    .cloned(),
                "custom_fields": field_or(&metadata, "customFields", json!({})),
                "flow_options": field_or(&definition, "flowOptions", json!({})),
                "settings": {
                    "format_type": field_or(&definition, "formatType", Value::Null),
                    "connection": field_or(params, "connection", Value::Null),
                    "path": field_or(params, "path", Value::Null),
                    "table": field_or(params, "table", Value::Null),
                    "schema": field_or(params, "schema", Value::Null),
                },
            },
        }))
    }
}

pub struct ClearDatasetTool;

impl ClearDatasetTool {
    pub async fn execute(state: &McpServerState, input: ClearDatasetInput) -> Value {
        let context = format!("Failed to clear dataset '{}'", input.dataset_name);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: ClearDatasetInput) -> Result<Value> {
        let client = state.client().await?;
        let partitions: Option<Vec<String>> = input.partition.clone().map(|p| vec![p]);
        client
            .project(&input.project_key)
            .dataset(&input.dataset_name)
            .clear(partitions.as_deref())
            .await?;
        info!(project_key = %input.project_key, dataset = %input.dataset_name, "dataset cleared");
        Ok(json!({
            "status": "ok",
            "dataset_name": input.dataset_name,
            "partition": input.partition,
            "clear_result": Value::Null,
            "message": format!("Dataset '{}' cleared successfully", input.dataset_name),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(dataset_type: &str, params: Value) -> CreateDatasetInput {
        CreateDatasetInput {
            project_key: "P".into(),
            dataset_name: "d".into(),
            dataset_type: dataset_type.into(),
            params: serde_json::from_value(params).unwrap(),
        }
    }

    #[test]
    fn creation_kind_is_case_insensitive() {
        let creation = CreateDatasetTool::validate_input(&input("MANAGED", json!({}))).unwrap();
        assert_eq!(
            creation,
            Creation::Managed {
                store_into: "filesystem_managed".into()
            }
        );
        let creation =
            CreateDatasetTool::validate_input(&input("Filesystem", json!({"path": "/x"}))).unwrap();
        assert_eq!(
            creation,
            Creation::Filesystem {
                connection: "filesystem_managed".into(),
                path: "/x".into()
            }
        );
    }

    #[test]
    fn required_params_are_checked() {
        let err = CreateDatasetTool::validate_input(&input("filesystem", json!({"path": ""})))
            .unwrap_err();
        assert_eq!(err.message, "Path is required for filesystem datasets");
        let err = CreateDatasetTool::validate_input(&input("sql", json!({"connection": "pg"})))
            .unwrap_err();
        assert_eq!(err.message, "Connection and table are required for SQL datasets");
        let err =
            CreateDatasetTool::validate_input(&input("s3", json!({"path": "p"}))).unwrap_err();
        assert_eq!(err.message, "Connection and path are required for S3 datasets");
    }

    #[test]
    fn unknown_types_take_the_generic_path() {
        let creation =
            CreateDatasetTool::validate_input(&input("Snowflake", json!({"any": 1}))).unwrap();
        assert_eq!(creation, Creation::Generic);
    }

    #[test]
    fn column_descriptions_depend_on_type() {
        let col = describe_column(&json!({"name": "m", "type": "map", "keyType": "string", "valueType": "int"}));
        assert_eq!(col["key_type"], "string");
        assert_eq!(col["comment"], "");
        assert_eq!(col["nullable"], true);
        let col = describe_column(&json!({"name": "n", "type": "bigint", "minValue": 0}));
        assert_eq!(col["min_value"], 0);
        assert!(col["max_value"].is_null());
    }

    #[test]
    fn metrics_are_grouped() {
        let summary = summarize_metrics(&json!({
            "basic": {"COUNT_RECORDS": {"value": 10}},
            "validity": {"not_empty": {"value": 1}},
            "columnStats": {"age": {"min": {"value": 3}, "countDistinct": {"value": 7}}}
        }));
        assert_eq!(summary["basic"]["record_count"], 10);
        assert!(summary["basic"]["file_size"].is_null());
        assert_eq!(summary["validity"]["not_empty"]["valid"], true);
        assert_eq!(summary["column_stats"]["age"]["min"], 3);
        assert_eq!(summary["column_stats"]["age"]["count_distinct"], 7);
        assert!(!is_present(&json!({})));
    }
}
