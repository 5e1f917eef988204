//! Recipe code tools: read, check and dry-run.

use dataiku_client::recipe::{self, recipe_body, ref_names};
use serde_json::{json, Value};
use tracing::debug;

use super::{field_or, line_count, str_or};
use crate::error::into_response;
use crate::server::McpServerState;
use crate::syntax::{self, imports_module, is_python, reads_input, writes_output};
use crate::types::*;
use crate::Result;

/// Recipe types whose code comes straight from the payload.
const SOURCE_RECIPE_TYPES: [&str; 7] = ["python", "r", "sql", "pyspark", "scala", "sparkr", "sparksql"];

fn language_for(recipe_type: &str) -> &'static str {
    match recipe_type {
        "python" | "pyspark" => "python",
        "r" => "r",
        "scala" => "scala",
        "sql" => "sql",
        _ => "unknown",
    }
}

fn code_info(language: &str, source: &str, code: &str) -> Value {
    json!({
        "language": language,
        "source": source,
        "line_count": line_count(code),
        "char_count": code.chars().count(),
    })
}

/// The recipe's code and where it came from: the source payload of a code
/// recipe, a SQL payload, or the recipe params as JSON.
fn extract_code(recipe_type: &str, definition: &Value) -> Result<(String, Value)> {
    let payload = definition.get("payload").unwrap_or(&Value::Null);

    if SOURCE_RECIPE_TYPES.contains(&recipe_type) {
        if let Some(code) = payload.as_str().filter(|c| !c.is_empty()) {
            let info = code_info(language_for(recipe_type), "get_code", code);
            return Ok((code.to_string(), info));
        }
    }

    let from_payload = match payload {
        Value::String(text) if !text.trim().is_empty() => Some(text.as_str()),
        Value::Object(map) => ["sql", "query", "code"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .find(|code| !code.is_empty()),
        _ => None,
    };
    if let Some(code) = from_payload {
        return Ok((code.to_string(), code_info("sql", "get_payload", code)));
    }

    let params = field_or(recipe_body(definition), "params", json!({}));
    let code = serde_json::to_string_pretty(&params)?;
    let mut info = code_info("json", "get_recipe_params", &code);
    info["type"] = json!("recipe_config");
    Ok((code, info))
}

/// Payload of a code recipe, or empty.
fn payload_code(definition: &Value) -> String {
    str_or(definition, "payload", "").to_string()
}

pub struct RecipeCodeTool;

impl RecipeCodeTool {
    pub async fn execute(state: &McpServerState, input: RecipeRef) -> Value {
        let context = format!("Failed to get recipe code for '{}'", input.recipe_name);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: RecipeRef) -> Result<Value> {
        let client = state.client().await?;
        let definition = client
            .project(&input.project_key)
            .recipe(&input.recipe_name)
            .definition()
            .await?;
        let body = recipe_body(&definition);
        let recipe_type = str_or(body, "type", "unknown");
        let engine = body
            .get("params")
            .and_then(|p| p.get("engine"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let (code, info) = extract_code(recipe_type, &definition)?;

        Ok(json!({
            "status": "ok",
            "recipe_info": {
                "name": input.recipe_name,
                "type": recipe_type,
                "engine": engine,
                "inputs": ref_names(&recipe::inputs(&definition)),
                "outputs": ref_names(&recipe::outputs(&definition)),
            },
            "code": code,
            "code_info": info,
        }))
    }
}

/// Static checks on a recipe's code, or on code supplied by the caller.
pub struct ValidateSyntaxTool;

impl ValidateSyntaxTool {
    pub async fn execute(state: &McpServerState, input: ValidateSyntaxInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to validate recipe syntax")
    }

    fn empty_code() -> Value {
        json!({
            "status": "ok",
            "valid": true,
            "message": "No code to validate (empty recipe)",
            "errors": [],
        })
    }

    async fn run(state: &McpServerState, input: ValidateSyntaxInput) -> Result<Value> {
        if input.code.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Ok(Self::empty_code());
        }
        let client = state.client().await?;
        let definition = client
            .project(&input.project_key)
            .recipe(&input.recipe_name)
            .definition()
            .await?;
        let code = input.code.clone().unwrap_or_else(|| payload_code(&definition));
        if code.trim().is_empty() {
            return Ok(Self::empty_code());
        }

        let recipe_type = str_or(recipe_body(&definition), "type", "unknown");
        let report = syntax::check(recipe_type, &code);
        let mut results = json!({
            "recipe_name": input.recipe_name,
            "recipe_type": recipe_type,
            "code_length": code.chars().count(),
            "line_count": line_count(&code),
        });
        report.record_checks(&mut results);
        debug!(recipe = %input.recipe_name, %recipe_type, errors = report.errors.len(), "recipe code checked");

        Ok(json!({
            "status": "ok",
            "valid": report.is_valid(),
            "validation_results": results,
            "error_count": report.errors.len(),
            "warning_count": report.warnings.len(),
            "errors": report.errors,
            "warnings": report.warnings,
        }))
    }
}

/// Structure checks for python code: imports and dataset access.
fn analyze_python(code: &str) -> Value {
    match syntax::check_python(code) {
        Ok(()) => json!({
            "has_dataiku_import": imports_module(code, "dataiku"),
            "has_input_read": reads_input(code),
            "has_output_write": writes_output(code),
            "line_count": line_count(code),
            "ast_valid": true,
        }),
        Err(issue) => json!({ "ast_valid": false, "error": issue.message }),
    }
}

fn recommendations(recipe_type: &str, input_errors: usize, analysis: &Value) -> Vec<&'static str> {
    let mut out = Vec::new();
    if input_errors > 0 {
        out.push("Fix input dataset access issues before running");
    }
    if is_python(recipe_type) {
        let flag = |key: &str| analysis.get(key).and_then(Value::as_bool).unwrap_or(false);
        if !flag("has_dataiku_import") {
            out.push("Add 'import dataiku' to your code");
        }
        if !flag("has_input_read") {
            out.push("Add code to read input datasets");
        }
        if !flag("has_output_write") {
            out.push("Add code to write output datasets");
        }
    }
    out
}

/// Check that a recipe's inputs are readable and its outputs exist, and
/// look over python code, without running anything.
pub struct DryRunTool;

impl DryRunTool {
    pub async fn execute(state: &McpServerState, input: DryRunInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to perform dry run test")
    }

    async fn run(state: &McpServerState, input: DryRunInput) -> Result<Value> {
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let definition = project.recipe(&input.recipe_name).definition().await?;
        let recipe_type = str_or(recipe_body(&definition), "type", "unknown");
        let inputs = ref_names(&recipe::inputs(&definition));
        let outputs = ref_names(&recipe::outputs(&definition));

        let mut input_checks = Vec::with_capacity(inputs.len());
        for name in &inputs {
            let dataset = project.dataset(name);
            let schema = match dataset.schema().await {
                Ok(schema) => schema,
                Err(err) => {
                    input_checks.push(json!({
                        "name": name,
                        "status": "error",
                        "message": format!("Input dataset not accessible: {err}"),
                    }));
                    continue;
                }
            };
            let schema_columns = schema
                .get("columns")
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            input_checks.push(match dataset.sample(input.sample_rows, None).await {
                Ok(sample) => json!({
                    "name": name,
                    "status": "ok",
                    "schema_columns": schema_columns,
                    "sample_rows": sample.rows.len(),
                    "sample_columns": sample.columns,
                }),
                Err(err) => json!({
                    "name": name,
                    "status": "warning",
                    "message": format!("Could not read sample data: {err}"),
                    "schema_columns": schema_columns,
                }),
            });
        }

        let mut output_checks = Vec::with_capacity(outputs.len());
        for name in &outputs {
            output_checks.push(match project.dataset(name).definition().await {
                Ok(def) => json!({
                    "name": name,
                    "status": "ok",
                    "exists": true,
                    "type": field_or(&def, "type", Value::Null),
                }),
                Err(err) => json!({
                    "name": name,
                    "status": "warning",
                    "exists": false,
                    "message": format!("Output dataset will be created: {err}"),
                }),
            });
        }

        let count_errors = |checks: &[Value]| checks.iter().filter(|c| c["status"] == "error").count();
        let input_errors = count_errors(&input_checks[..]);
        let output_errors = count_errors(&output_checks[..]);

        let mut results = json!({
            "recipe_name": input.recipe_name,
            "recipe_type": recipe_type,
            "inputs": inputs,
            "outputs": outputs,
            "sample_rows": input.sample_rows,
            "input_checks": input_checks,
            "output_checks": output_checks,
        });
        let analysis = if is_python(recipe_type) {
            let analysis = analyze_python(&payload_code(&definition));
            results["code_analysis"] = analysis.clone();
            analysis
        } else {
            json!({})
        };
        results["test_summary"] = json!({
            "overall_status": if input_errors == 0 && output_errors == 0 { "ok" } else { "warning" },
            "input_errors": input_errors,
            "output_errors": output_errors,
            "ready_for_execution": input_errors == 0,
            "recommendations": recommendations(recipe_type, input_errors, &analysis),
        });

        Ok(json!({ "status": "ok", "test_results": results }))
    }
}
