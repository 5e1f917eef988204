//! Project exploration: the flow graph, object search and data samples.

use std::collections::HashMap;

use dataiku_client::recipe::{self, ref_names};
use serde_json::{json, Map, Value};
use tracing::debug;

use super::{field_or, str_or, tags_of};
use crate::error::into_response;
use crate::flow::{leaves, roots, FlowGraph};
use crate::matcher::Matcher;
use crate::server::McpServerState;
use crate::types::*;
use crate::{Error, Result};

pub struct ProjectFlowTool;

impl ProjectFlowTool {
    pub async fn execute(state: &McpServerState, input: ProjectRef) -> Value {
        into_response(Self::run(state, input).await, "Failed to get project flow")
    }

    async fn run(state: &McpServerState, input: ProjectRef) -> Result<Value> {
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let mut flow = FlowGraph::new();

        for dataset in project.list_datasets().await? {
            let name = str_or(&dataset, "name", "");
            flow.add_dataset(name, str_or(&dataset, "type", "unknown"), tags_of(&dataset));
        }

        for listed in project.list_recipes().await? {
            let name = str_or(&listed, "name", "");
            let (inputs, outputs) = match project.recipe(name).definition().await {
                Ok(definition) => (
                    ref_names(&recipe::inputs(&definition)),
                    ref_names(&recipe::outputs(&definition)),
                ),
                Err(err) => {
                    debug!(recipe = %name, error = %err, "recipe skipped in flow");
                    (Vec::new(), Vec::new())
                }
            };
            flow.add_recipe(
                name,
                str_or(&listed, "type", "unknown"),
                tags_of(&listed),
                &inputs,
                &outputs,
            );
        }

        let dependencies = flow.dependencies();
        let stats = flow.stats(&dependencies);
        Ok(json!({
            "status": "ok",
            "project_key": input.project_key,
            "flow": flow,
            "dependencies": dependencies,
            "root_nodes": roots(&dependencies),
            "leaf_nodes": leaves(&dependencies),
            "flow_stats": stats,
        }))
    }
}

const SEARCHABLE_TYPES: [&str; 3] = ["datasets", "recipes", "scenarios"];

/// How an object matched: on its name, or only on description/tags.
fn match_type(matcher: &Matcher, term: &str, object: &Value) -> Option<&'static str> {
    let name = str_or(object, "name", "");
    let description = str_or(object, "description", "");
    let tags = tags_of(object);
    let tag_hit = tags
        .iter()
        .filter_map(Value::as_str)
        .any(|tag| matcher.is_match(tag));
    if !(matcher.is_match(name) || matcher.is_match(description) || tag_hit) {
        return None;
    }
    if name.to_lowercase().contains(&term.to_lowercase()) {
        Some("name")
    } else {
        Some("metadata")
    }
}

pub struct SearchTool;

impl SearchTool {
    pub async fn execute(state: &McpServerState, input: SearchInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to search project objects")
    }

    fn validate_input(input: &SearchInput) -> Result<Vec<String>> {
        let types = input
            .object_types
            .clone()
            .unwrap_or_else(|| SEARCHABLE_TYPES.iter().map(|t| t.to_string()).collect());
        if let Some(bad) = types.iter().find(|t| !SEARCHABLE_TYPES.contains(&t.as_str())) {
            return Err(Error::invalid_param(
                "object_types",
                format!("Invalid object type '{bad}'. Must be one of: {SEARCHABLE_TYPES:?}"),
            ));
        }
        Ok(types)
    }

    async fn run(state: &McpServerState, input: SearchInput) -> Result<Value> {
        let types = Self::validate_input(&input)?;
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let matcher = Matcher::new(&input.search_term);
        let term = input.search_term.as_str();

        let mut results = Map::new();
        let mut by_type = Map::new();
        let mut total = 0;
        for object_type in &types {
            let listed = match object_type.as_str() {
                "datasets" => project.list_datasets().await?,
                "recipes" => project.list_recipes().await?,
                _ => project.list_scenarios().await?,
            };
            let hits: Vec<Value> = listed
                .iter()
                .filter_map(|object| {
                    let how = match_type(&matcher, term, object)?;
                    let mut hit = json!({
                        "name": field_or(object, "name", Value::Null),
                        "type": field_or(object, "type", Value::Null),
                        "description": str_or(object, "description", ""),
                        "tags": tags_of(object),
                        "match_type": how,
                    });
                    if object_type == "scenarios" {
                        hit["id"] = field_or(object, "id", Value::Null);
                        hit["active"] = field_or(object, "active", json!(false));
                    }
                    Some(hit)
                })
                .collect();
            total += hits.len();
            by_type.insert(object_type.clone(), json!(hits.len()));
            results.insert(object_type.clone(), Value::Array(hits));
        }

        debug!(project_key = %input.project_key, %term, regex = matcher.is_regex(), total, "project searched");
        Ok(json!({
            "status": "ok",
            "project_key": input.project_key,
            "results": results,
            "search_stats": {
                "search_term": term,
                "object_types_searched": types,
                "total_matches": total,
                "matches_by_type": by_type,
            },
        }))
    }
}

fn is_numeric_type(column_type: &str) -> bool {
    matches!(column_type, "int" | "bigint" | "float" | "double")
}

/// Summary statistics over one column of sampled text cells. Empty cells
/// count as nulls.
fn column_stats(name: &str, column_type: &str, values: &[&str]) -> Value {
    let present: Vec<&str> = values.iter().copied().filter(|v| !v.is_empty()).collect();
    let null_count = values.len() - present.len();
    let null_percentage = if values.is_empty() {
        0.0
    } else {
        null_count as f64 / values.len() as f64 * 100.0
    };
    let mut stats = json!({
        "name": name,
        "type": column_type,
        "meaning": "",
        "description": "",
        "null_count": null_count,
        "null_percentage": null_percentage,
    });

    if is_numeric_type(column_type) {
        let numbers: Vec<f64> = present.iter().filter_map(|v| v.parse().ok()).collect();
        if !numbers.is_empty() {
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            stats["min"] = json!(min);
            stats["max"] = json!(max);
            stats["mean"] = json!(numbers.iter().sum::<f64>() / numbers.len() as f64);
        }
    } else if column_type == "string" && !present.is_empty() {
        let lengths: Vec<usize> = present.iter().map(|v| v.chars().count()).collect();
        let mut counts: Vec<(&str, usize)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for &value in &present {
            match index.get(value) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(value, counts.len());
                    counts.push((value, 1));
                }
            }
        }
        stats["unique_count"] = json!(counts.len());
        // Stable sort keeps first-seen order among equal counts.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(5);
        stats["avg_length"] = json!(lengths.iter().sum::<usize>() as f64 / lengths.len() as f64);
        stats["max_length"] = json!(lengths.iter().max());
        stats["min_length"] = json!(lengths.iter().min());
        stats["most_common"] = json!(counts);
    }
    stats
}

pub struct DatasetSampleTool;

impl DatasetSampleTool {
    pub async fn execute(state: &McpServerState, input: DatasetSampleInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to get dataset sample")
    }

    /// Schema columns restricted to `requested`, rejecting unknown names.
    fn select_columns(schema_columns: &[Value], requested: Option<&[String]>) -> Result<Vec<Value>> {
        let Some(requested) = requested.filter(|r| !r.is_empty()) else {
            return Ok(schema_columns.to_vec());
        };
        let available: Vec<&str> = schema_columns
            .iter()
            .map(|c| str_or(c, "name", ""))
            .collect();
        let invalid: Vec<&String> = requested
            .iter()
            .filter(|c| !available.contains(&c.as_str()))
            .collect();
        if !invalid.is_empty() {
            return Err(Error::invalid_param(
                "columns",
                format!("Invalid columns: {invalid:?}. Available columns: {available:?}"),
            ));
        }
        Ok(requested
            .iter()
            .filter_map(|name| {
                schema_columns
                    .iter()
                    .find(|c| c.get("name").and_then(Value::as_str) == Some(name.as_str()))
                    .cloned()
            })
            .collect())
    }

    async fn run(state: &McpServerState, input: DatasetSampleInput) -> Result<Value> {
        let client = state.client().await?;
        let dataset = client
            .project(&input.project_key)
            .dataset(&input.dataset_name);
        let definition = dataset.definition().await?;
        let schema = dataset.schema().await?;
        let schema_columns = schema
            .get("columns")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let columns = Self::select_columns(&schema_columns, input.columns.as_deref())?;

        let sample = dataset.sample(input.rows, input.columns.as_deref()).await?;
        let records: Vec<Value> = sample
            .rows
            .iter()
            .map(|row| {
                let record: Map<String, Value> = sample
                    .columns
                    .iter()
                    .enumerate()
                    .map(|(i, column)| {
                        let cell = match row.get(i).map(String::as_str) {
                            None | Some("") => Value::Null,
                            Some(text) => json!(text),
                        };
                        (column.clone(), cell)
                    })
                    .collect();
                Value::Object(record)
            })
            .collect();

        let stats: Vec<Value> = columns
            .iter()
            .map(|column| {
                let name = str_or(column, "name", "");
                let position = sample.columns.iter().position(|c| c == name);
                let values: Vec<&str> = sample
                    .rows
                    .iter()
                    .map(|row| {
                        position
                            .and_then(|i| row.get(i))
                            .map_or("", String::as_str)
                    })
                    .collect();
                let mut stats = column_stats(name, str_or(column, "type", "unknown"), &values);
                stats["meaning"] = json!(str_or(column, "meaning", ""));
                stats["description"] = json!(str_or(column, "comment", ""));
                stats
            })
            .collect();

        let params = definition.get("params").unwrap_or(&Value::Null);
        Ok(json!({
            "status": "ok",
            "dataset_info": {
                "name": input.dataset_name,
                "type": field_or(&definition, "type", json!("unknown")),
                "format": field_or(&definition, "formatType", json!("unknown")),
                "connection": field_or(params, "connection", json!("unknown")),
            },
            "schema": {
                "column_count": columns.len(),
                "columns": columns,
            },
            "sample_data": records,
            "sample_stats": {
                "requested_rows": input.rows,
                "actual_rows": sample.rows.len(),
                "requested_columns": input.columns,
                "total_columns": sample.columns.len(),
                "column_names": sample.columns,
            },
            "column_stats": stats,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_hits_win_over_metadata() {
        let matcher = Matcher::new("sales");
        let by_name = json!({"name": "sales_2024", "tags": []});
        let by_tag = json!({"name": "orders", "tags": ["Sales"]});
        let miss = json!({"name": "orders", "description": "daily feed"});
        assert_eq!(match_type(&matcher, "sales", &by_name), Some("name"));
        assert_eq!(match_type(&matcher, "sales", &by_tag), Some("metadata"));
        assert_eq!(match_type(&matcher, "sales", &miss), None);
    }

    #[test]
    fn regex_name_match_is_reported_as_metadata() {
        // A regex hit on the name that is not a literal substring.
        let matcher = Matcher::new("^ord.*s$");
        let object = json!({"name": "orders"});
        assert_eq!(match_type(&matcher, "^ord.*s$", &object), Some("metadata"));
    }

    #[test]
    fn unknown_object_types_are_rejected() {
        let input = SearchInput {
            project_key: "P".into(),
            search_term: "x".into(),
            object_types: Some(vec!["notebooks".into()]),
        };
        let err = SearchTool::validate_input(&input).unwrap_err();
        assert_eq!(err.code, 400);
    }

    #[test]
    fn numeric_stats_skip_nulls() {
        let stats = column_stats("n", "int", &["1", "", "3", "8"]);
        assert_eq!(stats["null_count"], 1);
        assert_eq!(stats["null_percentage"], 25.0);
        assert_eq!(stats["min"], 1.0);
        assert_eq!(stats["max"], 8.0);
        assert_eq!(stats["mean"], 4.0);
    }

    #[test]
    fn string_stats_rank_common_values() {
        let stats = column_stats("s", "string", &["b", "aa", "b", "ccc", "aa", "b"]);
        assert_eq!(stats["unique_count"], 3);
        assert_eq!(stats["most_common"], json!([["b", 3], ["aa", 2], ["ccc", 1]]));
        assert_eq!(stats["max_length"], 3);
        assert_eq!(stats["min_length"], 1);
    }

    #[test]
    fn unknown_columns_list_what_exists() {
        let schema = vec![json!({"name": "a", "type": "int"}), json!({"name": "b", "type": "string"})];
        let picked = DatasetSampleTool::select_columns(&schema, Some(&["b".to_string()])).unwrap();
        assert_eq!(picked, vec![json!({"name": "b", "type": "string"})]);
        let err = DatasetSampleTool::select_columns(&schema, Some(&["z".to_string()])).unwrap_err();
        assert_eq!(err.message, "Invalid columns: [\"z\"]. Available columns: [\"a\", \"b\"]");
        assert_eq!(DatasetSampleTool::select_columns(&schema, None).unwrap().len(), 2);
    }
}
