//! Scenario logs, step inspection and cloning.

use serde_json::{json, Value};
use tracing::{debug, info};

use super::{field_or, line_count, run_summary, str_or};
use crate::error::into_response;
use crate::patch::{apply_clone_modifications, apply_metadata, as_object_mut, steps, steps_mut, triggers, triggers_mut};
use crate::server::McpServerState;
use crate::types::*;
use crate::{Error, Result};

/// How many recent runs are searched for a run id.
const LOG_RUN_WINDOW: usize = 50;

/// Text of a step run's result: its log tail, or its message.
fn step_log_text(step_run: &Value) -> String {
    let result = step_run.get("result").unwrap_or(&Value::Null);
    if let Some(lines) = result
        .get("logTail")
        .and_then(|t| t.get("lines"))
        .and_then(Value::as_array)
    {
        let text: Vec<&str> = lines.iter().filter_map(Value::as_str).collect();
        if !text.is_empty() {
            return text.join("\n");
        }
    }
    str_or(result, "message", "").to_string()
}

/// Ids of jobs a run executed, in order of first appearance.
fn executed_jobs(details: &Value) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let step_runs = details
        .get("stepRuns")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for item in step_runs
        .iter()
        .filter_map(|s| s.get("additionalReportItems").and_then(Value::as_array))
        .flatten()
    {
        if item.get("type").and_then(Value::as_str) != Some("JOB_EXECUTED") {
            continue;
        }
        if let Some(id) = item.get("jobId").and_then(Value::as_str) {
            if !ids.iter().any(|known| known == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

pub struct ScenarioLogsTool;

impl ScenarioLogsTool {
    pub async fn execute(state: &McpServerState, input: ScenarioLogsInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to get scenario logs")
    }

    async fn run(state: &McpServerState, input: ScenarioLogsInput) -> Result<Value> {
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let scenario = project.scenario(&input.scenario_id);
        let runs = scenario.last_runs(LOG_RUN_WINDOW).await?;

        if runs.is_empty() {
            return Ok(json!({
                "status": "ok",
                "message": "No runs found for this scenario",
                "logs": [],
                "run_info": {},
            }));
        }

        let summaries: Vec<Value> = runs.iter().map(run_summary).collect();
        let target = match &input.run_id {
            Some(run_id) => summaries
                .iter()
                .find(|s| s["run_id"].as_str() == Some(run_id.as_str()))
                .ok_or_else(|| Error::not_found(format!("Run ID '{run_id}' not found")))?,
            None => &summaries[0],
        };
        let run_id = str_or(target, "run_id", "unknown").to_string();
        let started = target["start_time"].clone();

        let mut logs = Vec::new();
        match scenario.run_log(&run_id).await {
            Ok(text) if !text.is_empty() => logs.push(json!({
                "type": "scenario_log",
                "content": text,
                "timestamp": started,
            })),
            Ok(_) => {}
            Err(err) => logs.push(json!({
                "type": "error",
                "content": format!("Could not retrieve scenario log: {err}"),
                "timestamp": started,
            })),
        }

        match scenario.run_details(&run_id).await {
            Ok(details) => {
                let step_runs = details
                    .get("stepRuns")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for (i, step_run) in step_runs.iter().enumerate() {
                    let text = step_log_text(step_run);
                    if text.is_empty() {
                        continue;
                    }
                    let step = step_run.get("step").unwrap_or(&Value::Null);
                    logs.push(json!({
                        "type": "step_log",
                        "step_index": i,
                        "step_name": step
                            .get("name")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("Step {i}")),
                        "content": text,
                        "timestamp": field_or(step_run, "start", started.clone()),
                    }));
                }

                for job_id in executed_jobs(&details) {
                    match project.job(&job_id).log(None).await {
                        Ok(text) if !text.is_empty() => logs.push(json!({
                            "type": "job_log",
                            "job_id": job_id,
                            "job_name": format!("Job {job_id}"),
                            "content": text,
                            "timestamp": started,
                        })),
                        Ok(_) => {}
                        Err(err) => logs.push(json!({
                            "type": "job_error",
                            "job_id": job_id,
                            "content": format!("Could not retrieve job log: {err}"),
                            "timestamp": started,
                        })),
                    }
                }
            }
            Err(err) => {
                debug!(scenario = %input.scenario_id, %run_id, error = %err, "run details unavailable");
                logs.push(json!({
                    "type": "error",
                    "content": format!("Could not retrieve step runs: {err}"),
                    "timestamp": started,
                }));
                logs.push(json!({
                    "type": "error",
                    "content": format!("Could not retrieve jobs: {err}"),
                    "timestamp": started,
                }));
            }
        }

        Ok(json!({
            "status": "ok",
            "scenario_id": input.scenario_id,
            "run_info": {
                "run_id": run_id,
                "start_time": target["start_time"],
                "end_time": target["end_time"],
                "outcome": target["outcome"],
                "duration": target["duration"],
                "trigger": target["trigger_type"],
            },
            "log_count": logs.len(),
            "logs": logs,
        }))
    }
}

/// One step, with the fields its type carries.
fn describe_step(index: usize, step: &Value) -> Value {
    let params = field_or(step, "params", json!({}));
    let items = || field_or(&params, "items", json!([]));
    let mut info = json!({
        "index": index,
        "name": step
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Step {index}")),
        "type": str_or(step, "type", "unknown"),
        "enabled": field_or(step, "enabled", json!(true)),
        "params": params.clone(),
    });
    match step.get("type").and_then(Value::as_str) {
        Some("custom_python") => {
            let script = str_or(&params, "script", "");
            info["code_lines"] = json!(if script.is_empty() { 0 } else { line_count(script) });
            info["code"] = json!(script);
        }
        Some("build_flowitem") => {
            let items = items();
            info["build_count"] = json!(items.as_array().map_or(0, Vec::len));
            info["build_items"] = items;
        }
        Some("invalidate_cache") => info["invalidate_items"] = items(),
        Some("sync_hive") => info["sync_items"] = items(),
        Some("run_scenario") => {
            info["nested_scenarios"] = field_or(&params, "scenarioRuns", json!([]))
        }
        _ => {}
    }
    info
}

pub struct ScenarioStepsTool;

impl ScenarioStepsTool {
    pub async fn execute(state: &McpServerState, input: ScenarioRef) -> Value {
        into_response(Self::run(state, input).await, "Failed to get scenario steps")
    }

    async fn run(state: &McpServerState, input: ScenarioRef) -> Result<Value> {
        let client = state.client().await?;
        let settings = client
            .project(&input.project_key)
            .scenario(&input.scenario_id)
            .settings()
            .await?;
        let described: Vec<Value> = steps(&settings)
            .iter()
            .enumerate()
            .map(|(i, step)| describe_step(i, step))
            .collect();
        Ok(json!({
            "status": "ok",
            "scenario_info": {
                "id": input.scenario_id,
                "name": str_or(&settings, "name", &input.scenario_id),
                "type": str_or(&settings, "type", "unknown"),
                "active": field_or(&settings, "active", json!(false)),
                "step_count": described.len(),
            },
            "step_count": described.len(),
            "steps": described,
        }))
    }
}

/// Copy a scenario's steps and triggers into a new scenario, then apply
/// the requested modifications.
pub struct CloneScenarioTool;

impl CloneScenarioTool {
    pub async fn execute(state: &McpServerState, input: CloneScenarioInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to clone scenario")
    }

    async fn run(state: &McpServerState, input: CloneScenarioInput) -> Result<Value> {
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let source = project
            .scenario(&input.source_scenario_id)
            .settings()
            .await?;
        let scenario_type = str_or(&source, "type", "step_based").to_string();

        let definition = json!({ "params": field_or(&source, "params", json!({})) });
        let scenario = project
            .create_scenario(&input.new_scenario_name, &scenario_type, definition)
            .await?;

        let mut settings = scenario.settings().await?;
        {
            let map = as_object_mut(&mut settings);
            map.insert("name".into(), json!(input.new_scenario_name));
            map.insert("active".into(), field_or(&source, "active", json!(false)));
        }
        *steps_mut(&mut settings) = steps(&source).to_vec();
        *triggers_mut(&mut settings) = triggers(&source).to_vec();

        let mods = input.modifications.clone().unwrap_or_default();
        if mods.description.is_some() || mods.tags.is_some() {
            let mut metadata = scenario.metadata().await?;
            apply_metadata(&mut metadata, mods.description.as_deref(), mods.tags.as_deref(), None);
            scenario.set_metadata(metadata).await?;
        }
        apply_clone_modifications(&mut settings, &mods);

        let info = json!({
            "id": scenario.id(),
            "name": input.new_scenario_name,
            "type": scenario_type,
            "active": field_or(&settings, "active", json!(false)),
            "step_count": steps(&settings).len(),
            "trigger_count": triggers(&settings).len(),
        });
        scenario.save_settings(settings).await?;

        info!(project_key = %input.project_key, source = %input.source_scenario_id, scenario = %scenario.id(), "scenario cloned");
        Ok(json!({
            "status": "ok",
            "source_scenario_id": input.source_scenario_id,
            "new_scenario_id": scenario.id(),
            "new_scenario_name": input.new_scenario_name,
            "scenario_info": info,
            "modifications_applied": mods.applied(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_details_follow_type() {
        let step = describe_step(
            0,
            &json!({"type": "custom_python", "params": {"script": "a\nb\nc"}}),
        );
        assert_eq!(step["name"], "Step 0");
        assert_eq!(step["code_lines"], 3);
        assert_eq!(step["enabled"], true);

        let step = describe_step(
            1,
            &json!({"type": "build_flowitem", "name": "build", "params": {"items": [{"itemId": "a"}, {"itemId": "b"}]}}),
        );
        assert_eq!(step["build_count"], 2);
        assert_eq!(step["name"], "build");

        let step = describe_step(2, &json!({"type": "run_scenario", "params": {}}));
        assert_eq!(step["nested_scenarios"], json!([]));
    }

    #[test]
    fn empty_script_has_no_lines() {
        let step = describe_step(0, &json!({"type": "custom_python"}));
        assert_eq!(step["code_lines"], 0);
        assert_eq!(step["code"], "");
    }

    #[test]
    fn jobs_are_collected_once() {
        let details = json!({"stepRuns": [
            {"additionalReportItems": [
                {"type": "JOB_EXECUTED", "jobId": "j1"},
                {"type": "DATASET_BUILT"}
            ]},
            {"additionalReportItems": [{"type": "JOB_EXECUTED", "jobId": "j1"}, {"type": "JOB_EXECUTED", "jobId": "j2"}]}
        ]});
        assert_eq!(executed_jobs(&details), vec!["j1", "j2"]);
    }

    #[test]
    fn step_log_prefers_log_tail() {
        let run = json!({"result": {"message": "m", "logTail": {"lines": ["x", "y"]}}});
        assert_eq!(step_log_text(&run), "x\ny");
        let run = json!({"result": {"message": "only message"}});
        assert_eq!(step_log_text(&run), "only message");
        assert_eq!(step_log_text(&json!({})), "");
    }
}
