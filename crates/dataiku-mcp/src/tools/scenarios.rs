//! Scenario tools: lifecycle, triggers and runs.

use chrono::NaiveDate;
use dataiku_client::scenario::run_outcome;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{field_or, run_summary, str_or, tags_of};
use crate::error::into_response;
use crate::patch::{apply_metadata, as_object_mut, merge_object, set_step_script, triggers, triggers_mut};
use crate::server::McpServerState;
use crate::types::*;
use crate::{Error, Result};

pub const SCENARIO_TYPES: [&str; 2] = ["step_based", "custom_python"];
pub const TRIGGER_TYPES: [&str; 5] = ["periodic", "hourly", "daily", "monthly", "dataset"];

const TEMPORAL_TRIGGER_NAME: &str = "Time-based trigger";
const DATASET_TRIGGER_NAME: &str = "Dataset modified";

pub struct CreateScenarioTool;

impl CreateScenarioTool {
    pub async fn execute(state: &McpServerState, input: CreateScenarioInput) -> Value {
        let context = format!("Failed to create scenario '{}'", input.scenario_name);
        into_response(Self::run(state, input).await, &context)
    }

    fn validate_input(input: &CreateScenarioInput) -> Result<()> {
        if !SCENARIO_TYPES.contains(&input.scenario_type.as_str()) {
            return Err(Error::invalid_param(
                "scenario_type",
                format!(
                    "Invalid scenario type '{}'. Must be one of: {SCENARIO_TYPES:?}",
                    input.scenario_type
                ),
            ));
        }
        Ok(())
    }

    async fn run(state: &McpServerState, input: CreateScenarioInput) -> Result<Value> {
        Self::validate_input(&input)?;
        let client = state.client().await?;
        let definition = input
            .definition
            .clone()
            .map(object)
            .unwrap_or_else(|| json!({ "params": {} }));
        let scenario = client
            .project(&input.project_key)
            .create_scenario(&input.scenario_name, &input.scenario_type, definition)
            .await?;
        info!(project_key = %input.project_key, scenario = %scenario.id(), "scenario created");
        Ok(json!({
            "status": "ok",
            "scenario_name": input.scenario_name,
            "scenario_id": scenario.id(),
            "scenario_type": input.scenario_type,
            "project_key": input.project_key,
            "message": format!("Scenario '{}' created successfully", input.scenario_name),
        }))
    }
}

pub struct UpdateScenarioTool;

impl UpdateScenarioTool {
    pub async fn execute(state: &McpServerState, input: UpdateScenarioInput) -> Value {
        let context = format!("Failed to update scenario '{}'", input.scenario_id);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: UpdateScenarioInput) -> Result<Value> {
        let client = state.client().await?;
        let scenario = client
            .project(&input.project_key)
            .scenario(&input.scenario_id);
        let mut updated: Vec<&str> = Vec::new();

        if input.description.is_some() || input.tags.is_some() || input.custom_fields.is_some() {
            let mut metadata = scenario.metadata().await?;
            updated.extend(apply_metadata(
                &mut metadata,
                input.description.as_deref(),
                input.tags.as_deref(),
                input.custom_fields.as_ref(),
            ));
            scenario.set_metadata(metadata).await?;
        }

        let touches_settings = input.name.is_some()
            || input.active.is_some()
            || input.definition.is_some()
            || input.step_script.is_some();
        if touches_settings {
            let mut settings = scenario.settings().await?;
            if let Some(name) = &input.name {
                as_object_mut(&mut settings).insert("name".into(), json!(name));
                updated.push("name");
            }
            if let Some(active) = input.active {
                as_object_mut(&mut settings).insert("active".into(), json!(active));
                updated.push("active");
            }
            if let Some(definition) = &input.definition {
                merge_object(&mut settings, definition.clone());
                updated.push("definition");
            }
            if let Some(script) = &input.step_script {
                set_step_script(&mut settings, input.step_index, script)?;
                updated.push("step_script");
            }
            scenario.save_settings(settings).await?;
        }

        debug!(project_key = %input.project_key, scenario = %input.scenario_id, ?updated, "scenario updated");
        Ok(json!({
            "status": "ok",
            "scenario_id": input.scenario_id,
            "updated_fields": updated,
            "message": format!("Scenario '{}' updated successfully", input.scenario_id),
        }))
    }
}

pub struct DeleteScenarioTool;

impl DeleteScenarioTool {
    pub async fn execute(state: &McpServerState, input: ScenarioRef) -> Value {
        let context = format!("Failed to delete scenario '{}'", input.scenario_id);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: ScenarioRef) -> Result<Value> {
        let client = state.client().await?;
        let scenario = client
            .project(&input.project_key)
            .scenario(&input.scenario_id);
        let settings = scenario.settings().await.unwrap_or_else(|err| {
            debug!(scenario = %input.scenario_id, error = %err, "settings unavailable before delete");
            Value::Null
        });
        scenario.delete().await?;
        info!(project_key = %input.project_key, scenario = %input.scenario_id, "scenario deleted");
        Ok(json!({
            "status": "ok",
            "deleted_scenario": {
                "id": input.scenario_id,
                "name": str_or(&settings, "name", &input.scenario_id),
                "type": str_or(&settings, "type", "unknown"),
            },
            "message": format!("Scenario '{}' deleted successfully", input.scenario_id),
        }))
    }
}

/// `YYYY-MM-DD` start date, when a complete and valid date was given.
fn starting_from(year: Option<i32>, month: Option<u32>, day: Option<u32>) -> Result<Option<String>> {
    match (year, month, day) {
        (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y, m, d)
            .map(|date| Some(date.format("%Y-%m-%d").to_string()))
            .ok_or_else(|| {
                Error::invalid_param("day", format!("Invalid start date {y}-{m:02}-{d:02}"))
            }),
        _ => Ok(None),
    }
}

/// Build the DSS trigger document and the details echoed to the caller.
fn build_trigger(input: &AddTriggerInput) -> Result<(Value, Value)> {
    let kind = input.trigger_type.as_str();
    if kind == "time" {
        return Err(Error::invalid_param(
            "trigger_type",
            "Use specific time trigger types: periodic, hourly, daily, or monthly",
        ));
    }
    if !TRIGGER_TYPES.contains(&kind) {
        return Err(Error::invalid_param(
            "trigger_type",
            format!(
                "Unsupported trigger type '{kind}'. Supported types: {}",
                TRIGGER_TYPES.join(", ")
            ),
        ));
    }

    let temporal = |params: Value| {
        json!({
            "type": "temporal",
            "name": input.trigger_name.as_deref().unwrap_or(TEMPORAL_TRIGGER_NAME),
            "active": true,
            "params": params,
        })
    };

    let pair = match kind {
        "periodic" => {
            let every = input.every_minutes.unwrap_or(60);
            (
                temporal(json!({ "frequency": "Minutely", "repeatFrequency": every })),
                json!({ "type": kind, "every_minutes": every }),
            )
        }
        "hourly" => {
            let hour = input.starting_hour.unwrap_or(0);
            let minute = input.minute_of_hour.unwrap_or(0);
            let repeat = input.repeat_every.unwrap_or(1);
            (
                temporal(json!({
                    "frequency": "Hourly",
                    "hour": hour,
                    "minute": minute,
                    "repeatFrequency": repeat,
                })),
                json!({
                    "type": kind,
                    "starting_hour": hour,
                    "minute_of_hour": minute,
                    "repeat_every": repeat,
                }),
            )
        }
        "daily" => {
            let hour = input.hour.unwrap_or(2);
            let minute = input.minute.unwrap_or(0);
            let repeat = input.repeat_every.unwrap_or(1);
            let timezone = input.timezone.as_deref().unwrap_or("SERVER");
            let mut params = json!({
                "frequency": "Daily",
                "hour": hour,
                "minute": minute,
                "repeatFrequency": repeat,
                "timezone": timezone,
            });
            if let Some(start) = starting_from(input.year, input.month, input.day)? {
                params["startingFrom"] = json!(start);
            }
            (
                temporal(params),
                json!({
                    "type": kind,
                    "hour": hour,
                    "minute": minute,
                    "year": input.year,
                    "month": input.month,
                    "day": input.day,
                    "repeat_every": repeat,
                    "timezone": timezone,
                }),
            )
        }
        "monthly" => {
            let day = input.day.unwrap_or(1);
            let hour = input.hour.unwrap_or(2);
            let minute = input.minute.unwrap_or(0);
            let mut params = json!({
                "frequency": "Monthly",
                "daysOfMonth": [day],
                "hour": hour,
                "minute": minute,
                "repeatFrequency": 1,
            });
            if let Some(start) = starting_from(input.year, input.month, Some(1))? {
                params["startingFrom"] = json!(start);
            }
            (
                temporal(params),
                json!({
                    "type": kind,
                    "day": day,
                    "hour": hour,
                    "minute": minute,
                    "year": input.year,
                    "month": input.month,
                }),
            )
        }
        _ => {
            let dataset = input.dataset_name.as_deref().ok_or_else(|| {
                Error::invalid_param("dataset_name", "dataset_name is required for dataset triggers")
            })?;
            let project_key = input
                .dataset_project_key
                .as_deref()
                .unwrap_or(&input.project_key);
            (
                json!({
                    "type": "ds_modified",
                    "name": input.trigger_name.as_deref().unwrap_or(DATASET_TRIGGER_NAME),
                    "active": true,
                    "params": { "projectKey": project_key, "datasetName": dataset },
                }),
                json!({ "type": kind, "dataset_name": dataset, "project_key": project_key }),
            )
        }
    };
    Ok(pair)
}

pub struct AddTriggerTool;

impl AddTriggerTool {
    pub async fn execute(state: &McpServerState, input: AddTriggerInput) -> Value {
        let context = format!("Failed to add trigger to scenario '{}'", input.scenario_id);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: AddTriggerInput) -> Result<Value> {
        let (trigger, details) = build_trigger(&input)?;
        let client = state.client().await?;
        let scenario = client
            .project(&input.project_key)
            .scenario(&input.scenario_id);
        let mut settings = scenario.settings().await?;
        triggers_mut(&mut settings).push(trigger);
        scenario.save_settings(settings).await?;
        info!(project_key = %input.project_key, scenario = %input.scenario_id, trigger_type = %input.trigger_type, "trigger added");
        Ok(json!({
            "status": "ok",
            "scenario_id": input.scenario_id,
            "trigger_details": details,
            "message": format!(
                "Trigger '{}' added to scenario '{}' successfully",
                input.trigger_type, input.scenario_id
            ),
        }))
    }
}

pub struct RemoveTriggerTool;

impl RemoveTriggerTool {
    pub async fn execute(state: &McpServerState, input: RemoveTriggerInput) -> Value {
        let context = format!("Failed to remove trigger from scenario '{}'", input.scenario_id);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: RemoveTriggerInput) -> Result<Value> {
        let client = state.client().await?;
        let scenario = client
            .project(&input.project_key)
            .scenario(&input.scenario_id);
        let mut settings = scenario.settings().await?;
        let list = triggers_mut(&mut settings);
        let index = usize::try_from(input.trigger_idx)
            .ok()
            .filter(|&i| i < list.len())
            .ok_or_else(|| {
                Error::invalid_param(
                    "trigger_idx",
                    format!(
                        "Invalid trigger index {}. Valid range: 0-{}",
                        input.trigger_idx,
                        list.len() as i64 - 1
                    ),
                )
            })?;
        let removed = list.remove(index);
        let remaining = list.len();
        scenario.save_settings(settings).await?;

        info!(project_key = %input.project_key, scenario = %input.scenario_id, index, "trigger removed");
        Ok(json!({
            "status": "ok",
            "scenario_id": input.scenario_id,
            "removed_trigger": {
                "index": index,
                "type": str_or(&removed, "type", "unknown"),
                "name": str_or(&removed, "name", "unnamed"),
            },
            "remaining_triggers": remaining,
            "message": format!(
                "Trigger at index {index} removed from scenario '{}' successfully",
                input.scenario_id
            ),
        }))
    }
}

/// Fire a scenario, and by default wait for its outcome.
pub struct RunScenarioTool;

impl RunScenarioTool {
    pub async fn execute(state: &McpServerState, input: RunScenarioInput) -> Value {
        let context = format!("Failed to run scenario '{}'", input.scenario_id);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: RunScenarioInput) -> Result<Value> {
        let client = state.client().await?;
        let scenario = client
            .project(&input.project_key)
            .scenario(&input.scenario_id);
        let id = input.scenario_id.as_str();

        if !input.wait {
            let fire = scenario.run(None).await?;
            info!(project_key = %input.project_key, scenario = %id, trigger_fire = %fire.id, "scenario run started");
            return Ok(json!({
                "status": "ok",
                "scenario_id": id,
                "trigger_fire_id": fire.id,
                "waited_for_completion": false,
                "message": format!("Scenario '{id}' run initiated successfully"),
            }));
        }

        let run = scenario.run_and_wait(None).await?;
        let outcome = run_outcome(&run).unwrap_or("unknown").to_uppercase();
        let summary = run_summary(&run);
        let (status, message) = match outcome.as_str() {
            "SUCCESS" => ("ok", format!("Scenario '{id}' ran successfully")),
            "FAILED" => {
                warn!(project_key = %input.project_key, scenario = %id, "scenario run failed");
                let status = if input.no_fail { "ok" } else { "error" };
                (status, format!("Scenario '{id}' run failed"))
            }
            other => ("ok", format!("Scenario '{id}' run completed with outcome: {other}")),
        };
        Ok(json!({
            "status": status,
            "run_info": {
                "scenario_id": id,
                "run_id": summary["run_id"],
                "outcome": summary["outcome"],
                "start_time": summary["start_time"],
                "end_time": summary["end_time"],
                "duration": summary["duration"],
                "waited_for_completion": true,
            },
            "message": message,
        }))
    }
}

fn describe_trigger(trigger: &Value) -> Value {
    json!({
        "type": str_or(trigger, "type", "unknown"),
        "name": str_or(trigger, "name", "unnamed"),
        "active": field_or(trigger, "active", json!(false)),
        "params": field_or(trigger, "params", json!({})),
    })
}

pub struct ScenarioInfoTool;

impl ScenarioInfoTool {
    pub async fn execute(state: &McpServerState, input: ScenarioRef) -> Value {
        let context = format!("Failed to get scenario info for '{}'", input.scenario_id);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: ScenarioRef) -> Result<Value> {
        let client = state.client().await?;
        let scenario = client
            .project(&input.project_key)
            .scenario(&input.scenario_id);

        // Metadata and status are optional extras.
        let metadata = scenario.metadata().await.unwrap_or_else(|err| {
            debug!(scenario = %input.scenario_id, error = %err, "scenario metadata unavailable");
            json!({})
        });
        let settings = scenario.settings().await?;
        let status = scenario.status().await.unwrap_or_else(|err| {
            debug!(scenario = %input.scenario_id, error = %err, "scenario status unavailable");
            Value::Null
        });

        let trigger_list: Vec<Value> = triggers(&settings).iter().map(describe_trigger).collect();
        let last_run = match status.get("lastRun").filter(|r| !r.is_null()) {
            Some(run) => {
                let summary = run_summary(run);
                json!({
                    "outcome": summary["outcome"],
                    "start_time": summary["start_time"],
                    "end_time": summary["end_time"],
                    "duration": summary["duration"],
                })
            }
            None => json!({ "outcome": null, "start_time": null, "end_time": null, "duration": null }),
        };

        Ok(json!({
            "status": "ok",
            "scenario_info": {
                "id": input.scenario_id,
                "name": str_or(&settings, "name", &input.scenario_id),
                "type": str_or(&settings, "type", "unknown"),
                "active": field_or(&settings, "active", json!(false)),
                "description": field_or(&metadata, "description", json!("")),
                "tags": tags_of(&metadata),
                "custom_fields": field_or(&metadata, "customFields", json!({})),
                "trigger_count": trigger_list.len(),
                "triggers": trigger_list,
                "last_run": last_run,
                "next_run": field_or(&status, "nextRun", Value::Null),
                "is_active": field_or(&status, "active", Value::Null),
            },
        }))
    }
}

/// List scenarios with their settings; items whose settings cannot be
/// loaded fall back to the list entry and carry an `error`.
pub struct ListScenariosTool;

impl ListScenariosTool {
    pub async fn execute(state: &McpServerState, input: ListScenariosInput) -> Value {
        let context = format!("Failed to list scenarios in project '{}'", input.project_key);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: ListScenariosInput) -> Result<Value> {
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let listed = project.list_scenarios().await?;

        let mut scenarios = Vec::with_capacity(listed.len());
        for entry in &listed {
            let id = entry
                .get("id")
                .or_else(|| entry.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            match project.scenario(&id).settings().await {
                Ok(settings) => {
                    let scenario_type = settings.get("type").and_then(Value::as_str);
                    if input
                        .scenario_type
                        .as_deref()
                        .is_some_and(|wanted| scenario_type != Some(wanted))
                    {
                        continue;
                    }
                    let active = settings.get("active").and_then(Value::as_bool).unwrap_or(false);
                    if input.active_only && !active {
                        continue;
                    }
                    scenarios.push(json!({
                        "id": id,
                        "name": str_or(&settings, "name", &id),
                        "type": scenario_type.unwrap_or("unknown"),
                        "active": active,
                        "description": field_or(entry, "description", json!("")),
                        "tags": tags_of(entry),
                        "trigger_count": triggers(&settings).len(),
                    }));
                }
                Err(err) => {
                    debug!(scenario = %id, error = %err, "falling back to list entry");
                    scenarios.push(json!({
                        "id": id,
                        "name": str_or(entry, "name", &id),
                        "type": str_or(entry, "type", "unknown"),
                        "active": field_or(entry, "active", json!(false)),
                        "description": field_or(entry, "description", json!("")),
                        "tags": tags_of(entry),
                        "trigger_count": 0,
                        "error": format!("Could not get full details: {err}"),
                    }));
                }
            }
        }

        Ok(json!({
            "status": "ok",
            "total_count": scenarios.len(),
            "scenarios": scenarios,
            "project_key": input.project_key,
            "filters": {
                "scenario_type": input.scenario_type,
                "active_only": input.active_only,
            },
        }))
    }
}

pub struct RunHistoryTool;

impl RunHistoryTool {
    pub async fn execute(state: &McpServerState, input: RunHistoryInput) -> Value {
        let context = format!("Failed to get run history for scenario '{}'", input.scenario_id);
        into_response(Self::run(state, input).await, &context)
    }

    async fn run(state: &McpServerState, input: RunHistoryInput) -> Result<Value> {
        let client = state.client().await?;
        let runs = client
            .project(&input.project_key)
            .scenario(&input.scenario_id)
            .last_runs(input.limit)
            .await?;
        let history: Vec<Value> = runs.iter().take(input.limit).map(run_summary).collect();
        Ok(json!({
            "status": "ok",
            "scenario_id": input.scenario_id,
            "total_runs": history.len(),
            "message": format!("Retrieved {} runs for scenario '{}'", history.len(), input.scenario_id),
            "run_history": history,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger_input(value: Value) -> AddTriggerInput {
        let mut base = json!({"project_key": "P", "scenario_id": "S"});
        merge_object(&mut base, value.as_object().cloned().unwrap_or_default());
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn trigger_type_is_checked_first() {
        let err = build_trigger(&trigger_input(json!({"trigger_type": "time"}))).unwrap_err();
        assert_eq!(
            err.message,
            "Use specific time trigger types: periodic, hourly, daily, or monthly"
        );
        let err = build_trigger(&trigger_input(json!({"trigger_type": "weekly"}))).unwrap_err();
        assert_eq!(
            err.message,
            "Unsupported trigger type 'weekly'. Supported types: periodic, hourly, daily, monthly, dataset"
        );
        let err = build_trigger(&trigger_input(json!({"trigger_type": "dataset"}))).unwrap_err();
        assert_eq!(err.message, "dataset_name is required for dataset triggers");
    }

    #[test]
    fn trigger_defaults_are_filled() {
        let (trigger, details) =
            build_trigger(&trigger_input(json!({"trigger_type": "periodic"}))).unwrap();
        assert_eq!(trigger["type"], "temporal");
        assert_eq!(trigger["params"]["repeatFrequency"], 60);
        assert_eq!(details["every_minutes"], 60);

        let (trigger, details) =
            build_trigger(&trigger_input(json!({"trigger_type": "daily"}))).unwrap();
        assert_eq!(trigger["params"]["hour"], 2);
        assert_eq!(details["timezone"], "SERVER");
        assert!(details["year"].is_null());

        let (_, details) =
            build_trigger(&trigger_input(json!({"trigger_type": "monthly"}))).unwrap();
        assert_eq!(details["day"], 1);
    }

    #[test]
    fn dataset_trigger_defaults_to_own_project() {
        let (trigger, details) = build_trigger(&trigger_input(
            json!({"trigger_type": "dataset", "dataset_name": "orders"}),
        ))
        .unwrap();
        assert_eq!(trigger["type"], "ds_modified");
        assert_eq!(trigger["params"]["projectKey"], "P");
        assert_eq!(details["dataset_name"], "orders");
    }

    #[test]
    fn start_dates_are_validated() {
        assert_eq!(
            starting_from(Some(2025), Some(2), Some(3)).unwrap().as_deref(),
            Some("2025-02-03")
        );
        assert!(starting_from(Some(2025), None, Some(3)).unwrap().is_none());
        assert!(starting_from(Some(2025), Some(2), Some(30)).is_err());
    }

    #[test]
    fn scenario_type_must_be_known() {
        let input: CreateScenarioInput = serde_json::from_value(json!({
            "project_key": "P", "scenario_name": "n", "scenario_type": "cron"
        }))
        .unwrap();
        let err = CreateScenarioTool::validate_input(&input).unwrap_err();
        assert_eq!(
            err.message,
            "Invalid scenario type 'cron'. Must be one of: [\"step_based\", \"custom_python\"]"
        );
    }
}
