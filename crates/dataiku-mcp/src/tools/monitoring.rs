//! Run history, job inspection and job cancellation.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{duration_secs, epoch_millis, field_or, run_summary, str_or};
use crate::error::into_response;
use crate::server::McpServerState;
use crate::types::*;
use crate::Result;

const SUCCESS_OUTCOMES: [&str; 2] = ["SUCCESS", "DONE"];
const FAILED_OUTCOMES: [&str; 2] = ["FAILED", "ABORTED"];
const ACTIVE_STATES: [&str; 2] = ["RUNNING", "PENDING"];
const CANCELLED_STATES: [&str; 2] = ["ABORTED", "CANCELLED"];

/// Failures listed in the recent-runs summary.
const RECENT_FAILURES: usize = 10;
/// Activities listed in a job's details.
const ACTIVITY_LIMIT: usize = 10;

/// The flat view of one entry of a project's job list. DSS nests most of
/// it under `def` and `baseStatus`; older instances put it at the top.
#[derive(Debug, Clone, PartialEq)]
struct JobEntry {
    id: String,
    name: String,
    state: String,
    start: Value,
    end: Value,
}

impl JobEntry {
    fn from_listing(job: &Value) -> Self {
        let def = job.get("def").unwrap_or(&Value::Null);
        let base = job.get("baseStatus").unwrap_or(&Value::Null);
        let id = [def.get("id"), job.get("jobId"), job.get("id")]
            .into_iter()
            .flatten()
            .find_map(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let name = def
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Job {id}"));
        let state = [job.get("state"), base.get("state")]
            .into_iter()
            .flatten()
            .find_map(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_string();
        let first = |candidates: [Option<&Value>; 3]| {
            candidates
                .into_iter()
                .flatten()
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(Value::Null)
        };
        let start = first([def.get("initiationTimestamp"), base.get("jobStartTime"), job.get("startTime")]);
        let end = first([base.get("jobEndTime"), job.get("jobEndTime"), job.get("endTime")]);
        Self { id, name, state, start, end }
    }

    fn run_entry(&self) -> Value {
        json!({
            "type": "job",
            "object_id": self.id,
            "object_name": self.name,
            "run_id": self.id,
            "outcome": self.state,
            "start_time": self.start,
            "end_time": self.end,
            "duration": duration_secs(&self.start, &self.end),
            "trigger_type": "manual",
        })
    }
}

fn outcome_of(run: &Value) -> &str {
    str_or(run, "outcome", "unknown")
}

/// Newest first; runs without a start time go last.
fn sort_newest_first(runs: &mut [Value]) {
    let key = |run: &Value| epoch_millis(&run["start_time"]).unwrap_or(f64::NEG_INFINITY);
    runs.sort_by(|a, b| key(b).total_cmp(&key(a)));
}

fn summarize_runs(runs: &[Value], recent_failures: usize) -> Value {
    let count = |outcomes: &[&str]| runs.iter().filter(|r| outcomes.contains(&outcome_of(r))).count();
    let success = count(&SUCCESS_OUTCOMES[..]);
    let failed = count(&FAILED_OUTCOMES[..]);
    let running = count(&ACTIVE_STATES[..]);

    let durations: Vec<f64> = runs
        .iter()
        .filter(|r| ["SUCCESS", "DONE", "FAILED"].contains(&outcome_of(r)))
        .filter_map(|r| r["duration"].as_f64())
        .filter(|d| *d > 0.0)
        .collect();
    let average = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };

    let mut outcomes: BTreeMap<&str, usize> = BTreeMap::new();
    let mut types: BTreeMap<&str, usize> = BTreeMap::new();
    for run in runs {
        *outcomes.entry(outcome_of(run)).or_default() += 1;
        *types.entry(str_or(run, "type", "unknown")).or_default() += 1;
    }
    let success_rate = if runs.is_empty() {
        0.0
    } else {
        success as f64 / runs.len() as f64 * 100.0
    };

    json!({
        "total_runs": runs.len(),
        "success_runs": success,
        "failed_runs": failed,
        "running_runs": running,
        "success_rate": success_rate,
        "average_duration": average,
        "outcome_summary": outcomes,
        "type_summary": types,
        "recent_failures_count": recent_failures,
    })
}

/// Scenario runs and jobs of a project on one timeline.
pub struct RecentRunsTool;

impl RecentRunsTool {
    pub async fn execute(state: &McpServerState, input: RecentRunsInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to get recent runs")
    }

    async fn run(state: &McpServerState, input: RecentRunsInput) -> Result<Value> {
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let keep = |outcome: &str| input.status_filter.as_deref().map_or(true, |f| f == outcome);
        let mut runs = Vec::new();

        for scenario in project.list_scenarios().await? {
            let id = str_or(&scenario, "id", "");
            let last_runs = match project.scenario(id).last_runs(input.limit).await {
                Ok(last_runs) => last_runs,
                Err(err) => {
                    debug!(scenario = %id, error = %err, "scenario runs skipped");
                    continue;
                }
            };
            for run in &last_runs {
                let summary = run_summary(run);
                if !keep(outcome_of(&summary)) {
                    continue;
                }
                runs.push(json!({
                    "type": "scenario",
                    "object_id": id,
                    "object_name": str_or(&scenario, "name", id),
                    "run_id": summary["run_id"],
                    "outcome": summary["outcome"],
                    "start_time": summary["start_time"],
                    "end_time": summary["end_time"],
                    "duration": summary["duration"],
                    "trigger_type": summary["trigger_type"],
                }));
            }
        }

        match project.list_jobs().await {
            Ok(jobs) => runs.extend(
                jobs.iter()
                    .take(input.limit)
                    .map(JobEntry::from_listing)
                    .filter(|job| keep(&job.state))
                    .map(|job| job.run_entry()),
            ),
            Err(err) => warn!(project_key = %input.project_key, error = %err, "could not list jobs"),
        }

        sort_newest_first(&mut runs);
        runs.truncate(input.limit);
        let failures: Vec<Value> = runs
            .iter()
            .filter(|r| FAILED_OUTCOMES.contains(&outcome_of(r)))
            .take(RECENT_FAILURES)
            .cloned()
            .collect();
        let summary = summarize_runs(&runs, failures.len());

        Ok(json!({
            "status": "ok",
            "project_key": input.project_key,
            "runs": runs,
            "recent_failures": failures,
            "summary": summary,
            "filters_applied": {
                "limit": input.limit,
                "status_filter": input.status_filter,
            },
        }))
    }
}

/// A job's activities, from either the map or the list form DSS uses.
fn activities(status: &Value) -> Vec<Value> {
    let raw = status
        .get("activities")
        .or_else(|| status.get("baseStatus").and_then(|b| b.get("activities")));
    let items: Vec<(Option<&str>, &Value)> = match raw {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (Some(k.as_str()), v)).collect(),
        Some(Value::Array(list)) => list.iter().map(|v| (None, v)).collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|(key, activity)| {
            json!({
                "type": str_or(activity, "type", "unknown"),
                "name": activity
                    .get("name")
                    .or_else(|| activity.get("activityId"))
                    .and_then(Value::as_str)
                    .or(key)
                    .unwrap_or("unknown"),
                "state": str_or(activity, "state", "unknown"),
                "start_time": field_or(activity, "startTime", Value::Null),
                "end_time": field_or(activity, "endTime", Value::Null),
            })
        })
        .collect()
}

fn timeline(job_info: &Value) -> Vec<Value> {
    let mut events = Vec::new();
    if !job_info["start_time"].is_null() {
        events.push(json!({
            "event": "job_started",
            "timestamp": job_info["start_time"],
            "description": "Job execution started",
        }));
    }
    if !job_info["end_time"].is_null() {
        events.push(json!({
            "event": "job_completed",
            "timestamp": job_info["end_time"],
            "description": format!("Job completed with status: {}", str_or(job_info, "state", "unknown")),
        }));
    }
    events
}

pub struct JobDetailsTool;

impl JobDetailsTool {
    pub async fn execute(state: &McpServerState, input: JobDetailsInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to get job details")
    }

    async fn run(state: &McpServerState, input: JobDetailsInput) -> Result<Value> {
        let client = state.client().await?;
        let job = client.project(&input.project_key).job(&input.job_id);
        let status = job.status().await?;
        let base = status.get("baseStatus").unwrap_or(&Value::Null);
        let time = |keys: [&str; 2]| {
            keys.iter()
                .filter_map(|k| base.get(*k))
                .find(|v| !v.is_null())
                .cloned()
                .unwrap_or(Value::Null)
        };
        let job_info = json!({
            "job_id": input.job_id,
            "state": str_or(base, "state", "unknown"),
            "start_time": time(["startTime", "jobStartTime"]),
            "end_time": time(["endTime", "jobEndTime"]),
            "initiator": str_or(base, "initiator", "unknown"),
            "warning": field_or(&status, "hasWarning", json!(false)),
        });

        let mut logs = Vec::new();
        match job.log(None).await {
            Ok(text) if !text.is_empty() => logs.push(json!({
                "type": "main_log",
                "content": text,
                "timestamp": job_info["start_time"],
            })),
            Ok(_) => {}
            Err(err) => logs.push(json!({
                "type": "error",
                "content": format!("Could not retrieve job log: {err}"),
                "timestamp": job_info["start_time"],
            })),
        }

        let activities = activities(&status);
        let listed: Vec<&Value> = activities.iter().take(ACTIVITY_LIMIT).collect();
        Ok(json!({
            "status": "ok",
            "project_key": input.project_key,
            "timeline": timeline(&job_info),
            "job_info": job_info,
            "log_count": logs.len(),
            "logs": logs,
            "activity_info": {
                "activity_count": activities.len(),
                "activities": listed,
            },
        }))
    }
}

/// Abort running jobs and check that each one stopped.
pub struct CancelJobsTool;

impl CancelJobsTool {
    pub async fn execute(state: &McpServerState, input: CancelJobsInput) -> Value {
        into_response(Self::run(state, input).await, "Failed to cancel running jobs")
    }

    async fn run(state: &McpServerState, input: CancelJobsInput) -> Result<Value> {
        let client = state.client().await?;
        let project = client.project(&input.project_key);
        let mut cancelled = Vec::new();
        let mut failed = Vec::new();

        for job_id in &input.job_ids {
            let job = project.job(job_id);
            let previous = match job.status().await {
                Ok(status) => dataiku_client::JobResult::new(job_id.clone(), status),
                Err(err) => {
                    failed.push(json!({ "job_id": job_id, "error": format!("Failed to cancel job: {err}") }));
                    continue;
                }
            };
            let previous_state = previous.state();
            if !ACTIVE_STATES.contains(&previous_state) {
                failed.push(json!({
                    "job_id": job_id,
                    "error": format!("Job is not running (state: {previous_state})"),
                    "current_state": previous_state,
                }));
                continue;
            }
            if let Err(err) = job.abort().await {
                failed.push(json!({ "job_id": job_id, "error": format!("Failed to cancel job: {err}") }));
                continue;
            }

            tokio::time::sleep(client.poll_interval()).await;
            let mut entry = json!({
                "job_id": job_id,
                "previous_state": previous_state,
                "job_name": format!("Job {job_id}"),
            });
            match job.status().await {
                Ok(status) => {
                    let now = dataiku_client::JobResult::new(job_id.clone(), status);
                    entry["new_state"] = json!(now.state());
                    entry["cancelled_successfully"] = json!(CANCELLED_STATES.contains(&now.state()));
                    entry["verified"] = json!(true);
                }
                Err(err) => {
                    // The abort was sent but its effect is unknown.
                    entry["new_state"] = json!("unknown");
                    entry["cancelled_successfully"] = json!(false);
                    entry["verified"] = json!(false);
                    entry["verification_error"] = json!(err.to_string());
                }
            }
            info!(project_key = %input.project_key, %job_id, new_state = %entry["new_state"], "job abort requested");
            cancelled.push(entry);
        }

        let still_running: Vec<Value> = match project.list_jobs().await {
            Ok(jobs) => jobs
                .iter()
                .map(JobEntry::from_listing)
                .filter(|job| ACTIVE_STATES.contains(&job.state.as_str()))
                .map(|job| {
                    json!({
                        "job_id": job.id,
                        "job_name": job.name,
                        "state": job.state,
                        "start_time": job.start,
                    })
                })
                .collect(),
            Err(err) => {
                debug!(project_key = %input.project_key, error = %err, "could not list jobs after cancelling");
                Vec::new()
            }
        };

        let successful = cancelled
            .iter()
            .filter(|c| c["cancelled_successfully"] == true)
            .count();
        let success_rate = if input.job_ids.is_empty() {
            0.0
        } else {
            successful as f64 / input.job_ids.len() as f64 * 100.0
        };

        Ok(json!({
            "status": "ok",
            "project_key": input.project_key,
            "cancellation_summary": {
                "total_requested": input.job_ids.len(),
                "successful_cancellations": successful,
                "failed_cancellations": failed.len(),
                "success_rate": success_rate,
                "remaining_running_jobs": still_running.len(),
            },
            "cancelled_jobs": cancelled,
            "failed_cancellations": failed,
            "current_running_jobs": still_running,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_listing_reads_nested_definition() {
        let job = JobEntry::from_listing(&json!({
            "def": {"id": "build_x_2024", "initiationTimestamp": 1000},
            "state": "DONE",
            "baseStatus": {"jobEndTime": 6000}
        }));
        assert_eq!(job.id, "build_x_2024");
        assert_eq!(job.name, "Job build_x_2024");
        assert_eq!(job.state, "DONE");
        assert_eq!(job.run_entry()["duration"], 5.0);
    }

    #[test]
    fn runs_sort_newest_first_with_unknown_last() {
        let mut runs = vec![
            json!({"start_time": 10}),
            json!({"start_time": null}),
            json!({"start_time": 30}),
        ];
        sort_newest_first(&mut runs);
        assert_eq!(runs[0]["start_time"], 30);
        assert_eq!(runs[1]["start_time"], 10);
        assert!(runs[2]["start_time"].is_null());
    }

    #[test]
    fn summary_counts_outcomes() {
        let runs = vec![
            json!({"type": "scenario", "outcome": "SUCCESS", "duration": 10.0}),
            json!({"type": "job", "outcome": "DONE", "duration": 20.0}),
            json!({"type": "job", "outcome": "FAILED", "duration": null}),
            json!({"type": "job", "outcome": "RUNNING"}),
        ];
        let summary = summarize_runs(&runs, 1);
        assert_eq!(summary["success_runs"], 2);
        assert_eq!(summary["failed_runs"], 1);
        assert_eq!(summary["running_runs"], 1);
        assert_eq!(summary["success_rate"], 50.0);
        assert_eq!(summary["average_duration"], 15.0);
        assert_eq!(summary["type_summary"], json!({"job": 3, "scenario": 1}));
    }

    #[test]
    fn activities_accept_map_form() {
        let status = json!({"baseStatus": {"activities": {
            "compute_out_NP": {"type": "recipe", "state": "DONE", "startTime": 5}
        }}});
        let acts = activities(&status);
        assert_eq!(acts.len(), 1);
        assert_eq!(acts[0]["name"], "compute_out_NP");
        assert_eq!(acts[0]["start_time"], 5);
    }

    #[test]
    fn timeline_needs_timestamps() {
        assert!(timeline(&json!({"start_time": null, "end_time": null})).is_empty());
        let events = timeline(&json!({"state": "FAILED", "start_time": 1, "end_time": 2}));
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["description"], "Job completed with status: FAILED");
    }
}
