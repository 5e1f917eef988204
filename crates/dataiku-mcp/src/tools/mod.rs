//! MCP tool implementations, grouped by the DSS object they work on.
//!
//! Every tool is a unit struct with an `execute` function taking the shared
//! [`McpServerState`](crate::McpServerState) and its typed input. `execute`
//! always answers with a JSON object carrying `status`; failures are folded
//! into `{"status": "error", "message": ...}` by
//! [`into_response`](crate::error::into_response). Inputs are validated
//! before the DSS client is touched.

pub mod advanced_scenarios;
pub mod code;
pub mod datasets;
pub mod environment;
pub mod exploration;
pub mod monitoring;
pub mod productivity;
pub mod recipes;
pub mod scenarios;

use dataiku_client::{JobResult, BUILD_MODES};
use serde_json::{json, Value};

use crate::{Error, Result};

/// Reject a build mode DSS would not accept. `label` is the name shown in
/// the message ("build mode" or "build_mode").
pub(crate) fn validate_build_mode(param: &str, label: &str, mode: Option<&str>) -> Result<()> {
    match mode {
        Some(mode) if !BUILD_MODES.contains(&mode) => Err(Error::invalid_param(
            param,
            format!("Invalid {label}. Must be one of: {BUILD_MODES:?}"),
        )),
        _ => Ok(()),
    }
}

/// Fail unless a job that was waited for ended in `DONE`.
pub(crate) fn ensure_job_done(result: &JobResult) -> Result<()> {
    match result.outcome() {
        "DONE" => Ok(()),
        outcome => Err(
            Error::new(502, format!("Job run did not finish. Status: {outcome}"))
                .with_type("https://dataiku-mcp.local/errors/upstream")
                .with_context(json!({ "job_id": result.id, "job_status": outcome })),
        ),
    }
}

/// String field of a DSS document, or `default`.
pub(crate) fn str_or<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

/// Field of a DSS document, or `default` when missing or null.
pub(crate) fn field_or(value: &Value, key: &str, default: Value) -> Value {
    match value.get(key) {
        Some(v) if !v.is_null() => v.clone(),
        _ => default,
    }
}

pub(crate) fn tags_of(value: &Value) -> Vec<Value> {
    value
        .get("tags")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

pub(crate) fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

/// Timestamp in epoch milliseconds. DSS sends numbers; ISO-8601 strings are
/// accepted too.
pub(crate) fn epoch_millis(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.timestamp_millis() as f64),
        _ => None,
    }
}

/// Elapsed seconds between two timestamps, when both are known.
pub(crate) fn duration_secs(start: &Value, end: &Value) -> Option<f64> {
    let (start, end) = (epoch_millis(start)?, epoch_millis(end)?);
    (end >= start).then(|| (end - start) / 1000.0)
}

/// Flatten one entry of a scenario's run list.
pub(crate) fn run_summary(run: &Value) -> Value {
    let start = field_or(run, "start", Value::Null);
    let end = field_or(run, "end", Value::Null);
    let trigger = run
        .get("trigger")
        .map(|t| t.get("trigger").unwrap_or(t))
        .unwrap_or(&Value::Null);
    json!({
        "run_id": run.get("runId").or_else(|| run.get("id")).cloned().unwrap_or(json!("unknown")),
        "outcome": run
            .get("result")
            .and_then(|r| r.get("outcome"))
            .cloned()
            .unwrap_or(json!("unknown")),
        "duration": duration_secs(&start, &end),
        "start_time": start,
        "end_time": end,
        "trigger_name": str_or(trigger, "name", "unknown"),
        "trigger_type": str_or(trigger, "type", "unknown"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mode_errors_list_allowed_values() {
        assert!(validate_build_mode("mode", "build mode", None).is_ok());
        assert!(validate_build_mode("mode", "build mode", Some("RECURSIVE_BUILD")).is_ok());
        let err = validate_build_mode("mode", "build mode", Some("FAST")).unwrap_err();
        assert_eq!(
            err.message,
            "Invalid build mode. Must be one of: [\"RECURSIVE_BUILD\", \"NON_RECURSIVE_FORCED_BUILD\", \"RECURSIVE_FORCED_BUILD\"]"
        );
        assert_eq!(err.code, 400);
    }

    #[test]
    fn only_done_jobs_pass() {
        let done = JobResult::new("j1".into(), json!({"baseStatus": {"state": "DONE"}}));
        assert!(ensure_job_done(&done).is_ok());

        let failed = JobResult::new("j2".into(), json!({"baseStatus": {"state": "FAILED"}}));
        let err = ensure_job_done(&failed).unwrap_err();
        assert_eq!(err.code, 502);
        assert_eq!(err.message, "Job run did not finish. Status: FAILED");
    }

    #[test]
    fn run_summary_reads_nested_fields() {
        let run = json!({
            "runId": "2024-01-01-00-00-00",
            "start": 1_000,
            "end": 4_500,
            "result": {"outcome": "FAILED"},
            "trigger": {"trigger": {"type": "temporal", "name": "nightly"}}
        });
        let summary = run_summary(&run);
        assert_eq!(summary["run_id"], "2024-01-01-00-00-00");
        assert_eq!(summary["outcome"], "FAILED");
        assert_eq!(summary["duration"], 3.5);
        assert_eq!(summary["trigger_name"], "nightly");
        assert_eq!(summary["trigger_type"], "temporal");
    }

    #[test]
    fn timestamps_accept_numbers_and_rfc3339() {
        assert_eq!(epoch_millis(&json!(5)), Some(5.0));
        assert_eq!(epoch_millis(&json!("1970-01-01T00:00:01Z")), Some(1000.0));
        assert_eq!(epoch_millis(&json!(null)), None);
        assert_eq!(duration_secs(&json!(2000), &json!(1000)), None);
    }
}
