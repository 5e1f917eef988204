use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::project::Project;
use crate::transport::{segment, ApiRequest};

/// Job states after which a job no longer changes.
pub const TERMINAL_STATES: [&str; 3] = ["DONE", "FAILED", "ABORTED"];

/// A build job in a project.
#[derive(Clone)]
pub struct Job {
    project: Project,
    id: String,
}

impl Job {
    pub(crate) fn new(project: Project, id: String) -> Self {
        Self { project, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn path(&self, rest: &str) -> String {
        self.project
            .path(&format!("/jobs/{}{}", segment(&self.id), rest))
    }

    /// Full status document (`baseStatus`, `activities`, ...).
    pub async fn status(&self) -> Result<Value> {
        self.project.client().get(self.path("/")).await
    }

    /// Log text for the whole job, or for a single activity.
    pub async fn log(&self, activity: Option<&str>) -> Result<String> {
        let mut request = ApiRequest::get(self.path("/log/")).text();
        if let Some(activity) = activity {
            request = request.query("activity", activity);
        }
        let body = self.project.client().send(request).await?;
        Ok(match body {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    pub async fn abort(&self) -> Result<()> {
        self.project
            .client()
            .send(ApiRequest::post(self.path("/abort/")))
            .await?;
        Ok(())
    }

    /// Poll until the job reaches a terminal state.
    pub async fn wait_for_completion(&self) -> Result<JobResult> {
        let interval = self.project.client().poll_interval();
        loop {
            let status = self.status().await?;
            let result = JobResult::new(self.id.clone(), status);
            let state = result.state();
            if TERMINAL_STATES.contains(&state) {
                debug!(job_id = %self.id, %state, "job finished");
                return Ok(result);
            }
            tokio::time::sleep(interval).await;
        }
    }
}

/// Snapshot of a job status.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub id: String,
    pub status: Value,
}

impl JobResult {
    pub fn new(id: String, status: Value) -> Self {
        Self { id, status }
    }

    fn base(&self) -> &Value {
        self.status.get("baseStatus").unwrap_or(&Value::Null)
    }

    pub fn state(&self) -> &str {
        self.base()
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
    }

    /// Final outcome; the same as the state for terminal jobs.
    pub fn outcome(&self) -> &str {
        self.state()
    }

    pub fn start_time(&self) -> Value {
        self.base().get("jobStartTime").cloned().unwrap_or(Value::Null)
    }

    pub fn end_time(&self) -> Value {
        self.base().get("jobEndTime").cloned().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::MockTransport;
    use serde_json::json;

    #[tokio::test]
    async fn waits_until_terminal_state() {
        let mock = MockTransport::new();
        let path = "/projects/P/jobs/j1/";
        mock.on_get(path, json!({"baseStatus": {"state": "RUNNING"}}))
            .on_get(path, json!({"baseStatus": {"state": "RUNNING"}}))
            .on_get(
                path,
                json!({"baseStatus": {"state": "DONE", "jobStartTime": 1, "jobEndTime": 5}}),
            );

        let result = mock
            .client()
            .project("P")
            .job("j1")
            .wait_for_completion()
            .await
            .unwrap();
        assert_eq!(result.outcome(), "DONE");
        assert_eq!(result.start_time(), json!(1));
        assert_eq!(result.end_time(), json!(5));
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn log_is_returned_as_text() {
        let mock = MockTransport::new();
        mock.on_get("/projects/P/jobs/j1/log/", json!("line 1\nline 2"));
        let log = mock.client().project("P").job("j1").log(Some("a1")).await.unwrap();
        assert_eq!(log, "line 1\nline 2");
        let req = &mock.requests()[0];
        assert_eq!(req.query, vec![("activity".to_string(), "a1".to_string())]);
    }
}
