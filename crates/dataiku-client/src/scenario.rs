use serde_json::{json, Value};
use tracing::debug;

use crate::client::as_list;
use crate::error::{Error, Result};
use crate::project::Project;
use crate::transport::{segment, ApiRequest};

#[derive(Clone)]
pub struct Scenario {
    project: Project,
    id: String,
}

/// Handle on a fired trigger, returned by [`Scenario::run`].
#[derive(Debug, Clone)]
pub struct TriggerFire {
    pub id: String,
    pub raw: Value,
}

impl Scenario {
    pub(crate) fn new(project: Project, id: String) -> Self {
        Self { project, id }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn project_key(&self) -> &str {
        self.project.key()
    }

    fn path(&self, rest: &str) -> String {
        self.project
            .path(&format!("/scenarios/{}{}", segment(&self.id), rest))
    }

    /// Raw settings: `name`, `type`, `active`, `triggers`, `params`, ...
    pub async fn settings(&self) -> Result<Value> {
        self.project.client().get(self.path("/")).await
    }

    pub async fn save_settings(&self, settings: Value) -> Result<()> {
        self.project.client().put(self.path("/"), settings).await?;
        Ok(())
    }

    pub async fn metadata(&self) -> Result<Value> {
        self.project.client().get(self.path("/metadata")).await
    }

    pub async fn set_metadata(&self, metadata: Value) -> Result<()> {
        self.project.client().put(self.path("/metadata"), metadata).await?;
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        self.project
            .client()
            .send(ApiRequest::delete(self.path("/")))
            .await?;
        Ok(())
    }

    /// Lightweight status: `active`, `running`, `nextRun`, ...
    pub async fn status(&self) -> Result<Value> {
        self.project.client().get(self.path("/light/")).await
    }

    /// Most recent runs, newest first.
    pub async fn last_runs(&self, limit: usize) -> Result<Vec<Value>> {
        let request = ApiRequest::get(self.path("/get-last-runs")).query("limit", limit);
        as_list(self.project.client().send(request).await?)
    }

    /// Step runs and jobs of a single run.
    pub async fn run_details(&self, run_id: &str) -> Result<Value> {
        self.project
            .client()
            .get(self.path(&format!("/{}/", segment(run_id))))
            .await
    }

    /// Scenario-level log of a run, as text.
    pub async fn run_log(&self, run_id: &str) -> Result<String> {
        let request = ApiRequest::get(self.path(&format!("/{}/log", segment(run_id)))).text();
        Ok(match self.project.client().send(request).await? {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    /// Fire the scenario's manual trigger without waiting.
    pub async fn run(&self, params: Option<Value>) -> Result<TriggerFire> {
        let request =
            ApiRequest::post(self.path("/run")).json(params.unwrap_or_else(|| json!({})));
        let raw = self.project.client().send(request).await?;
        let id = raw
            .get("runId")
            .or_else(|| raw.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("trigger fire has no id".into()))?;
        debug!(project_key = %self.project_key(), scenario = %self.id, trigger_fire = %id, "scenario fired");
        Ok(TriggerFire { id, raw })
    }

    /// Poll the run started by `fire` until it has a result.
    pub async fn wait_for_run(&self, fire: &TriggerFire) -> Result<Value> {
        let interval = self.project.client().poll_interval();
        let path = self.project.path(&format!(
            "/scenarios/trigger/{}/{}",
            segment(&self.id),
            segment(&fire.id)
        ));
        loop {
            let state = self.project.client().get(path.clone()).await?;
            if let Some(run) = state.get("scenarioRun").filter(|r| !r.is_null()) {
                if run.get("result").is_some_and(|r| !r.is_null()) {
                    return Ok(run.clone());
                }
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn run_and_wait(&self, params: Option<Value>) -> Result<Value> {
        let fire = self.run(params).await?;
        self.wait_for_run(&fire).await
    }
}

/// Outcome of a finished run (`SUCCESS`, `WARNING`, `FAILED`, `ABORTED`).
pub fn run_outcome(run: &Value) -> Option<&str> {
    run.get("result")
        .and_then(|r| r.get("outcome"))
        .and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;

    #[tokio::test]
    async fn run_and_wait_polls_until_result() {
        let mock = MockTransport::new();
        mock.on_post("/projects/P/scenarios/S/run", json!({"runId": "fire-1"}))
            .on_get("/projects/P/scenarios/trigger/S/fire-1", json!({}))
            .on_get(
                "/projects/P/scenarios/trigger/S/fire-1",
                json!({"scenarioRun": {"runId": "r1", "result": null}}),
            )
            .on_get(
                "/projects/P/scenarios/trigger/S/fire-1",
                json!({"scenarioRun": {"runId": "r1", "result": {"outcome": "SUCCESS"}}}),
            );

        let run = mock
            .client()
            .project("P")
            .scenario("S")
            .run_and_wait(None)
            .await
            .unwrap();
        assert_eq!(run_outcome(&run), Some("SUCCESS"));
    }

    #[tokio::test]
    async fn last_runs_passes_limit() {
        let mock = MockTransport::new();
        mock.on_get("/projects/P/scenarios/S/get-last-runs", json!([]));
        let runs = mock.client().project("P").scenario("S").last_runs(50).await.unwrap();
        assert!(runs.is_empty());
        assert_eq!(
            mock.requests()[0].query,
            vec![("limit".to_string(), "50".to_string())]
        );
    }
}
