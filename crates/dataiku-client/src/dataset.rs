//! Dataset handle: definition, schema, metrics, builds and data sampling.

use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::job::JobResult;
use crate::project::Project;
use crate::transport::{segment, ApiRequest};

/// Partition id used by DSS for non-partitioned datasets.
pub const NO_PARTITION: &str = "NP";

/// Build modes accepted by DSS jobs.
pub const BUILD_MODES: [&str; 3] = [
    "RECURSIVE_BUILD",
    "NON_RECURSIVE_FORCED_BUILD",
    "RECURSIVE_FORCED_BUILD",
];

#[derive(Clone)]
pub struct Dataset {
    project: Project,
    name: String,
}

/// Rows pulled from a dataset, all cells as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub(crate) fn new(project: Project, name: String) -> Self {
        Self { project, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project_key(&self) -> &str {
        self.project.key()
    }

    fn path(&self, rest: &str) -> String {
        self.project
            .path(&format!("/datasets/{}{}", segment(&self.name), rest))
    }

    /// Raw dataset definition: `type`, `params`, `formatType`, ...
    pub async fn definition(&self) -> Result<Value> {
        self.project.client().get(self.path("")).await
    }

    pub async fn save_definition(&self, definition: Value) -> Result<()> {
        self.project.client().put(self.path(""), definition).await?;
        Ok(())
    }

    pub async fn delete(&self, drop_data: bool) -> Result<()> {
        let request = ApiRequest::delete(self.path("")).query("dropData", drop_data);
        self.project.client().send(request).await?;
        debug!(project_key = %self.project_key(), dataset = %self.name, drop_data, "deleted dataset");
        Ok(())
    }

    pub async fn schema(&self) -> Result<Value> {
        self.project.client().get(self.path("/schema")).await
    }

    pub async fn set_schema(&self, schema: Value) -> Result<()> {
        self.project.client().put(self.path("/schema"), schema).await?;
        Ok(())
    }

    pub async fn metadata(&self) -> Result<Value> {
        self.project.client().get(self.path("/metadata")).await
    }

    pub async fn set_metadata(&self, metadata: Value) -> Result<()> {
        self.project.client().put(self.path("/metadata"), metadata).await?;
        Ok(())
    }

    /// Last computed metric values for a partition (`NP` when unpartitioned).
    pub async fn last_metric_values(&self, partition: Option<&str>) -> Result<Value> {
        let partition = partition.unwrap_or(NO_PARTITION);
        self.project
            .client()
            .get(self.path(&format!("/metrics/last/{}", segment(partition))))
            .await
    }

    /// Drop stored data, optionally only for some partitions.
    pub async fn clear(&self, partitions: Option<&[String]>) -> Result<()> {
        let mut request = ApiRequest::delete(self.path("/data"));
        if let Some(partitions) = partitions.filter(|p| !p.is_empty()) {
            request = request.query("partitions", partitions.join(","));
        }
        self.project.client().send(request).await?;
        Ok(())
    }

    /// Start a build job for this dataset and wait for it.
    pub async fn build(&self, job_type: &str, partition: Option<&str>) -> Result<JobResult> {
        let mut output = json!({
            "projectKey": self.project_key(),
            "id": self.name,
            "type": "DATASET",
        });
        if let Some(partition) = partition {
            output["partition"] = json!(partition);
        }
        let job = self
            .project
            .start_job(json!({ "type": job_type, "outputs": [output] }))
            .await?;
        job.wait_for_completion().await
    }

    /// Read the first `limit` rows, optionally restricted to `columns`.
    pub async fn sample(&self, limit: usize, columns: Option<&[String]>) -> Result<Sample> {
        let schema = self.schema().await?;
        let all_columns: Vec<String> = schema
            .get("columns")
            .and_then(Value::as_array)
            .map(|cols| {
                cols.iter()
                    .filter_map(|c| c.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let selected: Vec<String> = match columns {
            Some(cols) if !cols.is_empty() => cols.to_vec(),
            _ => all_columns,
        };

        let sampling = json!({ "samplingMethod": "HEAD_SEQUENTIAL", "maxRecords": limit });
        let mut request = ApiRequest::get(self.path("/data/"))
            .query("format", "tsv-excel-noheader")
            .query("sampling", sampling.to_string())
            .text();
        if columns.is_some_and(|c| !c.is_empty()) {
            request = request.query("columns", selected.join(","));
        }

        let body = self.project.client().send(request).await?;
        let text = match body {
            Value::String(text) => text,
            Value::Null => String::new(),
            other => {
                return Err(Error::InvalidResponse(format!(
                    "expected TSV data, got {other}"
                )))
            }
        };

        let mut rows = parse_tsv(&text)?;
        rows.truncate(limit);
        Ok(Sample {
            columns: selected,
            rows,
        })
    }
}

fn parse_tsv(text: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockTransport;
    use reqwest::Method;

    #[test]
    fn tsv_keeps_quoted_tabs() {
        let rows = parse_tsv("a\t\"b\tc\"\n1\t2\n").unwrap();
        assert_eq!(rows[0], vec!["a", "b\tc"]);
        assert_eq!(rows[1], vec!["1", "2"]);
    }

    #[tokio::test]
    async fn sample_uses_schema_columns() {
        let mock = MockTransport::new();
        mock.on_get(
            "/projects/P/datasets/d/schema",
            json!({"columns": [{"name": "id"}, {"name": "city"}]}),
        )
        .on_get("/projects/P/datasets/d/data/", json!("1\tParis\n2\tLyon\n3\tNice\n"));

        let sample = mock
            .client()
            .project("P")
            .dataset("d")
            .sample(2, None)
            .await
            .unwrap();
        assert_eq!(sample.columns, vec!["id", "city"]);
        assert_eq!(sample.rows.len(), 2);
        assert_eq!(sample.rows[1], vec!["2", "Lyon"]);
    }

    #[tokio::test]
    async fn build_starts_job_for_dataset_output() {
        let mock = MockTransport::new();
        mock.on_post("/projects/P/jobs/", json!({"id": "job-1"}))
            .on_get("/projects/P/jobs/job-1/", json!({"baseStatus": {"state": "DONE"}}));

        let result = mock
            .client()
            .project("P")
            .dataset("d")
            .build("RECURSIVE_BUILD", Some("2024-01-01"))
            .await
            .unwrap();
        assert_eq!(result.id, "job-1");
        let body = mock.last_body(Method::POST, "/projects/P/jobs/").unwrap();
        assert_eq!(body["type"], "RECURSIVE_BUILD");
        assert_eq!(body["outputs"][0]["id"], "d");
        assert_eq!(body["outputs"][0]["partition"], "2024-01-01");
    }

    #[tokio::test]
    async fn metrics_default_to_unpartitioned() {
        let mock = MockTransport::new();
        mock.on_get("/projects/P/datasets/d/metrics/last/NP", json!({"metrics": []}));
        let metrics = mock
            .client()
            .project("P")
            .dataset("d")
            .last_metric_values(None)
            .await
            .unwrap();
        assert_eq!(metrics["metrics"], json!([]));
    }
}
