use dataiku_client::test_utils::MockTransport;
use dataiku_client::{Error, RecipeCreation, RecipeOutput};
use reqwest::Method;
use serde_json::json;

#[tokio::test]
async fn dataset_build_polls_job_until_terminal() {
    let mock = MockTransport::new();
    mock.on_post("/projects/P/jobs/", json!({"id": "build_1"}));
    mock.on_get("/projects/P/jobs/build_1/", json!({"baseStatus": {"state": "RUNNING"}}))
        .on_get(
            "/projects/P/jobs/build_1/",
            json!({"baseStatus": {"state": "DONE", "jobStartTime": 10, "jobEndTime": 20}}),
        );

    let result = mock
        .client()
        .project("P")
        .dataset("orders")
        .build("NON_RECURSIVE_FORCED_BUILD", None)
        .await
        .expect("build finishes");

    assert_eq!(result.state(), "DONE");
    assert_eq!(result.start_time(), json!(10));
    assert_eq!(result.end_time(), json!(20));
    assert_eq!(mock.requests_to(Method::GET, "/projects/P/jobs/build_1/").len(), 2);

    let body = mock.last_body(Method::POST, "/projects/P/jobs/").unwrap();
    assert_eq!(body["type"], "NON_RECURSIVE_FORCED_BUILD");
    assert_eq!(body["outputs"][0]["id"], "orders");
}

#[tokio::test]
async fn scenario_run_waits_for_result() {
    let mock = MockTransport::new();
    mock.on_post("/projects/P/scenarios/daily/run", json!({"runId": "fire_1"}));
    mock.on_get(
        "/projects/P/scenarios/trigger/daily/fire_1",
        json!({"scenarioRun": null}),
    )
    .on_get(
        "/projects/P/scenarios/trigger/daily/fire_1",
        json!({"scenarioRun": {"runId": "run_1", "result": {"outcome": "SUCCESS"}}}),
    );

    let run = mock
        .client()
        .project("P")
        .scenario("daily")
        .run_and_wait(None)
        .await
        .expect("scenario finishes");

    assert_eq!(dataiku_client::scenario::run_outcome(&run), Some("SUCCESS"));
}

#[tokio::test]
async fn dataset_sample_parses_tsv_rows() {
    let mock = MockTransport::new();
    mock.on_get(
        "/projects/P/datasets/orders/schema",
        json!({"columns": [{"name": "id", "type": "int"}, {"name": "city", "type": "string"}]}),
    );
    mock.on_get("/projects/P/datasets/orders/data/", json!("1\tParis\n2\t\n3\tOslo\n"));

    let sample = mock
        .client()
        .project("P")
        .dataset("orders")
        .sample(2, None)
        .await
        .expect("sample is read");

    assert_eq!(sample.columns, vec!["id", "city"]);
    assert_eq!(sample.rows.len(), 2);
    assert_eq!(sample.rows[1], vec!["2", ""]);
}

#[tokio::test]
async fn recipe_creation_posts_inputs_and_outputs() {
    let mock = MockTransport::new();
    mock.on_post("/projects/P/recipes/", json!({"name": "compute_orders"}));

    let creation = RecipeCreation {
        recipe_type: "python".into(),
        name: "compute_orders".into(),
        inputs: vec!["raw".into()],
        outputs: vec![RecipeOutput::existing("orders")],
    };
    let recipe = mock
        .client()
        .project("P")
        .create_recipe(&creation)
        .await
        .expect("recipe is created");

    assert_eq!(recipe.name(), "compute_orders");
    assert_eq!(mock.requests_to(Method::POST, "/projects/P/recipes/").len(), 1);
}

#[tokio::test]
async fn api_errors_keep_status_and_message() {
    let mock = MockTransport::new();
    mock.fail(Method::GET, "/projects/P/metadata", 403, "Not allowed");

    let err = mock.client().project("P").metadata().await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "Not allowed");
        }
        other => panic!("unexpected error: {other}"),
    }
}
