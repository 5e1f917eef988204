//! Integration tests for the MCP stdio protocol
//!
//! These tests spawn the server binary and exchange JSON-RPC messages over
//! its stdin/stdout. No DSS instance is needed: the client connects lazily,
//! so only tool calls touch the network, and those fail fast because the
//! connection variables are removed from the child's environment.

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Session {
    fn spawn() -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_dataiku-mcp"))
            .env_remove("DSS_HOST")
            .env_remove("DSS_API_KEY")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn server");
        let stdin = child.stdin.take().unwrap();
        let stdout = BufReader::new(child.stdout.take().unwrap());
        Self {
            child,
            stdin,
            stdout,
        }
    }

    fn send(&mut self, message: Value) {
        writeln!(self.stdin, "{}", message).unwrap();
        self.stdin.flush().unwrap();
    }

    /// Send a request and read lines until its response arrives.
    fn request(&mut self, id: u64, method: &str, params: Value) -> Value {
        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}));
        loop {
            let mut line = String::new();
            let read = self.stdout.read_line(&mut line).unwrap();
            assert!(read > 0, "server closed stdout before answering {method}");
            let message: Value = serde_json::from_str(&line).expect("Failed to parse JSON response");
            if message["id"] == id {
                return message;
            }
        }
    }

    fn initialize(&mut self) -> Value {
        let response = self.request(
            1,
            "initialize",
            json!({
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "integration-test", "version": "0.0.0"}
            }),
        );
        self.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        response
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.child.kill().ok();
        self.child.wait().ok();
    }
}

/// Parse the JSON document a tool returned as text content.
fn tool_payload(response: &Value) -> Value {
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("tool result should carry text content");
    serde_json::from_str(text).unwrap()
}

#[test]
fn test_initialize_protocol() {
    let mut session = Session::spawn();
    let response = session.initialize();

    assert_eq!(response["jsonrpc"], "2.0");
    assert!(response["result"].is_object());
    assert_eq!(response["result"]["serverInfo"]["name"], "dataiku-mcp");
    assert!(response["result"]["capabilities"]["tools"].is_object());
    assert!(response["result"]["capabilities"]["resources"].is_object());
}

#[test]
fn test_tools_list() {
    let mut session = Session::spawn();
    session.initialize();

    let response = session.request(2, "tools/list", json!({}));
    let tools = response["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 43);

    let create = tools
        .iter()
        .find(|t| t["name"] == "create_dataset")
        .expect("create_dataset is listed");
    let required = create["inputSchema"]["required"].as_array().unwrap();
    assert!(required.contains(&json!("project_key")));
    assert!(required.contains(&json!("dataset_name")));
}

#[test]
fn test_tool_descriptions_match_behavior() {
    let mut session = Session::spawn();
    session.initialize();

    let response = session.request(2, "tools/list", json!({}));
    let tools = response["result"]["tools"].as_array().unwrap();
    let description = |name: &str| -> String {
        tools
            .iter()
            .find(|t| t["name"] == name)
            .and_then(|t| t["description"].as_str())
            .unwrap_or_default()
            .to_string()
    };

    for name in ["build_dataset", "run_recipe"] {
        let text = description(name);
        assert!(text.contains("wait"), "{name}: {text}");
        assert!(!text.contains("without waiting"), "{name}: {text}");
    }
    assert!(!description("add_scenario_trigger").contains("sql"));
    assert!(!description("inspect_dataset_schema").contains("recommendation"));
    assert!(!description("get_dataset_info").contains("schema summary"));
    assert!(!description("get_scenario_run_history").contains("statistics"));
    assert!(!description("get_scenario_logs").contains("extracted errors"));
}

#[test]
fn test_resources_list() {
    let mut session = Session::spawn();
    session.initialize();

    let response = session.request(2, "resources/list", json!({}));
    let resources = response["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0]["uri"], "projects://");

    let response = session.request(3, "resources/templates/list", json!({}));
    let templates = response["result"]["resourceTemplates"].as_array().unwrap();
    assert_eq!(templates[0]["uriTemplate"], "project://{project_key}");
}

#[test]
fn test_unknown_resource_is_an_error() {
    let mut session = Session::spawn();
    session.initialize();

    let response = session.request(2, "resources/read", json!({"uri": "files://nope"}));
    assert!(response["error"].is_object());
}

#[test]
fn test_tool_without_configuration_reports_error_envelope() {
    let mut session = Session::spawn();
    session.initialize();

    let response = session.request(
        2,
        "tools/call",
        json!({"name": "list_datasets", "arguments": {"project_key": "SALES"}}),
    );
    let payload = tool_payload(&response);
    assert_eq!(payload["status"], "error");
    assert!(payload["message"].as_str().unwrap().contains("DSS_HOST"));
}

#[test]
fn test_invalid_input_is_rejected_before_connecting() {
    let mut session = Session::spawn();
    session.initialize();

    let response = session.request(
        2,
        "tools/call",
        json!({
            "name": "export_project_config",
            "arguments": {"project_key": "SALES", "format": "xml"}
        }),
    );
    let payload = tool_payload(&response);
    assert_eq!(payload["status"], "error");
    assert_eq!(payload["message"], "Invalid format. Must be one of: json, yaml");
}

#[test]
fn test_tools_call_invalid_tool() {
    let mut session = Session::spawn();
    session.initialize();

    let response = session.request(2, "tools/call", json!({"name": "nonexistent", "arguments": {}}));
    assert!(response["error"].is_object());
}
