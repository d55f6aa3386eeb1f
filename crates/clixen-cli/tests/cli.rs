use assert_cmd::Command;
use predicates::str::{contains, starts_with};
use tempfile::TempDir;

const VALID_WORKFLOW: &str = r#"{
  "nodes": [
    { "id": "start", "type": "n8n-nodes-base.manualTrigger" },
    { "id": "done", "type": "n8n-nodes-base.noOp" }
  ],
  "connections": [ { "from": "start", "to": "done" } ]
}"#;

const NO_TRIGGER_WORKFLOW: &str = r#"{
  "nodes": [
    { "id": "fetch", "type": "n8n-nodes-base.httpRequest", "parameters": { "url": "https://example.com" } }
  ],
  "connections": []
}"#;

const MISSING_PATH_WORKFLOW: &str = r#"{
  "nodes": [
    { "id": "hook", "type": "n8n-nodes-base.webhook" },
    { "id": "done", "type": "n8n-nodes-base.noOp" }
  ],
  "connections": [ { "from": "hook", "to": "done" } ]
}"#;

/// Command isolated from the user's config, data directory and credentials.
fn clixen(home: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("clixen"));
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("CLIXEN_DIR", home.path().join("data"))
        .env("CLIXEN_DB_PATH", home.path().join("clixen.db"))
        .env("NO_COLOR", "1")
        .env_remove("OPENAI_API_KEY")
        .env_remove("N8N_API_KEY")
        .env_remove("N8N_BASE_URL")
        .env_remove("CLIXEN_OWNER");
    cmd
}

fn write_workflow(home: &TempDir, name: &str, body: &str) -> String {
    let path = home.path().join(name);
    std::fs::write(&path, body).unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    clixen(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Clixen"));
}

#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    clixen(&home).arg("--version").assert().success();
}

#[test]
fn test_cli_completions() {
    let home = TempDir::new().unwrap();
    clixen(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(starts_with("_clixen"));
}

#[test]
fn test_catalog_lists_node_types() {
    let home = TempDir::new().unwrap();
    clixen(&home)
        .arg("catalog")
        .assert()
        .success()
        .stdout(contains("n8n-nodes-base.webhook"));

    clixen(&home)
        .args(["catalog", "n8n-nodes-base.if", "--format", "json"])
        .assert()
        .success()
        .stdout(contains("\"output_ports\": 2"));
}

#[test]
fn test_catalog_unknown_type_fails() {
    let home = TempDir::new().unwrap();
    clixen(&home)
        .args(["catalog", "n8n-nodes-base.doesNotExist"])
        .assert()
        .failure()
        .stderr(contains("Unknown node type"));
}

#[test]
fn test_validate_accepts_valid_workflow() {
    let home = TempDir::new().unwrap();
    let file = write_workflow(&home, "valid.json", VALID_WORKFLOW);
    clixen(&home)
        .args(["validate", &file])
        .assert()
        .success()
        .stdout(contains("No defects found"));
}

#[test]
fn test_validate_reports_blocking_defects() {
    let home = TempDir::new().unwrap();
    let file = write_workflow(&home, "no-trigger.json", NO_TRIGGER_WORKFLOW);
    clixen(&home)
        .args(["validate", &file, "--format", "json"])
        .assert()
        .failure()
        .stdout(contains("NoTrigger"))
        .stderr(contains("blocking defect"));
}

#[test]
fn test_validate_repair_fills_defaults() {
    let home = TempDir::new().unwrap();
    let file = write_workflow(&home, "missing-path.json", MISSING_PATH_WORKFLOW);
    clixen(&home)
        .args(["validate", &file, "--repair"])
        .assert()
        .success()
        .stdout(contains("ready"))
        .stdout(contains("hook.path"));
}

#[test]
fn test_generate_dry_run_is_recorded_in_history() {
    let home = TempDir::new().unwrap();
    clixen(&home)
        .args([
            "generate",
            "Send me a daily report by email every morning",
            "--name",
            "Daily Report",
            "--owner",
            "u1",
            "--source",
            "templates",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(contains("deployed"))
        .stdout(contains("u1__Daily Report"));

    clixen(&home)
        .args(["history", "list", "--owner", "u1", "--format", "json"])
        .assert()
        .success()
        .stdout(contains("\"state\": \"deployed\""))
        .stdout(contains("Daily Report"));

    clixen(&home)
        .args(["history", "list", "--owner", "u2", "--format", "json"])
        .assert()
        .success()
        .stdout(contains("[]"));
}

#[test]
fn test_generate_without_engine_url_fails() {
    let home = TempDir::new().unwrap();
    clixen(&home)
        .args(["generate", "daily report", "--source", "templates"])
        .assert()
        .failure()
        .stderr(contains("engine URL not configured"));
}
