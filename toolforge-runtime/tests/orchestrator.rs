//! End-to-end orchestrator tests against a scripted mock instance.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Once;

use serial_test::serial;
use toolforge_runtime::deploy::{self, DeployStatus};
use toolforge_runtime::error::DeployError;
use toolforge_runtime::instance::ExecOutput;
use toolforge_runtime::registry;
use toolforge_runtime::testkit::MockInstance;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let state_dir = std::env::temp_dir().join(format!("toolforge-itest-{}", std::process::id()));
        unsafe {
            std::env::set_var("TOOLFORGE_STATE_DIR", &state_dir);
            std::env::set_var("TOOLFORGE_PROBE_SETTLE_SECS", "0");
            std::env::set_var("TOOLFORGE_PROBE_TIMEOUT_SECS", "1");
            std::env::set_var("TOOLFORGE_TRANSFER_RETRY_DELAY_MS", "1");
        }
    });
}

fn staged(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (rel, content) in files {
        let file = dir.path().join(rel);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(file, content).unwrap();
    }
    dir
}

fn exec_ok(stdout: &str) -> ExecOutput {
    ExecOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

fn exec_fail(stdout: &str, stderr: &str) -> ExecOutput {
    ExecOutput {
        exit_code: 1,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

async fn run_deploy(
    instance: &MockInstance,
    tree: &Path,
    owner: &str,
) -> toolforge_runtime::error::Result<deploy::DeployResult> {
    deploy::deploy_staged("test-deploy", instance, tree, owner, &HashMap::new()).await
}

#[tokio::test]
#[serial]
async fn missing_expose_aborts_before_any_remote_call() {
    init();
    let tree = staged(&[("Dockerfile", "FROM node:20\nRUN echo no expose here\n")]);
    let instance = MockInstance::new();

    let err = run_deploy(&instance, tree.path(), "alice").await.unwrap_err();
    assert!(matches!(err, DeployError::Validation(_)));
    assert_eq!(instance.total_remote_calls(), 0);
}

#[tokio::test]
#[serial]
async fn build_failure_is_a_soft_result_with_captured_output() {
    init();
    let tree = staged(&[("Dockerfile", "FROM node:20\nEXPOSE 3000\n")]);
    let instance = MockInstance::new().with_exec_results(vec![
        exec_ok("1000\n"),
        exec_fail("step 3/7", "npm ERR! missing script: build"),
    ]);

    let result = run_deploy(&instance, tree.path(), "alice").await.unwrap();
    assert_eq!(result.status, DeployStatus::Failed);
    assert_eq!(result.port, 0);
    assert_eq!(result.build_output, "npm ERR! missing script: build");
    assert!(result.tool_id.is_none());

    // Nothing after the build ran.
    assert!(instance.exposed.lock().unwrap().is_empty());
    assert!(instance.ttl_calls.lock().unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn run_failure_reports_the_allocated_port() {
    init();
    let tree = staged(&[("Dockerfile", "FROM node:20\nEXPOSE 3000\n")]);
    let instance = MockInstance::new().with_exec_results(vec![
        exec_ok("1000\n1001\n1003\n"),
        exec_ok("built"),
        exec_fail("", "driver failed programming external connectivity"),
    ]);

    let result = run_deploy(&instance, tree.path(), "alice").await.unwrap();
    assert_eq!(result.status, DeployStatus::Failed);
    assert_eq!(result.port, 1002);
    assert!(
        result
            .build_output
            .starts_with("Build OK. Run failed: driver failed")
    );
    assert!(result.tool_id.is_none());
    assert!(instance.exposed.lock().unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn successful_deploy_registers_tool_with_probed_price() {
    init();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/schema"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "price": 0.5,
            "inputSchema": { "type": "object" },
            "outputSchema": { "type": "string" }
        })))
        .mount(&server)
        .await;

    let tree = staged(&[
        ("Dockerfile", "FROM node:20\nEXPOSE 3000\n"),
        (
            "package.json",
            r#"{"name": "summarizer", "description": "Summarizes text"}"#,
        ),
        ("src/config.ts", "export const config = { price: 0.02 };"),
    ]);
    let instance = MockInstance::new()
        .with_exec_results(vec![
            exec_ok("1000\n1001\n1003\n"),
            exec_ok("Successfully built abc123"),
            exec_ok("f00dfeed"),
        ])
        .with_expose_url(&server.uri());

    let mut env = HashMap::new();
    env.insert("API_KEY".to_string(), "secret value".to_string());
    let result = deploy::deploy_staged("test-deploy", &instance, tree.path(), "Alice", &env)
        .await
        .unwrap();

    assert_eq!(result.status, DeployStatus::Deployed);
    assert_eq!(result.port, 1002);
    assert_eq!(result.url, server.uri());
    assert_eq!(result.build_output, "Successfully built abc123");
    assert!(result.container_id.starts_with("alice_"));

    // The run command carries the port mapping and escaped env.
    let exec_log = instance.exec_log.lock().unwrap().clone();
    let run_cmd = &exec_log[2];
    assert!(run_cmd.contains("-p 1002:3000"));
    assert!(run_cmd.contains(" -e 'API_KEY=secret value'"));
    assert!(run_cmd.contains(&format!("--name {}", result.container_id)));

    // Registered with the probed price over the static one, TTL reset.
    let tool = registry::get_tool_by_id(result.tool_id.as_ref().unwrap()).unwrap();
    assert_eq!(tool.price, 0.5);
    assert_eq!(tool.name, "summarizer");
    assert_eq!(tool.api_url, server.uri());
    assert!(tool.input_schema.is_some());
    assert_eq!(instance.ttl_calls.lock().unwrap().as_slice(), &[300]);
    assert_eq!(
        instance.exposed.lock().unwrap().as_slice(),
        &[(result.container_id.clone(), 1002)]
    );
}

#[tokio::test]
#[serial]
async fn unprobeable_workload_falls_back_to_static_price() {
    init();
    let tree = staged(&[
        ("Dockerfile", "FROM node:20\nEXPOSE 8080\n"),
        ("src/index.ts", "const price = 0.02;"),
    ]);
    // No expose_url override: the synthetic URL resolves nowhere and the
    // probe falls back silently.
    let instance = MockInstance::new().with_exec_results(vec![
        exec_ok(""),
        exec_ok("ok"),
        exec_ok("deadbeef"),
    ]);

    let result = run_deploy(&instance, tree.path(), "bob").await.unwrap();
    assert_eq!(result.status, DeployStatus::Deployed);
    assert_eq!(result.port, 1000);

    let tool = registry::get_tool_by_id(result.tool_id.as_ref().unwrap()).unwrap();
    assert_eq!(tool.price, 0.02);
    assert_eq!(tool.name, "unnamed-tool");
}

#[tokio::test]
#[serial]
async fn redeploying_the_same_tree_mints_fresh_identities() {
    init();
    let tree = staged(&[("Dockerfile", "FROM node:20\nEXPOSE 3000\n")]);

    let mut seen_containers = Vec::new();
    let mut seen_tools = Vec::new();
    for _ in 0..2 {
        let instance = MockInstance::new().with_exec_results(vec![
            exec_ok(""),
            exec_ok("ok"),
            exec_ok("ok"),
        ]);
        let result = run_deploy(&instance, tree.path(), "carol").await.unwrap();
        assert_eq!(result.status, DeployStatus::Deployed);
        seen_containers.push(result.container_id);
        seen_tools.push(result.tool_id.unwrap());
    }

    assert_ne!(seen_containers[0], seen_containers[1]);
    assert_ne!(seen_tools[0], seen_tools[1]);
}
