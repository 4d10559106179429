//! The deployment orchestrator: one linear state machine from uploaded
//! archive to registered, internet-reachable tool.
//!
//! Failure semantics (they differ by phase):
//! - anything before `Building` aborts the pipeline and propagates a hard
//!   error after best-effort scratch cleanup;
//! - a non-zero exit from `docker build` or `docker run` is a *soft* failure:
//!   a normal [`DeployResult`] with `status: Failed` and the captured output,
//!   so callers can show the user their own build log;
//! - the schema probe never fails the pipeline.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::archive;
use crate::config::RuntimeConfig;
use crate::error::Result;
use crate::instance::InstanceHandle;
use crate::manifest;
use crate::port;
use crate::probe;
use crate::progress::{self, DeployPhase};
use crate::registry;
use crate::resume;
use crate::transfer;
use crate::util::{container_identity, shell_escape};

/// One deployment intake: the uploaded archive, who owns it, and optional
/// environment overrides for the workload.
#[derive(Clone, Debug)]
pub struct DeployRequest {
    pub archive: Vec<u8>,
    pub owner: String,
    pub env: HashMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    Deployed,
    Failed,
}

/// Terminal outcome of one deployment attempt. Immutable once returned.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResult {
    pub container_id: String,
    pub url: String,
    pub port: u16,
    pub build_output: String,
    pub status: DeployStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
}

impl DeployResult {
    fn soft_failure(container_id: &str, port: u16, build_output: String) -> Self {
        Self {
            container_id: container_id.to_string(),
            url: String::new(),
            port,
            build_output,
            status: DeployStatus::Failed,
            tool_id: None,
        }
    }
}

fn env_flags(env: &HashMap<String, String>) -> String {
    let mut keys: Vec<_> = env.keys().collect();
    keys.sort();
    keys.iter()
        .map(|key| format!(" -e {}", shell_escape(&format!("{key}={}", env[*key]))))
        .collect()
}

/// Deploy an uploaded archive onto the instance, tracking progress under a
/// fresh deploy id. Scratch space is cleaned on every exit path.
pub async fn deploy(handle: &dyn InstanceHandle, request: DeployRequest) -> Result<DeployResult> {
    let deploy_id = uuid::Uuid::new_v4().to_string();
    progress::start_deploy(&deploy_id);
    deploy_tracked(&deploy_id, handle, request).await
}

/// Deploy under a caller-supplied deploy id (already registered with the
/// progress tracker).
pub async fn deploy_tracked(
    deploy_id: &str,
    handle: &dyn InstanceHandle,
    request: DeployRequest,
) -> Result<DeployResult> {
    let staged = match archive::stage_archive(deploy_id, &request.archive).await {
        Ok(path) => path,
        Err(err) => {
            progress::update_deploy(deploy_id, DeployPhase::Failed, Some(err.to_string()));
            archive::cleanup(deploy_id).await;
            return Err(err);
        }
    };

    let result = deploy_staged(deploy_id, handle, &staged, &request.owner, &request.env).await;

    progress::update_deploy(deploy_id, DeployPhase::CleaningUp, None);
    archive::cleanup(deploy_id).await;

    match &result {
        Ok(outcome) if outcome.status == DeployStatus::Deployed => {
            progress::update_deploy(deploy_id, DeployPhase::Deployed, None);
        }
        Ok(outcome) => {
            progress::update_deploy(
                deploy_id,
                DeployPhase::Failed,
                Some(outcome.build_output.clone()),
            );
        }
        Err(err) => {
            error!("deploy {deploy_id} aborted: {err}");
            progress::update_deploy(deploy_id, DeployPhase::Failed, Some(err.to_string()));
        }
    }

    result
}

/// The pipeline proper, from an already-staged tree. Does not clean scratch
/// space — [`deploy_tracked`] owns that.
pub async fn deploy_staged(
    deploy_id: &str,
    handle: &dyn InstanceHandle,
    staged: &Path,
    owner: &str,
    env: &HashMap<String, String>,
) -> Result<DeployResult> {
    let config = RuntimeConfig::load();
    let container_id = container_identity(owner);

    // Pre-flight: everything parseable locally, before any remote call.
    progress::update_deploy(deploy_id, DeployPhase::ParsingMetadata, None);
    let expose_port = manifest::parse_expose_port(staged)?;
    let meta = manifest::parse_tool_meta(staged);
    let static_price = manifest::parse_static_price(staged);

    progress::update_deploy(deploy_id, DeployPhase::Resuming, None);
    resume::wait_until_ready(handle, config.resume_poll_interval).await?;

    progress::update_deploy(deploy_id, DeployPhase::Transferring, None);
    let remote_path = format!("{}/{container_id}", config.remote_app_root);
    transfer::transfer_dir(handle, staged, &remote_path, config.transfer_retry_delay).await?;

    // Hold the allocation lock from port selection through `docker run` so
    // concurrent deployments to this instance cannot bind the same port.
    progress::update_deploy(deploy_id, DeployPhase::AllocatingPort, None);
    let allocation = port::allocation_lock(handle.id()).await;
    let host_port = port::next_host_port(handle).await?;

    progress::update_deploy(deploy_id, DeployPhase::Building, None);
    let build = handle
        .exec(&format!(
            "cd {remote_path} && docker build -t {container_id} ."
        ))
        .await?;
    if !build.success() {
        info!("deploy {deploy_id}: build failed with exit {}", build.exit_code);
        let output = if !build.stderr.is_empty() {
            build.stderr
        } else if !build.stdout.is_empty() {
            build.stdout
        } else {
            "Build failed".to_string()
        };
        return Ok(DeployResult::soft_failure(&container_id, 0, output));
    }

    progress::update_deploy(deploy_id, DeployPhase::Running, None);
    let run = handle
        .exec(&format!(
            "docker run -d -p {host_port}:{expose_port}{} --name {container_id} {container_id}",
            env_flags(env)
        ))
        .await?;
    drop(allocation);
    if !run.success() {
        info!("deploy {deploy_id}: run failed with exit {}", run.exit_code);
        return Ok(DeployResult::soft_failure(
            &container_id,
            host_port,
            format!("Build OK. Run failed: {}", run.stderr),
        ));
    }

    progress::update_deploy(deploy_id, DeployPhase::Exposing, None);
    let url = handle.expose_http_service(&container_id, host_port).await?;

    progress::update_deploy(deploy_id, DeployPhase::ProbingSchema, None);
    let schema = probe::probe_schema(&url, config.probe_settle, config.probe_timeout).await;

    progress::update_deploy(deploy_id, DeployPhase::PersistingRecord, None);
    let record =
        registry::create_tool_record(owner, &meta, &url, static_price, schema.as_ref())?;

    // Keep the instance awake long enough for the tool's first callers.
    handle.set_wake_ttl(config.wake_ttl_secs).await?;

    info!(
        "deploy {deploy_id}: {container_id} live at {url} (tool {})",
        record.id
    );

    Ok(DeployResult {
        container_id,
        url,
        port: host_port,
        build_output: if build.stdout.is_empty() {
            "Build successful".to_string()
        } else {
            build.stdout
        },
        status: DeployStatus::Deployed,
        tool_id: Some(record.id),
    })
}
