//! The remote instance contract consumed by the orchestrator.
//!
//! An instance is a remote compute unit owned by the cloud provider: it can be
//! paused and resumed, runs multiple workloads, executes shell commands, and
//! accepts file uploads. The orchestrator only sees these traits;
//! [`HttpInstanceHandle`] is the production implementation speaking the
//! provider's REST API.

use std::path::Path;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{DeployError, Result};
use crate::http::{provider_get_json, provider_post_json};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Running,
    Paused,
    Pausing,
    Stopped,
    Unknown,
}

impl InstanceStatus {
    pub fn is_ready(self) -> bool {
        matches!(self, InstanceStatus::Running)
    }

    /// Whether a resume command is the appropriate way out of this state.
    pub fn is_resumable(self) -> bool {
        matches!(
            self,
            InstanceStatus::Paused | InstanceStatus::Pausing | InstanceStatus::Stopped
        )
    }

    pub fn parse(raw: &str) -> InstanceStatus {
        match raw.to_ascii_lowercase().as_str() {
            "running" | "ready" => InstanceStatus::Running,
            "paused" => InstanceStatus::Paused,
            "pausing" => InstanceStatus::Pausing,
            "stopped" => InstanceStatus::Stopped,
            _ => InstanceStatus::Unknown,
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InstanceStatus::Running => "running",
            InstanceStatus::Paused => "paused",
            InstanceStatus::Pausing => "pausing",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Captured output of one remote command.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i64,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One upload session against an instance. Not reentrant — one logical
/// transfer per deployment attempt.
#[async_trait]
pub trait TransferSession: Send {
    /// Create a single remote directory. May fail if it already exists; the
    /// transfer engine swallows that.
    async fn mkdir(&mut self, remote: &str) -> Result<()>;

    /// Upload one local file to the given remote path, overwriting.
    async fn upload_file(&mut self, local: &Path, remote: &str) -> Result<()>;
}

/// Capability handle for one remote compute instance.
#[async_trait]
pub trait InstanceHandle: Send + Sync {
    fn id(&self) -> &str;

    async fn status(&self) -> Result<InstanceStatus>;

    /// Ask the provider to bring the instance back up. Completion is observed
    /// via [`status`](Self::status), not by this call returning.
    async fn resume(&self) -> Result<()>;

    async fn exec(&self, command: &str) -> Result<ExecOutput>;

    async fn upload_session(&self) -> Result<Box<dyn TransferSession>>;

    /// Publish a host port as an internet-reachable HTTP service, returning
    /// its public URL.
    async fn expose_http_service(&self, name: &str, port: u16) -> Result<String>;

    /// Reset the instance's idle-pause countdown.
    async fn set_wake_ttl(&self, seconds: u64) -> Result<()>;
}

// ─── Provider-backed implementation ──────────────────────────────────────────

/// [`InstanceHandle`] speaking a Morph-style provider REST API.
#[derive(Clone, Debug)]
pub struct HttpInstanceHandle {
    base_url: String,
    api_key: String,
    instance_id: String,
}

impl HttpInstanceHandle {
    pub fn new(base_url: &str, api_key: &str, instance_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            instance_id: instance_id.to_string(),
        }
    }

    fn path(&self, suffix: &str) -> String {
        format!("/instance/{}{suffix}", self.instance_id)
    }
}

#[async_trait]
impl InstanceHandle for HttpInstanceHandle {
    fn id(&self) -> &str {
        &self.instance_id
    }

    async fn status(&self) -> Result<InstanceStatus> {
        let body = provider_get_json(&self.base_url, &self.path(""), &self.api_key).await?;
        let raw = body
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| DeployError::Instance("Missing instance status".into()))?;
        Ok(InstanceStatus::parse(raw))
    }

    async fn resume(&self) -> Result<()> {
        provider_post_json(&self.base_url, &self.path("/resume"), &self.api_key, json!({}))
            .await?;
        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<ExecOutput> {
        let body = provider_post_json(
            &self.base_url,
            &self.path("/exec"),
            &self.api_key,
            json!({ "command": command }),
        )
        .await?;
        serde_json::from_value(body)
            .map_err(|err| DeployError::Instance(format!("Invalid exec response: {err}")))
    }

    async fn upload_session(&self) -> Result<Box<dyn TransferSession>> {
        Ok(Box::new(HttpTransferSession {
            handle: self.clone(),
        }))
    }

    async fn expose_http_service(&self, name: &str, port: u16) -> Result<String> {
        let body = provider_post_json(
            &self.base_url,
            &self.path("/http-services"),
            &self.api_key,
            json!({ "name": name, "port": port }),
        )
        .await?;
        body.get("url")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| DeployError::Instance("Provider returned no service URL".into()))
    }

    async fn set_wake_ttl(&self, seconds: u64) -> Result<()> {
        provider_post_json(
            &self.base_url,
            &self.path("/ttl"),
            &self.api_key,
            json!({ "ttl_seconds": seconds, "ttl_action": "pause" }),
        )
        .await?;
        Ok(())
    }
}

struct HttpTransferSession {
    handle: HttpInstanceHandle,
}

#[async_trait]
impl TransferSession for HttpTransferSession {
    async fn mkdir(&mut self, remote: &str) -> Result<()> {
        provider_post_json(
            &self.handle.base_url,
            &self.handle.path("/files/mkdir"),
            &self.handle.api_key,
            json!({ "path": remote }),
        )
        .await?;
        Ok(())
    }

    async fn upload_file(&mut self, local: &Path, remote: &str) -> Result<()> {
        let content = tokio::fs::read(local)
            .await
            .map_err(|err| DeployError::Archive(format!("read {}: {err}", local.display())))?;
        provider_post_json(
            &self.handle.base_url,
            &self.handle.path("/files"),
            &self.handle.api_key,
            json!({ "path": remote, "content_b64": BASE64.encode(content) }),
        )
        .await?;
        Ok(())
    }
}
