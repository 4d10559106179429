//! Instance resume coordination: bring a suspended instance back to ready.
//!
//! Resuming takes an instance out of a billable-pause state — callers must
//! treat it as having real-world cost and must not call it speculatively.

use std::time::Duration;

use tracing::{info, warn};

use crate::RESUME_MAX_POLLS;
use crate::error::{DeployError, Result};
use crate::instance::InstanceHandle;

/// If the instance is suspended, issue a resume and poll its status once per
/// `poll_interval` until it is ready, for at most [`RESUME_MAX_POLLS`] polls.
/// A no-op when the instance is already running.
pub async fn wait_until_ready(
    handle: &dyn InstanceHandle,
    poll_interval: Duration,
) -> Result<()> {
    let mut last = handle.status().await?;
    if last.is_ready() {
        return Ok(());
    }

    if last.is_resumable() {
        info!("resuming instance {} (status: {last})", handle.id());
        handle.resume().await?;
    } else {
        warn!(
            "instance {} in status {last}, waiting without issuing resume",
            handle.id()
        );
    }

    for _ in 1..RESUME_MAX_POLLS {
        tokio::time::sleep(poll_interval).await;
        last = handle.status().await?;
        if last.is_ready() {
            info!("instance {} ready", handle.id());
            return Ok(());
        }
    }

    Err(DeployError::ResumeTimeout(last))
}
