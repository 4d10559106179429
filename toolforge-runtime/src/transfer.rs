//! Directory transfer engine: whole-tree upload with bounded retry.
//!
//! A failed attempt is not rolled back — the next attempt re-uploads
//! everything, so the remote target must tolerate overwritten files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::TRANSFER_MAX_ATTEMPTS;
use crate::error::{DeployError, Result};
use crate::instance::{InstanceHandle, TransferSession};

#[derive(Clone, Debug, PartialEq, Eq)]
enum TransferOp {
    Mkdir(String),
    Upload(PathBuf, String),
}

/// Delay inserted before retrying after the given failed attempt (1-based):
/// linear backoff, `attempt × base`.
fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base * attempt
}

fn plan_dir(local: &Path, remote: &str, ops: &mut Vec<TransferOp>) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(local)
        .map_err(|err| DeployError::Archive(format!("read {}: {err}", local.display())))?
        .collect::<std::io::Result<_>>()
        .map_err(|err| DeployError::Archive(format!("read {}: {err}", local.display())))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        let remote_path = format!("{remote}/{name}");
        let file_type = entry
            .file_type()
            .map_err(|err| DeployError::Archive(format!("stat {name}: {err}")))?;
        if file_type.is_dir() {
            ops.push(TransferOp::Mkdir(remote_path.clone()));
            plan_dir(&entry.path(), &remote_path, ops)?;
        } else {
            ops.push(TransferOp::Upload(entry.path(), remote_path));
        }
    }
    Ok(())
}

/// Flatten the local tree into an ordered op list. Directory creation always
/// precedes the uploads beneath it.
fn plan_transfer(local: &Path, remote: &str) -> Result<Vec<TransferOp>> {
    let mut ops = vec![TransferOp::Mkdir(remote.to_string())];
    plan_dir(local, remote, &mut ops)?;
    Ok(ops)
}

/// Create each path component of `remote`, swallowing "already exists".
async fn ensure_remote_dir(session: &mut dyn TransferSession, remote: &str) {
    let mut current = String::new();
    for part in remote.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);
        let _ = session.mkdir(&current).await;
    }
}

async fn run_attempt(handle: &dyn InstanceHandle, ops: &[TransferOp]) -> Result<()> {
    let mut session = handle.upload_session().await?;
    for op in ops {
        match op {
            TransferOp::Mkdir(remote) => ensure_remote_dir(session.as_mut(), remote).await,
            TransferOp::Upload(local, remote) => {
                session.upload_file(local, remote).await?;
            }
        }
    }
    Ok(())
}

/// Upload `local_dir` to `remote_dir` on the instance, retrying the whole
/// tree up to [`TRANSFER_MAX_ATTEMPTS`] times with linearly increasing
/// backoff. Fails with [`DeployError::TransferExhausted`] carrying the last
/// underlying error.
pub async fn transfer_dir(
    handle: &dyn InstanceHandle,
    local_dir: &Path,
    remote_dir: &str,
    base_delay: Duration,
) -> Result<()> {
    let ops = plan_transfer(local_dir, remote_dir)?;
    let files = ops
        .iter()
        .filter(|op| matches!(op, TransferOp::Upload(..)))
        .count();

    let mut last_err: Option<DeployError> = None;
    for attempt in 1..=TRANSFER_MAX_ATTEMPTS {
        match run_attempt(handle, &ops).await {
            Ok(()) => {
                info!(
                    "transferred {files} files to {remote_dir} (attempt {attempt}/{TRANSFER_MAX_ATTEMPTS})"
                );
                return Ok(());
            }
            Err(err) => {
                warn!("transfer attempt {attempt}/{TRANSFER_MAX_ATTEMPTS} failed: {err}");
                last_err = Some(err);
                if attempt < TRANSFER_MAX_ATTEMPTS {
                    tokio::time::sleep(backoff_delay(attempt, base_delay)).await;
                }
            }
        }
    }

    let last = last_err.map(|e| e.to_string()).unwrap_or_default();
    Err(DeployError::TransferExhausted(last))
}
