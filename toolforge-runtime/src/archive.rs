//! Archive staging: extract an uploaded zip to a scratch directory.

use std::path::PathBuf;

use tokio::process::Command;
use tracing::warn;

use crate::error::{DeployError, Result};
use crate::store::state_dir;

fn scratch_root() -> PathBuf {
    state_dir().join("staging")
}

pub fn staged_path(id: &str) -> PathBuf {
    scratch_root().join(id)
}

/// Write the uploaded zip to scratch space and extract it. Returns the
/// extraction directory. The zip itself is removed whether or not extraction
/// succeeds.
pub async fn stage_archive(id: &str, zip_bytes: &[u8]) -> Result<PathBuf> {
    let extract_path = staged_path(id);
    tokio::fs::create_dir_all(&extract_path)
        .await
        .map_err(|err| DeployError::Archive(format!("create scratch dir: {err}")))?;

    let zip_path = scratch_root().join(format!("{id}.zip"));
    tokio::fs::write(&zip_path, zip_bytes)
        .await
        .map_err(|err| DeployError::Archive(format!("write archive: {err}")))?;

    let output = Command::new("unzip")
        .arg("-o")
        .arg("-d")
        .arg(&extract_path)
        .arg(&zip_path)
        .output()
        .await
        .map_err(|err| DeployError::Archive(format!("spawn unzip: {err}")))?;

    let _ = tokio::fs::remove_file(&zip_path).await;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DeployError::Archive(format!(
            "Failed to extract zip: {stderr}"
        )));
    }

    Ok(extract_path)
}

/// Remove a staged tree. Never propagates an error — cleanup runs on every
/// deployment exit path.
pub async fn cleanup(id: &str) {
    let path = staged_path(id);
    if let Err(err) = tokio::fs::remove_dir_all(&path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!("failed to clean staged archive {id}: {err}");
        }
    }
}
