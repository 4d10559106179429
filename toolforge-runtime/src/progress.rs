//! In-memory deployment progress tracking.
//!
//! Deployments run off the request-handling task; the API exposes this map so
//! frontends can poll a long deploy instead of waiting for the full pipeline.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::util::now_ts;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployPhase {
    Extracting,
    ParsingMetadata,
    Resuming,
    Transferring,
    AllocatingPort,
    Building,
    Running,
    Exposing,
    ProbingSchema,
    PersistingRecord,
    CleaningUp,
    Deployed,
    Failed,
}

impl DeployPhase {
    /// Progress percentage (0–100) for UI rendering.
    pub fn progress_pct(self) -> u8 {
        match self {
            Self::Extracting => 5,
            Self::ParsingMetadata => 10,
            Self::Resuming => 20,
            Self::Transferring => 35,
            Self::AllocatingPort => 45,
            Self::Building => 60,
            Self::Running => 75,
            Self::Exposing => 85,
            Self::ProbingSchema => 90,
            Self::PersistingRecord => 95,
            Self::CleaningUp => 98,
            Self::Deployed => 100,
            Self::Failed => 0,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Deployed | Self::Failed)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeployProgress {
    pub deploy_id: String,
    pub phase: DeployPhase,
    pub message: Option<String>,
    pub started_at: u64,
    pub updated_at: u64,
    pub progress_pct: u8,
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

static DEPLOYS: Lazy<Mutex<HashMap<String, DeployProgress>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Begin tracking a new deployment.
pub fn start_deploy(deploy_id: &str) -> DeployProgress {
    let now = now_ts();
    let progress = DeployProgress {
        deploy_id: deploy_id.to_string(),
        phase: DeployPhase::Extracting,
        message: Some("Staging archive".into()),
        started_at: now,
        updated_at: now,
        progress_pct: DeployPhase::Extracting.progress_pct(),
    };
    DEPLOYS
        .lock()
        .unwrap()
        .insert(deploy_id.to_string(), progress.clone());
    progress
}

/// Advance the phase for a deployment. Returns the updated progress.
pub fn update_deploy(
    deploy_id: &str,
    phase: DeployPhase,
    message: Option<String>,
) -> Option<DeployProgress> {
    let mut map = DEPLOYS.lock().unwrap();
    let entry = map.get_mut(deploy_id)?;
    entry.phase = phase;
    entry.progress_pct = phase.progress_pct();
    entry.updated_at = now_ts();
    if let Some(msg) = message {
        entry.message = Some(msg);
    }
    Some(entry.clone())
}

pub fn get_deploy(deploy_id: &str) -> Option<DeployProgress> {
    DEPLOYS.lock().unwrap().get(deploy_id).cloned()
}

/// List all in-flight (non-terminal) deployments.
pub fn list_active_deploys() -> Vec<DeployProgress> {
    DEPLOYS
        .lock()
        .unwrap()
        .values()
        .filter(|p| !p.phase.is_terminal())
        .cloned()
        .collect()
}

/// Remove terminal entries older than `max_age_secs`.
pub fn gc_deploys(max_age_secs: u64) {
    let cutoff = now_ts().saturating_sub(max_age_secs);
    DEPLOYS
        .lock()
        .unwrap()
        .retain(|_, p| !p.phase.is_terminal() || p.updated_at > cutoff);
}
