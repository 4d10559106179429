//! Deployment orchestrator for user-submitted tool packages.
//!
//! Turns an uploaded archive into a running, internet-reachable container on a
//! possibly-suspended remote instance: stage the archive, parse its manifest,
//! resume the instance, transfer the tree, allocate a host port, build and run
//! the workload, expose it over HTTP, probe its self-described schema, and
//! register the resulting tool.

pub mod api;
pub mod archive;
pub mod config;
pub mod deploy;
pub mod error;
pub mod http;
pub mod instance;
pub mod manifest;
pub mod port;
pub mod probe;
pub mod progress;
pub mod registry;
pub mod resume;
pub mod store;
pub mod transfer;
pub mod util;

#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;

pub use deploy::{DeployRequest, DeployResult, DeployStatus};
pub use error::DeployError;
pub use instance::{ExecOutput, InstanceHandle, InstanceStatus, TransferSession};
pub use registry::ToolRecord;

/// First host port considered for workload publication.
pub const PORT_FLOOR: u16 = 1000;
/// Whole-tree upload attempts before giving up.
pub const TRANSFER_MAX_ATTEMPTS: u32 = 3;
/// Status polls after issuing a resume before timing out.
pub const RESUME_MAX_POLLS: u32 = 60;
/// Idle-pause countdown applied to the instance after a successful deploy.
pub const WAKE_TTL_SECS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
