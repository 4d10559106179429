use std::fmt;

use crate::instance::InstanceStatus;

/// Errors returned by deployment runtime operations.
///
/// Workload build/run failures are *not* errors — they surface as a
/// [`crate::DeployResult`] with `status: Failed` so callers can tell a crashed
/// pipeline from a container that failed to build.
#[derive(Debug)]
pub enum DeployError {
    /// Invalid input or configuration (missing EXPOSE directive, bad env).
    Validation(String),
    /// Archive staging failure (corrupt zip, unreadable tree).
    Archive(String),
    /// Remote instance / cloud provider failure.
    Instance(String),
    /// Instance never reached a ready state; carries the last observed status.
    ResumeTimeout(InstanceStatus),
    /// All transfer attempts failed; carries the last underlying error.
    TransferExhausted(String),
    /// HTTP request to a collaborator failed.
    Http(String),
    /// Internal storage/state error.
    Storage(String),
    /// Requested resource not found.
    NotFound(String),
}

impl fmt::Display for DeployError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::Validation(msg) => write!(f, "validation error: {msg}"),
            DeployError::Archive(msg) => write!(f, "archive error: {msg}"),
            DeployError::Instance(msg) => write!(f, "instance error: {msg}"),
            DeployError::ResumeTimeout(status) => {
                write!(f, "instance resume timed out (last status: {status})")
            }
            DeployError::TransferExhausted(msg) => {
                write!(f, "transfer failed after {} attempts: {msg}", crate::TRANSFER_MAX_ATTEMPTS)
            }
            DeployError::Http(msg) => write!(f, "http error: {msg}"),
            DeployError::Storage(msg) => write!(f, "storage error: {msg}"),
            DeployError::NotFound(msg) => write!(f, "not found: {msg}"),
        }
    }
}

impl std::error::Error for DeployError {}

/// Convert DeployError to String for API error envelopes.
impl From<DeployError> for String {
    fn from(err: DeployError) -> Self {
        err.to_string()
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
