//! Mock collaborators for tests: a recording instance handle with scripted
//! statuses, exec results, and injectable transfer failures.

use std::collections::VecDeque;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{DeployError, Result};
use crate::instance::{ExecOutput, InstanceHandle, InstanceStatus, TransferSession};

/// Shared recording state behind a [`MockInstance`] and its sessions.
#[derive(Default)]
pub struct MockShared {
    /// Scripted status sequence; the last entry repeats once exhausted.
    pub statuses: Mutex<VecDeque<InstanceStatus>>,
    pub status_calls: AtomicUsize,
    pub resume_calls: AtomicUsize,
    /// Scripted exec outputs, consumed in order; default is exit 0.
    pub exec_results: Mutex<VecDeque<ExecOutput>>,
    pub exec_log: Mutex<Vec<String>>,
    pub sessions_opened: AtomicUsize,
    /// Sessions whose first upload should fail, counted down per session.
    pub upload_failures: AtomicUsize,
    pub fail_mkdir: std::sync::atomic::AtomicBool,
    pub mkdirs: Mutex<Vec<String>>,
    pub uploaded: Mutex<Vec<String>>,
    pub exposed: Mutex<Vec<(String, u16)>>,
    pub ttl_calls: Mutex<Vec<u64>>,
    /// When set, `expose_http_service` returns this URL (e.g. a wiremock
    /// server) instead of a synthetic one.
    pub expose_url: Mutex<Option<String>>,
}

impl MockShared {
    /// Total remote interactions of any kind — used to assert that pre-flight
    /// failures never touch the instance.
    pub fn total_remote_calls(&self) -> usize {
        self.status_calls.load(Ordering::Relaxed)
            + self.resume_calls.load(Ordering::Relaxed)
            + self.exec_log.lock().unwrap().len()
            + self.sessions_opened.load(Ordering::Relaxed)
            + self.exposed.lock().unwrap().len()
            + self.ttl_calls.lock().unwrap().len()
    }
}

pub struct MockInstance {
    id: String,
    shared: Arc<MockShared>,
}

impl Deref for MockInstance {
    type Target = MockShared;

    fn deref(&self) -> &MockShared {
        &self.shared
    }
}

impl Default for MockInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInstance {
    pub fn new() -> Self {
        let instance = Self {
            id: "mock-instance".to_string(),
            shared: Arc::new(MockShared::default()),
        };
        instance
            .shared
            .statuses
            .lock()
            .unwrap()
            .push_back(InstanceStatus::Running);
        instance
    }

    pub fn with_statuses(self, statuses: &[InstanceStatus]) -> Self {
        *self.shared.statuses.lock().unwrap() = statuses.iter().copied().collect();
        self
    }

    pub fn with_exec_results(self, results: Vec<ExecOutput>) -> Self {
        *self.shared.exec_results.lock().unwrap() = results.into();
        self
    }

    /// Make the first upload of the next `n` sessions fail.
    pub fn with_upload_failures(self, n: usize) -> Self {
        self.shared.upload_failures.store(n, Ordering::Relaxed);
        self
    }

    pub fn with_mkdir_errors(self) -> Self {
        self.shared.fail_mkdir.store(true, Ordering::Relaxed);
        self
    }

    pub fn with_expose_url(self, url: &str) -> Self {
        *self.shared.expose_url.lock().unwrap() = Some(url.to_string());
        self
    }
}

#[async_trait]
impl InstanceHandle for MockInstance {
    fn id(&self) -> &str {
        &self.id
    }

    async fn status(&self) -> Result<InstanceStatus> {
        self.status_calls.fetch_add(1, Ordering::Relaxed);
        let mut statuses = self.statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.pop_front().unwrap()
        } else {
            *statuses.front().unwrap_or(&InstanceStatus::Unknown)
        };
        Ok(status)
    }

    async fn resume(&self) -> Result<()> {
        self.resume_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn exec(&self, command: &str) -> Result<ExecOutput> {
        self.exec_log.lock().unwrap().push(command.to_string());
        let scripted = self.exec_results.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_default())
    }

    async fn upload_session(&self) -> Result<Box<dyn TransferSession>> {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
        let fail_first_upload = self
            .upload_failures
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        Ok(Box::new(MockSession {
            shared: Arc::clone(&self.shared),
            fail_first_upload,
        }))
    }

    async fn expose_http_service(&self, name: &str, port: u16) -> Result<String> {
        self.exposed.lock().unwrap().push((name.to_string(), port));
        let url = self
            .expose_url
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| format!("http://{name}.tools.test"));
        Ok(url)
    }

    async fn set_wake_ttl(&self, seconds: u64) -> Result<()> {
        self.ttl_calls.lock().unwrap().push(seconds);
        Ok(())
    }
}

struct MockSession {
    shared: Arc<MockShared>,
    fail_first_upload: bool,
}

#[async_trait]
impl TransferSession for MockSession {
    async fn mkdir(&mut self, remote: &str) -> Result<()> {
        self.shared.mkdirs.lock().unwrap().push(remote.to_string());
        if self.shared.fail_mkdir.load(Ordering::Relaxed) {
            return Err(DeployError::Instance("directory exists".into()));
        }
        Ok(())
    }

    async fn upload_file(&mut self, _local: &Path, remote: &str) -> Result<()> {
        if self.fail_first_upload {
            self.fail_first_upload = false;
            return Err(DeployError::Instance("injected upload failure".into()));
        }
        self.shared.uploaded.lock().unwrap().push(remote.to_string());
        Ok(())
    }
}
