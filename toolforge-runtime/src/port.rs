//! Host port allocation on a shared instance.
//!
//! Allocation is observe-then-use: the allocator lists ports bound by running
//! workloads and probes upward from a fixed floor. The window between
//! observation and `docker run` is guarded by a per-instance async lock —
//! callers hold [`allocation_lock`] from allocation until the workload is
//! bound.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::PORT_FLOOR;
use crate::error::Result;
use crate::instance::InstanceHandle;

/// Lists host ports currently bound by running containers, one per line.
const LIST_PORTS_CMD: &str = "docker ps --format '{{.Ports}}' | grep -oE '0\\.0\\.0\\.0:[0-9]+' | cut -d: -f2 | sort -n";

static PORT_LOCKS: Lazy<DashMap<String, Arc<Mutex<()>>>> = Lazy::new(DashMap::new);

/// Serialize port allocation (and the bind that follows) per instance.
pub async fn allocation_lock(instance_id: &str) -> OwnedMutexGuard<()> {
    let lock = PORT_LOCKS
        .entry(instance_id.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    lock.lock_owned().await
}

fn parse_used_ports(stdout: &str) -> HashSet<u16> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<u16>().ok())
        .collect()
}

/// First port at or above `floor` that is not in `used`.
pub fn first_free_port(used: &HashSet<u16>, floor: u16) -> u16 {
    let mut port = floor;
    while used.contains(&port) {
        port += 1;
    }
    port
}

/// Pick the next unused host port on the instance. Advisory — hold
/// [`allocation_lock`] across this call and the subsequent bind.
pub async fn next_host_port(handle: &dyn InstanceHandle) -> Result<u16> {
    let output = handle.exec(LIST_PORTS_CMD).await?;
    let used = parse_used_ports(&output.stdout);
    Ok(first_free_port(&used, PORT_FLOOR))
}
