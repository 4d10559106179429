use std::env;
use std::time::Duration;

use once_cell::sync::OnceCell;

/// Runtime configuration loaded once at startup from environment variables.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Base URL of the cloud provider API consumed by `HttpInstanceHandle`.
    pub provider_api_url: String,
    /// Bearer token for the provider API.
    pub provider_api_key: String,
    /// Remote directory that receives uploaded tool trees.
    pub remote_app_root: String,
    pub request_timeout: Duration,
    /// Interval between instance status polls while resuming.
    pub resume_poll_interval: Duration,
    /// Base unit for the transfer engine's linear backoff.
    pub transfer_retry_delay: Duration,
    /// Grace period before the post-launch schema probe.
    pub probe_settle: Duration,
    /// Per-request timeout on the schema probe.
    pub probe_timeout: Duration,
    /// Idle-pause window reset on the instance after a successful deploy.
    pub wake_ttl_secs: u64,
}

static RUNTIME_CONFIG: OnceCell<RuntimeConfig> = OnceCell::new();

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    /// Cached after the first call — subsequent calls return the same config.
    pub fn load() -> &'static RuntimeConfig {
        RUNTIME_CONFIG.get_or_init(|| {
            let provider_api_url = env::var("TOOLFORGE_PROVIDER_URL")
                .unwrap_or_else(|_| "https://cloud.morph.so/api".to_string());
            let provider_api_key = env::var("TOOLFORGE_PROVIDER_KEY").unwrap_or_default();
            let remote_app_root =
                env::var("TOOLFORGE_REMOTE_ROOT").unwrap_or_else(|_| "/app".to_string());

            RuntimeConfig {
                provider_api_url,
                provider_api_key,
                remote_app_root,
                request_timeout: Duration::from_secs(env_u64(
                    "TOOLFORGE_REQUEST_TIMEOUT_SECS",
                    crate::DEFAULT_TIMEOUT_SECS,
                )),
                resume_poll_interval: Duration::from_secs(env_u64(
                    "TOOLFORGE_RESUME_POLL_SECS",
                    1,
                )),
                transfer_retry_delay: Duration::from_millis(env_u64(
                    "TOOLFORGE_TRANSFER_RETRY_DELAY_MS",
                    1000,
                )),
                probe_settle: Duration::from_secs(env_u64("TOOLFORGE_PROBE_SETTLE_SECS", 3)),
                probe_timeout: Duration::from_secs(env_u64("TOOLFORGE_PROBE_TIMEOUT_SECS", 5)),
                wake_ttl_secs: env_u64("TOOLFORGE_WAKE_TTL_SECS", crate::WAKE_TTL_SECS),
            }
        })
    }
}
