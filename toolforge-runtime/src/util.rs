use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

pub fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

pub fn shell_escape(value: &str) -> String {
    let escaped = value.replace('\'', "'\"'\"'");
    format!("'{escaped}'")
}

/// Reduce an owner identity to characters that are valid in a container name.
fn sanitize_identity(owner: &str) -> String {
    let cleaned: String = owner
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}

/// Derive a container/service name for one deployment attempt:
/// sanitized owner identity plus a short random suffix, lower-cased.
/// Fresh per attempt — identical uploads never share an identity.
pub fn container_identity(owner: &str) -> String {
    let suffix: String = {
        let mut rng = rand::thread_rng();
        (0..8)
            .map(|_| {
                let n: u8 = rng.gen_range(0..16);
                char::from_digit(n as u32, 16).unwrap()
            })
            .collect()
    };
    format!("{}_{suffix}", sanitize_identity(owner))
}
