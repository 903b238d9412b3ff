//! Readiness polling for newly provisioned shards.

use crate::domain::{RouterConfig, ShardError};
use crate::ports::outbound::ShardBackend;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Poll `backend.ping()` until it succeeds or the readiness timeout passes.
///
/// The interval starts at `readiness_poll_interval_ms` and doubles up to
/// `readiness_max_interval_ms`. Any ping error counts as "not ready yet".
pub fn wait_until_ready(backend: &dyn ShardBackend, config: &RouterConfig) -> Result<(), ShardError> {
    let timeout = Duration::from_millis(config.readiness_timeout_ms);
    let max_interval = Duration::from_millis(config.readiness_max_interval_ms.max(1));
    let mut interval = Duration::from_millis(config.readiness_poll_interval_ms.max(1)).min(max_interval);
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let last_error = match backend.ping() {
            Ok(()) => {
                debug!(shard = backend.name(), attempts, "shard ready");
                return Ok(());
            }
            Err(e) => e,
        };

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            warn!(
                shard = backend.name(),
                attempts,
                error = %last_error,
                "shard not ready before timeout"
            );
            return Err(ShardError::ProvisioningTimeout {
                shard: backend.name().to_string(),
                waited_ms: elapsed.as_millis() as u64,
            });
        }

        debug!(shard = backend.name(), attempts, error = %last_error, "shard not ready, retrying");
        std::thread::sleep(interval.min(timeout - elapsed));
        interval = (interval * 2).min(max_interval);
    }
}
