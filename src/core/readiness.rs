use std::time::Duration;

use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info};

pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
/// Shorter intervals are raised to this so probing never spins.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Deadlines too large for the clock are capped here.
const MAX_DEADLINE: Duration = Duration::from_secs(86_400 * 365);

/// Poll `base_url` at a fixed interval until any HTTP response arrives or
/// `deadline` elapses. No single probe outlives the deadline.
pub async fn wait_until_ready(
    client: &reqwest::Client,
    base_url: &str,
    deadline: Duration,
    interval: Duration,
) -> bool {
    let started = Instant::now();
    let give_up_at = started
        .checked_add(deadline)
        .unwrap_or(started + MAX_DEADLINE);
    let interval = interval.max(MIN_POLL_INTERVAL);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match timeout_at(give_up_at, client.get(base_url).send()).await {
            Ok(Ok(response)) => {
                info!(
                    status = %response.status(),
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "server is accepting connections"
                );
                return true;
            }
            Ok(Err(err)) => debug!(attempts, error = %err, "server not ready yet"),
            Err(_) => debug!(attempts, "readiness probe hit the deadline"),
        }

        let now = Instant::now();
        if now >= give_up_at {
            info!(attempts, "gave up waiting for the server");
            return false;
        }
        let next_probe = now.checked_add(interval).unwrap_or(give_up_at);
        sleep_until(next_probe.min(give_up_at)).await;
    }
}
