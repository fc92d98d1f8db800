//! Periodic backend health probe.
//!
//! The only recurring background task in the system: probe the health
//! endpoint on a fixed interval and publish the result on a watch channel.
//! The task stops on its own once every receiver has been dropped.

use crate::backend::BackendClient;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Probe interval used by the applications.
pub const HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(30);

/// Spawn the recurring health probe. The receiver starts at `false` and is
/// updated after every probe.
pub fn spawn_health_monitor(
    client: BackendClient,
    period: Duration,
) -> (watch::Receiver<bool>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            let healthy = client.check_health().await;
            log::debug!(
                "health probe: {}",
                if healthy { "healthy" } else { "unreachable" }
            );
            if tx.send(healthy).is_err() {
                break;
            }
        }
        log::debug!("health monitor stopped");
    });
    (rx, handle)
}
