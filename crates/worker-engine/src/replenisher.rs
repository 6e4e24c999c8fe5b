use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use worker_core::SharedStateClient;

use crate::job::Origin;

/// Long-running task that resets `currtokens:{origin}` to `max_rps` once
/// per second for every origin the fetcher has ever observed.
///
/// Resetting rather than incrementing means a transient over-decrement
/// from the fetcher's racy starvation check self-heals at the next tick,
/// at the cost of up to one second of staleness.
pub async fn run(
    redis: Arc<dyn SharedStateClient>,
    observed_origins: Arc<DashSet<Origin>>,
    max_rps: i64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                for origin in observed_origins.iter() {
                    let key = format!("currtokens:{}", origin.as_str());
                    if let Err(err) = redis.set(&key, max_rps).await {
                        tracing::warn!(origin = %origin.as_str(), error = %err, "failed to replenish token budget");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
