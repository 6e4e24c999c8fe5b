use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;

use crate::fetcher::RateLimitedFetcher;
use crate::job::parse_job;
use crate::processor::process;
use crate::stats::StatsAggregator;
use crate::traits::{Consumer, Persister};

/// Cooperative stop signal shared between the consume loop and whatever
/// drives shutdown (a ctrl-c handler, a test, ...). Mirrors the
/// flag-plus-[`Notify`] shape used to wake a `tokio::select!` loop that is
/// otherwise parked waiting on the next poll.
pub struct Shutdown {
    stop_requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn request_stop(&self) {
        if !self.stop_requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn should_stop(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    async fn notified(&self) {
        self.notify.notified().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Poll → dispatch → commit, gated by a bounded semaphore and tracked in a
/// [`JoinSet`] so shutdown can drain in-flight work before returning.
///
/// Two distinct ways to stop, matching two distinct drain behaviors:
///
/// - `terminate`: the loop self-stops the first time a poll comes back
///   empty. It then waits for every already-dispatched job to finish on
///   its own; nothing is cancelled.
/// - `shutdown` (an externally requested stop, e.g. ctrl-c): the loop
///   stops dispatching immediately, cancels every in-flight job, and waits
///   only up to `shutdown_drain_deadline` before abandoning stragglers.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    consumer: Arc<dyn Consumer>,
    fetcher: Arc<RateLimitedFetcher>,
    persister: Arc<dyn Persister>,
    stats: Arc<StatsAggregator>,
    shutdown: Arc<Shutdown>,
    batch_size: usize,
    max_concurrency: usize,
    idle_poll_interval: Duration,
    resize_dims: (u32, u32),
    terminate: bool,
    shutdown_drain_deadline: Duration,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let mut inflight: JoinSet<()> = JoinSet::new();
    let mut cancelled = false;

    loop {
        if shutdown.should_stop() {
            cancelled = true;
            break;
        }

        let messages = consumer.poll(batch_size).await;

        if messages.is_empty() {
            if terminate {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(idle_poll_interval) => {}
                _ = shutdown.notified() => {}
            }
            reap_finished(&mut inflight);
            continue;
        }

        for message in messages {
            let job = match parse_job(&message) {
                Ok(job) => job,
                Err(err) => {
                    tracing::warn!(error = %err, "discarding unparseable message");
                    continue;
                }
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break, // semaphore closed: shutting down
            };

            let fetcher = fetcher.clone();
            let persister = persister.clone();
            let stats = stats.clone();
            inflight.spawn(async move {
                process(job, permit, &fetcher, &persister, &stats, resize_dims).await;
            });
        }

        if let Err(err) = consumer.commit_offsets().await {
            tracing::warn!(error = %err, "failed to commit consumer offsets");
        }

        reap_finished(&mut inflight);
    }

    if cancelled {
        inflight.abort_all();
        let drained = tokio::time::timeout(shutdown_drain_deadline, async {
            while let Some(res) = inflight.join_next().await {
                if let Err(err) = res {
                    if !err.is_cancelled() {
                        tracing::error!(error = %err, "processing task panicked during shutdown drain");
                    }
                }
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!("shutdown drain deadline elapsed, abandoning remaining in-flight jobs");
        }
    } else {
        // Terminate mode: every dispatched job is already running to
        // completion on its own, so just wait for all of them.
        while let Some(res) = inflight.join_next().await {
            if let Err(err) = res {
                tracing::error!(error = %err, "processing task panicked during drain");
            }
        }
    }
}

/// Collect already-completed task results without blocking, so a panicking
/// task is observed (and logged) promptly instead of only at shutdown.
fn reap_finished(inflight: &mut JoinSet<()>) {
    while let Some(res) = inflight.try_join_next() {
        if let Err(err) = res {
            tracing::error!(error = %err, "processing task panicked");
        }
    }
}
