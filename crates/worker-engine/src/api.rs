//! Public entry point for the image-ingestion engine: wires the consumer
//! loop and the token replenisher together and hands back a handle for
//! graceful shutdown.

use std::sync::Arc;

use dashmap::DashSet;
use worker_core::{SharedStateClient, WorkerConfig};

use crate::consumer::Shutdown;
use crate::fetcher::RateLimitedFetcher;
use crate::job::Origin;
use crate::stats::StatsAggregator;
use crate::traits::{Consumer, HttpSession, Persister};

/// Everything the engine needs beyond tunables: the shared-state client and
/// the three capability seams.
pub struct EngineDeps {
    pub redis: Arc<dyn SharedStateClient>,
    pub consumer: Arc<dyn Consumer>,
    pub http: Arc<dyn HttpSession>,
    pub persister: Arc<dyn Persister>,
}

/// Handle to a running engine instance.
pub struct EngineHandle {
    shutdown: Arc<Shutdown>,
    consumer_join: tokio::task::JoinHandle<()>,
    replenisher_join: tokio::task::JoinHandle<()>,
}

impl EngineHandle {
    /// Request a graceful shutdown: stop leasing new batches, let
    /// already-dispatched jobs finish, then stop the replenisher.
    pub fn request_stop(&self) {
        self.shutdown.request_stop();
    }

    /// The shutdown flag driving the consume loop, for wiring an external
    /// trigger (a signal handler, a test) directly to it.
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        self.shutdown.clone()
    }

    /// Wait for both background tasks to exit.
    pub async fn wait(self) -> anyhow::Result<()> {
        self.consumer_join
            .await
            .map_err(|err| anyhow::anyhow!("consumer loop task join error: {err}"))?;
        self.replenisher_join
            .await
            .map_err(|err| anyhow::anyhow!("replenisher task join error: {err}"))?;
        Ok(())
    }
}

/// Start the engine: spawns the consume loop and the token replenisher as
/// background tasks and returns a handle to stop and await them.
pub fn start_engine(config: WorkerConfig, deps: EngineDeps) -> EngineHandle {
    let observed_origins: Arc<DashSet<Origin>> = Arc::new(DashSet::new());
    let fetcher = Arc::new(RateLimitedFetcher::new(
        deps.redis.clone(),
        deps.http,
        observed_origins.clone(),
    ));
    let stats = Arc::new(StatsAggregator::new(deps.redis.clone(), config.window_horizons));

    let shutdown = Arc::new(Shutdown::new());
    let (replenisher_shutdown_tx, replenisher_shutdown_rx) = tokio::sync::watch::channel(false);

    let consumer_join = tokio::spawn(crate::consumer::run(
        deps.consumer,
        fetcher,
        deps.persister,
        stats,
        shutdown.clone(),
        config.batch_size,
        config.max_concurrency,
        config.idle_poll_interval,
        config.resize_dims,
        config.terminate_on_empty_poll,
        config.shutdown_drain_deadline,
    ));

    let replenisher_join = tokio::spawn(crate::replenisher::run(
        deps.redis,
        observed_origins,
        config.max_rps_per_origin,
        replenisher_shutdown_rx,
    ));

    // The replenisher is told to stop whenever the caller requests it;
    // dropping the sender on `EngineHandle`'s own shutdown would race the
    // consume loop's drain, so this task outlives the consumer briefly by
    // watching the same flag independently.
    let shutdown_watch = shutdown.clone();
    tokio::spawn(async move {
        loop {
            if shutdown_watch.should_stop() {
                let _ = replenisher_shutdown_tx.send(true);
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    });

    EngineHandle {
        shutdown,
        consumer_join,
        replenisher_join,
    }
}
