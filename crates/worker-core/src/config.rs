use std::time::Duration;

/// Tunable parameters for the ingestion pipeline.
///
/// Deliberately free of any CLI/env-parsing dependency: the binary crate owns
/// argument parsing and builds one of these from a `clap::Parser` struct.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Max messages fetched per `Consumer::poll` call.
    pub batch_size: usize,
    /// Global semaphore capacity bounding in-flight processors.
    pub max_concurrency: usize,
    /// Replenisher's reset value for `currtokens:{origin}`.
    pub max_rps_per_origin: i64,
    /// `(max_w, max_h)` thumbnail bound.
    pub resize_dims: (u32, u32),
    /// Error-window horizons, e.g. `{60s, 1h, 12h}`.
    pub window_horizons: Vec<Duration>,
    /// How long the consumer loop sleeps after an empty poll.
    pub idle_poll_interval: Duration,
    /// If true, the consumer loop stops polling and returns as soon as a
    /// poll comes back empty, after waiting for all outstanding jobs to
    /// finish. If false (the default for a long-running daemon), an empty
    /// poll just means "wait and try again" until externally asked to stop.
    pub terminate_on_empty_poll: bool,
    /// Upper bound on how long an externally requested shutdown waits for
    /// in-flight jobs to finish after cancelling them. Jobs still running
    /// past the deadline are abandoned so the process can exit.
    pub shutdown_drain_deadline: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_concurrency: 20,
            max_rps_per_origin: 5,
            resize_dims: (640, 480),
            window_horizons: vec![
                Duration::from_secs(60),
                Duration::from_secs(3_600),
                Duration::from_secs(43_200),
            ],
            idle_poll_interval: Duration::from_millis(250),
            terminate_on_empty_poll: false,
            shutdown_drain_deadline: Duration::from_secs(30),
        }
    }
}
