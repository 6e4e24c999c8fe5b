use std::time::Duration;

use clap::Parser;

fn parse_duration_secs(input: &str) -> Result<Duration, String> {
    let secs: u64 = input
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration in seconds: {input:?}"))?;
    Ok(Duration::from_secs(secs))
}

#[derive(Debug, Clone, Parser)]
#[command(name = "image-worker", version, about = "Rate-limited image ingestion worker")]
pub struct Cli {
    /// Redis (or Redis-compatible) URL backing rate limits and stats.
    #[arg(long, env = "IMAGE_WORKER_REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Max messages fetched per poll.
    #[arg(long, env = "IMAGE_WORKER_BATCH_SIZE", default_value_t = 10)]
    pub batch_size: usize,

    /// Bound on in-flight fetch/decode/persist jobs.
    #[arg(long, env = "IMAGE_WORKER_MAX_CONCURRENCY", default_value_t = 20)]
    pub max_concurrency: usize,

    /// Per-origin requests-per-second budget.
    #[arg(long, env = "IMAGE_WORKER_MAX_RPS_PER_ORIGIN", default_value_t = 5)]
    pub max_rps_per_origin: i64,

    /// Thumbnail width bound.
    #[arg(long, env = "IMAGE_WORKER_RESIZE_WIDTH", default_value_t = 640)]
    pub resize_width: u32,

    /// Thumbnail height bound.
    #[arg(long, env = "IMAGE_WORKER_RESIZE_HEIGHT", default_value_t = 480)]
    pub resize_height: u32,

    /// Sleep duration after an empty poll.
    #[arg(
        long,
        env = "IMAGE_WORKER_IDLE_POLL_MS",
        default_value_t = 250,
    )]
    pub idle_poll_ms: u64,

    /// Error-tracking window horizons, in seconds (repeatable).
    #[arg(
        long = "error-window-secs",
        env = "IMAGE_WORKER_ERROR_WINDOWS_SECS",
        value_delimiter = ',',
        default_value = "60,3600,43200"
    )]
    pub error_window_secs: Vec<u64>,

    /// HTTP client timeout.
    #[arg(long = "http-timeout-secs", env = "IMAGE_WORKER_HTTP_TIMEOUT_SECS", value_parser = parse_duration_secs, default_value = "30")]
    pub http_timeout: Duration,

    /// Directory resized thumbnails are written to.
    #[arg(long, env = "IMAGE_WORKER_OUTPUT_DIR", default_value = "./output")]
    pub output_dir: std::path::PathBuf,

    /// Read newline-delimited job messages from this file instead of
    /// stdin. `-` (the default) reads stdin.
    #[arg(long, env = "IMAGE_WORKER_INPUT", default_value = "-")]
    pub input: String,

    /// Stop once the input is exhausted (an empty poll) and every
    /// dispatched job has finished, instead of running as a long-lived
    /// daemon. Useful for the finite file-input case.
    #[arg(long, env = "IMAGE_WORKER_TERMINATE_ON_EMPTY_POLL")]
    pub terminate_on_empty_poll: bool,

    /// On ctrl-c, how long to wait for in-flight jobs to finish after
    /// cancelling them before abandoning them and exiting anyway.
    #[arg(
        long = "shutdown-drain-deadline-secs",
        env = "IMAGE_WORKER_SHUTDOWN_DRAIN_DEADLINE_SECS",
        value_parser = parse_duration_secs,
        default_value = "30"
    )]
    pub shutdown_drain_deadline: Duration,
}
