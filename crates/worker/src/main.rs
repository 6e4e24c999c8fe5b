mod cli;
mod persister;
mod shutdown;
mod stdin_consumer;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use worker_core::{RedisSharedStateClient, SharedStateClient, WorkerConfig};
use worker_engine::{start_engine, EngineDeps, ReqwestHttpSession};

use crate::cli::Cli;
use crate::persister::FilePersister;
use crate::shutdown::{spawn_ctrl_c_handler, CtrlCGuard};
use crate::stdin_consumer::StdinBatchConsumer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = WorkerConfig {
        batch_size: cli.batch_size,
        max_concurrency: cli.max_concurrency,
        max_rps_per_origin: cli.max_rps_per_origin,
        resize_dims: (cli.resize_width, cli.resize_height),
        window_horizons: cli.error_window_secs.into_iter().map(Duration::from_secs).collect(),
        idle_poll_interval: Duration::from_millis(cli.idle_poll_ms),
        terminate_on_empty_poll: cli.terminate_on_empty_poll,
        shutdown_drain_deadline: cli.shutdown_drain_deadline,
    };

    let redis: Arc<dyn SharedStateClient> = Arc::new(RedisSharedStateClient::connect(&cli.redis_url).await?);
    let http = Arc::new(ReqwestHttpSession::new(cli.http_timeout)?);
    let persister = Arc::new(FilePersister::new(cli.output_dir).await?);

    let consumer: Arc<dyn worker_engine::Consumer> = if cli.input == "-" {
        Arc::new(StdinBatchConsumer::spawn(Box::new(tokio::io::stdin())))
    } else {
        let file = tokio::fs::File::open(&cli.input).await?;
        Arc::new(StdinBatchConsumer::spawn(Box::new(file)))
    };

    tracing::info!(
        batch_size = config.batch_size,
        max_concurrency = config.max_concurrency,
        max_rps_per_origin = config.max_rps_per_origin,
        "image-worker starting"
    );

    let engine = start_engine(
        config,
        EngineDeps {
            redis,
            consumer,
            http,
            persister,
        },
    );

    let ctrl_c_guard = Arc::new(CtrlCGuard::new());
    spawn_ctrl_c_handler(ctrl_c_guard, engine.shutdown_handle());

    engine.wait().await?;
    Ok(())
}
