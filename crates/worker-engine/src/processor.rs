use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;

use crate::fetcher::RateLimitedFetcher;
use crate::job::Job;
use crate::stats::{StatsAggregator, STATUS_SENTINEL_NO_RESPONSE};
use crate::traits::Persister;

/// Orchestrates fetch → decode → resize → persist → stats for one job.
///
/// Takes ownership of `permit` so it is released on every exit path,
/// including an early `return` or a panic unwinding through this
/// function, for free, via `OwnedSemaphorePermit`'s `Drop` impl. No
/// exit path here ever propagates a panic past its own boundary: decode
/// and resize failures are `Result`s, not panics, and corrupt input is an
/// expected condition rather than an error to crash on.
pub async fn process(
    job: Job,
    permit: OwnedSemaphorePermit,
    fetcher: &RateLimitedFetcher,
    persister: &Arc<dyn Persister>,
    stats: &StatsAggregator,
    resize_dims: (u32, u32),
) {
    let _permit = permit;
    let origin = job.origin.clone();

    let response = match fetcher.get(&origin, &job.url).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%origin, error = %err, "fetch transport failure");
            stats.record_error(&origin, STATUS_SENTINEL_NO_RESPONSE).await;
            return;
        }
    };

    if !(200..300).contains(&response.status) {
        stats.record_error(&origin, response.status).await;
        return;
    }

    let (max_w, max_h) = resize_dims;
    let resized = match tokio::task::spawn_blocking(move || decode_and_resize(&response.body, max_w, max_h)).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(err)) => {
            tracing::debug!(%origin, error = %err, "image decode failed");
            stats.record_error(&origin, STATUS_SENTINEL_NO_RESPONSE).await;
            return;
        }
        Err(join_err) => {
            tracing::error!(%origin, error = %join_err, "resize task panicked");
            stats.record_error(&origin, STATUS_SENTINEL_NO_RESPONSE).await;
            return;
        }
    };

    if let Err(err) = persister.persist(&resized, job.identifier).await {
        // Persister failures are logged but treated as success for offset
        // purposes: persistence is idempotent on `identifier` and handled
        // at a higher layer.
        tracing::warn!(identifier = %job.identifier, error = %err, "persister failed, treating as success");
    }

    stats.record_success(&origin).await;
}

fn decode_and_resize(bytes: &[u8], max_w: u32, max_h: u32) -> Result<Vec<u8>, image::ImageError> {
    let image = image::load_from_memory(bytes)?;
    let resized = image.resize(max_w, max_h, image::imageops::FilterType::Lanczos3);

    let mut out = Vec::new();
    resized.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Jpeg)?;
    Ok(out)
}
