use std::sync::Arc;
use std::time::Duration;

use dashmap::DashSet;
use rand::Rng;
use worker_core::SharedStateClient;

use crate::job::Origin;
use crate::traits::{FetchError, HttpResponse, HttpSession};

const BACKOFF_MIN: Duration = Duration::from_millis(50);
const BACKOFF_MAX: Duration = Duration::from_millis(200);

/// Wraps an [`HttpSession`] with a per-origin token acquisition step.
pub struct RateLimitedFetcher {
    redis: Arc<dyn SharedStateClient>,
    session: Arc<dyn HttpSession>,
    observed_origins: Arc<DashSet<Origin>>,
}

impl RateLimitedFetcher {
    pub fn new(
        redis: Arc<dyn SharedStateClient>,
        session: Arc<dyn HttpSession>,
        observed_origins: Arc<DashSet<Origin>>,
    ) -> Self {
        Self {
            redis,
            session,
            observed_origins,
        }
    }

    /// Acquire a token for `origin`, then issue the GET. Suspends
    /// cooperatively (never busy-loops) while starved; a cancelled await
    /// at any of these suspension points drops out without touching the
    /// token count.
    pub async fn get(&self, origin: &Origin, url: &str) -> Result<HttpResponse, FetchError> {
        self.observed_origins.insert(origin.clone());

        loop {
            let key = format!("currtokens:{origin}");
            match self.redis.decr(&key).await {
                Ok(remaining) if remaining >= 0 => break,
                Ok(_) => {
                    tokio::time::sleep(jittered_backoff()).await;
                    continue;
                }
                Err(err) => {
                    // Shared-state failure: log and proceed rather than
                    // wedge the pipeline on a store hiccup.
                    tracing::warn!(%origin, error = %err, "rate-limit check failed, proceeding without a token");
                    break;
                }
            }
        }

        self.session.get(url).await
    }
}

fn jittered_backoff() -> Duration {
    let millis = rand::thread_rng().gen_range(BACKOFF_MIN.as_millis()..=BACKOFF_MAX.as_millis());
    Duration::from_millis(millis as u64)
}
