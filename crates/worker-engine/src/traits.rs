use async_trait::async_trait;
use uuid::Uuid;

use crate::job::Message;

/// Response from an [`HttpSession::get`] call.
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// A fetch that never reached a response (connection refused, timeout,
/// DNS failure, ...). The fetcher maps this to the reserved status-`0`
/// sentinel.
#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct FetchError(pub String);

/// The HTTP client used to retrieve image bytes. Injected so tests can
/// substitute a network-simulating fake.
#[async_trait]
pub trait HttpSession: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// The message-bus consumer. Only the interface is specified here;
/// production deployments inject a real client (Kafka, SQS, ...).
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Return up to `batch_size` messages.
    async fn poll(&self, batch_size: usize) -> Vec<Message>;

    /// Commit offsets for every message returned by prior `poll` calls.
    /// Idempotent.
    async fn commit_offsets(&self) -> anyhow::Result<()>;
}

/// Downstream persistence sink for resized thumbnails. Errors are logged
/// but treated as success for offset-commit purposes.
#[async_trait]
pub trait Persister: Send + Sync {
    async fn persist(&self, bytes: &[u8], identifier: Uuid) -> anyhow::Result<()>;
}
