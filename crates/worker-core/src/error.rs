/// Failures surfaced by the shared-state client.
///
/// The client never retries internally; callers decide whether a failure
/// is fatal or merely logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum SharedStateError {
    #[error("shared-state transport error: {0}")]
    Transport(#[from] redis::RedisError),

    #[error("shared-state pipeline commit failed: {0}")]
    PipelineCommit(String),
}
