#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Shared-state client and ambient types for the image-ingestion worker.

pub mod config;
pub mod error;
pub mod shared_state;

pub use config::WorkerConfig;
pub use error::SharedStateError;
pub use shared_state::{Pipeline, RedisSharedStateClient, SharedStateClient};
