#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Fetch → decode/resize → persist pipeline for incoming image jobs, plus
//! the shared-state-coordinated rate limiter and error/stat bookkeeping
//! around it.

pub mod api;
pub mod consumer;
pub mod fetcher;
pub mod http;
pub mod job;
pub mod processor;
pub mod replenisher;
pub mod stats;
pub mod traits;

pub use api::{start_engine, EngineDeps, EngineHandle};
pub use consumer::Shutdown;
pub use fetcher::RateLimitedFetcher;
pub use http::ReqwestHttpSession;
pub use job::{derive_origin, parse_job, Job, Message, Origin, ParseError};
pub use stats::StatsAggregator;
pub use traits::{Consumer, FetchError, HttpResponse, HttpSession, Persister};
