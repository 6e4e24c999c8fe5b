use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use worker_engine::Shutdown;

/// Tracks how many times ctrl-c has fired: the first requests a graceful
/// drain, the second exits immediately without waiting for in-flight jobs.
pub struct CtrlCGuard {
    presses: AtomicU8,
}

impl CtrlCGuard {
    pub fn new() -> Self {
        Self {
            presses: AtomicU8::new(0),
        }
    }

    fn bump(&self) -> u8 {
        self.presses.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for CtrlCGuard {
    fn default() -> Self {
        Self::new()
    }
}

pub fn spawn_ctrl_c_handler(guard: Arc<CtrlCGuard>, shutdown: Arc<Shutdown>) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            let n = guard.bump();
            if n == 1 {
                tracing::info!("shutdown requested, draining in-flight jobs (press ctrl-c again to exit immediately)");
                shutdown.request_stop();
            } else {
                tracing::warn!("second ctrl-c received, exiting immediately");
                std::process::exit(130);
            }
        }
    });
}
