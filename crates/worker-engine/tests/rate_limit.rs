//! End-to-end rate-limit enforcement: a fetcher backed by a real
//! replenisher task should never drive a simulated origin past its true
//! capacity.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use worker_core::{Pipeline, SharedStateClient, SharedStateError};
use worker_engine::{derive_origin, FetchError, HttpResponse, HttpSession, RateLimitedFetcher};

struct MapRedis {
    values: Mutex<HashMap<String, i64>>,
}

impl MapRedis {
    fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SharedStateClient for MapRedis {
    async fn set(&self, key: &str, value: i64) -> Result<(), SharedStateError> {
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }
    async fn incr(&self, key: &str) -> Result<i64, SharedStateError> {
        let mut v = self.values.lock().unwrap();
        let e = v.entry(key.to_string()).or_insert(0);
        *e += 1;
        Ok(*e)
    }
    async fn decr(&self, key: &str) -> Result<i64, SharedStateError> {
        let mut v = self.values.lock().unwrap();
        let e = v.entry(key.to_string()).or_insert(0);
        *e -= 1;
        Ok(*e)
    }
    async fn rpush(&self, _key: &str, _value: &str) -> Result<(), SharedStateError> {
        Ok(())
    }
    fn pipeline(&self) -> Box<dyn Pipeline> {
        unimplemented!("not exercised by rate-limit test")
    }
}

/// Models an origin server with a true capacity of `capacity_rps`: flags
/// itself "overloaded" if more than `capacity_rps` requests land in any
/// trailing one-second window.
struct LoadSimulatingSession {
    capacity_rps: usize,
    recent_millis: Mutex<VecDeque<i64>>,
    overloaded: AtomicBool,
    start: tokio::time::Instant,
    total_requests: AtomicI64,
}

impl LoadSimulatingSession {
    fn new(capacity_rps: usize) -> Self {
        Self {
            capacity_rps,
            recent_millis: Mutex::new(VecDeque::new()),
            overloaded: AtomicBool::new(false),
            start: tokio::time::Instant::now(),
            total_requests: AtomicI64::new(0),
        }
    }
}

#[async_trait]
impl HttpSession for LoadSimulatingSession {
    async fn get(&self, _url: &str) -> Result<HttpResponse, FetchError> {
        self.total_requests.fetch_add(1, Ordering::SeqCst);
        let now_ms = self.start.elapsed().as_millis() as i64;
        let mut recent = self.recent_millis.lock().unwrap();
        recent.push_back(now_ms);
        while let Some(&front) = recent.front() {
            if now_ms - front >= 1_000 {
                recent.pop_front();
            } else {
                break;
            }
        }
        if recent.len() > self.capacity_rps {
            self.overloaded.store(true, Ordering::SeqCst);
        }
        Ok(HttpResponse { status: 200, body: vec![] })
    }
}

#[tokio::test(start_paused = true)]
async fn replenished_fetcher_never_overloads_a_higher_capacity_origin() {
    let redis = Arc::new(MapRedis::new());
    let redis_dyn: Arc<dyn SharedStateClient> = redis.clone();
    let session = Arc::new(LoadSimulatingSession::new(11));
    let session_dyn: Arc<dyn HttpSession> = session.clone();
    let observed = Arc::new(DashSet::new());
    let fetcher = Arc::new(RateLimitedFetcher::new(redis_dyn.clone(), session_dyn, observed.clone()));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let max_rps = 10;
    let replenisher = tokio::spawn(worker_engine::replenisher::run(
        redis_dyn,
        observed,
        max_rps,
        shutdown_rx,
    ));

    let origin = derive_origin("https://example.gov/a.jpg").unwrap();
    let mut handles = Vec::new();
    for _ in 0..100 {
        let fetcher = fetcher.clone();
        let origin = origin.clone();
        handles.push(tokio::spawn(async move {
            fetcher.get(&origin, "https://example.gov/a.jpg").await.unwrap();
        }));
    }

    for handle in handles {
        tokio::time::timeout(Duration::from_secs(60), handle)
            .await
            .expect("fetch should complete well within the simulated window")
            .unwrap();
    }

    assert!(
        !session.overloaded.load(Ordering::SeqCst),
        "origin observed more than its true capacity in a 1s window"
    );
    assert_eq!(session.total_requests.load(Ordering::SeqCst), 100);

    let _ = shutdown_tx.send(true);
    replenisher.await.unwrap();
}
