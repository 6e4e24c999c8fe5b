use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;
use worker_core::SharedStateClient;

use crate::job::Origin;

/// Reserved status sentinel for fetches that never reached an HTTP status
/// line (transport failure / timeout) or for image-decode failures.
pub const STATUS_SENTINEL_NO_RESPONSE: u16 = 0;

/// Records success/error counters and time-windowed error sets.
pub struct StatsAggregator {
    redis: Arc<dyn SharedStateClient>,
    windows: Vec<Duration>,
}

impl StatsAggregator {
    pub fn new(redis: Arc<dyn SharedStateClient>, windows: Vec<Duration>) -> Self {
        Self { redis, windows }
    }

    /// Increment `num_resized` and `num_resized:{origin}`.
    pub async fn record_success(&self, origin: &Origin) {
        let mut pipeline = self.redis.pipeline();
        pipeline.incr("num_resized");
        pipeline.incr(&format!("num_resized:{origin}"));
        if let Err(err) = pipeline.commit().await {
            tracing::warn!(%origin, error = %err, "failed to record success stats");
        }
    }

    /// Increment `resize_errors*` counters and append + trim one entry per
    /// configured window. The sorted-set trim for each window is buffered
    /// after that window's insert, so a just-added event is never trimmed
    /// by its own call.
    pub async fn record_error(&self, origin: &Origin, status: u16) {
        let now = Utc::now().timestamp();
        let member = format!("{now}-{}", Uuid::new_v4());

        let mut pipeline = self.redis.pipeline();
        pipeline.incr("resize_errors");
        pipeline.incr(&format!("resize_errors:{origin}"));
        pipeline.incr(&format!("resize_errors:{origin}:{status}"));

        for window in &self.windows {
            let key = format!("err{}:{origin}", window_label(*window));
            pipeline.zadd(&key, now as f64, &member);
            // Inclusive-lower, exclusive-upper: keep score >= now - W, drop
            // everything strictly older.
            let cutoff = now - window.as_secs() as i64;
            pipeline.zremrangebyscore(&key, "-inf", &format!("({cutoff}"));
        }

        if let Err(err) = pipeline.commit().await {
            tracing::warn!(%origin, status, error = %err, "failed to record error stats");
        }
    }
}

/// Map a window duration to its key suffix (`err60s`, `err1hr`, `err12hr`).
/// Arbitrary horizons fall back to a `{n}s` suffix.
fn window_label(window: Duration) -> String {
    match window.as_secs() {
        60 => "60s".to_string(),
        3_600 => "1hr".to_string(),
        43_200 => "12hr".to_string(),
        secs => format!("{secs}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use worker_core::{Pipeline, SharedStateError};

    #[derive(Default)]
    struct FakeStore {
        counters: Mutex<BTreeMap<String, i64>>,
        sorted_sets: Mutex<BTreeMap<String, Vec<(f64, String)>>>,
    }

    struct FakeClient(Arc<FakeStore>);

    struct FakePipeline {
        store: Arc<FakeStore>,
        ops: Vec<Op>,
    }

    enum Op {
        Incr(String),
        Zadd(String, f64, String),
        Zremrangebyscore(String, String, String),
    }

    #[async_trait]
    impl SharedStateClient for FakeClient {
        async fn set(&self, key: &str, value: i64) -> Result<(), SharedStateError> {
            self.0.counters.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }
        async fn incr(&self, key: &str) -> Result<i64, SharedStateError> {
            let mut c = self.0.counters.lock().unwrap();
            let v = c.entry(key.to_string()).or_insert(0);
            *v += 1;
            Ok(*v)
        }
        async fn decr(&self, key: &str) -> Result<i64, SharedStateError> {
            let mut c = self.0.counters.lock().unwrap();
            let v = c.entry(key.to_string()).or_insert(0);
            *v -= 1;
            Ok(*v)
        }
        async fn rpush(&self, _key: &str, _value: &str) -> Result<(), SharedStateError> {
            Ok(())
        }
        fn pipeline(&self) -> Box<dyn Pipeline> {
            Box::new(FakePipeline {
                store: self.0.clone(),
                ops: Vec::new(),
            })
        }
    }

    #[async_trait]
    impl Pipeline for FakePipeline {
        fn incr(&mut self, key: &str) {
            self.ops.push(Op::Incr(key.to_string()));
        }
        fn zadd(&mut self, key: &str, score: f64, member: &str) {
            self.ops.push(Op::Zadd(key.to_string(), score, member.to_string()));
        }
        fn zremrangebyscore(&mut self, key: &str, min: &str, max: &str) {
            self.ops
                .push(Op::Zremrangebyscore(key.to_string(), min.to_string(), max.to_string()));
        }
        async fn commit(self: Box<Self>) -> Result<(), SharedStateError> {
            for op in self.ops {
                match op {
                    Op::Incr(key) => {
                        let mut c = self.store.counters.lock().unwrap();
                        *c.entry(key).or_insert(0) += 1;
                    }
                    Op::Zadd(key, score, member) => {
                        self.store
                            .sorted_sets
                            .lock()
                            .unwrap()
                            .entry(key)
                            .or_default()
                            .push((score, member));
                    }
                    Op::Zremrangebyscore(key, min, max) => {
                        let min: f64 = if min == "-inf" { f64::NEG_INFINITY } else { min.parse().unwrap() };
                        let (max, exclusive) = if let Some(stripped) = max.strip_prefix('(') {
                            (stripped.parse::<f64>().unwrap(), true)
                        } else {
                            (max.parse::<f64>().unwrap(), false)
                        };
                        let mut sets = self.store.sorted_sets.lock().unwrap();
                        if let Some(entries) = sets.get_mut(&key) {
                            // Keep everything outside [min, max) (or [min, max]
                            // when the upper bound is inclusive), matching
                            // Redis's ZREMRANGEBYSCORE range semantics.
                            entries.retain(|(score, _)| {
                                if *score < min {
                                    return true;
                                }
                                if exclusive {
                                    *score >= max
                                } else {
                                    *score > max
                                }
                            });
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn record_success_increments_totals_and_per_origin() {
        let store = Arc::new(FakeStore::default());
        let client: Arc<dyn SharedStateClient> = Arc::new(FakeClient(store.clone()));
        let stats = StatsAggregator::new(client, vec![Duration::from_secs(60)]);
        let origin = Origin::display_for_test("example.gov");

        stats.record_success(&origin).await;

        let counters = store.counters.lock().unwrap();
        assert_eq!(counters.get("num_resized"), Some(&1));
        assert_eq!(counters.get("num_resized:example.gov"), Some(&1));
    }

    #[tokio::test]
    async fn record_error_writes_all_expected_keys() {
        let store = Arc::new(FakeStore::default());
        let client: Arc<dyn SharedStateClient> = Arc::new(FakeClient(store.clone()));
        let stats = StatsAggregator::new(
            client,
            vec![Duration::from_secs(60), Duration::from_secs(3_600), Duration::from_secs(43_200)],
        );
        let origin = Origin::display_for_test("example.gov");

        stats.record_error(&origin, 403).await;

        let counters = store.counters.lock().unwrap();
        assert_eq!(counters.get("resize_errors"), Some(&1));
        assert_eq!(counters.get("resize_errors:example.gov"), Some(&1));
        assert_eq!(counters.get("resize_errors:example.gov:403"), Some(&1));

        let sets = store.sorted_sets.lock().unwrap();
        assert!(sets.contains_key("err60s:example.gov"));
        assert!(sets.contains_key("err1hr:example.gov"));
        assert!(sets.contains_key("err12hr:example.gov"));
    }
}
