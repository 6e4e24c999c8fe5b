use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::SharedStateError;

/// Thin typed facade over the external key-value/sorted-set store.
/// Unknown keys behave as if initialized to zero (counters) or empty
/// (lists/sets), matching Redis's native behavior for
/// `INCR`/`DECR`/`RPUSH`/`ZADD` on a missing key, so the trait doesn't need
/// to special-case it.
#[async_trait]
pub trait SharedStateClient: Send + Sync {
    /// Set an integer key to an absolute value (used by the replenisher).
    async fn set(&self, key: &str, value: i64) -> Result<(), SharedStateError>;

    /// Atomically increment a counter and return the new value.
    async fn incr(&self, key: &str) -> Result<i64, SharedStateError>;

    /// Atomically decrement a counter and return the new value.
    async fn decr(&self, key: &str) -> Result<i64, SharedStateError>;

    /// Append a value to a list.
    async fn rpush(&self, key: &str, value: &str) -> Result<(), SharedStateError>;

    /// Open a pipeline that batches operations into a single round-trip.
    fn pipeline(&self) -> Box<dyn Pipeline>;
}

/// A batch of buffered writes committed together.
///
/// Operations are buffered in call order and committed in that same order
/// when `commit` runs. Callers rely on this to add a sorted-set entry
/// before trimming the set, so a just-added event is never trimmed by its
/// own call.
#[async_trait]
pub trait Pipeline: Send {
    /// Buffer an atomic increment.
    fn incr(&mut self, key: &str);

    /// Buffer a sorted-set insert scored by `score`.
    fn zadd(&mut self, key: &str, score: f64, member: &str);

    /// Buffer a sorted-set trim. `min`/`max` use Redis range syntax
    /// (a `(` prefix makes a bound exclusive).
    fn zremrangebyscore(&mut self, key: &str, min: &str, max: &str);

    /// Commit every buffered operation as one batched round-trip.
    async fn commit(self: Box<Self>) -> Result<(), SharedStateError>;
}

/// Redis-backed [`SharedStateClient`].
///
/// Wraps [`ConnectionManager`], which transparently reconnects on
/// transport errors, so callers don't need their own retry loop around
/// transient connection drops.
#[derive(Clone)]
pub struct RedisSharedStateClient {
    conn: ConnectionManager,
}

impl RedisSharedStateClient {
    /// Connect to `redis_url` (e.g. `redis://127.0.0.1/0`).
    pub async fn connect(redis_url: &str) -> Result<Self, SharedStateError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SharedStateClient for RedisSharedStateClient {
    async fn set(&self, key: &str, value: i64) -> Result<(), SharedStateError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, SharedStateError> {
        let mut conn = self.conn.clone();
        let v = conn.incr(key, 1).await?;
        Ok(v)
    }

    async fn decr(&self, key: &str) -> Result<i64, SharedStateError> {
        let mut conn = self.conn.clone();
        let v = conn.decr(key, 1).await?;
        Ok(v)
    }

    async fn rpush(&self, key: &str, value: &str) -> Result<(), SharedStateError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(key, value).await?;
        Ok(())
    }

    fn pipeline(&self) -> Box<dyn Pipeline> {
        Box::new(RedisPipeline {
            conn: self.conn.clone(),
            pipe: redis::pipe(),
        })
    }
}

struct RedisPipeline {
    conn: ConnectionManager,
    pipe: redis::Pipeline,
}

#[async_trait]
impl Pipeline for RedisPipeline {
    fn incr(&mut self, key: &str) {
        self.pipe.cmd("INCR").arg(key).ignore();
    }

    fn zadd(&mut self, key: &str, score: f64, member: &str) {
        self.pipe.cmd("ZADD").arg(key).arg(score).arg(member).ignore();
    }

    fn zremrangebyscore(&mut self, key: &str, min: &str, max: &str) {
        self.pipe
            .cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg(min)
            .arg(max)
            .ignore();
    }

    async fn commit(mut self: Box<Self>) -> Result<(), SharedStateError> {
        self.pipe
            .query_async::<()>(&mut self.conn)
            .await
            .map_err(|err| SharedStateError::PipelineCommit(err.to_string()))
    }
}
