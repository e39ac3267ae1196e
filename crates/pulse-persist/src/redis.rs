use crate::backend::{events_key, sample_key, summary_key, PersistBackend, RULES_KEY};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pulse_core::{PulseError, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

/// Redis 镜像后端
///
/// 连接由 `ConnectionManager` 维护并自动重连；每次操作克隆
/// 连接句柄，不跨调用持锁。
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl RedisBackend {
    /// 连接 Redis
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| PulseError::Transient(format!("redis open: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| PulseError::Transient(format!("redis connect: {}", e)))?;

        info!(url = %url, "Connected to Redis mirror store");
        Ok(Self { conn })
    }
}

fn transient(e: redis::RedisError) -> PulseError {
    PulseError::Transient(format!("redis: {}", e))
}

#[async_trait]
impl PersistBackend for RedisBackend {
    async fn put_sample(
        &self,
        metric: &str,
        timestamp: DateTime<Utc>,
        payload: String,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex(sample_key(metric, timestamp), payload, ttl.as_secs())
            .await
            .map_err(transient)
    }

    async fn put_rule(&self, rule_id: &str, payload: String) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.hset(RULES_KEY, rule_id, payload)
            .await
            .map_err(transient)
    }

    async fn delete_rule(&self, rule_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.hdel(RULES_KEY, rule_id).await.map_err(transient)
    }

    async fn append_event(&self, date: NaiveDate, payload: String, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = events_key(date);
        let _: () = conn.rpush(&key, payload).await.map_err(transient)?;
        conn.expire(&key, ttl.as_secs() as i64)
            .await
            .map_err(transient)
    }

    async fn put_summary(&self, date: NaiveDate, payload: String, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex(summary_key(date), payload, ttl.as_secs())
            .await
            .map_err(transient)
    }
}
