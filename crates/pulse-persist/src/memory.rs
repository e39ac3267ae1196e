use crate::backend::{events_key, sample_key, summary_key, PersistBackend, RULES_KEY};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pulse_core::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// 内存镜像后端
///
/// 供测试和未启用 Redis 的部署使用；TTL 不生效。
#[derive(Default)]
pub struct MemoryBackend {
    kv: Arc<RwLock<HashMap<String, String>>>,
    hashes: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
    lists: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.kv.read().await.get(key).cloned()
    }

    pub async fn hash_len(&self, key: &str) -> usize {
        self.hashes
            .read()
            .await
            .get(key)
            .map(|h| h.len())
            .unwrap_or(0)
    }

    pub async fn rules(&self) -> HashMap<String, String> {
        self.hashes
            .read()
            .await
            .get(RULES_KEY)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn list(&self, key: &str) -> Vec<String> {
        self.lists.read().await.get(key).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PersistBackend for MemoryBackend {
    async fn put_sample(
        &self,
        metric: &str,
        timestamp: DateTime<Utc>,
        payload: String,
        _ttl: Duration,
    ) -> Result<()> {
        let mut kv = self.kv.write().await;
        kv.insert(sample_key(metric, timestamp), payload);
        Ok(())
    }

    async fn put_rule(&self, rule_id: &str, payload: String) -> Result<()> {
        let mut hashes = self.hashes.write().await;
        hashes
            .entry(RULES_KEY.to_string())
            .or_default()
            .insert(rule_id.to_string(), payload);
        Ok(())
    }

    async fn delete_rule(&self, rule_id: &str) -> Result<()> {
        let mut hashes = self.hashes.write().await;
        if let Some(rules) = hashes.get_mut(RULES_KEY) {
            rules.remove(rule_id);
        }
        Ok(())
    }

    async fn append_event(&self, date: NaiveDate, payload: String, _ttl: Duration) -> Result<()> {
        let mut lists = self.lists.write().await;
        lists.entry(events_key(date)).or_default().push(payload);
        Ok(())
    }

    async fn put_summary(&self, date: NaiveDate, payload: String, _ttl: Duration) -> Result<()> {
        let mut kv = self.kv.write().await;
        kv.insert(summary_key(date), payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rule_mirror_roundtrip() {
        let backend = MemoryBackend::new();

        backend
            .put_rule("r1", r#"{"name":"high_cpu"}"#.to_string())
            .await
            .unwrap();
        assert_eq!(backend.rules().await.len(), 1);

        backend.delete_rule("r1").await.unwrap();
        assert!(backend.rules().await.is_empty());
    }

    #[tokio::test]
    async fn test_event_append() {
        let backend = MemoryBackend::new();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        backend
            .append_event(date, "e1".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        backend
            .append_event(date, "e2".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let events = backend.list("monitoring:alert:events:2024-03-01").await;
        assert_eq!(events, vec!["e1".to_string(), "e2".to_string()]);
    }
}
