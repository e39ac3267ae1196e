use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 指标样本
///
/// 样本一旦创建不可变；写入存储时复制，查询时复制返回。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub tags: HashMap<String, String>,
}

impl MetricSample {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp: Utc::now(),
            tags: HashMap::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }
}

/// 指标元信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricMetadata {
    pub name: String,
    pub sample_count: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
    pub tag_keys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_builder() {
        let sample = MetricSample::new("cpu_usage", 42.5)
            .with_tag("host", "node-1")
            .with_tag("region", "cn-east");

        assert_eq!(sample.name, "cpu_usage");
        assert_eq!(sample.value, 42.5);
        assert_eq!(sample.tags.get("host"), Some(&"node-1".to_string()));
    }

    #[test]
    fn test_sample_serialization() {
        let sample = MetricSample::new("latency_ms", 12.0).with_tag("path", "/api");

        let json = serde_json::to_string(&sample).unwrap();
        let back: MetricSample = serde_json::from_str(&json).unwrap();

        assert_eq!(back.name, "latency_ms");
        assert_eq!(back.value, 12.0);
        assert_eq!(back.tags.get("path"), Some(&"/api".to_string()));
    }
}
