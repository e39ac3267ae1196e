use crate::model::{MetricMetadata, MetricSample};
use chrono::{DateTime, Duration, Utc};
use pulse_core::{PulseError, Result};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// 保留策略
///
/// 每次写入都按时间和容量裁剪，不依赖后台清扫。
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// 热数据窗口
    pub hot_window: Duration,

    /// 单指标样本数上限
    pub max_samples_per_metric: usize,
}

impl RetentionPolicy {
    pub fn new(hot_window_secs: u64, max_samples_per_metric: usize) -> Self {
        Self {
            hot_window: Duration::seconds(hot_window_secs as i64),
            max_samples_per_metric,
        }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(300, 10_000)
    }
}

type SeriesBuffer = Arc<RwLock<VecDeque<MetricSample>>>;

/// 指标存储
///
/// 外层映射只在新增指标时写锁定；不同指标的写入方各自持有
/// 内层缓冲区的锁，互不阻塞。
pub struct MetricStore {
    series: RwLock<HashMap<String, SeriesBuffer>>,
    policy: RetentionPolicy,
}

impl MetricStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            series: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// 记录一个样本
    pub async fn record(
        &self,
        name: &str,
        value: f64,
        timestamp: DateTime<Utc>,
        tags: HashMap<String, String>,
    ) -> Result<()> {
        let sample = MetricSample {
            name: name.to_string(),
            value,
            timestamp,
            tags,
        };
        self.record_sample(sample).await
    }

    /// 记录一个已构建的样本
    pub async fn record_sample(&self, sample: MetricSample) -> Result<()> {
        if sample.name.trim().is_empty() {
            return Err(PulseError::Validation("metric name is empty".to_string()));
        }
        if !sample.value.is_finite() {
            return Err(PulseError::Validation(format!(
                "metric {} value is not finite",
                sample.name
            )));
        }

        let buffer = self.buffer_for(&sample.name).await;
        let mut buf = buffer.write().await;

        // 插入点从尾部回退查找，正常时间序写入是 O(1)
        let idx = buf
            .iter()
            .rposition(|s| s.timestamp <= sample.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        if idx == buf.len() {
            buf.push_back(sample);
        } else {
            buf.insert(idx, sample);
        }

        Self::trim(&mut buf, Utc::now(), &self.policy);
        Ok(())
    }

    /// 批量记录
    pub async fn record_batch(&self, samples: Vec<MetricSample>) -> Result<()> {
        for sample in samples {
            self.record_sample(sample).await?;
        }
        Ok(())
    }

    /// 查询某指标自 `since` 之后的样本（时间升序，快照复制）
    pub async fn query(&self, name: &str, since: DateTime<Utc>) -> Vec<MetricSample> {
        match self.existing_buffer(name).await {
            Some(buffer) => {
                let buf = buffer.read().await;
                buf.iter()
                    .filter(|s| s.timestamp > since)
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// 查询半开区间 `(start, end]` 内的样本
    pub async fn query_range(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<MetricSample> {
        match self.existing_buffer(name).await {
            Some(buffer) => {
                let buf = buffer.read().await;
                buf.iter()
                    .filter(|s| s.timestamp > start && s.timestamp <= end)
                    .cloned()
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// 某指标最新的样本
    pub async fn latest(&self, name: &str) -> Option<MetricSample> {
        let buffer = self.existing_buffer(name).await?;
        let buf = buffer.read().await;
        buf.back().cloned()
    }

    /// 当前持有样本的指标名列表
    pub async fn metric_names(&self) -> Vec<String> {
        let map = self.series.read().await;
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }

    /// 指标元信息
    pub async fn metadata(&self, name: &str) -> Option<MetricMetadata> {
        let buffer = self.existing_buffer(name).await?;
        let buf = buffer.read().await;

        let mut tag_keys = BTreeSet::new();
        for sample in buf.iter() {
            for key in sample.tags.keys() {
                tag_keys.insert(key.clone());
            }
        }

        Some(MetricMetadata {
            name: name.to_string(),
            sample_count: buf.len(),
            oldest: buf.front().map(|s| s.timestamp),
            newest: buf.back().map(|s| s.timestamp),
            tag_keys: tag_keys.into_iter().collect(),
        })
    }

    /// 清理所有指标的过期样本，移除空序列
    ///
    /// 写入路径已经裁剪；这里兜底处理不再有写入的冷指标。
    pub async fn cleanup_stale(&self) -> usize {
        let now = Utc::now();
        let buffers: Vec<(String, SeriesBuffer)> = {
            let map = self.series.read().await;
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let mut evicted = 0;
        let mut empty_names = Vec::new();

        for (name, buffer) in buffers {
            let mut buf = buffer.write().await;
            let before = buf.len();
            Self::trim(&mut buf, now, &self.policy);
            evicted += before - buf.len();
            if buf.is_empty() {
                empty_names.push(name);
            }
        }

        if !empty_names.is_empty() {
            let mut map = self.series.write().await;
            for name in &empty_names {
                // 重新检查：裁剪后到这里之间可能又有写入
                if let Some(buffer) = map.get(name) {
                    if buffer.try_read().map(|b| b.is_empty()).unwrap_or(false) {
                        map.remove(name);
                    }
                }
            }
        }

        if evicted > 0 {
            debug!(evicted, "Stale samples cleaned up");
        }

        evicted
    }

    fn trim(buf: &mut VecDeque<MetricSample>, now: DateTime<Utc>, policy: &RetentionPolicy) {
        let cutoff = now - policy.hot_window;
        while let Some(front) = buf.front() {
            if front.timestamp < cutoff {
                buf.pop_front();
            } else {
                break;
            }
        }
        while buf.len() > policy.max_samples_per_metric {
            buf.pop_front();
        }
    }

    async fn buffer_for(&self, name: &str) -> SeriesBuffer {
        if let Some(buffer) = self.existing_buffer(name).await {
            return buffer;
        }
        let mut map = self.series.write().await;
        map.entry(name.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(VecDeque::new())))
            .clone()
    }

    async fn existing_buffer(&self, name: &str) -> Option<SeriesBuffer> {
        let map = self.series.read().await;
        map.get(name).cloned()
    }
}
