use chrono::{DateTime, Duration, Utc};
use pulse_store::MetricStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 聚合类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationType {
    Avg,
    Max,
    Min,
    Sum,
    Count,
    /// 调用方提供归约函数
    Custom,
}

impl AggregationType {
    /// 宽松解析：无法识别的字符串回退为 AVG，只记一条警告
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "avg" | "average" | "mean" => Self::Avg,
            "max" => Self::Max,
            "min" => Self::Min,
            "sum" => Self::Sum,
            "count" => Self::Count,
            other => {
                warn!(aggregation = %other, "Unknown aggregation type, falling back to AVG");
                Self::Avg
            }
        }
    }
}

impl std::fmt::Display for AggregationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Avg => "avg",
            Self::Max => "max",
            Self::Min => "min",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

/// 窗口聚合结果
///
/// 每次聚合调用重新计算，不落盘。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetric {
    pub metric_name: String,
    pub value: f64,
    pub aggregation: AggregationType,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub sample_count: usize,
}

/// 窗口聚合器
pub struct Aggregator {
    store: Arc<MetricStore>,
}

impl Aggregator {
    pub fn new(store: Arc<MetricStore>) -> Self {
        Self { store }
    }

    /// 固定窗口聚合，窗口为半开区间 `(now-window, now]`
    ///
    /// 窗口内无样本时返回 `None`，不发出零值。
    pub async fn aggregate_window(
        &self,
        name: &str,
        window: Duration,
        aggregation: AggregationType,
    ) -> Option<AggregatedMetric> {
        let now = Utc::now();
        aggregate_at(&self.store, name, window, aggregation, now).await
    }

    /// 自定义归约函数的窗口聚合
    pub async fn aggregate_custom<F>(
        &self,
        name: &str,
        window: Duration,
        reducer: F,
    ) -> Option<AggregatedMetric>
    where
        F: Fn(&[f64]) -> f64,
    {
        let now = Utc::now();
        let start = now - window;
        let samples = self.store.query_range(name, start, now).await;

        if samples.is_empty() {
            return None;
        }

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        Some(AggregatedMetric {
            metric_name: name.to_string(),
            value: reducer(&values),
            aggregation: AggregationType::Custom,
            window_start: start,
            window_end: now,
            sample_count: samples.len(),
        })
    }

    /// 滑动窗口聚合流
    ///
    /// 每经过一个 `slide` 周期重新计算一次窗口并向有界通道发送
    /// （通道满时产生背压）。取消方式：丢弃接收端或调用
    /// [`SlidingWindowStream::cancel`]。空窗口不发送。
    pub fn sliding_window(
        &self,
        name: impl Into<String>,
        window: Duration,
        slide: std::time::Duration,
        aggregation: AggregationType,
        capacity: usize,
    ) -> SlidingWindowStream {
        let name = name.into();
        let store = self.store.clone();
        let (tx, rx) = mpsc::channel(capacity);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(slide);
            // 第一个 tick 立即到来，跳过以保证首次发射在一个完整周期后
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let now = Utc::now();
                if let Some(aggregated) =
                    aggregate_at(&store, &name, window, aggregation, now).await
                {
                    if tx.send(aggregated).await.is_err() {
                        debug!(metric = %name, "Sliding window receiver dropped, stopping");
                        break;
                    }
                }
            }
        });

        SlidingWindowStream {
            receiver: rx,
            handle,
        }
    }
}

/// 滑动窗口流句柄
pub struct SlidingWindowStream {
    receiver: mpsc::Receiver<AggregatedMetric>,
    handle: JoinHandle<()>,
}

impl SlidingWindowStream {
    /// 接收下一个聚合结果；流被取消后返回 `None`
    pub async fn recv(&mut self) -> Option<AggregatedMetric> {
        self.receiver.recv().await
    }

    /// 停止发射并释放定时器
    pub fn cancel(self) {
        self.handle.abort();
    }
}

async fn aggregate_at(
    store: &MetricStore,
    name: &str,
    window: Duration,
    aggregation: AggregationType,
    now: DateTime<Utc>,
) -> Option<AggregatedMetric> {
    let start = now - window;
    let samples = store.query_range(name, start, now).await;

    if samples.is_empty() {
        return None;
    }

    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    Some(AggregatedMetric {
        metric_name: name.to_string(),
        value: reduce(&values, aggregation),
        aggregation,
        window_start: start,
        window_end: now,
        sample_count: samples.len(),
    })
}

fn reduce(values: &[f64], aggregation: AggregationType) -> f64 {
    match aggregation {
        AggregationType::Avg | AggregationType::Custom => {
            values.iter().sum::<f64>() / values.len() as f64
        }
        AggregationType::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        AggregationType::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
        AggregationType::Sum => values.iter().sum(),
        AggregationType::Count => values.len() as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_store::{MetricSample, RetentionPolicy};

    async fn store_with(values: &[(f64, i64)]) -> Arc<MetricStore> {
        let store = Arc::new(MetricStore::new(RetentionPolicy::default()));
        let now = Utc::now();
        for (value, age_secs) in values {
            store
                .record_sample(
                    MetricSample::new("cpu", *value)
                        .with_timestamp(now - Duration::seconds(*age_secs)),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_avg_equals_arithmetic_mean() {
        let store = store_with(&[(10.0, 30), (20.0, 20), (30.0, 10)]).await;
        let aggregator = Aggregator::new(store);

        let result = aggregator
            .aggregate_window("cpu", Duration::seconds(60), AggregationType::Avg)
            .await
            .unwrap();

        assert_eq!(result.value, 20.0);
        assert_eq!(result.sample_count, 3);
        assert_eq!(result.aggregation, AggregationType::Avg);
    }

    #[tokio::test]
    async fn test_window_excludes_old_samples() {
        let store = store_with(&[(100.0, 120), (10.0, 5)]).await;
        let aggregator = Aggregator::new(store);

        let result = aggregator
            .aggregate_window("cpu", Duration::seconds(60), AggregationType::Avg)
            .await
            .unwrap();

        assert_eq!(result.value, 10.0);
        assert_eq!(result.sample_count, 1);
    }

    #[tokio::test]
    async fn test_empty_window_returns_none() {
        let store = Arc::new(MetricStore::new(RetentionPolicy::default()));
        let aggregator = Aggregator::new(store);

        let result = aggregator
            .aggregate_window("cpu", Duration::seconds(60), AggregationType::Avg)
            .await;

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_min_max_sum_count() {
        let store = store_with(&[(5.0, 30), (15.0, 20), (10.0, 10)]).await;
        let aggregator = Aggregator::new(store);
        let window = Duration::seconds(60);

        let max = aggregator
            .aggregate_window("cpu", window, AggregationType::Max)
            .await
            .unwrap();
        assert_eq!(max.value, 15.0);

        let min = aggregator
            .aggregate_window("cpu", window, AggregationType::Min)
            .await
            .unwrap();
        assert_eq!(min.value, 5.0);

        let sum = aggregator
            .aggregate_window("cpu", window, AggregationType::Sum)
            .await
            .unwrap();
        assert_eq!(sum.value, 30.0);

        let count = aggregator
            .aggregate_window("cpu", window, AggregationType::Count)
            .await
            .unwrap();
        assert_eq!(count.value, 3.0);
    }

    #[tokio::test]
    async fn test_custom_reducer() {
        let store = store_with(&[(5.0, 30), (15.0, 10)]).await;
        let aggregator = Aggregator::new(store);

        // 极差
        let result = aggregator
            .aggregate_custom("cpu", Duration::seconds(60), |values| {
                let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
                max - min
            })
            .await
            .unwrap();

        assert_eq!(result.value, 10.0);
        assert_eq!(result.aggregation, AggregationType::Custom);
    }

    #[test]
    fn test_lenient_parse_falls_back_to_avg() {
        assert_eq!(AggregationType::parse("max"), AggregationType::Max);
        assert_eq!(AggregationType::parse("AVERAGE"), AggregationType::Avg);
        assert_eq!(AggregationType::parse("median"), AggregationType::Avg);
    }

    #[tokio::test]
    async fn test_sliding_window_emits_and_cancels() {
        let store = Arc::new(MetricStore::new(RetentionPolicy::default()));
        store
            .record_sample(MetricSample::new("cpu", 50.0))
            .await
            .unwrap();
        let aggregator = Aggregator::new(store.clone());

        let mut stream = aggregator.sliding_window(
            "cpu",
            Duration::seconds(60),
            std::time::Duration::from_millis(20),
            AggregationType::Avg,
            4,
        );

        let first = tokio::time::timeout(std::time::Duration::from_secs(1), stream.recv())
            .await
            .expect("timed out waiting for sliding emission")
            .expect("stream closed unexpectedly");
        assert_eq!(first.value, 50.0);

        stream.cancel();
    }
}
