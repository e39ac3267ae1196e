use crate::anomaly::{self, AnomalyDetection};
use crate::trend::{self, TrendAnalysis};
use chrono::{Duration, Utc};
use pulse_store::MetricStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 回看窗口内的描述统计
///
/// 区间内无样本时所有数值字段为 0，不是错误。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricStatistics {
    pub metric_name: String,
    pub average: f64,
    pub max: f64,
    pub min: f64,
    pub stddev: f64,
    pub count: usize,
    pub sum: f64,
}

impl MetricStatistics {
    fn empty(metric_name: &str) -> Self {
        Self {
            metric_name: metric_name.to_string(),
            average: 0.0,
            max: 0.0,
            min: 0.0,
            stddev: 0.0,
            count: 0,
            sum: 0.0,
        }
    }
}

/// 统计分析器
pub struct StatsAnalyzer {
    store: Arc<MetricStore>,
}

impl StatsAnalyzer {
    pub fn new(store: Arc<MetricStore>) -> Self {
        Self { store }
    }

    /// 回看窗口内的均值/极值/标准差/计数/总和
    pub async fn statistics(&self, name: &str, lookback: Duration) -> MetricStatistics {
        let since = Utc::now() - lookback;
        let samples = self.store.query(name, since).await;

        if samples.is_empty() {
            return MetricStatistics::empty(name);
        }

        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let sum: f64 = values.iter().sum();
        let average = sum / values.len() as f64;

        MetricStatistics {
            metric_name: name.to_string(),
            average,
            max: values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            min: values.iter().cloned().fold(f64::INFINITY, f64::min),
            stddev: stddev(&values, average),
            count: values.len(),
            sum,
        }
    }

    /// 最近邻名次法百分位数
    ///
    /// `index = ceil(p/100 * n) - 1`，钳制到 `[0, n-1]`；
    /// 返回值与入参百分位一一对应。区间为空时返回空列表。
    pub async fn percentiles(
        &self,
        name: &str,
        percentiles: &[f64],
        lookback: Duration,
    ) -> Vec<(f64, f64)> {
        let since = Utc::now() - lookback;
        let samples = self.store.query(name, since).await;

        if samples.is_empty() {
            return Vec::new();
        }

        let mut values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        // 非有限值在写入时已被拒绝
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let n = values.len();
        percentiles
            .iter()
            .map(|&p| {
                let rank = (p / 100.0 * n as f64).ceil() as isize - 1;
                let idx = rank.clamp(0, n as isize - 1) as usize;
                (p, values[idx])
            })
            .collect()
    }

    /// 最小二乘趋势分析
    pub async fn analyze_trend(&self, name: &str, lookback: Duration) -> TrendAnalysis {
        let since = Utc::now() - lookback;
        let samples = self.store.query(name, since).await;
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        trend::analyze_values(name, &values)
    }

    /// 阈值标准差异常检测
    pub async fn detect_anomalies(
        &self,
        name: &str,
        threshold_stddevs: f64,
        lookback: Duration,
    ) -> Vec<AnomalyDetection> {
        let since = Utc::now() - lookback;
        let samples = self.store.query(name, since).await;
        anomaly::detect_in_samples(name, &samples, threshold_stddevs)
    }
}

/// 总体标准差
pub(crate) fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_store::{MetricSample, RetentionPolicy};

    async fn store_with(values: &[f64]) -> Arc<MetricStore> {
        let store = Arc::new(MetricStore::new(RetentionPolicy::default()));
        let now = Utc::now();
        for (i, value) in values.iter().enumerate() {
            store
                .record_sample(
                    MetricSample::new("cpu", *value)
                        .with_timestamp(now - Duration::seconds((values.len() - i) as i64)),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_statistics() {
        let analyzer = StatsAnalyzer::new(store_with(&[10.0, 20.0, 30.0]).await);
        let stats = analyzer.statistics("cpu", Duration::minutes(5)).await;

        assert_eq!(stats.count, 3);
        assert_eq!(stats.average, 20.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.sum, 60.0);
        assert!((stats.stddev - 8.164965809).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_statistics_zero_filled_when_empty() {
        let store = Arc::new(MetricStore::new(RetentionPolicy::default()));
        let analyzer = StatsAnalyzer::new(store);
        let stats = analyzer.statistics("missing", Duration::minutes(5)).await;

        assert_eq!(stats.count, 0);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.max, 0.0);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.stddev, 0.0);
        assert_eq!(stats.sum, 0.0);
    }

    #[tokio::test]
    async fn test_nearest_rank_percentile() {
        let analyzer = StatsAnalyzer::new(store_with(&[40.0, 10.0, 30.0, 20.0]).await);
        let result = analyzer
            .percentiles("cpu", &[50.0, 100.0], Duration::minutes(5))
            .await;

        // ceil(0.5 * 4) - 1 = 1 → 排序后第二个值
        assert_eq!(result[0], (50.0, 20.0));
        assert_eq!(result[1], (100.0, 40.0));
    }

    #[tokio::test]
    async fn test_percentile_index_clamped() {
        let analyzer = StatsAnalyzer::new(store_with(&[5.0]).await);
        let result = analyzer
            .percentiles("cpu", &[0.0, 99.9], Duration::minutes(5))
            .await;

        assert_eq!(result[0], (0.0, 5.0));
        assert_eq!(result[1], (99.9, 5.0));
    }
}
