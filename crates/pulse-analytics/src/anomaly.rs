use crate::stats::stddev;
use chrono::{DateTime, Utc};
use pulse_store::MetricSample;
use serde::{Deserialize, Serialize};

/// 异常类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AnomalyType {
    /// 高于均值上界
    Spike,
    /// 低于均值下界
    Drop,
}

/// 异常检测结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyDetection {
    pub metric_name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub anomaly_type: AnomalyType,
    /// 偏离程度，|value - mean| / stddev
    pub severity: f64,
    pub description: String,
}

/// 在样本序列上做 `mean ± k·stddev` 阈值检测
///
/// 样本不足两个或序列无波动（stddev 为 0）时不产生异常。
pub fn detect_in_samples(
    metric_name: &str,
    samples: &[MetricSample],
    threshold_stddevs: f64,
) -> Vec<AnomalyDetection> {
    if samples.len() < 2 {
        return Vec::new();
    }

    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let sd = stddev(&values, mean);

    if sd == 0.0 {
        return Vec::new();
    }

    // 边界取闭：恰好偏离 k 个标准差的样本也计入
    let upper = mean + threshold_stddevs * sd;
    let lower = mean - threshold_stddevs * sd;

    samples
        .iter()
        .filter_map(|sample| {
            let anomaly_type = if sample.value >= upper {
                AnomalyType::Spike
            } else if sample.value <= lower {
                AnomalyType::Drop
            } else {
                return None;
            };

            let severity = (sample.value - mean).abs() / sd;
            Some(AnomalyDetection {
                metric_name: metric_name.to_string(),
                value: sample.value,
                timestamp: sample.timestamp,
                anomaly_type,
                severity,
                description: format!(
                    "{} value {:.2} deviates {:.2} stddevs from mean {:.2}",
                    metric_name, sample.value, severity, mean
                ),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: &[f64]) -> Vec<MetricSample> {
        values
            .iter()
            .map(|v| MetricSample::new("cpu", *v))
            .collect()
    }

    #[test]
    fn test_spike_detected() {
        let detections = detect_in_samples("cpu", &samples(&[10.0, 10.0, 10.0, 10.0, 100.0]), 2.0);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].anomaly_type, AnomalyType::Spike);
        assert_eq!(detections[0].value, 100.0);
        assert!(detections[0].severity >= 2.0);
    }

    #[test]
    fn test_drop_detected() {
        let detections = detect_in_samples("cpu", &samples(&[50.0, 50.0, 50.0, 50.0, 1.0]), 1.5);

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].anomaly_type, AnomalyType::Drop);
    }

    #[test]
    fn test_flat_series_has_no_anomalies() {
        let detections = detect_in_samples("cpu", &samples(&[7.0, 7.0, 7.0]), 2.0);
        assert!(detections.is_empty());
    }

    #[test]
    fn test_too_few_samples() {
        let detections = detect_in_samples("cpu", &samples(&[100.0]), 2.0);
        assert!(detections.is_empty());
    }
}
