use serde::{Deserialize, Serialize};

/// 趋势方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// 趋势置信度，来自相关系数绝对值
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendConfidence {
    High,
    Medium,
    Low,
}

/// 趋势分析结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub metric_name: String,
    pub trend: TrendDirection,
    pub slope: f64,
    pub correlation: f64,
    pub confidence: TrendConfidence,
}

/// 对有序取值序列做最小二乘回归
///
/// 自变量取序列下标而非时钟，保证回归尺度与采样间隔无关。
/// 少于两个点时返回 STABLE/LOW 哨兵值。
pub fn analyze_values(metric_name: &str, values: &[f64]) -> TrendAnalysis {
    if values.len() < 2 {
        return TrendAnalysis {
            metric_name: metric_name.to_string(),
            trend: TrendDirection::Stable,
            slope: 0.0,
            correlation: 0.0,
            confidence: TrendConfidence::Low,
        };
    }

    let n = values.len() as f64;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_xy = 0.0;
    let mut sum_x2 = 0.0;
    let mut sum_y2 = 0.0;

    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
        sum_y2 += y * y;
    }

    let denom = n * sum_x2 - sum_x * sum_x;
    let slope = if denom.abs() < f64::EPSILON {
        0.0
    } else {
        (n * sum_xy - sum_x * sum_y) / denom
    };

    let corr_denom = (n * sum_x2 - sum_x * sum_x).sqrt() * (n * sum_y2 - sum_y * sum_y).sqrt();
    let correlation = if corr_denom.abs() < f64::EPSILON {
        0.0
    } else {
        (n * sum_xy - sum_x * sum_y) / corr_denom
    };

    let trend = if slope > 0.1 {
        TrendDirection::Increasing
    } else if slope < -0.1 {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    let confidence = if correlation.abs() > 0.8 {
        TrendConfidence::High
    } else if correlation.abs() > 0.5 {
        TrendConfidence::Medium
    } else {
        TrendConfidence::Low
    };

    TrendAnalysis {
        metric_name: metric_name.to_string(),
        trend,
        slope,
        correlation,
        confidence,
    }
}
