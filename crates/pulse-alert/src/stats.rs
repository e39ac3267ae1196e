use crate::engine::AlertEngine;
use crate::model::{AlertEvent, AlertStatus};
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 历史告警的汇总统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertStatistics {
    pub total: usize,
    pub by_status: HashMap<String, usize>,
    pub by_severity: HashMap<String, usize>,
    pub avg_response_time_ms: f64,
    pub avg_resolution_time_ms: f64,
}

/// 告警趋势方向，来自前后半段计数差
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertTrendDirection {
    Rising,
    Falling,
    Flat,
}

/// 按天聚合的告警数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertTrendPoint {
    pub date: NaiveDate,
    pub count: usize,
}

/// 告警趋势
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertTrend {
    pub points: Vec<AlertTrendPoint>,
    pub direction: AlertTrendDirection,
}

/// 处理效率指标
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEfficiency {
    pub total: usize,
    pub acknowledged_ratio: f64,
    pub resolved_ratio: f64,
    pub avg_response_time_ms: f64,
    pub avg_resolution_time_ms: f64,
}

/// 按状态/级别计数，平均响应与解决时长
pub fn statistics(events: &[AlertEvent]) -> AlertStatistics {
    let mut by_status: HashMap<String, usize> = HashMap::new();
    let mut by_severity: HashMap<String, usize> = HashMap::new();

    for event in events {
        *by_status.entry(event.status.to_string()).or_insert(0) += 1;
        *by_severity.entry(event.severity.to_string()).or_insert(0) += 1;
    }

    AlertStatistics {
        total: events.len(),
        by_status,
        by_severity,
        avg_response_time_ms: average(events.iter().filter_map(|e| e.response_time_ms)),
        avg_resolution_time_ms: average(events.iter().filter_map(|e| e.resolution_time_ms)),
    }
}

/// 最近 `days` 天按天分桶的触发计数
///
/// 方向信号取后半段与前半段计数之差。
pub fn trend(events: &[AlertEvent], days: u32) -> AlertTrend {
    let today = Utc::now().date_naive();
    let days = days.max(1);

    let mut counts: HashMap<NaiveDate, usize> = HashMap::new();
    for event in events {
        *counts.entry(event.triggered_at.date_naive()).or_insert(0) += 1;
    }

    let points: Vec<AlertTrendPoint> = (0..days)
        .map(|offset| {
            let date = today - Duration::days((days - 1 - offset) as i64);
            AlertTrendPoint {
                count: counts.get(&date).copied().unwrap_or(0),
                date,
            }
        })
        .collect();

    let half = points.len() / 2;
    let first: usize = points[..half].iter().map(|p| p.count).sum();
    let second: usize = points[points.len() - half..].iter().map(|p| p.count).sum();

    let direction = if second > first {
        AlertTrendDirection::Rising
    } else if second < first {
        AlertTrendDirection::Falling
    } else {
        AlertTrendDirection::Flat
    };

    AlertTrend { points, direction }
}

/// 确认率、解决率与平均处理时长
pub fn efficiency(events: &[AlertEvent]) -> AlertEfficiency {
    let total = events.len();
    if total == 0 {
        return AlertEfficiency {
            total: 0,
            acknowledged_ratio: 0.0,
            resolved_ratio: 0.0,
            avg_response_time_ms: 0.0,
            avg_resolution_time_ms: 0.0,
        };
    }

    let acknowledged = events.iter().filter(|e| e.acknowledged_at.is_some()).count();
    let resolved = events
        .iter()
        .filter(|e| e.status == AlertStatus::Resolved)
        .count();

    AlertEfficiency {
        total,
        acknowledged_ratio: acknowledged as f64 / total as f64,
        resolved_ratio: resolved as f64 / total as f64,
        avg_response_time_ms: average(events.iter().filter_map(|e| e.response_time_ms)),
        avg_resolution_time_ms: average(events.iter().filter_map(|e| e.resolution_time_ms)),
    }
}

fn average(values: impl Iterator<Item = i64>) -> f64 {
    let collected: Vec<i64> = values.collect();
    if collected.is_empty() {
        return 0.0;
    }
    collected.iter().sum::<i64>() as f64 / collected.len() as f64
}

impl AlertEngine {
    /// 历史环上的汇总统计
    pub async fn alert_statistics(&self) -> AlertStatistics {
        statistics(&self.history_snapshot().await)
    }

    /// 最近 `days` 天的告警趋势
    pub async fn alert_trend(&self, days: u32) -> AlertTrend {
        trend(&self.history_snapshot().await, days)
    }

    /// 告警处理效率
    pub async fn alert_efficiency(&self) -> AlertEfficiency {
        efficiency(&self.history_snapshot().await)
    }
}
