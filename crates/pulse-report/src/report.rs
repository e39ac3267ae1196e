use chrono::{DateTime, Duration, Utc};
use pulse_alert::{AlertEngine, AlertEvent, AlertStatistics};
use pulse_analytics::{MetricStatistics, StatsAnalyzer, TrendAnalysis};
use pulse_core::AlertSeverity;
use pulse_store::MetricStore;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// 报表类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Summary,
    Performance,
    Alerts,
}

impl FromStr for ReportKind {
    type Err = pulse_core::PulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "performance" => Ok(Self::Performance),
            "alerts" => Ok(Self::Alerts),
            other => Err(pulse_core::PulseError::Validation(format!(
                "unknown report kind: {}",
                other
            ))),
        }
    }
}

/// 单个指标的表现
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricPerformance {
    pub name: String,
    pub statistics: MetricStatistics,
    pub trend: TrendAnalysis,
}

/// 性能报表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub window_secs: i64,
    pub metrics: Vec<MetricPerformance>,
}

/// 告警报表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertReport {
    pub generated_at: DateTime<Utc>,
    pub window_secs: i64,
    pub min_severity: Option<AlertSeverity>,
    pub events: Vec<AlertEvent>,
    pub statistics: AlertStatistics,
}

/// 总览报表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryReport {
    pub generated_at: DateTime<Utc>,
    pub window_secs: i64,
    pub metric_count: usize,
    pub metrics: Vec<MetricStatistics>,
    pub active_alerts: usize,
    pub alert_statistics: AlertStatistics,
}

/// 报表
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Report {
    Summary(SummaryReport),
    Performance(PerformanceReport),
    Alerts(AlertReport),
}

/// 报表构建器
///
/// 纯读侧组合，不改动任何引擎状态。
pub struct ReportBuilder {
    store: Arc<MetricStore>,
    analyzer: StatsAnalyzer,
    alerts: Arc<AlertEngine>,
}

impl ReportBuilder {
    pub fn new(store: Arc<MetricStore>, alerts: Arc<AlertEngine>) -> Self {
        Self {
            analyzer: StatsAnalyzer::new(store.clone()),
            store,
            alerts,
        }
    }

    /// 按类型生成报表
    pub async fn generate_report(&self, kind: ReportKind, range: Duration) -> Report {
        match kind {
            ReportKind::Summary => Report::Summary(self.generate_summary_report(range).await),
            ReportKind::Performance => {
                Report::Performance(self.generate_performance_report(range).await)
            }
            ReportKind::Alerts => Report::Alerts(self.generate_alert_report(None, range).await),
        }
    }

    /// 全指标统计与趋势
    pub async fn generate_performance_report(&self, range: Duration) -> PerformanceReport {
        let names = self.store.metric_names().await;
        let mut metrics = Vec::with_capacity(names.len());

        for name in names {
            metrics.push(MetricPerformance {
                statistics: self.analyzer.statistics(&name, range).await,
                trend: self.analyzer.analyze_trend(&name, range).await,
                name,
            });
        }

        debug!(metric_count = metrics.len(), "Performance report generated");
        PerformanceReport {
            generated_at: Utc::now(),
            window_secs: range.num_seconds(),
            metrics,
        }
    }

    /// 按级别过滤的告警报表
    pub async fn generate_alert_report(
        &self,
        min_severity: Option<AlertSeverity>,
        range: Duration,
    ) -> AlertReport {
        let since = Utc::now() - range;
        let events: Vec<AlertEvent> = self
            .alerts
            .history_snapshot()
            .await
            .into_iter()
            .filter(|e| e.triggered_at > since)
            .filter(|e| min_severity.map(|min| e.severity >= min).unwrap_or(true))
            .collect();

        let statistics = pulse_alert::stats::statistics(&events);

        AlertReport {
            generated_at: Utc::now(),
            window_secs: range.num_seconds(),
            min_severity,
            events,
            statistics,
        }
    }

    /// 指标与告警的总览
    pub async fn generate_summary_report(&self, range: Duration) -> SummaryReport {
        let names = self.store.metric_names().await;
        let mut metrics = Vec::with_capacity(names.len());
        for name in &names {
            metrics.push(self.analyzer.statistics(name, range).await);
        }

        SummaryReport {
            generated_at: Utc::now(),
            window_secs: range.num_seconds(),
            metric_count: names.len(),
            metrics,
            active_alerts: self.alerts.active_alerts().await.len(),
            alert_statistics: self.alerts.alert_statistics().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_alert::{AlertRule, CompareOp};
    use pulse_notify::NotifyManager;
    use pulse_store::{MetricSample, RetentionPolicy};
    use std::collections::HashMap;

    async fn setup() -> (ReportBuilder, Arc<MetricStore>, Arc<AlertEngine>) {
        let store = Arc::new(MetricStore::new(RetentionPolicy::default()));
        let alerts = Arc::new(AlertEngine::new(
            store.clone(),
            Arc::new(NotifyManager::new()),
        ));
        (
            ReportBuilder::new(store.clone(), alerts.clone()),
            store,
            alerts,
        )
    }

    #[tokio::test]
    async fn test_performance_report_covers_all_metrics() {
        let (builder, store, _) = setup().await;

        for value in [1.0, 2.0, 3.0] {
            store
                .record_sample(MetricSample::new("cpu", value))
                .await
                .unwrap();
        }
        store
            .record_sample(MetricSample::new("mem", 512.0))
            .await
            .unwrap();

        let report = builder.generate_performance_report(Duration::minutes(5)).await;
        assert_eq!(report.metrics.len(), 2);

        let cpu = report.metrics.iter().find(|m| m.name == "cpu").unwrap();
        assert_eq!(cpu.statistics.count, 3);
        assert_eq!(cpu.statistics.average, 2.0);
    }

    #[tokio::test]
    async fn test_alert_report_filters_by_severity() {
        let (builder, _, alerts) = setup().await;

        let critical = AlertRule {
            name: "critical_rule".to_string(),
            metric_name: "cpu".to_string(),
            operator: CompareOp::Gt,
            threshold: 80.0,
            severity: AlertSeverity::Critical,
            cooldown_secs: 0,
            ..Default::default()
        };
        let info = AlertRule {
            name: "info_rule".to_string(),
            severity: AlertSeverity::Info,
            ..critical.clone()
        };

        let critical = alerts.create_rule(critical).await.unwrap();
        let info = alerts.create_rule(info).await.unwrap();
        alerts
            .trigger_alert(&critical.id, 90.0, HashMap::new())
            .await
            .unwrap();
        alerts
            .trigger_alert(&info.id, 90.0, HashMap::new())
            .await
            .unwrap();

        let all = builder
            .generate_alert_report(None, Duration::hours(1))
            .await;
        assert_eq!(all.events.len(), 2);

        let filtered = builder
            .generate_alert_report(Some(AlertSeverity::Warning), Duration::hours(1))
            .await;
        assert_eq!(filtered.events.len(), 1);
        assert_eq!(filtered.events[0].severity, AlertSeverity::Critical);
    }

    #[tokio::test]
    async fn test_summary_report() {
        let (builder, store, _) = setup().await;
        store
            .record_sample(MetricSample::new("cpu", 10.0))
            .await
            .unwrap();

        let report = builder
            .generate_report(ReportKind::Summary, Duration::minutes(5))
            .await;

        match report {
            Report::Summary(summary) => {
                assert_eq!(summary.metric_count, 1);
                assert_eq!(summary.active_alerts, 0);
            }
            other => panic!("unexpected report variant: {:?}", other),
        }
    }
}
