use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use pulse_alert::{AlertEngine, EvaluationSummary};

/// 引擎运行计数
///
/// Registry 由实例持有，不注册任何全局单例。
pub struct OpsMetrics {
    samples_ingested_total: IntCounter,
    rule_evaluations_total: IntCounter,
    alerts_triggered_total: IntCounter,
    sample_mirror_failures_total: IntCounter,

    // 告警引擎内部计数在导出时同步
    evaluation_failures: IntGauge,
    notification_failures: IntGauge,
    alert_persistence_failures: IntGauge,

    registry: Registry,
}

impl OpsMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let samples_ingested_total = IntCounter::new(
            "pulse_samples_ingested_total",
            "Total number of metric samples ingested",
        )?;
        registry.register(Box::new(samples_ingested_total.clone()))?;

        let rule_evaluations_total = IntCounter::new(
            "pulse_rule_evaluations_total",
            "Total number of alert rule evaluations",
        )?;
        registry.register(Box::new(rule_evaluations_total.clone()))?;

        let alerts_triggered_total = IntCounter::new(
            "pulse_alerts_triggered_total",
            "Total number of alert events triggered",
        )?;
        registry.register(Box::new(alerts_triggered_total.clone()))?;

        let sample_mirror_failures_total = IntCounter::new(
            "pulse_sample_mirror_failures_total",
            "Total number of failed sample mirror writes",
        )?;
        registry.register(Box::new(sample_mirror_failures_total.clone()))?;

        let evaluation_failures = IntGauge::new(
            "pulse_rule_evaluation_failures",
            "Number of isolated rule evaluation failures",
        )?;
        registry.register(Box::new(evaluation_failures.clone()))?;

        let notification_failures = IntGauge::new(
            "pulse_notification_failures",
            "Number of failed notification deliveries",
        )?;
        registry.register(Box::new(notification_failures.clone()))?;

        let alert_persistence_failures = IntGauge::new(
            "pulse_alert_persistence_failures",
            "Number of failed alert mirror writes",
        )?;
        registry.register(Box::new(alert_persistence_failures.clone()))?;

        Ok(Self {
            samples_ingested_total,
            rule_evaluations_total,
            alerts_triggered_total,
            sample_mirror_failures_total,
            evaluation_failures,
            notification_failures,
            alert_persistence_failures,
            registry,
        })
    }

    pub fn inc_samples_ingested(&self, count: u64) {
        self.samples_ingested_total.inc_by(count);
    }

    pub fn inc_sample_mirror_failure(&self) {
        self.sample_mirror_failures_total.inc();
    }

    pub fn record_sweep(&self, summary: &EvaluationSummary) {
        self.rule_evaluations_total.inc_by(summary.evaluated as u64);
        self.alerts_triggered_total.inc_by(summary.triggered as u64);
    }

    /// 同步告警引擎内部计数后导出文本格式
    pub fn export(&self, alerts: &AlertEngine) -> Result<String, prometheus::Error> {
        self.evaluation_failures
            .set(alerts.evaluation_failure_count() as i64);
        self.notification_failures
            .set(alerts.notification_failure_count() as i64);
        self.alert_persistence_failures
            .set(alerts.persistence_failure_count() as i64);

        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).unwrap_or_default())
    }
}
