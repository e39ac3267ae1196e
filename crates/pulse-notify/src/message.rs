use chrono::{DateTime, Utc};
use pulse_core::AlertSeverity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 告警通知消息
///
/// 告警引擎触发事件后投递到各通知渠道的载体。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    /// 告警事件 ID
    pub alert_id: String,

    /// 触发规则 ID，人工触发为 "MANUAL"
    pub rule_id: String,

    /// 规则名称
    pub rule_name: String,

    /// 告警类别
    pub alert_type: String,

    /// 级别
    pub severity: AlertSeverity,

    /// 消息正文
    pub message: String,

    /// 指标名
    pub metric_name: String,

    /// 触发时的指标值
    pub metric_value: f64,

    /// 规则阈值
    pub threshold: f64,

    /// 触发时间
    pub triggered_at: DateTime<Utc>,

    /// 上下文
    pub context: HashMap<String, String>,
}

impl AlertMessage {
    /// 渲染为纯文本摘要，供日志和邮件正文使用
    pub fn summary(&self) -> String {
        let mut body = format!("Alert: {}\n\n", self.rule_name);
        body.push_str(&format!("Severity: {}\n", self.severity));
        body.push_str(&format!("Metric: {}\n", self.metric_name));
        body.push_str(&format!(
            "Value: {:.2} (threshold {:.2})\n",
            self.metric_value, self.threshold
        ));
        body.push_str(&format!("Message: {}\n", self.message));
        body.push_str(&format!("Triggered at: {}\n", self.triggered_at));

        if !self.context.is_empty() {
            body.push_str("\nContext:\n");
            for (k, v) in &self.context {
                body.push_str(&format!("  {}: {}\n", k, v));
            }
        }

        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_contains_fields() {
        let mut context = HashMap::new();
        context.insert("host".to_string(), "node-1".to_string());

        let message = AlertMessage {
            alert_id: "a1".to_string(),
            rule_id: "r1".to_string(),
            rule_name: "high_cpu".to_string(),
            alert_type: "threshold".to_string(),
            severity: AlertSeverity::Critical,
            message: "CPU usage is 95%".to_string(),
            metric_name: "cpu_usage".to_string(),
            metric_value: 95.0,
            threshold: 80.0,
            triggered_at: Utc::now(),
            context,
        };

        let summary = message.summary();
        assert!(summary.contains("high_cpu"));
        assert!(summary.contains("critical"));
        assert!(summary.contains("host: node-1"));
    }
}
