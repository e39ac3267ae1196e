use chrono::{DateTime, Duration, Utc};
use pulse_core::{AlertSeverity, PulseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// 人工触发事件的保留规则 ID
pub const MANUAL_RULE_ID: &str = "MANUAL";

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn check(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Gt => value > threshold,
            Self::Lt => value < threshold,
            Self::Ge => value >= threshold,
            Self::Le => value <= threshold,
            Self::Eq => (value - threshold).abs() < f64::EPSILON,
            Self::Ne => (value - threshold).abs() >= f64::EPSILON,
        }
    }
}

impl FromStr for CompareOp {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            ">" | "gt" | "greater_than" => Ok(Self::Gt),
            "<" | "lt" | "less_than" => Ok(Self::Lt),
            ">=" | "gte" | "greater_equal" => Ok(Self::Ge),
            "<=" | "lte" | "less_equal" => Ok(Self::Le),
            "==" | "eq" | "equal" => Ok(Self::Eq),
            "!=" | "ne" | "not_equal" => Ok(Self::Ne),
            other => Err(PulseError::Validation(format!(
                "unknown compare operator: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        };
        write!(f, "{}", s)
    }
}

/// 告警规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    /// 规则 ID
    pub id: String,

    /// 规则名称（不要求唯一）
    pub name: String,

    /// 规则描述
    pub description: String,

    /// 告警类别，用于渠道过滤
    pub alert_type: String,

    /// 监控的指标名
    pub metric_name: String,

    /// 比较运算符
    pub operator: CompareOp,

    /// 阈值
    pub threshold: f64,

    /// 级别
    pub severity: AlertSeverity,

    /// 是否启用
    pub enabled: bool,

    /// 冷却期（秒），同一规则两次触发的最小间隔
    pub cooldown_secs: u64,

    /// 告警消息模板，空则自动生成
    pub message: String,

    /// 元数据
    pub metadata: HashMap<String, String>,

    /// 创建时间
    pub created_at: DateTime<Utc>,

    /// 更新时间
    pub updated_at: DateTime<Utc>,

    /// 创建者
    pub created_by: String,

    /// 最后修改者
    pub updated_by: String,
}

impl Default for AlertRule {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            description: String::new(),
            alert_type: "threshold".to_string(),
            metric_name: String::new(),
            operator: CompareOp::Gt,
            threshold: 0.0,
            severity: AlertSeverity::Warning,
            enabled: true,
            cooldown_secs: 300,
            message: String::new(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: "system".to_string(),
            updated_by: "system".to_string(),
        }
    }
}

impl AlertRule {
    /// 校验规则是否可用
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PulseError::Validation("rule name is empty".to_string()));
        }
        if self.metric_name.trim().is_empty() {
            return Err(PulseError::Validation(format!(
                "rule {} has no metric name",
                self.name
            )));
        }
        if !self.threshold.is_finite() {
            return Err(PulseError::Validation(format!(
                "rule {} threshold is not finite",
                self.name
            )));
        }
        Ok(())
    }

    /// 渲染告警消息
    pub fn render_message(&self, value: f64) -> String {
        if self.message.is_empty() {
            format!(
                "{}: {} {} {:.2} (current {:.2})",
                self.name, self.metric_name, self.operator, self.threshold, value
            )
        } else {
            self.message.clone()
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::seconds(self.cooldown_secs as i64)
    }
}

/// 告警事件状态
///
/// 只进不退：ACTIVE → ACKNOWLEDGED → RESOLVED，确认可跳过。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Suppressed,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "ACTIVE",
            Self::Acknowledged => "ACKNOWLEDGED",
            Self::Resolved => "RESOLVED",
            Self::Suppressed => "SUPPRESSED",
        };
        write!(f, "{}", s)
    }
}

/// 告警事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub message: String,
    pub metric_name: String,
    pub metric_value: f64,
    pub threshold: f64,
    pub context: HashMap<String, String>,
    pub triggered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_by: Option<String>,
    pub acknowledgment_comment: Option<String>,
    pub resolution: Option<String>,
    /// 触发到确认的毫秒数
    pub response_time_ms: Option<i64>,
    /// 触发到解决的毫秒数
    pub resolution_time_ms: Option<i64>,
}

impl AlertEvent {
    /// 由规则触发构建
    pub fn from_rule(rule: &AlertRule, value: f64, context: HashMap<String, String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            alert_type: rule.alert_type.clone(),
            severity: rule.severity,
            status: AlertStatus::Active,
            message: rule.render_message(value),
            metric_name: rule.metric_name.clone(),
            metric_value: value,
            threshold: rule.threshold,
            context,
            triggered_at: Utc::now(),
            acknowledged_at: None,
            resolved_at: None,
            acknowledged_by: None,
            resolved_by: None,
            acknowledgment_comment: None,
            resolution: None,
            response_time_ms: None,
            resolution_time_ms: None,
        }
    }

    /// 人工触发构建，规则 ID 固定为 "MANUAL"
    pub fn manual(
        name: &str,
        severity: AlertSeverity,
        message: &str,
        metric_name: &str,
        value: f64,
        context: HashMap<String, String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: MANUAL_RULE_ID.to_string(),
            rule_name: name.to_string(),
            alert_type: "manual".to_string(),
            severity,
            status: AlertStatus::Active,
            message: message.to_string(),
            metric_name: metric_name.to_string(),
            metric_value: value,
            threshold: 0.0,
            context,
            triggered_at: Utc::now(),
            acknowledged_at: None,
            resolved_at: None,
            acknowledged_by: None,
            resolved_by: None,
            acknowledgment_comment: None,
            resolution: None,
            response_time_ms: None,
            resolution_time_ms: None,
        }
    }
}

/// 规则抑制
///
/// 过期采用惰性判定：只在读取/评估时核对 `expires_at`，
/// 不做后台清扫。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSuppression {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub reason: String,
    pub duration_secs: u64,
    pub suppressed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub suppressed_by: String,
    pub active: bool,
}

impl AlertSuppression {
    pub fn new(
        rule_id: &str,
        rule_name: &str,
        reason: &str,
        duration_secs: u64,
        suppressed_by: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule_id.to_string(),
            rule_name: rule_name.to_string(),
            reason: reason.to_string(),
            duration_secs,
            suppressed_at: now,
            expires_at: now + Duration::seconds(duration_secs as i64),
            suppressed_by: suppressed_by.to_string(),
            active: true,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
