use crate::message::AlertMessage;
use anyhow::Result;
use async_trait::async_trait;
use pulse_core::AlertSeverity;

/// 通知结果
#[derive(Debug, Clone)]
pub struct NotifyResult {
    pub success: bool,
    pub message: String,
}

impl NotifyResult {
    pub fn success() -> Self {
        Self {
            success: true,
            message: "Notification sent successfully".to_string(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 通知器 trait
///
/// 新增渠道只需实现该 trait 并注册到管理器，不修改任何分发逻辑。
/// `supports` 是渠道自身的能力声明：按告警类别和级别过滤。
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 发送通知
    async fn send(&self, message: &AlertMessage) -> Result<NotifyResult>;

    /// 通知器名称
    fn name(&self) -> &str;

    /// 是否启用
    fn is_enabled(&self) -> bool {
        true
    }

    /// 是否接收该类别/级别的告警
    fn supports(&self, _alert_type: &str, _severity: AlertSeverity) -> bool {
        true
    }
}

/// 类别/级别过滤器，供各渠道复用
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    /// 接收的告警类别，空表示全部
    pub alert_types: Vec<String>,

    /// 最低级别
    pub min_severity: Option<AlertSeverity>,
}

impl ChannelFilter {
    pub fn matches(&self, alert_type: &str, severity: AlertSeverity) -> bool {
        if !self.alert_types.is_empty()
            && !self.alert_types.iter().any(|t| t == alert_type)
        {
            return false;
        }
        if let Some(min) = self.min_severity {
            if severity < min {
                return false;
            }
        }
        true
    }
}
