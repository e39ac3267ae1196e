use crate::message::AlertMessage;
use crate::notifier::Notifier;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// 单次分发的结果
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchOutcome {
    /// 至少一个渠道成功投递
    pub delivered: bool,

    /// 实际尝试的渠道数
    pub attempted: usize,

    /// 失败的渠道数
    pub failures: usize,
}

/// 通知管理器
///
/// 渠道失败彼此隔离：单个渠道的错误只记日志、计失败数，
/// 不影响其余渠道，也不向调用方抛出。
pub struct NotifyManager {
    notifiers: Arc<RwLock<Vec<Box<dyn Notifier>>>>,
}

impl NotifyManager {
    pub fn new() -> Self {
        Self {
            notifiers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// 注册通知器
    pub async fn register(&self, notifier: Box<dyn Notifier>) {
        info!("Registered notifier: {}", notifier.name());
        let mut notifiers = self.notifiers.write().await;
        notifiers.push(notifier);
    }

    pub async fn notifier_count(&self) -> usize {
        self.notifiers.read().await.len()
    }

    /// 将告警分发到所有匹配的渠道
    ///
    /// 只调用 `enabled && supports(..)` 的渠道；
    /// 只要有一个成功即视为已投递。
    pub async fn dispatch(&self, message: &AlertMessage) -> DispatchOutcome {
        let notifiers = self.notifiers.read().await;
        let mut outcome = DispatchOutcome::default();

        for notifier in notifiers.iter() {
            if !notifier.is_enabled() {
                continue;
            }
            if !notifier.supports(&message.alert_type, message.severity) {
                continue;
            }

            outcome.attempted += 1;
            match notifier.send(message).await {
                Ok(result) if result.success => {
                    info!(
                        channel = %notifier.name(),
                        alert_id = %message.alert_id,
                        "Notification sent"
                    );
                    outcome.delivered = true;
                }
                Ok(result) => {
                    warn!(
                        channel = %notifier.name(),
                        alert_id = %message.alert_id,
                        reason = %result.message,
                        "Notification rejected"
                    );
                    outcome.failures += 1;
                }
                Err(e) => {
                    error!(
                        channel = %notifier.name(),
                        alert_id = %message.alert_id,
                        error = %e,
                        "Notification error"
                    );
                    outcome.failures += 1;
                }
            }
        }

        outcome
    }
}

impl Default for NotifyManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::NotifyResult;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use pulse_core::AlertSeverity;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubNotifier {
        name: String,
        fail: bool,
        min_severity: Option<AlertSeverity>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Notifier for StubNotifier {
        async fn send(&self, _message: &AlertMessage) -> Result<NotifyResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Ok(NotifyResult::failure("stub failure"))
            } else {
                Ok(NotifyResult::success())
            }
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn supports(&self, _alert_type: &str, severity: AlertSeverity) -> bool {
            self.min_severity.map(|min| severity >= min).unwrap_or(true)
        }
    }

    fn message(severity: AlertSeverity) -> AlertMessage {
        AlertMessage {
            alert_id: "a1".to_string(),
            rule_id: "r1".to_string(),
            rule_name: "high_cpu".to_string(),
            alert_type: "threshold".to_string(),
            severity,
            message: "test".to_string(),
            metric_name: "cpu".to_string(),
            metric_value: 90.0,
            threshold: 80.0,
            triggered_at: Utc::now(),
            context: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_at_least_one_delivered() {
        let manager = NotifyManager::new();
        let calls = Arc::new(AtomicUsize::new(0));

        manager
            .register(Box::new(StubNotifier {
                name: "failing".to_string(),
                fail: true,
                min_severity: None,
                calls: calls.clone(),
            }))
            .await;
        manager
            .register(Box::new(StubNotifier {
                name: "working".to_string(),
                fail: false,
                min_severity: None,
                calls: calls.clone(),
            }))
            .await;

        let outcome = manager.dispatch(&message(AlertSeverity::Warning)).await;

        // 一个失败不阻塞另一个
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(outcome.delivered);
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.attempted, 2);
    }

    #[tokio::test]
    async fn test_all_failures_means_not_delivered() {
        let manager = NotifyManager::new();
        let calls = Arc::new(AtomicUsize::new(0));

        manager
            .register(Box::new(StubNotifier {
                name: "failing".to_string(),
                fail: true,
                min_severity: None,
                calls,
            }))
            .await;

        let outcome = manager.dispatch(&message(AlertSeverity::Warning)).await;
        assert!(!outcome.delivered);
        assert_eq!(outcome.failures, 1);
    }

    #[tokio::test]
    async fn test_severity_filter_skips_channel() {
        let manager = NotifyManager::new();
        let calls = Arc::new(AtomicUsize::new(0));

        manager
            .register(Box::new(StubNotifier {
                name: "critical_only".to_string(),
                fail: false,
                min_severity: Some(AlertSeverity::Critical),
                calls: calls.clone(),
            }))
            .await;

        let outcome = manager.dispatch(&message(AlertSeverity::Info)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.attempted, 0);
        assert!(!outcome.delivered);
    }
}
