use crate::model::{AlertEvent, AlertRule, AlertStatus, AlertSuppression};
use chrono::Utc;
use pulse_core::{AlertSeverity, PulseError, Result};
use pulse_notify::{AlertMessage, NotifyManager};
use pulse_persist::PersistBackend;
use pulse_store::MetricStore;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 一轮评估的汇总
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluationSummary {
    /// 实际评估的规则数
    pub evaluated: usize,

    /// 触发的事件数
    pub triggered: usize,

    /// 因抑制或冷却跳过的规则数
    pub skipped: usize,

    /// 评估失败的规则数（被隔离，不中断本轮）
    pub failed: usize,
}

/// 告警规则引擎
///
/// 规则、活动事件、抑制各自持锁；事件的确认/解决在活动表的
/// 写锁内完成，并发确认与解决不会丢更新。通知与镜像写出都在
/// 独立任务里进行，失败只计数、不回滚事件。
pub struct AlertEngine {
    store: Arc<MetricStore>,
    notify: Arc<NotifyManager>,
    persist: Option<Arc<dyn PersistBackend>>,
    persist_ttl: StdDuration,

    rules: Arc<RwLock<HashMap<String, AlertRule>>>,
    active: Arc<RwLock<HashMap<String, AlertEvent>>>,
    history: Arc<RwLock<VecDeque<AlertEvent>>>,
    last_fired: Arc<RwLock<HashMap<String, chrono::DateTime<Utc>>>>,
    suppressions: Arc<RwLock<HashMap<String, AlertSuppression>>>,
    history_capacity: usize,

    notification_failures: Arc<AtomicU64>,
    persistence_failures: Arc<AtomicU64>,
    evaluation_failures: Arc<AtomicU64>,
}

impl AlertEngine {
    pub fn new(store: Arc<MetricStore>, notify: Arc<NotifyManager>) -> Self {
        Self {
            store,
            notify,
            persist: None,
            persist_ttl: StdDuration::from_secs(300),
            rules: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(VecDeque::new())),
            last_fired: Arc::new(RwLock::new(HashMap::new())),
            suppressions: Arc::new(RwLock::new(HashMap::new())),
            history_capacity: 1000,
            notification_failures: Arc::new(AtomicU64::new(0)),
            persistence_failures: Arc::new(AtomicU64::new(0)),
            evaluation_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 挂接外部镜像存储
    pub fn with_persistence(mut self, backend: Arc<dyn PersistBackend>, ttl: StdDuration) -> Self {
        self.persist = Some(backend);
        self.persist_ttl = ttl;
        self
    }

    /// 历史环形缓冲区容量
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    // ------------------------------------------------------------------
    // 规则 CRUD
    // ------------------------------------------------------------------

    /// 创建规则
    pub async fn create_rule(&self, mut rule: AlertRule) -> Result<AlertRule> {
        rule.validate()?;

        if rule.id.is_empty() {
            rule.id = Uuid::new_v4().to_string();
        }
        let now = Utc::now();
        rule.created_at = now;
        rule.updated_at = now;

        {
            let mut rules = self.rules.write().await;
            rules.insert(rule.id.clone(), rule.clone());
        }

        self.mirror_rule(&rule);
        info!(rule_id = %rule.id, rule_name = %rule.name, "Alert rule created");
        Ok(rule)
    }

    /// 更新规则，保留原创建信息
    pub async fn update_rule(&self, mut rule: AlertRule) -> Result<AlertRule> {
        rule.validate()?;

        let mut rules = self.rules.write().await;
        let existing = rules
            .get(&rule.id)
            .ok_or_else(|| PulseError::NotFound(format!("alert rule {}", rule.id)))?;

        rule.created_at = existing.created_at;
        rule.created_by = existing.created_by.clone();
        rule.updated_at = Utc::now();
        rules.insert(rule.id.clone(), rule.clone());
        drop(rules);

        self.mirror_rule(&rule);
        info!(rule_id = %rule.id, "Alert rule updated");
        Ok(rule)
    }

    /// 删除规则，连带清理冷却与抑制记录
    pub async fn delete_rule(&self, rule_id: &str) -> Result<()> {
        let removed = {
            let mut rules = self.rules.write().await;
            rules.remove(rule_id)
        };
        if removed.is_none() {
            return Err(PulseError::NotFound(format!("alert rule {}", rule_id)));
        }

        self.last_fired.write().await.remove(rule_id);
        self.suppressions.write().await.remove(rule_id);

        if let Some(persist) = &self.persist {
            let persist = persist.clone();
            let rule_id = rule_id.to_string();
            let failures = self.persistence_failures.clone();
            tokio::spawn(async move {
                if let Err(e) = persist.delete_rule(&rule_id).await {
                    failures.fetch_add(1, Ordering::Relaxed);
                    warn!(rule_id = %rule_id, error = %e, "Rule mirror delete failed");
                }
            });
        }

        info!(rule_id = %rule_id, "Alert rule deleted");
        Ok(())
    }

    /// 启用/禁用规则
    pub async fn set_rule_enabled(&self, rule_id: &str, enabled: bool, by: &str) -> Result<()> {
        let mirrored = {
            let mut rules = self.rules.write().await;
            let rule = rules
                .get_mut(rule_id)
                .ok_or_else(|| PulseError::NotFound(format!("alert rule {}", rule_id)))?;
            rule.enabled = enabled;
            rule.updated_at = Utc::now();
            rule.updated_by = by.to_string();
            rule.clone()
        };

        self.mirror_rule(&mirrored);
        info!(rule_id = %rule_id, enabled, "Alert rule toggled");
        Ok(())
    }

    pub async fn get_rule(&self, rule_id: &str) -> Result<AlertRule> {
        let rules = self.rules.read().await;
        rules
            .get(rule_id)
            .cloned()
            .ok_or_else(|| PulseError::NotFound(format!("alert rule {}", rule_id)))
    }

    pub async fn list_rules(&self) -> Vec<AlertRule> {
        let rules = self.rules.read().await;
        let mut all: Vec<AlertRule> = rules.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        all
    }

    // ------------------------------------------------------------------
    // 评估与触发
    // ------------------------------------------------------------------

    /// 评估所有启用的规则
    ///
    /// 单条规则的失败被隔离：记日志、计数，继续评估其余规则。
    pub async fn evaluate_all_rules(&self) -> EvaluationSummary {
        let rules: Vec<AlertRule> = {
            let rules = self.rules.read().await;
            rules.values().filter(|r| r.enabled).cloned().collect()
        };

        let mut summary = EvaluationSummary::default();

        for rule in rules {
            if self.is_suppressed(&rule.id).await {
                debug!(rule_id = %rule.id, "Rule suppressed, skipping");
                summary.skipped += 1;
                continue;
            }

            summary.evaluated += 1;

            let sample = match self.store.latest(&rule.metric_name).await {
                Some(sample) => sample,
                None => {
                    self.evaluation_failures.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        rule_id = %rule.id,
                        metric = %rule.metric_name,
                        "No samples for rule metric"
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            if !rule.operator.check(sample.value, rule.threshold) {
                continue;
            }

            let mut context: HashMap<String, String> = sample.tags.clone();
            context.insert("evaluated_at".to_string(), Utc::now().to_rfc3339());

            match self.trigger_alert(&rule.id, sample.value, context).await {
                Ok(Some(_)) => summary.triggered += 1,
                Ok(None) => summary.skipped += 1,
                Err(e) => {
                    self.evaluation_failures.fetch_add(1, Ordering::Relaxed);
                    error!(rule_id = %rule.id, error = %e, "Rule evaluation failed");
                    summary.failed += 1;
                }
            }
        }

        debug!(
            evaluated = summary.evaluated,
            triggered = summary.triggered,
            skipped = summary.skipped,
            failed = summary.failed,
            "Rule evaluation sweep finished"
        );
        summary
    }

    /// 触发告警
    ///
    /// 冷却期内返回 `Ok(None)`：是限流策略，不是错误。
    pub async fn trigger_alert(
        &self,
        rule_id: &str,
        value: f64,
        context: HashMap<String, String>,
    ) -> Result<Option<AlertEvent>> {
        let rule = self.get_rule(rule_id).await?;
        let now = Utc::now();

        {
            // 冷却检查与登记在同一把写锁内，并发触发不会双发
            let mut last = self.last_fired.write().await;
            if let Some(fired_at) = last.get(rule_id) {
                if now - *fired_at < rule.cooldown() {
                    debug!(rule_id = %rule_id, "Alert suppressed by cooldown");
                    return Ok(None);
                }
            }
            last.insert(rule_id.to_string(), now);
        }

        let event = AlertEvent::from_rule(&rule, value, context);
        self.register_event(event.clone()).await;

        info!(
            alert_id = %event.id,
            rule_id = %rule_id,
            metric = %event.metric_name,
            value = event.metric_value,
            "Alert triggered"
        );
        Ok(Some(event))
    }

    /// 人工触发，绕过冷却
    pub async fn trigger_manual(
        &self,
        name: &str,
        severity: AlertSeverity,
        message: &str,
        metric_name: &str,
        value: f64,
        context: HashMap<String, String>,
    ) -> AlertEvent {
        let event = AlertEvent::manual(name, severity, message, metric_name, value, context);
        self.register_event(event.clone()).await;

        info!(alert_id = %event.id, name = %name, "Manual alert triggered");
        event
    }

    /// 确认告警
    pub async fn acknowledge_alert(&self, alert_id: &str, by: &str, comment: &str) -> Result<AlertEvent> {
        let updated = {
            let mut active = self.active.write().await;
            let event = active
                .get_mut(alert_id)
                .ok_or_else(|| PulseError::NotFound(format!("alert {}", alert_id)))?;

            if event.status != AlertStatus::Active {
                return Err(PulseError::Validation(format!(
                    "alert {} is {}, only ACTIVE alerts can be acknowledged",
                    alert_id, event.status
                )));
            }

            let now = Utc::now();
            event.status = AlertStatus::Acknowledged;
            event.acknowledged_at = Some(now);
            event.acknowledged_by = Some(by.to_string());
            event.acknowledgment_comment = Some(comment.to_string());
            event.response_time_ms = Some((now - event.triggered_at).num_milliseconds());
            event.clone()
        };

        self.update_history(&updated).await;
        info!(alert_id = %alert_id, by = %by, "Alert acknowledged");
        Ok(updated)
    }

    /// 解决告警并从活动集合移除
    pub async fn resolve_alert(&self, alert_id: &str, by: &str, resolution: &str) -> Result<AlertEvent> {
        let resolved = {
            let mut active = self.active.write().await;
            let mut event = active
                .remove(alert_id)
                .ok_or_else(|| PulseError::NotFound(format!("alert {}", alert_id)))?;

            let now = Utc::now();
            event.status = AlertStatus::Resolved;
            event.resolved_at = Some(now);
            event.resolved_by = Some(by.to_string());
            event.resolution = Some(resolution.to_string());
            event.resolution_time_ms = Some((now - event.triggered_at).num_milliseconds());
            event
        };

        self.update_history(&resolved).await;
        info!(alert_id = %alert_id, by = %by, "Alert resolved");
        Ok(resolved)
    }

    // ------------------------------------------------------------------
    // 抑制
    // ------------------------------------------------------------------

    /// 抑制规则
    ///
    /// 抑制期内规则在评估时被跳过，但规则本身不受影响。
    pub async fn suppress_rule(
        &self,
        rule_id: &str,
        reason: &str,
        duration_secs: u64,
        by: &str,
    ) -> Result<AlertSuppression> {
        let rule = self.get_rule(rule_id).await?;
        let suppression = AlertSuppression::new(rule_id, &rule.name, reason, duration_secs, by);

        {
            let mut suppressions = self.suppressions.write().await;
            suppressions.insert(rule_id.to_string(), suppression.clone());
        }

        info!(
            rule_id = %rule_id,
            duration_secs,
            by = %by,
            "Rule suppressed"
        );
        Ok(suppression)
    }

    /// 解除抑制
    pub async fn unsuppress_rule(&self, rule_id: &str) -> Result<()> {
        let removed = {
            let mut suppressions = self.suppressions.write().await;
            suppressions.remove(rule_id)
        };
        if removed.is_none() {
            return Err(PulseError::NotFound(format!(
                "suppression for rule {}",
                rule_id
            )));
        }
        info!(rule_id = %rule_id, "Rule unsuppressed");
        Ok(())
    }

    /// 当前未过期的抑制列表
    pub async fn list_suppressions(&self) -> Vec<AlertSuppression> {
        let now = Utc::now();
        let suppressions = self.suppressions.read().await;
        suppressions
            .values()
            .filter(|s| !s.is_expired(now))
            .cloned()
            .collect()
    }

    /// 惰性判定抑制是否仍然生效，过期条目顺手摘除
    async fn is_suppressed(&self, rule_id: &str) -> bool {
        let now = Utc::now();
        let expired = {
            let suppressions = self.suppressions.read().await;
            match suppressions.get(rule_id) {
                Some(s) if s.is_expired(now) => true,
                Some(_) => return true,
                None => return false,
            }
        };

        if expired {
            let mut suppressions = self.suppressions.write().await;
            if let Some(s) = suppressions.get_mut(rule_id) {
                if s.is_expired(now) {
                    s.active = false;
                    suppressions.remove(rule_id);
                }
            }
        }
        false
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    pub async fn active_alerts(&self) -> Vec<AlertEvent> {
        let active = self.active.read().await;
        let mut events: Vec<AlertEvent> = active.values().cloned().collect();
        events.sort_by(|a, b| a.triggered_at.cmp(&b.triggered_at));
        events
    }

    /// 历史事件，最多 `limit` 条最近的
    pub async fn alert_history(&self, limit: usize) -> Vec<AlertEvent> {
        let history = self.history.read().await;
        let start = history.len().saturating_sub(limit);
        history.iter().skip(start).cloned().collect()
    }

    /// 先查活动集合，再查历史
    pub async fn get_alert(&self, alert_id: &str) -> Result<AlertEvent> {
        {
            let active = self.active.read().await;
            if let Some(event) = active.get(alert_id) {
                return Ok(event.clone());
            }
        }
        let history = self.history.read().await;
        history
            .iter()
            .rev()
            .find(|e| e.id == alert_id)
            .cloned()
            .ok_or_else(|| PulseError::NotFound(format!("alert {}", alert_id)))
    }

    /// 历史环形缓冲区快照
    pub async fn history_snapshot(&self) -> Vec<AlertEvent> {
        let history = self.history.read().await;
        history.iter().cloned().collect()
    }

    // ------------------------------------------------------------------
    // 运行计数
    // ------------------------------------------------------------------

    pub fn notification_failure_count(&self) -> u64 {
        self.notification_failures.load(Ordering::Relaxed)
    }

    pub fn persistence_failure_count(&self) -> u64 {
        self.persistence_failures.load(Ordering::Relaxed)
    }

    pub fn evaluation_failure_count(&self) -> u64 {
        self.evaluation_failures.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // 内部
    // ------------------------------------------------------------------

    /// 登记事件：入活动集合、入历史、镜像、分发通知
    async fn register_event(&self, event: AlertEvent) {
        {
            let mut active = self.active.write().await;
            active.insert(event.id.clone(), event.clone());
        }
        {
            let mut history = self.history.write().await;
            history.push_back(event.clone());
            while history.len() > self.history_capacity {
                history.pop_front();
            }
        }

        self.mirror_event(&event);
        self.dispatch_notification(event);
    }

    /// 历史条目随生命周期变化同步更新
    async fn update_history(&self, event: &AlertEvent) {
        let mut history = self.history.write().await;
        if let Some(entry) = history.iter_mut().rev().find(|e| e.id == event.id) {
            *entry = event.clone();
        }
    }

    fn dispatch_notification(&self, event: AlertEvent) {
        let notify = self.notify.clone();
        let failures = self.notification_failures.clone();
        let message = AlertMessage {
            alert_id: event.id.clone(),
            rule_id: event.rule_id.clone(),
            rule_name: event.rule_name.clone(),
            alert_type: event.alert_type.clone(),
            severity: event.severity,
            message: event.message.clone(),
            metric_name: event.metric_name.clone(),
            metric_value: event.metric_value,
            threshold: event.threshold,
            triggered_at: event.triggered_at,
            context: event.context.clone(),
        };

        tokio::spawn(async move {
            let outcome = notify.dispatch(&message).await;
            if outcome.failures > 0 {
                failures.fetch_add(outcome.failures as u64, Ordering::Relaxed);
            }
            if outcome.attempted > 0 && !outcome.delivered {
                warn!(
                    alert_id = %message.alert_id,
                    attempted = outcome.attempted,
                    "Alert notification not delivered by any channel"
                );
            }
        });
    }

    fn mirror_rule(&self, rule: &AlertRule) {
        let Some(persist) = &self.persist else {
            return;
        };
        let payload = match serde_json::to_string(rule) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(rule_id = %rule.id, error = %e, "Rule serialization failed");
                return;
            }
        };

        let persist = persist.clone();
        let rule_id = rule.id.clone();
        let failures = self.persistence_failures.clone();
        tokio::spawn(async move {
            if let Err(e) = persist.put_rule(&rule_id, payload).await {
                failures.fetch_add(1, Ordering::Relaxed);
                warn!(rule_id = %rule_id, error = %e, "Rule mirror write failed");
            }
        });
    }

    fn mirror_event(&self, event: &AlertEvent) {
        let Some(persist) = &self.persist else {
            return;
        };
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(alert_id = %event.id, error = %e, "Event serialization failed");
                return;
            }
        };

        let persist = persist.clone();
        let date = event.triggered_at.date_naive();
        let ttl = self.persist_ttl;
        let alert_id = event.id.clone();
        let failures = self.persistence_failures.clone();
        tokio::spawn(async move {
            if let Err(e) = persist.append_event(date, payload, ttl).await {
                failures.fetch_add(1, Ordering::Relaxed);
                warn!(alert_id = %alert_id, error = %e, "Event mirror write failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CompareOp;
    use pulse_core::ErrorKind;
    use pulse_persist::MemoryBackend;
    use pulse_store::{MetricSample, RetentionPolicy};

    fn cpu_rule(cooldown_secs: u64) -> AlertRule {
        AlertRule {
            name: "high_cpu".to_string(),
            metric_name: "cpu".to_string(),
            operator: CompareOp::Gt,
            threshold: 80.0,
            cooldown_secs,
            ..Default::default()
        }
    }

    fn engine() -> (AlertEngine, Arc<MetricStore>) {
        let store = Arc::new(MetricStore::new(RetentionPolicy::default()));
        let notify = Arc::new(NotifyManager::new());
        (AlertEngine::new(store.clone(), notify), store)
    }

    #[tokio::test]
    async fn test_create_rule_assigns_id_and_validates() {
        let (engine, _) = engine();

        let created = engine.create_rule(cpu_rule(60)).await.unwrap();
        assert!(!created.id.is_empty());

        let invalid = AlertRule {
            name: "broken".to_string(),
            ..Default::default()
        };
        let err = engine.create_rule(invalid).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_second_trigger() {
        let (engine, _) = engine();
        let rule = engine.create_rule(cpu_rule(60)).await.unwrap();

        let first = engine
            .trigger_alert(&rule.id, 90.0, HashMap::new())
            .await
            .unwrap();
        assert!(first.is_some());

        // 冷却期内：静默跳过，不是错误
        let second = engine
            .trigger_alert(&rule.id, 95.0, HashMap::new())
            .await
            .unwrap();
        assert!(second.is_none());

        assert_eq!(engine.active_alerts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_lifecycle() {
        let (engine, store) = engine();
        let rule = engine.create_rule(cpu_rule(60)).await.unwrap();

        store
            .record_sample(MetricSample::new("cpu", 85.0))
            .await
            .unwrap();

        let summary = engine.evaluate_all_rules().await;
        assert_eq!(summary.triggered, 1);

        let active = engine.active_alerts().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].metric_value, 85.0);
        assert_eq!(active[0].status, AlertStatus::Active);
        let alert_id = active[0].id.clone();

        let acked = engine
            .acknowledge_alert(&alert_id, "ops", "looking into it")
            .await
            .unwrap();
        assert_eq!(acked.status, AlertStatus::Acknowledged);
        assert!(acked.response_time_ms.is_some());

        let resolved = engine
            .resolve_alert(&alert_id, "ops", "restarted service")
            .await
            .unwrap();
        assert_eq!(resolved.status, AlertStatus::Resolved);
        assert!(resolved.resolution_time_ms.is_some());

        // 解决后移出活动集合，保留在历史里
        assert!(engine.active_alerts().await.is_empty());
        let history = engine.alert_history(10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, AlertStatus::Resolved);
        assert_eq!(engine.get_rule(&rule.id).await.unwrap().id, rule.id);
    }

    #[tokio::test]
    async fn test_resolve_is_terminal() {
        let (engine, _) = engine();
        let rule = engine.create_rule(cpu_rule(0)).await.unwrap();

        let event = engine
            .trigger_alert(&rule.id, 90.0, HashMap::new())
            .await
            .unwrap()
            .unwrap();

        // ACTIVE → RESOLVED 跳过确认也合法
        engine.resolve_alert(&event.id, "ops", "done").await.unwrap();

        let err = engine
            .resolve_alert(&event.id, "ops", "again")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = engine
            .acknowledge_alert(&event.id, "ops", "late")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_acknowledge_twice_rejected() {
        let (engine, _) = engine();
        let rule = engine.create_rule(cpu_rule(0)).await.unwrap();

        let event = engine
            .trigger_alert(&rule.id, 90.0, HashMap::new())
            .await
            .unwrap()
            .unwrap();

        engine
            .acknowledge_alert(&event.id, "ops", "ack")
            .await
            .unwrap();
        let err = engine
            .acknowledge_alert(&event.id, "ops", "ack again")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_suppression_skips_evaluation() {
        let (engine, store) = engine();
        let rule = engine.create_rule(cpu_rule(0)).await.unwrap();

        store
            .record_sample(MetricSample::new("cpu", 95.0))
            .await
            .unwrap();

        engine
            .suppress_rule(&rule.id, "maintenance window", 3600, "ops")
            .await
            .unwrap();

        let summary = engine.evaluate_all_rules().await;
        assert_eq!(summary.triggered, 0);
        assert_eq!(summary.skipped, 1);
        assert!(engine.active_alerts().await.is_empty());

        engine.unsuppress_rule(&rule.id).await.unwrap();
        let summary = engine.evaluate_all_rules().await;
        assert_eq!(summary.triggered, 1);
    }

    #[tokio::test]
    async fn test_zero_duration_suppression_is_inactive() {
        let (engine, store) = engine();
        let rule = engine.create_rule(cpu_rule(0)).await.unwrap();

        store
            .record_sample(MetricSample::new("cpu", 95.0))
            .await
            .unwrap();

        engine
            .suppress_rule(&rule.id, "noop", 0, "ops")
            .await
            .unwrap();

        // duration=0 在下一轮评估即失效
        let summary = engine.evaluate_all_rules().await;
        assert_eq!(summary.triggered, 1);
    }

    #[tokio::test]
    async fn test_disabled_rule_not_evaluated() {
        let (engine, store) = engine();
        let rule = engine.create_rule(cpu_rule(0)).await.unwrap();

        store
            .record_sample(MetricSample::new("cpu", 95.0))
            .await
            .unwrap();

        engine
            .set_rule_enabled(&rule.id, false, "ops")
            .await
            .unwrap();

        let summary = engine.evaluate_all_rules().await;
        assert_eq!(summary.evaluated, 0);
        assert_eq!(summary.triggered, 0);
    }

    #[tokio::test]
    async fn test_missing_metric_does_not_abort_sweep() {
        let (engine, store) = engine();
        engine
            .create_rule(AlertRule {
                name: "no_data".to_string(),
                metric_name: "missing_metric".to_string(),
                ..cpu_rule(0)
            })
            .await
            .unwrap();
        engine.create_rule(cpu_rule(0)).await.unwrap();

        store
            .record_sample(MetricSample::new("cpu", 95.0))
            .await
            .unwrap();

        // 一条规则查不到指标，另一条照常触发
        let summary = engine.evaluate_all_rules().await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.triggered, 1);
    }

    #[tokio::test]
    async fn test_update_preserves_created_at() {
        let (engine, _) = engine();
        let created = engine.create_rule(cpu_rule(60)).await.unwrap();

        let mut updated = created.clone();
        updated.threshold = 70.0;
        updated.created_at = Utc::now() + chrono::Duration::days(1);
        let result = engine.update_rule(updated).await.unwrap();

        assert_eq!(result.created_at, created.created_at);
        assert_eq!(result.threshold, 70.0);
        assert!(result.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_delete_unknown_rule_not_found() {
        let (engine, _) = engine();
        let err = engine.delete_rule("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_manual_trigger_bypasses_rules() {
        let (engine, _) = engine();

        let event = engine
            .trigger_manual(
                "manual_check",
                AlertSeverity::Info,
                "operator triggered",
                "disk",
                0.9,
                HashMap::new(),
            )
            .await;

        assert_eq!(event.rule_id, crate::model::MANUAL_RULE_ID);
        assert_eq!(engine.active_alerts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_history_ring_evicts_oldest() {
        let (engine, _) = engine();
        let engine = engine.with_history_capacity(3);
        let rule = engine.create_rule(cpu_rule(0)).await.unwrap();

        for i in 0..5 {
            engine
                .trigger_alert(&rule.id, 80.0 + i as f64, HashMap::new())
                .await
                .unwrap();
        }

        let history = engine.history_snapshot().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].metric_value, 82.0);
    }

    #[tokio::test]
    async fn test_events_and_rules_mirrored() {
        let store = Arc::new(MetricStore::new(RetentionPolicy::default()));
        let notify = Arc::new(NotifyManager::new());
        let backend = Arc::new(MemoryBackend::new());
        let engine = AlertEngine::new(store, notify)
            .with_persistence(backend.clone(), StdDuration::from_secs(300));

        let rule = engine.create_rule(cpu_rule(0)).await.unwrap();
        engine
            .trigger_alert(&rule.id, 90.0, HashMap::new())
            .await
            .unwrap();

        // 镜像写出是异步旁路
        tokio::time::sleep(StdDuration::from_millis(100)).await;

        assert_eq!(backend.rules().await.len(), 1);
        let date = Utc::now().date_naive();
        let events = backend
            .list(&format!("monitoring:alert:events:{}", date.format("%Y-%m-%d")))
            .await;
        assert_eq!(events.len(), 1);
    }
}
