use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pulse_core::Result;
use std::time::Duration;

/// 外部镜像存储后端
///
/// 仅作旁路缓存，不是活动状态的事实来源；所有失败都归类为
/// `Transient`，调用方记日志后继续。键名是确定性的，便于
/// 外部系统按约定读取。
#[async_trait]
pub trait PersistBackend: Send + Sync {
    /// 镜像一个指标样本，键 `metrics:aggregation:data:<name>:<ts>`
    async fn put_sample(
        &self,
        metric: &str,
        timestamp: DateTime<Utc>,
        payload: String,
        ttl: Duration,
    ) -> Result<()>;

    /// 镜像告警规则到哈希 `monitoring:alert:rules`
    async fn put_rule(&self, rule_id: &str, payload: String) -> Result<()>;

    /// 从规则哈希中删除
    async fn delete_rule(&self, rule_id: &str) -> Result<()>;

    /// 追加告警事件到 `monitoring:alert:events:<date>`
    async fn append_event(&self, date: NaiveDate, payload: String, ttl: Duration) -> Result<()>;

    /// 写入每日汇总 `monitoring:alert:summary:<date>`
    async fn put_summary(&self, date: NaiveDate, payload: String, ttl: Duration) -> Result<()>;
}

pub(crate) fn sample_key(metric: &str, timestamp: DateTime<Utc>) -> String {
    format!(
        "metrics:aggregation:data:{}:{}",
        metric,
        timestamp.timestamp_millis()
    )
}

pub(crate) const RULES_KEY: &str = "monitoring:alert:rules";

pub(crate) fn events_key(date: NaiveDate) -> String {
    format!("monitoring:alert:events:{}", date.format("%Y-%m-%d"))
}

pub(crate) fn summary_key(date: NaiveDate) -> String {
    format!("monitoring:alert:summary:{}", date.format("%Y-%m-%d"))
}
