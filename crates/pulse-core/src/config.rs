use anyhow::{anyhow, Result};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 引擎全局配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub alert: AlertConfig,
    pub scheduler: SchedulerConfig,
    pub persist: PersistConfig,
}

/// 指标存储配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// 热数据窗口（秒），超龄样本在每次写入时被裁剪
    pub retention_secs: u64,

    /// 单个指标缓冲区的样本数上限
    pub max_samples_per_metric: usize,
}

/// 告警引擎配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertConfig {
    /// 历史环形缓冲区容量，满后淘汰最旧事件
    pub history_capacity: usize,

    /// 滑动窗口流的通道容量（有界，背压）
    pub sliding_channel_capacity: usize,
}

/// 后台任务配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// 规则评估周期（秒）
    pub evaluation_interval_secs: u64,

    /// 过期数据清理周期（秒）
    pub cleanup_interval_secs: u64,

    /// 每日告警汇总任务的 Cron 表达式
    pub summary_cron: String,
}

/// 持久化旁路配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersistConfig {
    /// 是否启用外部镜像存储
    pub enabled: bool,

    /// Redis 连接地址
    pub redis_url: String,

    /// 镜像数据 TTL（秒），与热数据窗口对齐
    pub ttl_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                retention_secs: 300,
                max_samples_per_metric: 10_000,
            },
            alert: AlertConfig {
                history_capacity: 1000,
                sliding_channel_capacity: 64,
            },
            scheduler: SchedulerConfig {
                evaluation_interval_secs: 30,
                cleanup_interval_secs: 60,
                summary_cron: "0 0 1 * * *".to_string(),
            },
            persist: PersistConfig {
                enabled: false,
                redis_url: "redis://127.0.0.1:6379".to_string(),
                ttl_secs: 300,
            },
        }
    }
}

impl EngineConfig {
    /// 从 TOML 文件加载配置
    ///
    /// 文件不存在时返回默认配置。
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let config = Config::builder()
            .add_source(File::new(
                path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.store.retention_secs, 300);
        assert_eq!(config.alert.history_capacity, 1000);
        assert!(!config.persist.enabled);
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = EngineConfig::load("/nonexistent/pulse.toml").unwrap();
        assert_eq!(config.scheduler.evaluation_interval_secs, 30);
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[store]
retention_secs = 600
max_samples_per_metric = 500

[alert]
history_capacity = 50
sliding_channel_capacity = 8

[scheduler]
evaluation_interval_secs = 10
cleanup_interval_secs = 30
summary_cron = "0 0 2 * * *"

[persist]
enabled = true
redis_url = "redis://cache:6379"
ttl_secs = 600
"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.store.retention_secs, 600);
        assert_eq!(config.alert.history_capacity, 50);
        assert!(config.persist.enabled);
        assert_eq!(config.persist.redis_url, "redis://cache:6379");
    }
}
