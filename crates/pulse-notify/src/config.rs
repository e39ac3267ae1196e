use crate::notifier::{ChannelFilter, Notifier};
use crate::providers::{
    DingTalkConfig, DingTalkNotifier, EmailConfig, EmailNotifier, LogNotifier, WebhookConfig,
    WebhookNotifier,
};
use anyhow::Result;
use pulse_core::AlertSeverity;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 通知渠道配置表
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

/// 单个渠道的声明
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// 日志渠道
    Log {
        #[serde(default)]
        min_severity: Option<AlertSeverity>,
    },

    /// Webhook 渠道
    Webhook {
        url: String,
        #[serde(default)]
        headers: Option<std::collections::HashMap<String, String>>,
        #[serde(default)]
        alert_types: Vec<String>,
        #[serde(default)]
        min_severity: Option<AlertSeverity>,
    },

    /// 邮件渠道
    Email {
        smtp_host: String,
        smtp_port: u16,
        username: String,
        password: String,
        from: String,
        to: Vec<String>,
        #[serde(default)]
        min_severity: Option<AlertSeverity>,
    },

    /// 钉钉渠道
    Dingtalk {
        webhook_url: String,
        #[serde(default)]
        min_severity: Option<AlertSeverity>,
    },
}

impl NotifyConfig {
    /// 从 TOML 文本解析
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// 从文件加载；文件不存在时返回空配置
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// 按配置构建通知器集合
    pub fn build_notifiers(&self) -> Vec<Box<dyn Notifier>> {
        self.channels
            .iter()
            .map(|channel| -> Box<dyn Notifier> {
                match channel.clone() {
                    ChannelConfig::Log { min_severity } => {
                        Box::new(LogNotifier::with_filter(ChannelFilter {
                            alert_types: Vec::new(),
                            min_severity,
                        }))
                    }
                    ChannelConfig::Webhook {
                        url,
                        headers,
                        alert_types,
                        min_severity,
                    } => Box::new(
                        WebhookNotifier::new(WebhookConfig { url, headers }).with_filter(
                            ChannelFilter {
                                alert_types,
                                min_severity,
                            },
                        ),
                    ),
                    ChannelConfig::Email {
                        smtp_host,
                        smtp_port,
                        username,
                        password,
                        from,
                        to,
                        min_severity,
                    } => Box::new(
                        EmailNotifier::new(EmailConfig {
                            smtp_host,
                            smtp_port,
                            username,
                            password,
                            from,
                            to,
                        })
                        .with_filter(ChannelFilter {
                            alert_types: Vec::new(),
                            min_severity,
                        }),
                    ),
                    ChannelConfig::Dingtalk {
                        webhook_url,
                        min_severity,
                    } => Box::new(
                        DingTalkNotifier::new(DingTalkConfig { webhook_url }).with_filter(
                            ChannelFilter {
                                alert_types: Vec::new(),
                                min_severity,
                            },
                        ),
                    ),
                }
            })
            .collect()
    }
}
