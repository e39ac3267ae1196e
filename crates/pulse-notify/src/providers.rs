use crate::message::AlertMessage;
use crate::notifier::{ChannelFilter, Notifier, NotifyResult};
use anyhow::Result;
use async_trait::async_trait;
use pulse_core::AlertSeverity;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// 日志通知
// ============================================================================

/// 把告警写入 tracing 日志的兜底渠道
pub struct LogNotifier {
    filter: ChannelFilter,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self {
            filter: ChannelFilter::default(),
        }
    }

    pub fn with_filter(filter: ChannelFilter) -> Self {
        Self { filter }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &AlertMessage) -> Result<NotifyResult> {
        match message.severity {
            AlertSeverity::Critical => warn!(
                rule = %message.rule_name,
                metric = %message.metric_name,
                value = message.metric_value,
                "ALERT: {}", message.message
            ),
            _ => info!(
                rule = %message.rule_name,
                metric = %message.metric_name,
                value = message.metric_value,
                "ALERT: {}", message.message
            ),
        }
        Ok(NotifyResult::success())
    }

    fn name(&self) -> &str {
        "log"
    }

    fn supports(&self, alert_type: &str, severity: AlertSeverity) -> bool {
        self.filter.matches(alert_type, severity)
    }
}

// ============================================================================
// Webhook 通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    pub headers: Option<std::collections::HashMap<String, String>>,
}

pub struct WebhookNotifier {
    config: WebhookConfig,
    filter: ChannelFilter,
    client: reqwest::Client,
    enabled: bool,
}

impl WebhookNotifier {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            filter: ChannelFilter::default(),
            client: reqwest::Client::new(),
            enabled: true,
        }
    }

    pub fn with_filter(mut self, filter: ChannelFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, message: &AlertMessage) -> Result<NotifyResult> {
        let mut request = self.client.post(&self.config.url);

        if let Some(headers) = &self.config.headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request.json(message).send().await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "Webhook failed with status: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supports(&self, alert_type: &str, severity: AlertSeverity) -> bool {
        self.filter.matches(alert_type, severity)
    }
}

// ============================================================================
// 邮件通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: Vec<String>,
}

pub struct EmailNotifier {
    config: EmailConfig,
    filter: ChannelFilter,
    enabled: bool,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            filter: ChannelFilter::default(),
            enabled: true,
        }
    }

    pub fn with_filter(mut self, filter: ChannelFilter) -> Self {
        self.filter = filter;
        self
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn send(&self, message: &AlertMessage) -> Result<NotifyResult> {
        use lettre::message::header::ContentType;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

        let email = Message::builder()
            .from(self.config.from.parse()?)
            .to(self.config.to[0].parse()?)
            .subject(format!(
                "[{}] {}",
                message.severity.to_string().to_uppercase(),
                message.rule_name
            ))
            .header(ContentType::TEXT_PLAIN)
            .body(message.summary())?;

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.clone(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
            .credentials(creds)
            .port(self.config.smtp_port)
            .build();

        match mailer.send(email).await {
            Ok(_) => Ok(NotifyResult::success()),
            Err(e) => Ok(NotifyResult::failure(format!("Email send failed: {}", e))),
        }
    }

    fn name(&self) -> &str {
        "email"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supports(&self, alert_type: &str, severity: AlertSeverity) -> bool {
        self.filter.matches(alert_type, severity)
    }
}

// ============================================================================
// 钉钉通知
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DingTalkConfig {
    pub webhook_url: String,
}

pub struct DingTalkNotifier {
    config: DingTalkConfig,
    filter: ChannelFilter,
    client: reqwest::Client,
    enabled: bool,
}

impl DingTalkNotifier {
    pub fn new(config: DingTalkConfig) -> Self {
        Self {
            config,
            filter: ChannelFilter::default(),
            client: reqwest::Client::new(),
            enabled: true,
        }
    }

    pub fn with_filter(mut self, filter: ChannelFilter) -> Self {
        self.filter = filter;
        self
    }

    fn build_message(&self, message: &AlertMessage) -> serde_json::Value {
        let severity_emoji = match message.severity {
            AlertSeverity::Info => "ℹ️",
            AlertSeverity::Warning => "⚠️",
            AlertSeverity::Critical => "🔥",
        };

        serde_json::json!({
            "msgtype": "markdown",
            "markdown": {
                "title": format!("告警: {}", message.rule_name),
                "text": format!(
                    "## {} 告警通知\n\n**规则**: {}\n\n**级别**: {}\n\n**指标**: {} = {:.2}（阈值 {:.2}）\n\n**消息**: {}\n\n**触发时间**: {}",
                    severity_emoji,
                    message.rule_name,
                    message.severity,
                    message.metric_name,
                    message.metric_value,
                    message.threshold,
                    message.message,
                    message.triggered_at
                )
            }
        })
    }
}

#[async_trait]
impl Notifier for DingTalkNotifier {
    async fn send(&self, message: &AlertMessage) -> Result<NotifyResult> {
        let body = self.build_message(message);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(NotifyResult::success())
        } else {
            Ok(NotifyResult::failure(format!(
                "DingTalk failed: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &str {
        "dingtalk"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn supports(&self, alert_type: &str, severity: AlertSeverity) -> bool {
        self.filter.matches(alert_type, severity)
    }
}
