pub mod config;
pub mod manager;
pub mod message;
pub mod notifier;
pub mod providers;

pub use config::{ChannelConfig, NotifyConfig};
pub use manager::{DispatchOutcome, NotifyManager};
pub use message::AlertMessage;
pub use notifier::{ChannelFilter, Notifier, NotifyResult};
pub use providers::{
    DingTalkConfig, DingTalkNotifier, EmailConfig, EmailNotifier, LogNotifier, WebhookConfig,
    WebhookNotifier,
};
