pub mod config;
pub mod error;
pub mod severity;

pub use config::{AlertConfig, EngineConfig, PersistConfig, SchedulerConfig, StoreConfig};
pub use error::{ErrorKind, PulseError, Result};
pub use severity::AlertSeverity;
