pub mod engine;
pub mod model;
pub mod stats;

pub use engine::{AlertEngine, EvaluationSummary};
pub use model::{
    AlertEvent, AlertRule, AlertStatus, AlertSuppression, CompareOp, MANUAL_RULE_ID,
};
pub use stats::{
    AlertEfficiency, AlertStatistics, AlertTrend, AlertTrendDirection, AlertTrendPoint,
};
