pub mod aggregate;
pub mod anomaly;
pub mod stats;
pub mod trend;

pub use aggregate::{AggregatedMetric, AggregationType, Aggregator, SlidingWindowStream};
pub use anomaly::{AnomalyDetection, AnomalyType};
pub use stats::{MetricStatistics, StatsAnalyzer};
pub use trend::{TrendAnalysis, TrendConfidence, TrendDirection};
