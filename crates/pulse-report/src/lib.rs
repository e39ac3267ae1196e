pub mod export;
pub mod report;

pub use export::{ExportFormat, MetricExporter};
pub use report::{
    AlertReport, MetricPerformance, PerformanceReport, Report, ReportBuilder, ReportKind,
    SummaryReport,
};
