use chrono::{Duration, SecondsFormat, Utc};
use pulse_core::{PulseError, Result};
use pulse_store::{MetricSample, MetricStore};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// 导出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(PulseError::Validation(format!(
                "unknown export format: {}",
                other
            ))),
        }
    }
}

/// 指标导出器
pub struct MetricExporter {
    store: Arc<MetricStore>,
}

impl MetricExporter {
    pub fn new(store: Arc<MetricStore>) -> Self {
        Self { store }
    }

    /// 导出若干指标在回看窗口内的样本
    ///
    /// 每个指标内部按时间升序；指标顺序与入参一致。
    pub async fn export_metrics(
        &self,
        names: &[String],
        range: Duration,
        format: ExportFormat,
    ) -> Result<String> {
        let since = Utc::now() - range;

        let mut samples = Vec::new();
        for name in names {
            samples.extend(self.store.query(name, since).await);
        }

        match format {
            ExportFormat::Json => export_json(&samples),
            ExportFormat::Csv => Ok(export_csv(&samples)),
        }
    }
}

fn export_json(samples: &[MetricSample]) -> Result<String> {
    Ok(serde_json::to_string_pretty(
        &serde_json::json!({ "metrics": samples }),
    )?)
}

fn export_csv(samples: &[MetricSample]) -> String {
    let mut out = String::from("MetricName,Value,Timestamp,Tags\n");

    for sample in samples {
        let mut tags: Vec<(&String, &String)> = sample.tags.iter().collect();
        tags.sort_by(|a, b| a.0.cmp(b.0));
        let tags_field = tags
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(";");

        out.push_str(&format!(
            "{},{},{},{}\n",
            csv_escape(&sample.name),
            sample.value,
            sample
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            csv_escape(&tags_field)
        ));
    }

    out
}

/// 含逗号、引号或换行的字段加引号，内部引号翻倍
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
