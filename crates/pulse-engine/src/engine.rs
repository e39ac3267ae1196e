use crate::ops::OpsMetrics;
use crate::scheduler::EngineScheduler;
use chrono::{DateTime, Duration, Utc};
use pulse_alert::AlertEngine;
use pulse_analytics::{
    AggregatedMetric, AggregationType, Aggregator, AnomalyDetection, MetricStatistics,
    SlidingWindowStream, StatsAnalyzer, TrendAnalysis,
};
use pulse_core::{EngineConfig, PulseError, Result};
use pulse_notify::{NotifyConfig, NotifyManager};
use pulse_persist::{PersistBackend, RedisBackend};
use pulse_report::{ExportFormat, MetricExporter, Report, ReportBuilder, ReportKind};
use pulse_store::{MetricMetadata, MetricSample, MetricStore, RetentionPolicy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// 监控引擎门面
///
/// 进程启动时显式构建一次，退出时显式 `shutdown`；
/// 内部子系统全部经由该结构体持有，没有全局状态。
pub struct MonitoringEngine {
    config: EngineConfig,
    store: Arc<MetricStore>,
    aggregator: Aggregator,
    analyzer: StatsAnalyzer,
    notify: Arc<NotifyManager>,
    alerts: Arc<AlertEngine>,
    reports: ReportBuilder,
    exporter: MetricExporter,
    persist: Option<Arc<dyn PersistBackend>>,
    ops: Arc<OpsMetrics>,
    scheduler: Mutex<Option<EngineScheduler>>,
}

impl MonitoringEngine {
    /// 按配置构建引擎
    ///
    /// 镜像存储不可达时降级为纯内存运行，只记一条警告。
    pub async fn new(config: EngineConfig) -> Result<Self> {
        let persist: Option<Arc<dyn PersistBackend>> = if config.persist.enabled {
            match RedisBackend::connect(&config.persist.redis_url).await {
                Ok(backend) => Some(Arc::new(backend)),
                Err(e) => {
                    warn!(
                        error = %e,
                        "Redis mirror unavailable, continuing without persistence"
                    );
                    None
                }
            }
        } else {
            None
        };

        Self::with_backend(config, persist)
    }

    /// 注入后端构建，测试和嵌入方使用
    pub fn with_backend(
        config: EngineConfig,
        persist: Option<Arc<dyn PersistBackend>>,
    ) -> Result<Self> {
        let store = Arc::new(MetricStore::new(RetentionPolicy::new(
            config.store.retention_secs,
            config.store.max_samples_per_metric,
        )));
        let notify = Arc::new(NotifyManager::new());

        let mut alerts = AlertEngine::new(store.clone(), notify.clone())
            .with_history_capacity(config.alert.history_capacity);
        if let Some(backend) = &persist {
            alerts = alerts.with_persistence(
                backend.clone(),
                StdDuration::from_secs(config.persist.ttl_secs),
            );
        }
        let alerts = Arc::new(alerts);

        let ops =
            Arc::new(OpsMetrics::new().map_err(|e| PulseError::Internal(e.to_string()))?);

        info!(
            retention_secs = config.store.retention_secs,
            history_capacity = config.alert.history_capacity,
            persistence = persist.is_some(),
            "Monitoring engine constructed"
        );

        Ok(Self {
            aggregator: Aggregator::new(store.clone()),
            analyzer: StatsAnalyzer::new(store.clone()),
            reports: ReportBuilder::new(store.clone(), alerts.clone()),
            exporter: MetricExporter::new(store.clone()),
            store,
            notify,
            alerts,
            persist,
            ops,
            config,
            scheduler: Mutex::new(None),
        })
    }

    /// 启动后台任务（评估循环、清理循环、每日汇总）
    pub async fn start(&self) -> Result<()> {
        let mut guard = self.scheduler.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let scheduler = EngineScheduler::start(
            &self.config.scheduler,
            self.alerts.clone(),
            self.store.clone(),
            self.ops.clone(),
            self.persist.clone(),
            StdDuration::from_secs(self.config.persist.ttl_secs),
        )
        .await
        .map_err(PulseError::from)?;

        *guard = Some(scheduler);
        Ok(())
    }

    /// 停止后台任务并等待退出
    pub async fn shutdown(&self) {
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.shutdown().await;
        }
    }

    // ------------------------------------------------------------------
    // 写入接口
    // ------------------------------------------------------------------

    /// 记录一个指标样本
    pub async fn record_metric(
        &self,
        name: &str,
        value: f64,
        timestamp: DateTime<Utc>,
        tags: HashMap<String, String>,
    ) -> Result<()> {
        let sample = MetricSample {
            name: name.to_string(),
            value,
            timestamp,
            tags,
        };
        self.ingest(sample).await
    }

    /// 以当前时间记录
    pub async fn record_value(&self, name: &str, value: f64) -> Result<()> {
        self.record_metric(name, value, Utc::now(), HashMap::new())
            .await
    }

    /// 批量记录
    pub async fn record_metrics(&self, batch: Vec<MetricSample>) -> Result<()> {
        for sample in batch {
            self.ingest(sample).await?;
        }
        Ok(())
    }

    /// 记录性能指标，统一加 `performance.` 前缀
    pub async fn record_performance_metrics(&self, metrics: HashMap<String, f64>) -> Result<()> {
        for (name, value) in metrics {
            self.record_value(&format!("performance.{}", name), value)
                .await?;
        }
        Ok(())
    }

    /// 记录系统指标，统一加 `system.` 前缀
    pub async fn record_system_metrics(&self, metrics: HashMap<String, f64>) -> Result<()> {
        for (name, value) in metrics {
            self.record_value(&format!("system.{}", name), value)
                .await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // 查询接口
    // ------------------------------------------------------------------

    pub async fn get_statistics(&self, name: &str, lookback: Duration) -> MetricStatistics {
        self.analyzer.statistics(name, lookback).await
    }

    pub async fn get_percentiles(
        &self,
        name: &str,
        percentiles: &[f64],
        lookback: Duration,
    ) -> Vec<(f64, f64)> {
        self.analyzer.percentiles(name, percentiles, lookback).await
    }

    pub async fn get_trend(&self, name: &str, lookback: Duration) -> TrendAnalysis {
        self.analyzer.analyze_trend(name, lookback).await
    }

    pub async fn get_anomalies(
        &self,
        name: &str,
        threshold_stddevs: f64,
        lookback: Duration,
    ) -> Vec<AnomalyDetection> {
        self.analyzer
            .detect_anomalies(name, threshold_stddevs, lookback)
            .await
    }

    pub async fn get_available_metrics(&self) -> Vec<String> {
        self.store.metric_names().await
    }

    pub async fn get_metric_metadata(&self, name: &str) -> Result<MetricMetadata> {
        self.store
            .metadata(name)
            .await
            .ok_or_else(|| PulseError::NotFound(format!("metric {}", name)))
    }

    // ------------------------------------------------------------------
    // 聚合接口
    // ------------------------------------------------------------------

    pub async fn aggregate_window(
        &self,
        name: &str,
        window: Duration,
        aggregation: AggregationType,
    ) -> Option<AggregatedMetric> {
        self.aggregator
            .aggregate_window(name, window, aggregation)
            .await
    }

    pub async fn aggregate_custom<F>(
        &self,
        name: &str,
        window: Duration,
        reducer: F,
    ) -> Option<AggregatedMetric>
    where
        F: Fn(&[f64]) -> f64,
    {
        self.aggregator.aggregate_custom(name, window, reducer).await
    }

    /// 滑动窗口流，通道容量来自配置
    pub fn sliding_window(
        &self,
        name: &str,
        window: Duration,
        slide: StdDuration,
        aggregation: AggregationType,
    ) -> SlidingWindowStream {
        self.aggregator.sliding_window(
            name,
            window,
            slide,
            aggregation,
            self.config.alert.sliding_channel_capacity,
        )
    }

    // ------------------------------------------------------------------
    // 告警、通知、报表
    // ------------------------------------------------------------------

    /// 告警管理入口（规则 CRUD、抑制、确认/解决）
    pub fn alerts(&self) -> Arc<AlertEngine> {
        self.alerts.clone()
    }

    pub fn notify_manager(&self) -> Arc<NotifyManager> {
        self.notify.clone()
    }

    /// 按 TOML 渠道配置批量注册通知器
    pub async fn register_channels(&self, config: &NotifyConfig) {
        for notifier in config.build_notifiers() {
            self.notify.register(notifier).await;
        }
    }

    pub async fn generate_report(&self, kind: ReportKind, range: Duration) -> Report {
        self.reports.generate_report(kind, range).await
    }

    pub fn reports(&self) -> &ReportBuilder {
        &self.reports
    }

    pub async fn export_metrics(
        &self,
        names: &[String],
        range: Duration,
        format: ExportFormat,
    ) -> Result<String> {
        self.exporter.export_metrics(names, range, format).await
    }

    /// 导出引擎自身的运行计数（Prometheus 文本格式）
    pub fn export_ops_metrics(&self) -> Result<String> {
        self.ops
            .export(&self.alerts)
            .map_err(|e| PulseError::Internal(e.to_string()))
    }

    pub fn store(&self) -> Arc<MetricStore> {
        self.store.clone()
    }

    // ------------------------------------------------------------------
    // 内部
    // ------------------------------------------------------------------

    async fn ingest(&self, sample: MetricSample) -> Result<()> {
        self.store.record_sample(sample.clone()).await?;
        self.ops.inc_samples_ingested(1);
        self.mirror_sample(sample);
        Ok(())
    }

    /// 样本镜像写出：异步旁路，失败只计数
    fn mirror_sample(&self, sample: MetricSample) {
        let Some(persist) = &self.persist else {
            return;
        };
        let payload = match serde_json::to_string(&sample) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(metric = %sample.name, error = %e, "Sample serialization failed");
                return;
            }
        };

        let persist = persist.clone();
        let ops = self.ops.clone();
        let ttl = StdDuration::from_secs(self.config.persist.ttl_secs);
        tokio::spawn(async move {
            if let Err(e) = persist
                .put_sample(&sample.name, sample.timestamp, payload, ttl)
                .await
            {
                ops.inc_sample_mirror_failure();
                warn!(metric = %sample.name, error = %e, "Sample mirror write failed");
            }
        });
    }
}
