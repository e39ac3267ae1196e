use crate::ops::OpsMetrics;
use chrono::Utc;
use pulse_alert::AlertEngine;
use pulse_core::SchedulerConfig;
use pulse_persist::PersistBackend;
use pulse_store::MetricStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

/// 后台任务调度
///
/// 规则评估与过期清理走固定间隔循环，每日告警汇总走 Cron 任务；
/// 所有循环监听同一个停机信号，`shutdown` 等待它们退出。
pub struct EngineScheduler {
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    cron: Option<JobScheduler>,
}

impl EngineScheduler {
    /// 启动全部后台任务
    pub async fn start(
        config: &SchedulerConfig,
        alerts: Arc<AlertEngine>,
        store: Arc<MetricStore>,
        ops: Arc<OpsMetrics>,
        persist: Option<Arc<dyn PersistBackend>>,
        persist_ttl: Duration,
    ) -> anyhow::Result<Self> {
        let (stop_tx, _) = watch::channel(false);
        let mut handles = Vec::new();

        // 规则评估循环
        {
            let alerts = alerts.clone();
            let ops = ops.clone();
            let mut stop_rx = stop_tx.subscribe();
            let interval = Duration::from_secs(config.evaluation_interval_secs.max(1));

            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let summary = alerts.evaluate_all_rules().await;
                            ops.record_sweep(&summary);
                        }
                        _ = stop_rx.changed() => {
                            debug!("Evaluation loop stopped");
                            break;
                        }
                    }
                }
            }));
        }

        // 过期样本清理循环
        {
            let store = store.clone();
            let mut stop_rx = stop_tx.subscribe();
            let interval = Duration::from_secs(config.cleanup_interval_secs.max(1));

            handles.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            store.cleanup_stale().await;
                        }
                        _ = stop_rx.changed() => {
                            debug!("Cleanup loop stopped");
                            break;
                        }
                    }
                }
            }));
        }

        // 每日告警汇总落盘
        let cron = if let Some(persist) = persist {
            let scheduler = JobScheduler::new().await?;
            let alerts = alerts.clone();

            let job = Job::new_async(config.summary_cron.as_str(), move |_uuid, _l| {
                let alerts = alerts.clone();
                let persist = persist.clone();

                Box::pin(async move {
                    let statistics = alerts.alert_statistics().await;
                    let date = Utc::now().date_naive();

                    let payload = match serde_json::to_string(&statistics) {
                        Ok(payload) => payload,
                        Err(e) => {
                            error!(error = %e, "Summary serialization failed");
                            return;
                        }
                    };

                    match persist.put_summary(date, payload, persist_ttl).await {
                        Ok(()) => {
                            info!(date = %date, total = statistics.total, "Daily alert summary persisted");
                        }
                        Err(e) => {
                            warn!(date = %date, error = %e, "Daily alert summary write failed");
                        }
                    }
                })
            })?;

            scheduler.add(job).await?;
            scheduler.start().await?;
            Some(scheduler)
        } else {
            None
        };

        info!(
            evaluation_interval_secs = config.evaluation_interval_secs,
            cleanup_interval_secs = config.cleanup_interval_secs,
            "Engine scheduler started"
        );

        Ok(Self {
            stop_tx,
            handles,
            cron,
        })
    }

    /// 停止所有后台任务并等待退出
    pub async fn shutdown(mut self) {
        let _ = self.stop_tx.send(true);

        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }

        if let Some(mut cron) = self.cron.take() {
            if let Err(e) = cron.shutdown().await {
                warn!(error = %e, "Cron scheduler shutdown failed");
            }
        }

        info!("Engine scheduler stopped");
    }
}
