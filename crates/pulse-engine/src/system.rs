use pulse_store::MetricStore;
use std::sync::Arc;
use sysinfo::System;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, warn};

/// 系统指标采样器
///
/// 周期性把本机 CPU/内存读数灌入指标存储，走与业务指标
/// 相同的 `system.` 前缀通道。
pub struct SystemSampler {
    system: System,
    store: Arc<MetricStore>,
}

impl SystemSampler {
    pub fn new(store: Arc<MetricStore>) -> Self {
        Self {
            system: System::new_all(),
            store,
        }
    }

    /// 采样一次
    pub async fn sample(&mut self) {
        self.system.refresh_all();

        let cpu_usage = self.system.global_cpu_info().cpu_usage() as f64;
        let memory_used = self.system.used_memory() as f64;

        for (name, value) in [
            ("system.cpu_usage", cpu_usage),
            ("system.memory_used_bytes", memory_used),
        ] {
            if let Err(e) = self
                .store
                .record(name, value, chrono::Utc::now(), Default::default())
                .await
            {
                warn!(metric = %name, error = %e, "System metric record failed");
            }
        }

        debug!(
            cpu_usage,
            memory_used_mb = memory_used / 1024.0 / 1024.0,
            "System metrics sampled"
        );
    }

    /// 启动周期采样，返回句柄供取消
    pub fn start_periodic_collection(mut self, interval_secs: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                ticker.tick().await;
                self.sample().await;
            }
        })
    }
}
