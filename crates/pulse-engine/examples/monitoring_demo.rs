use pulse_alert::{AlertRule, CompareOp};
use pulse_analytics::AggregationType;
use pulse_core::{AlertSeverity, EngineConfig};
use pulse_engine::MonitoringEngine;
use pulse_notify::NotifyConfig;
use pulse_report::ExportFormat;
use std::collections::HashMap;
use tokio::time::{sleep, Duration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== PULSE 监控引擎示例 ===\n");

    // 1. 构建引擎
    println!("1. 构建引擎");
    let mut config = EngineConfig::default();
    config.scheduler.evaluation_interval_secs = 1;
    let engine = MonitoringEngine::new(config).await?;

    // 2. 注册通知渠道
    println!("2. 注册通知渠道");
    let notify_config = NotifyConfig::from_toml_str(
        r#"
[[channels]]
type = "log"

[[channels]]
type = "webhook"
url = "https://example.com/hook"
min_severity = "critical"
"#,
    )?;
    engine.register_channels(&notify_config).await;
    println!(
        "已注册 {} 个通知渠道\n",
        engine.notify_manager().notifier_count().await
    );

    // 3. 创建告警规则
    println!("3. 创建告警规则");
    let rule = engine
        .alerts()
        .create_rule(AlertRule {
            name: "high_cpu".to_string(),
            description: "CPU 使用率过高".to_string(),
            metric_name: "cpu_usage".to_string(),
            operator: CompareOp::Gt,
            threshold: 80.0,
            severity: AlertSeverity::Critical,
            cooldown_secs: 60,
            ..Default::default()
        })
        .await?;
    println!("规则已创建: {} ({})\n", rule.name, rule.id);

    // 4. 写入指标并启动后台评估
    println!("4. 写入指标并启动后台评估");
    engine.start().await?;

    for value in [45.0, 60.0, 72.0, 85.0, 92.0] {
        engine.record_value("cpu_usage", value).await?;
        sleep(Duration::from_millis(300)).await;
    }

    sleep(Duration::from_millis(1500)).await;

    // 5. 查看触发的告警
    println!("\n5. 当前活跃告警:");
    let active = engine.alerts().active_alerts().await;
    for alert in &active {
        println!(
            "  - {} | {} = {:.1}（阈值 {:.1}）",
            alert.rule_name, alert.metric_name, alert.metric_value, alert.threshold
        );
    }

    // 6. 确认并解决
    if let Some(alert) = active.first() {
        println!("\n6. 确认并解决告警");
        engine
            .alerts()
            .acknowledge_alert(&alert.id, "ops", "已定位进程")
            .await?;
        engine
            .alerts()
            .resolve_alert(&alert.id, "ops", "已重启服务")
            .await?;
        println!("告警 {} 已解决", alert.id);
    }

    // 7. 统计与聚合
    println!("\n7. 统计与聚合");
    let stats = engine
        .get_statistics("cpu_usage", chrono::Duration::minutes(5))
        .await;
    println!(
        "cpu_usage: avg={:.1} max={:.1} min={:.1} count={}",
        stats.average, stats.max, stats.min, stats.count
    );

    if let Some(aggregated) = engine
        .aggregate_window(
            "cpu_usage",
            chrono::Duration::minutes(1),
            AggregationType::Max,
        )
        .await
    {
        println!("近一分钟最大值: {:.1}", aggregated.value);
    }

    // 8. 导出
    println!("\n8. CSV 导出");
    let csv = engine
        .export_metrics(
            &["cpu_usage".to_string()],
            chrono::Duration::hours(1),
            ExportFormat::Csv,
        )
        .await?;
    println!("{}", csv);

    engine.shutdown().await;
    println!("=== 示例完成 ===");
    Ok(())
}
