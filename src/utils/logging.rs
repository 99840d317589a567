//! 日志工具模块
//!
//! 提供日志初始化以及格式化输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::{CardStatus, StateSummary};
use crate::orchestrator::CycleReport;

/// 初始化 tracing 日志
///
/// 通过 `RUST_LOG` 控制级别，默认 `info`；重复调用不会报错
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 批次轮询发布模式");
    info!("⏱️ 轮询间隔: {} 分钟", config.interval_minutes);
    match config.cycles {
        Some(n) => info!("🔁 轮询次数: {}", n),
        None => info!("🔁 轮询次数: 不限"),
    }
    info!("📝 默认模板: {}", config.default_template_id);
    info!("{}", "=".repeat(60));
}

/// 记录一轮开始
pub fn log_cycle_start(cycle: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始第 {} 轮轮询", cycle);
    info!("{}", "=".repeat(60));
}

/// 记录一轮完成
pub fn log_cycle_complete(cycle: usize, report: &CycleReport) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 轮完成: 拉取 {} / 新建 {} / 发布 {} / 待处理 {} / 失败 {}",
        cycle, report.fetched, report.admitted, report.posted, report.need_action, report.failed
    );
    info!("{}", "─".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(summary: &StateSummary) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🗂️ 卡片总数: {}", summary.total_cards);
    for status in CardStatus::ALL {
        let count = summary.count(status);
        if count > 0 {
            info!("  {}: {}", status, count);
        }
    }
    info!("✅ 已发布: {}", summary.count(CardStatus::Posted));
    info!("⚠️ 待人工处理: {}", summary.need_action_queue);
    info!("📜 发布历史: {}", summary.history);
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("короткий", 20), "короткий");
        assert_eq!(truncate_text("абвгд", 3), "абв...");
    }
}
