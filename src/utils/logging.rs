use anyhow::Result;
/// 日志工具模块
///
/// 提供日志初始化和输出的辅助函数
use std::fs;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::{SessionSnapshot, SessionStatus};

/// 安装全局日志订阅器，遵循 `RUST_LOG`（默认 info）
///
/// 重复调用不会报错
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(log_file_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let log_header = format!(
        "{}\n排期表抓取日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 排期表抓取");
    info!("🌐 目标页面: {}", config.target_url);
    match config.browser_debug_port {
        Some(port) => info!("🔌 连接已打开的浏览器，端口: {}", port),
        None => info!("🖥️ 启动新浏览器 (headless: {})", config.headless),
    }
    info!("🔐 验证码模式: {:?}，最多 {} 次", config.captcha_mode, config.captcha_max_attempts);
    info!("{}", "=".repeat(60));
}

/// 打印会话结束时的统计信息
pub fn log_session_summary(snapshot: &SessionSnapshot) {
    info!("\n{}", "─".repeat(60));
    info!("📊 会话 {} 结束", snapshot.id);
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    match snapshot.status {
        SessionStatus::Completed => info!("✅ 成功: {} 条案件", snapshot.record_count),
        SessionStatus::Cancelled => info!("🛑 已取消"),
        _ => info!(
            "❌ 失败: {}",
            truncate_text(snapshot.error_detail.as_deref().unwrap_or("未知错误"), 200)
        ),
    }
    if !snapshot.completed_steps.is_empty() {
        let steps: Vec<&str> = snapshot.completed_steps.iter().map(|s| s.as_str()).collect();
        info!("已完成步骤: {}", steps.join(" → "));
    }
    info!("{}", "─".repeat(60));
}

/// 截断文本
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
