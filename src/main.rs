use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use causelist_scraper::utils::logging;
use causelist_scraper::{
    CaptchaModeSetting, ChromeDriverFactory, Config, SessionController, SessionStatus, SessionStore,
    TerminalPrompt, TesseractCli,
};

/// 抓取 eCourts 每日排期表
#[derive(Debug, Parser)]
#[command(name = "causelist", version, about)]
struct Cli {
    /// 区名称（用于推荐区选项）
    #[arg(long)]
    district: String,

    /// today / tomorrow / YYYY-MM-DD
    #[arg(long, default_value = "today")]
    when: String,

    /// TOML 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 无头模式启动浏览器
    #[arg(long, overrides_with = "no_headless")]
    headless: bool,

    /// 显示浏览器窗口
    #[arg(long, overrides_with = "headless")]
    no_headless: bool,

    /// 验证码识别后自动点击配置中的案件类别
    #[arg(long)]
    auto_captcha: bool,
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::from_env(),
        };
        if self.headless {
            config.headless = true;
        }
        if self.no_headless {
            config.headless = false;
        }
        if self.auto_captcha {
            config.captcha_mode = CaptchaModeSetting::Auto;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    let cli = Cli::parse();

    // 加载配置
    let config = cli.load_config()?;
    if let Err(e) = logging::init_log_file(&config.log_file) {
        warn!("⚠️ 无法初始化日志文件 {}: {}", config.log_file, e);
    }
    logging::log_startup(&config);

    let controller = SessionController::new(
        config.clone(),
        Arc::new(ChromeDriverFactory::new(config.clone())),
        Arc::new(TesseractCli::new(config.tesseract_binary.clone())),
        Arc::new(TerminalPrompt::stdin()),
    );
    let store = SessionStore::new(controller);

    let id = store.start(&cli.district, &cli.when)?;
    if let Some(worker) = store.take_worker(&id)? {
        worker.await?;
    }

    let snapshot = store.poll(&id)?;
    match snapshot.status {
        SessionStatus::Completed => {
            let records = store.fetch_records(&id)?;
            info!("🎉 共抓取 {} 条案件", records.len());
            Ok(())
        }
        status => bail!(
            "会话 {} 以 {:?} 状态结束: {}",
            id,
            status,
            snapshot.error_detail.unwrap_or_default()
        ),
    }
}
