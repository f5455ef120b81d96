use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::AppError;
use crate::models::CaseCategory;

/// 验证码提交方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptchaModeSetting {
    /// OCR 自动识别，类别由外部客户端选择
    Hybrid,
    /// OCR 自动识别，并自动点击 `auto_category`
    Auto,
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 排期表页面 URL
    pub target_url: String,
    /// 是否以无头模式启动浏览器
    pub headless: bool,
    /// 浏览器可执行文件路径（为空时由 chromiumoxide 自动查找）
    pub chrome_executable: Option<String>,
    /// 设置后连接到已打开的浏览器调试端口，而不是新启动浏览器
    pub browser_debug_port: Option<u16>,
    // --- 等待外部选择 ---
    /// 轮询间隔（秒）
    pub poll_interval_secs: u64,
    /// 下拉框选择超时（秒）
    pub dropdown_timeout_secs: u64,
    /// 案件类别选择超时（秒），要等验证码往返，所以更长
    pub category_timeout_secs: u64,
    // --- 验证码 ---
    pub captcha_max_attempts: usize,
    pub captcha_mode: CaptchaModeSetting,
    pub auto_category: CaseCategory,
    pub tesseract_binary: String,
    // --- 表单 ---
    /// 法官下拉框查找轮数
    pub judge_lookup_attempts: usize,
    pub judge_lookup_backoff_ms: u64,
    /// 单个元素等待时间（秒）
    pub element_timeout_secs: u64,
    /// 步骤之间的停顿（毫秒），给页面异步加载留时间
    pub settle_delay_ms: u64,
    /// 可查询的最远日期（天）
    pub max_advance_days: i64,
    // --- 输出 ---
    pub output_dir: String,
    pub save_results: bool,
    pub log_file: String,
    /// 终止会话在会话表中的保留时间（秒）
    pub session_retention_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_url: "https://services.ecourts.gov.in/ecourtindia_v6/?p=cause_list/index"
                .to_string(),
            headless: true,
            chrome_executable: None,
            browser_debug_port: None,
            poll_interval_secs: 15,
            dropdown_timeout_secs: 120,
            category_timeout_secs: 180,
            captcha_max_attempts: 4,
            captcha_mode: CaptchaModeSetting::Hybrid,
            auto_category: CaseCategory::Civil,
            tesseract_binary: "tesseract".to_string(),
            judge_lookup_attempts: 5,
            judge_lookup_backoff_ms: 800,
            element_timeout_secs: 5,
            settle_delay_ms: 1000,
            max_advance_days: 30,
            output_dir: "ecourts_output".to_string(),
            save_results: true,
            log_file: "ecourts_output/ecourts_run.log".to_string(),
            session_retention_secs: 3600,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// 以默认值为基础，用环境变量覆盖
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺省字段取默认值，再应用环境变量覆盖
    pub fn from_toml_file(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::io(path.display().to_string(), e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config.with_env_overrides())
    }

    fn with_env_overrides(self) -> Self {
        let d = self;
        Self {
            target_url: std::env::var("TARGET_URL").unwrap_or(d.target_url),
            headless: env_parse("HEADLESS").unwrap_or(d.headless),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(d.chrome_executable),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").or(d.browser_debug_port),
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS").unwrap_or(d.poll_interval_secs),
            dropdown_timeout_secs: env_parse("DROPDOWN_TIMEOUT_SECS").unwrap_or(d.dropdown_timeout_secs),
            category_timeout_secs: env_parse("CATEGORY_TIMEOUT_SECS").unwrap_or(d.category_timeout_secs),
            captcha_max_attempts: env_parse("CAPTCHA_MAX_ATTEMPTS").unwrap_or(d.captcha_max_attempts),
            captcha_mode: match std::env::var("CAPTCHA_MODE").ok().as_deref() {
                Some("auto") => CaptchaModeSetting::Auto,
                Some("hybrid") => CaptchaModeSetting::Hybrid,
                _ => d.captcha_mode,
            },
            auto_category: std::env::var("AUTO_CATEGORY")
                .ok()
                .and_then(|v| CaseCategory::parse(&v))
                .unwrap_or(d.auto_category),
            tesseract_binary: std::env::var("TESSERACT_BINARY").unwrap_or(d.tesseract_binary),
            judge_lookup_attempts: env_parse("JUDGE_LOOKUP_ATTEMPTS").unwrap_or(d.judge_lookup_attempts),
            judge_lookup_backoff_ms: env_parse("JUDGE_LOOKUP_BACKOFF_MS").unwrap_or(d.judge_lookup_backoff_ms),
            element_timeout_secs: env_parse("ELEMENT_TIMEOUT_SECS").unwrap_or(d.element_timeout_secs),
            settle_delay_ms: env_parse("SETTLE_DELAY_MS").unwrap_or(d.settle_delay_ms),
            max_advance_days: env_parse("MAX_ADVANCE_DAYS").unwrap_or(d.max_advance_days),
            output_dir: std::env::var("OUTPUT_DIR").unwrap_or(d.output_dir),
            save_results: env_parse("SAVE_RESULTS").unwrap_or(d.save_results),
            log_file: std::env::var("LOG_FILE").unwrap_or(d.log_file),
            session_retention_secs: env_parse("SESSION_RETENTION_SECS").unwrap_or(d.session_retention_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn dropdown_timeout(&self) -> Duration {
        Duration::from_secs(self.dropdown_timeout_secs)
    }

    pub fn category_timeout(&self) -> Duration {
        Duration::from_secs(self.category_timeout_secs)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn judge_lookup_backoff(&self) -> Duration {
        Duration::from_millis(self.judge_lookup_backoff_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn session_retention(&self) -> Duration {
        Duration::from_secs(self.session_retention_secs)
    }
}
