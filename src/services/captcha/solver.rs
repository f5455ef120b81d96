//! 验证码求解状态机
//!
//! 每次尝试：定位图片 → 取图 → 预处理 → OCR → 填入输入框 →
//! 自动点击类别并校验，或（混合模式）暂停等待外部给出类别。
//! 任何一步失败都刷新一次验证码，再开始下一次尝试。

use anyhow::Result;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{CaptchaModeSetting, Config};
use crate::error::AppError;
use crate::infrastructure::{first_present, BrowserDriver, Locator};
use crate::models::CaseCategory;
use crate::services::captcha::ocr::{clean_ocr_text, OcrEngine, PageSegMode, CAPTCHA_LENGTH, CAPTCHA_WHITELIST};
use crate::services::captcha::preprocess;
use crate::services::portal;

/// 类别选择方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptchaMode {
    /// 识别后直接点击该类别
    Auto(CaseCategory),
    /// 识别并填入后暂停，等外部客户端给出类别
    Hybrid,
}

impl CaptchaMode {
    pub fn from_config(config: &Config) -> Self {
        match config.captcha_mode {
            CaptchaModeSetting::Auto => CaptchaMode::Auto(config.auto_category),
            CaptchaModeSetting::Hybrid => CaptchaMode::Hybrid,
        }
    }
}

/// 求解结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaOutcome {
    /// 已提交并通过校验
    Solved { category: CaseCategory, text: String },
    /// 验证码已填入，等待外部给出类别后调用 [`CaptchaSolver::resume`]
    AwaitingCategory { text: String },
}

/// 提交后判断结果页的启发式规则
///
/// 阈值与关键词针对当前的门户页面，页面改版后需要重新校准
#[derive(Debug, Clone)]
pub struct ValidationHeuristics {
    pub min_keyword_hits: usize,
    pub success_keywords: &'static [&'static str],
    /// 日期范围等弹窗错误文本（小写）
    pub popup_errors: &'static [&'static str],
    /// URL 同时包含这些片段时视为结果页
    pub url_markers: &'static [&'static str],
}

impl Default for ValidationHeuristics {
    fn default() -> Self {
        Self {
            min_keyword_hits: 2,
            success_keywords: &[
                "principal district judge",
                "civil cases listed",
                "sr no",
                "cases",
                "party name",
                "advocate",
                "record not found",
                "urgent cases",
                "awaited",
            ],
            popup_errors: &[
                "selection valid upto one month",
                "selection only upto 1 month allowed",
                "invalid date",
                "date range exceeded",
                "maximum 1 month",
                "date should be within",
                "please select date within",
            ],
            url_markers: &["cause_list", "index"],
        }
    }
}

impl ValidationHeuristics {
    /// 页面文本中出现的成功关键词数
    pub fn keyword_hits(&self, text: &str) -> usize {
        let lowered = text.to_lowercase();
        self.success_keywords
            .iter()
            .filter(|kw| lowered.contains(*kw))
            .count()
    }

    /// 页面文本中的弹窗错误
    pub fn popup_error(&self, text: &str) -> Option<&'static str> {
        let lowered = text.to_lowercase();
        self.popup_errors.iter().copied().find(|e| lowered.contains(e))
    }

    pub fn url_looks_like_results(&self, url: &str) -> bool {
        let lowered = url.to_lowercase();
        self.url_markers.iter().all(|m| lowered.contains(m))
    }
}

/// 单次尝试的结果
enum Attempt {
    Solved(CaseCategory, String),
    Awaiting(String),
    Retry(String),
}

/// 验证码求解器
///
/// 尝试次数在整个会话中累计，`resume` 失败后转入自动模式继续消耗剩余次数
pub struct CaptchaSolver {
    ocr: Arc<dyn OcrEngine>,
    max_attempts: usize,
    attempts: usize,
    refreshes: usize,
    element_timeout: Duration,
    settle_delay: Duration,
    heuristics: ValidationHeuristics,
    pending_text: Option<String>,
}

impl CaptchaSolver {
    pub fn new(ocr: Arc<dyn OcrEngine>, config: &Config) -> Self {
        Self {
            ocr,
            max_attempts: config.captcha_max_attempts.max(1),
            attempts: 0,
            refreshes: 0,
            element_timeout: config.element_timeout(),
            settle_delay: config.settle_delay(),
            heuristics: ValidationHeuristics::default(),
            pending_text: None,
        }
    }

    pub fn with_heuristics(mut self, heuristics: ValidationHeuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    /// 已消耗的尝试次数
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// 已触发的刷新次数
    pub fn refreshes(&self) -> usize {
        self.refreshes
    }

    /// 求解验证码；用完全部尝试次数后返回 `CaptchaExhausted`
    pub async fn solve(&mut self, driver: &dyn BrowserDriver, mode: CaptchaMode) -> Result<CaptchaOutcome> {
        while self.attempts < self.max_attempts {
            self.attempts += 1;
            info!("🔐 验证码第 {}/{} 次尝试", self.attempts, self.max_attempts);

            match self.attempt(driver, mode).await? {
                Attempt::Solved(category, text) => {
                    info!("✅ 验证码通过，类别: {}", category);
                    return Ok(CaptchaOutcome::Solved { category, text });
                }
                Attempt::Awaiting(text) => {
                    info!("⏳ 验证码已填入 ({})，等待选择案件类别", text);
                    self.pending_text = Some(text.clone());
                    return Ok(CaptchaOutcome::AwaitingCategory { text });
                }
                Attempt::Retry(reason) => {
                    warn!("⚠️ 第 {} 次尝试失败: {}", self.attempts, reason);
                    self.refresh(driver).await;
                }
            }
        }

        Err(AppError::CaptchaExhausted {
            attempts: self.attempts,
        }
        .into())
    }

    /// 混合模式下收到类别后继续：点击类别并校验，失败则刷新并按该类别自动重试
    pub async fn resume(&mut self, driver: &dyn BrowserDriver, category: CaseCategory) -> Result<CaptchaOutcome> {
        let text = self.pending_text.take().unwrap_or_default();
        info!("▶️ 收到类别 {}，提交验证码", category);

        match self.submit_and_validate(driver, category).await {
            Ok(true) => return Ok(CaptchaOutcome::Solved { category, text }),
            Ok(false) => warn!("⚠️ 第 {} 次尝试校验失败", self.attempts),
            Err(e) => warn!("⚠️ 提交类别失败: {}", e),
        }
        self.refresh(driver).await;
        self.solve(driver, CaptchaMode::Auto(category)).await
    }

    async fn attempt(&mut self, driver: &dyn BrowserDriver, mode: CaptchaMode) -> Result<Attempt> {
        let Some(image_locator) = first_present(driver, portal::CAPTCHA_IMAGE, self.element_timeout).await? else {
            return Ok(Attempt::Retry("未找到验证码图片".to_string()));
        };

        let image = match self.capture(driver, &image_locator).await {
            Ok(image) => image,
            Err(e) => return Ok(Attempt::Retry(format!("读取验证码图片失败: {}", e))),
        };

        let Some(text) = self.recognize(&image).await else {
            return Ok(Attempt::Retry(format!("未识别出 {} 位验证码", CAPTCHA_LENGTH)));
        };
        debug!("识别结果: {}", text);

        let Some(input) = first_present(driver, portal::CAPTCHA_INPUT, Duration::ZERO).await? else {
            return Ok(Attempt::Retry("未找到验证码输入框".to_string()));
        };
        if let Err(e) = driver.set_value(&input, &text).await {
            return Ok(Attempt::Retry(format!("填写验证码失败: {}", e)));
        }

        match mode {
            CaptchaMode::Hybrid => Ok(Attempt::Awaiting(text)),
            CaptchaMode::Auto(category) => match self.submit_and_validate(driver, category).await {
                Ok(true) => Ok(Attempt::Solved(category, text)),
                Ok(false) => Ok(Attempt::Retry("提交后校验失败".to_string())),
                Err(e) => Ok(Attempt::Retry(format!("提交失败: {}", e))),
            },
        }
    }

    /// 内嵌图片直接解码，否则对元素截图
    async fn capture(&self, driver: &dyn BrowserDriver, locator: &Locator) -> Result<DynamicImage> {
        let src = driver.attribute(locator, "src").await?.unwrap_or_default();
        if let Some(decoded) = preprocess::decode_data_url(&src) {
            return Ok(decoded?);
        }
        let bytes = driver.screenshot(locator).await?;
        Ok(preprocess::decode(&bytes)?)
    }

    /// 依次在两张候选图、两种布局假设下识别，返回第一个长度正确的结果
    async fn recognize(&self, image: &DynamicImage) -> Option<String> {
        for candidate in preprocess::binarize_candidates(image) {
            for mode in [PageSegMode::SingleLine, PageSegMode::SingleWord] {
                match self.ocr.recognize(&candidate, mode, CAPTCHA_WHITELIST).await {
                    Ok(raw) => {
                        let text = clean_ocr_text(&raw);
                        if text.len() == CAPTCHA_LENGTH {
                            return Some(text);
                        }
                        debug!("OCR 结果长度不符 (psm {}): {:?}", mode.psm(), text);
                    }
                    Err(e) => warn!("OCR 失败: {}", e),
                }
            }
        }
        None
    }

    async fn submit_and_validate(&self, driver: &dyn BrowserDriver, category: CaseCategory) -> Result<bool> {
        self.click_category(driver, category).await?;
        sleep(self.settle_delay).await;
        self.check_success(driver).await
    }

    /// 点击类别按钮提交表单
    pub async fn click_category(&self, driver: &dyn BrowserDriver, category: CaseCategory) -> Result<()> {
        for locator in portal::category_buttons(category) {
            if !driver.is_visible(&locator).await.unwrap_or(false) {
                continue;
            }
            match driver.click(&locator).await {
                Ok(()) => {
                    debug!("已点击类别按钮: {}", locator);
                    return Ok(());
                }
                Err(e) => debug!("点击 {} 失败: {}", locator, e),
            }
        }
        Err(AppError::navigation(format!("未找到 {} 按钮", category)).into())
    }

    /// 判断提交后是否进入结果页
    pub async fn check_success(&self, driver: &dyn BrowserDriver) -> Result<bool> {
        for locator in portal::FAILURE_BANNERS {
            if driver.is_visible(locator).await.unwrap_or(false) {
                debug!("出现错误提示: {}", locator);
                return Ok(false);
            }
        }

        for locator in portal::CAPTCHA_INPUT {
            if !driver.is_visible(locator).await.unwrap_or(false) {
                continue;
            }
            let value = driver.attribute(locator, "value").await.ok().flatten();
            if value.is_some_and(|v| !v.trim().is_empty()) {
                debug!("验证码输入框仍有内容，提交未被接受");
                return Ok(false);
            }
        }

        let body = driver.body_text().await.unwrap_or_default();
        if let Some(popup) = self.heuristics.popup_error(&body) {
            warn!("⚠️ 页面提示日期错误: {}", popup);
            return Ok(false);
        }

        for locator in portal::SUCCESS_MARKERS.iter().chain(portal::RECORD_NOT_FOUND) {
            if driver.is_visible(locator).await.unwrap_or(false) {
                debug!("结果页标记: {}", locator);
                return Ok(true);
            }
        }

        let hits = self.heuristics.keyword_hits(&body);
        if hits >= self.heuristics.min_keyword_hits {
            debug!("命中 {} 个结果页关键词", hits);
            return Ok(true);
        }

        let url = driver.current_url().await.unwrap_or_default();
        Ok(self.heuristics.url_looks_like_results(&url))
    }

    /// 刷新验证码；找不到刷新按钮时只记录日志
    async fn refresh(&mut self, driver: &dyn BrowserDriver) {
        self.refreshes += 1;
        for locator in portal::CAPTCHA_REFRESH {
            if !driver.is_visible(locator).await.unwrap_or(false) {
                continue;
            }
            if driver.click(locator).await.is_ok() {
                debug!("🔄 已刷新验证码");
                sleep(self.settle_delay).await;
                return;
            }
        }
        warn!("⚠️ 未找到验证码刷新按钮");
    }
}
