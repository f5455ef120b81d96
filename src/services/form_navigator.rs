//! 表单导航服务
//!
//! 负责级联下拉框（州 → 区 → 法院综合体 → 法官）和日期输入框。
//! 只处理页面控件，不认识会话；等待外部选择由流程层负责。

use anyhow::Result;
use chrono::NaiveDate;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::{first_present, BrowserDriver, Locator, SelectOption};
use crate::models::FieldKind;
use crate::services::portal;

/// 日期输入框依次尝试的格式
const DATE_INPUT_FORMATS: &[&str] = &["%d-%m-%Y", "%m-%d-%Y"];

/// 设置 selectedIndex 并触发 change 的脚本（前两种方式都失败时使用）
const SCRIPTED_SELECT: &str = r#"
    const wanted = __WANTED__;
    const opts = Array.from(el.options || []);
    const idx = opts.findIndex(o => (o.text || '').trim() === wanted);
    if (idx < 0) return false;
    el.selectedIndex = idx;
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
"#;

/// 是否为占位选项（"Select State"、"--Choose--" 之类）
pub fn is_sentinel(text: &str) -> bool {
    let lowered = text
        .trim()
        .trim_matches(|c: char| c == '-' || c.is_whitespace())
        .to_lowercase();
    ["select", "choose"].iter().any(|word| {
        lowered == *word
            || lowered
                .strip_prefix(word)
                .is_some_and(|rest| rest.starts_with(|c: char| !c.is_alphanumeric()))
    })
}

/// 过滤占位项、禁用项和空项，按首次出现的顺序去重
pub fn filter_options(options: Vec<SelectOption>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(options.len());
    for option in options {
        let text = option.text.trim();
        if option.disabled || text.is_empty() || is_sentinel(text) {
            continue;
        }
        if !seen.iter().any(|s| s == text) {
            seen.push(text.to_string());
        }
    }
    seen
}

/// 级联依赖：选择某字段前必须已经设置的字段
pub fn prerequisite(field: FieldKind) -> Option<FieldKind> {
    match field {
        FieldKind::State => None,
        FieldKind::District => Some(FieldKind::State),
        FieldKind::CourtComplex => Some(FieldKind::District),
        FieldKind::Judge => Some(FieldKind::CourtComplex),
        FieldKind::CaseCategory => None,
    }
}

/// 表单导航
pub struct FormNavigator {
    element_timeout: Duration,
    judge_attempts: usize,
    judge_backoff: Duration,
    /// 已经成功设置的字段（按顺序）
    applied: Vec<FieldKind>,
    judge_locator: Option<Locator>,
}

impl FormNavigator {
    pub fn new(config: &Config) -> Self {
        Self {
            element_timeout: config.element_timeout(),
            judge_attempts: config.judge_lookup_attempts.max(1),
            judge_backoff: config.judge_lookup_backoff(),
            applied: Vec::new(),
            judge_locator: None,
        }
    }

    /// 字段对应的下拉框定位列表
    fn control_locators(field: FieldKind) -> &'static [Locator] {
        match field {
            FieldKind::State => portal::STATE_SELECT,
            FieldKind::District => portal::DISTRICT_SELECT,
            FieldKind::CourtComplex => portal::COMPLEX_SELECT,
            FieldKind::Judge => portal::JUDGE_SELECT,
            FieldKind::CaseCategory => &[],
        }
    }

    /// 定位字段的下拉框；法官下拉框使用 [`Self::locate_judge`] 找到的位置
    async fn control(&self, driver: &dyn BrowserDriver, field: FieldKind) -> Result<Locator> {
        if field == FieldKind::Judge {
            if let Some(locator) = &self.judge_locator {
                return Ok(locator.clone());
            }
        }
        first_present(driver, Self::control_locators(field), self.element_timeout)
            .await?
            .ok_or_else(|| AppError::navigation(format!("未找到 {} 下拉框", field)).into())
    }

    /// 读取下拉框的有效选项
    pub async fn list_options(&self, driver: &dyn BrowserDriver, locator: &Locator) -> Result<Vec<String>> {
        let raw = driver.select_options(locator).await?;
        Ok(filter_options(raw))
    }

    /// 读取字段的有效选项；只剩占位项时返回 `NoOptionsAvailable`
    pub async fn field_options(&self, driver: &dyn BrowserDriver, field: FieldKind) -> Result<Vec<String>> {
        let locator = self.control(driver, field).await?;
        let options = self.list_options(driver, &locator).await?;
        if options.is_empty() {
            return Err(AppError::NoOptionsAvailable { field }.into());
        }
        debug!("{} 共 {} 个选项", field, options.len());
        Ok(options)
    }

    /// 把下拉框设为显示文本等于 `value` 的选项
    ///
    /// 依次尝试：按文本选择 → 按下标选择 → 脚本设置下标并触发 change。
    /// 每种方式执行后都回读选中项确认
    pub async fn apply_selection(
        &self,
        driver: &dyn BrowserDriver,
        locator: &Locator,
        value: &str,
    ) -> Result<()> {
        let value = value.trim();

        match driver.select_by_text(locator, value).await {
            Ok(()) => {
                if self.is_selected(driver, locator, value).await {
                    return Ok(());
                }
                debug!("按文本选择后未生效: {}", value);
            }
            Err(e) => debug!("按文本选择失败: {}", e),
        }

        let raw = driver.select_options(locator).await.unwrap_or_default();
        if let Some(index) = raw.iter().position(|o| o.text.trim() == value) {
            match driver.select_by_index(locator, index).await {
                Ok(()) => {
                    if self.is_selected(driver, locator, value).await {
                        return Ok(());
                    }
                    debug!("按下标选择后未生效: {}", index);
                }
                Err(e) => debug!("按下标选择失败: {}", e),
            }
        }

        let script = SCRIPTED_SELECT.replace("__WANTED__", &serde_json::to_string(value)?);
        match driver.execute_script(locator, &script).await {
            Ok(result) => {
                if result.as_bool() == Some(true) && self.is_selected(driver, locator, value).await {
                    return Ok(());
                }
                debug!("脚本选择未生效: {}", value);
            }
            Err(e) => debug!("脚本选择失败: {}", e),
        }

        Err(AppError::navigation(format!("无法在 {} 中选择 '{}'", locator, value)).into())
    }

    async fn is_selected(&self, driver: &dyn BrowserDriver, locator: &Locator, value: &str) -> bool {
        matches!(
            driver.selected_text(locator).await,
            Ok(Some(text)) if text.trim() == value
        )
    }

    /// 设置级联字段；前置字段未设置时失败
    pub async fn select_field(
        &mut self,
        driver: &dyn BrowserDriver,
        field: FieldKind,
        value: &str,
    ) -> Result<()> {
        if let Some(required) = prerequisite(field) {
            if !self.applied.contains(&required) {
                return Err(AppError::navigation(format!(
                    "选择 {} 之前必须先选择 {}",
                    field, required
                ))
                .into());
            }
        }

        let locator = self.control(driver, field).await?;
        self.apply_selection(driver, &locator, value).await?;
        info!("✓ 已选择 {}: {}", field, value);

        // 重新选择上游字段会使下游字段失效
        if let Some(pos) = self.applied.iter().position(|f| *f == field) {
            self.applied.truncate(pos);
        }
        self.applied.push(field);
        Ok(())
    }

    pub fn is_applied(&self, field: FieldKind) -> bool {
        self.applied.contains(&field)
    }

    /// 查找法官下拉框并返回其有效选项
    ///
    /// 该下拉框在选择法院综合体后异步生成，所以先对综合体重新触发一次 change，
    /// 再按定位列表进行有限轮数的查找，每轮之间等待一段时间
    pub async fn locate_judge(&mut self, driver: &dyn BrowserDriver) -> Result<Vec<String>> {
        if !self.is_applied(FieldKind::CourtComplex) {
            return Err(AppError::navigation("选择法官之前必须先选择法院综合体").into());
        }

        if let Some(complex) = portal::COMPLEX_SELECT.first() {
            let fire = "el.dispatchEvent(new Event('change', { bubbles: true })); return true;";
            if let Err(e) = driver.execute_script(complex, fire).await {
                debug!("重新触发综合体 change 失败: {}", e);
            }
        }

        for attempt in 1..=self.judge_attempts {
            debug!("查找法官下拉框，第 {}/{} 轮", attempt, self.judge_attempts);
            for locator in portal::JUDGE_SELECT {
                if !driver.wait_for(locator, Duration::ZERO).await.unwrap_or(false) {
                    continue;
                }
                let id = driver.attribute(locator, "id").await.ok().flatten();
                if id.as_deref() == Some(portal::COMPLEX_SELECT_ID) {
                    continue;
                }
                let options = self.list_options(driver, locator).await.unwrap_or_default();
                if !options.is_empty() {
                    info!("✓ 找到法官下拉框 ({}), {} 个选项", locator, options.len());
                    self.judge_locator = Some(locator.clone());
                    return Ok(options);
                }
            }
            if attempt < self.judge_attempts {
                sleep(self.judge_backoff).await;
            }
        }

        warn!("⚠️ {} 轮查找后仍未找到法官下拉框", self.judge_attempts);
        Err(AppError::NoOptionsAvailable {
            field: FieldKind::Judge,
        }
        .into())
    }

    /// 填写日期，返回实际填入的日期
    ///
    /// 每个日期依次尝试 dd-mm-yyyy 与 mm-dd-yyyy，输入框有值即视为成功；
    /// 目标日期全部失败时再用今天试一次
    pub async fn set_date(
        &self,
        driver: &dyn BrowserDriver,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<NaiveDate> {
        let Some(locator) = first_present(driver, portal::DATE_INPUT, self.element_timeout).await? else {
            return Err(AppError::navigation("未找到日期输入框").into());
        };

        let mut candidates = vec![date];
        if date != today {
            candidates.push(today);
        }

        for candidate in candidates {
            for fmt in DATE_INPUT_FORMATS {
                let text = candidate.format(fmt).to_string();
                if let Err(e) = driver.set_value(&locator, &text).await {
                    debug!("日期输入失败 ({}): {}", text, e);
                    continue;
                }
                let held = driver.attribute(&locator, "value").await.ok().flatten();
                if held.is_some_and(|v| !v.trim().is_empty()) {
                    if candidate != date {
                        warn!("⚠️ 日期 {} 无法填入，改用今天 {}", date, candidate);
                    }
                    info!("✓ 日期已设置: {}", text);
                    return Ok(candidate);
                }
            }
        }

        Err(AppError::navigation(format!("无法设置日期 {}", date)).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_detection() {
        assert!(is_sentinel("Select"));
        assert!(is_sentinel("select state"));
        assert!(is_sentinel("--Choose--"));
        assert!(is_sentinel("  SELECT COURT NAME "));
        assert!(!is_sentinel("Selectpur"));
        assert!(!is_sentinel("Pune"));
    }

    #[test]
    fn test_filter_options_drops_sentinels_and_duplicates() {
        let options = vec![
            SelectOption::new("Select District"),
            SelectOption::new("Pune"),
            SelectOption::new("Mumbai"),
            SelectOption::new(" Pune "),
            SelectOption::disabled("Nagpur"),
            SelectOption::new(""),
            SelectOption::new("choose"),
        ];
        assert_eq!(filter_options(options), vec!["Pune", "Mumbai"]);
    }

    #[test]
    fn test_filter_options_never_yields_sentinels() {
        let options: Vec<SelectOption> = ["Select", "SELECT", "Choose One", "A", "a", "B", "A"]
            .into_iter()
            .map(SelectOption::new)
            .collect();
        let out = filter_options(options);
        assert!(out.iter().all(|o| !is_sentinel(o)));
        let mut dedup = out.clone();
        dedup.dedup();
        assert_eq!(dedup.len(), out.len());
        assert_eq!(out, vec!["A", "a", "B"]);
    }

    #[test]
    fn test_cascade_prerequisites() {
        assert_eq!(prerequisite(FieldKind::State), None);
        assert_eq!(prerequisite(FieldKind::District), Some(FieldKind::State));
        assert_eq!(prerequisite(FieldKind::Judge), Some(FieldKind::CourtComplex));
    }
}
