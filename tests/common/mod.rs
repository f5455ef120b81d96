//! 集成测试共用的假浏览器、假 OCR 与测试配置

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use causelist_scraper::config::{CaptchaModeSetting, Config};
use causelist_scraper::infrastructure::{BrowserDriver, By, DriverFactory, Locator, SelectOption};
use causelist_scraper::models::{CaseCategory, FieldKind, SessionSnapshot, SessionStatus};
use causelist_scraper::orchestrator::SessionStore;
use causelist_scraper::services::captcha::{OcrEngine, PageSegMode};
use causelist_scraper::services::portal;
use image::{GrayImage, ImageFormat, Luma};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub const STATE_ID: &str = "sess_state_code";
pub const DISTRICT_ID: &str = "sess_dist_code";
pub const COMPLEX_ID: &str = "court_complex_code";
pub const JUDGE_ID: &str = "court_name_code";
pub const DATE_ID: &str = "cause_list_date";
pub const CAPTCHA_INPUT_ID: &str = "cause_list_captcha_code";

pub const RESULTS_HTML: &str = r#"
<html><body>
<div>Principal District Judge, Pune</div>
<table class="table">
  <tr><td>Sr No</td><td>Cases</td><td>Party Name</td><td>Advocate</td></tr>
  <tr><td colspan="4">Civil Cases Listed</td></tr>
  <tr><td>1</td><td>OS/12/2023<br>Next hearing date 20-11-2026</td><td>Ramesh<br>versus<br>Suresh</td><td>Adv. Kulkarni</td></tr>
  <tr><td>2</td><td>CS/7/2024</td><td>Asha versus State</td><td></td></tr>
</table>
</body></html>
"#;

pub const EMPTY_RESULTS_HTML: &str = r#"
<html><body>
<div>Principal District Judge, Pune</div>
<table class="table">
  <tr><td>Sr No</td><td>Cases</td><td>Party Name</td><td>Advocate</td></tr>
  <tr><td colspan="4">Record not found</td></tr>
</table>
</body></html>
"#;

#[derive(Debug, Clone)]
pub struct FakeSelect {
    pub options: Vec<SelectOption>,
    pub selected: Option<usize>,
}

impl FakeSelect {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            options: texts.iter().map(|t| SelectOption::new(*t)).collect(),
            selected: None,
        }
    }
}

/// 假页面的可变状态
#[derive(Debug)]
pub struct FakePage {
    pub selects: HashMap<&'static str, FakeSelect>,
    /// 法官下拉框是否已生成
    pub judge_ready: bool,
    /// 选择法院综合体后是否生成法官下拉框
    pub judge_appears_after_complex: bool,
    pub date_value: String,
    pub captcha_value: String,
    /// 依次决定每次提交是否被接受；用完后一律接受
    pub submissions: VecDeque<bool>,
    pub results_shown: bool,
    pub rejected: bool,
    pub results_html: String,
    pub navigated: Vec<String>,
    pub refresh_clicks: usize,
    pub category_clicks: Vec<CaseCategory>,
    pub break_select_by_text: bool,
    pub panic_on_navigate: bool,
}

impl FakePage {
    pub fn portal() -> Self {
        let mut selects = HashMap::new();
        selects.insert(STATE_ID, FakeSelect::new(&["Select State", "Maharashtra", "Goa"]));
        selects.insert(
            DISTRICT_ID,
            FakeSelect::new(&["Select District", "Pune", "Mumbai", "Pune Rural"]),
        );
        selects.insert(
            COMPLEX_ID,
            FakeSelect::new(&["Select Court Complex", "Pune District Court", "Shivajinagar Court"]),
        );
        selects.insert(
            JUDGE_ID,
            FakeSelect::new(&[
                "Select Court Name",
                "1-Principal District Judge",
                "2-Civil Judge Senior Division",
            ]),
        );
        Self {
            selects,
            judge_ready: false,
            judge_appears_after_complex: true,
            date_value: String::new(),
            captcha_value: String::new(),
            submissions: VecDeque::new(),
            results_shown: false,
            rejected: false,
            results_html: RESULTS_HTML.to_string(),
            navigated: Vec::new(),
            refresh_clicks: 0,
            category_clicks: Vec::new(),
            break_select_by_text: false,
            panic_on_navigate: false,
        }
    }
}

fn category_of(locator: &Locator) -> Option<CaseCategory> {
    [CaseCategory::Civil, CaseCategory::Criminal]
        .into_iter()
        .find(|c| portal::category_buttons(*c).contains(locator))
}

fn captcha_png() -> Vec<u8> {
    let image = GrayImage::from_fn(60, 20, |x, y| {
        if (x / 6 + y / 5) % 2 == 0 {
            Luma([20u8])
        } else {
            Luma([230u8])
        }
    });
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode captcha png");
    bytes.into_inner()
}

/// 模拟排期表页面的假浏览器
///
/// 只认识 `portal` 中的第一组定位方式，其余 XPath 一律视为不存在
#[derive(Clone)]
pub struct FakeDriver {
    page: Arc<Mutex<FakePage>>,
    closes: Arc<AtomicUsize>,
}

impl FakeDriver {
    pub fn new(page: FakePage) -> Self {
        Self {
            page: Arc::new(Mutex::new(page)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn portal() -> Self {
        Self::new(FakePage::portal())
    }

    pub fn page(&self) -> MutexGuard<'_, FakePage> {
        self.page.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn select_id(locator: &Locator) -> Option<&str> {
        (locator.by == By::Id).then_some(locator.value.as_ref())
    }

    fn exists(page: &FakePage, locator: &Locator) -> bool {
        if let Some(id) = Self::select_id(locator) {
            return match id {
                JUDGE_ID => page.judge_ready,
                DATE_ID | CAPTCHA_INPUT_ID => true,
                other => page.selects.contains_key(other),
            };
        }
        if locator == &portal::CAPTCHA_IMAGE[0] || locator == &portal::CAPTCHA_REFRESH[0] {
            return true;
        }
        if locator == &portal::FAILURE_BANNERS[0] {
            return page.rejected;
        }
        if locator == &portal::SUCCESS_MARKERS[0] {
            return page.results_shown;
        }
        category_of(locator).is_some()
    }

    fn with_select<R>(&self, locator: &Locator, f: impl FnOnce(&mut FakePage, &str) -> Result<R>) -> Result<R> {
        let mut page = self.page();
        let id = Self::select_id(locator)
            .filter(|id| page.selects.contains_key(*id))
            .ok_or_else(|| anyhow!("no such select: {}", locator))?
            .to_string();
        if id == JUDGE_ID && !page.judge_ready {
            bail!("judge select not rendered");
        }
        f(&mut page, &id)
    }

    fn choose(page: &mut FakePage, id: &str, index: usize) -> Result<()> {
        let select = page
            .selects
            .get_mut(id)
            .ok_or_else(|| anyhow!("no such select: {}", id))?;
        if index >= select.options.len() {
            bail!("index {} out of range", index);
        }
        select.selected = Some(index);
        if id == COMPLEX_ID && page.judge_appears_after_complex {
            page.judge_ready = true;
        }
        Ok(())
    }

    fn submit(page: &mut FakePage, category: CaseCategory) {
        page.category_clicks.push(category);
        let accepted = page.submissions.pop_front().unwrap_or(true);
        if accepted {
            page.results_shown = true;
            page.rejected = false;
            page.captcha_value.clear();
        } else {
            page.rejected = true;
        }
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let panic = {
            let mut page = self.page();
            page.navigated.push(url.to_string());
            page.panic_on_navigate
        };
        if panic {
            panic!("renderer crashed");
        }
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, _timeout: Duration) -> Result<bool> {
        Ok(Self::exists(&self.page(), locator))
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        Ok(Self::exists(&self.page(), locator))
    }

    async fn select_options(&self, locator: &Locator) -> Result<Vec<SelectOption>> {
        Ok(self
            .with_select(locator, |page, id| Ok(page.selects[id].options.clone()))
            .unwrap_or_default())
    }

    async fn selected_text(&self, locator: &Locator) -> Result<Option<String>> {
        self.with_select(locator, |page, id| {
            let select = &page.selects[id];
            Ok(select
                .selected
                .and_then(|i| select.options.get(i))
                .map(|o| o.text.clone()))
        })
    }

    async fn select_by_text(&self, locator: &Locator, text: &str) -> Result<()> {
        self.with_select(locator, |page, id| {
            if page.break_select_by_text {
                bail!("element not interactable");
            }
            let index = page.selects[id]
                .options
                .iter()
                .position(|o| o.text.trim() == text)
                .ok_or_else(|| anyhow!("no option '{}'", text))?;
            Self::choose(page, id, index)
        })
    }

    async fn select_by_index(&self, locator: &Locator, index: usize) -> Result<()> {
        self.with_select(locator, |page, id| Self::choose(page, id, index))
    }

    async fn execute_script(&self, locator: &Locator, _script: &str) -> Result<JsonValue> {
        if Self::exists(&self.page(), locator) {
            Ok(JsonValue::Bool(true))
        } else {
            Ok(JsonValue::Null)
        }
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let page = self.page();
        if !Self::exists(&page, locator) {
            return Ok(None);
        }
        let value = match (Self::select_id(locator), name) {
            (Some(id), "id") => Some(id.to_string()),
            (Some(DATE_ID), "value") => Some(page.date_value.clone()),
            (Some(CAPTCHA_INPUT_ID), "value") => Some(page.captcha_value.clone()),
            (None, "src") if locator == &portal::CAPTCHA_IMAGE[0] => {
                Some("/securimage/securimage_show.php?captcha".to_string())
            }
            _ => None,
        };
        Ok(value)
    }

    async fn set_value(&self, locator: &Locator, text: &str) -> Result<()> {
        let mut page = self.page();
        match Self::select_id(locator) {
            Some(DATE_ID) => page.date_value = text.to_string(),
            Some(CAPTCHA_INPUT_ID) => page.captcha_value = text.to_string(),
            _ => bail!("not an input: {}", locator),
        }
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let mut page = self.page();
        if locator == &portal::CAPTCHA_REFRESH[0] {
            page.refresh_clicks += 1;
            page.rejected = false;
            page.captcha_value.clear();
            return Ok(());
        }
        match category_of(locator) {
            Some(category) => {
                Self::submit(&mut page, category);
                Ok(())
            }
            None => bail!("cannot click {}", locator),
        }
    }

    async fn screenshot(&self, locator: &Locator) -> Result<Vec<u8>> {
        if locator == &portal::CAPTCHA_IMAGE[0] {
            Ok(captcha_png())
        } else {
            bail!("cannot screenshot {}", locator)
        }
    }

    async fn current_url(&self) -> Result<String> {
        Ok("https://court.test/home".to_string())
    }

    async fn body_text(&self) -> Result<String> {
        let page = self.page();
        Ok(if page.results_shown {
            "Principal District Judge\nSr No\nCases\nParty Name\nAdvocate".to_string()
        } else if page.rejected {
            "Invalid Captcha".to_string()
        } else {
            "Cause List\nEnter Captcha".to_string()
        })
    }

    async fn page_source(&self) -> Result<String> {
        let page = self.page();
        Ok(if page.results_shown {
            page.results_html.clone()
        } else {
            "<html><body><form></form></body></html>".to_string()
        })
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// 每次交出同一个假浏览器的克隆，测试可以继续观察其状态
pub struct FakeFactory {
    pub driver: FakeDriver,
    pub fail: bool,
}

impl FakeFactory {
    pub fn new(driver: FakeDriver) -> Self {
        Self { driver, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            driver: FakeDriver::portal(),
            fail: true,
        }
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    async fn acquire(&self) -> Result<Box<dyn BrowserDriver>> {
        if self.fail {
            bail!("chrome not found");
        }
        Ok(Box::new(self.driver.clone()))
    }
}

/// 按顺序返回预设文本的 OCR；用完后重复最后一个
pub struct ScriptedOcr {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<String>,
    calls: AtomicUsize,
}

impl ScriptedOcr {
    pub fn always(text: &str) -> Self {
        Self::sequence(&[text])
    }

    pub fn sequence(texts: &[&str]) -> Self {
        Self {
            responses: Mutex::new(texts.iter().map(|t| t.to_string()).collect()),
            last: Mutex::new(String::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    async fn recognize(&self, _image: &GrayImage, _mode: PageSegMode, _whitelist: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = self.responses.lock().unwrap_or_else(|e| e.into_inner()).pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}

/// 测试配置：不停顿、不落盘，超时保持默认值
pub fn test_config() -> Config {
    Config {
        target_url: "https://court.test/?p=cause_list/index".to_string(),
        captcha_mode: CaptchaModeSetting::Hybrid,
        element_timeout_secs: 0,
        settle_delay_ms: 0,
        judge_lookup_attempts: 3,
        judge_lookup_backoff_ms: 10,
        save_results: false,
        ..Config::default()
    }
}

/// 模拟外部客户端：每秒轮询一次，对等待中的字段给出答案，直到会话终止
///
/// `answers` 中没有的字段取推荐项，没有推荐项时取第一项
pub async fn drive_client(
    store: &SessionStore,
    id: &str,
    answers: &HashMap<FieldKind, &str>,
) -> SessionSnapshot {
    loop {
        let snapshot = store.poll(id).expect("session exists");
        if snapshot.status.is_terminal() {
            return snapshot;
        }
        if snapshot.status == SessionStatus::WaitingInput {
            if let Some(pending) = &snapshot.pending_input {
                let answer = answers
                    .get(&pending.field)
                    .map(|a| a.to_string())
                    .or_else(|| pending.suggested.clone())
                    .or_else(|| pending.options.first().cloned());
                if let Some(answer) = answer {
                    // 工作任务尚未取走上一次的选择时会返回 BadField，下一轮再试
                    let _ = store.provide_selection(id, pending.field.as_str(), &answer);
                }
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
