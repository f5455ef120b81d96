//! 排期表抓取流程 - 流程层
//!
//! 核心职责：定义"一次抓取"的完整步骤
//!
//! 流程顺序：
//! 1. 打开页面
//! 2. 州 → 区 → 法院综合体 → 法官（每一步都等待外部选择）
//! 3. 填写日期
//! 4. 验证码（自动或混合模式）
//! 5. 解析结果页，补全元数据，导出

use anyhow::Result;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::infrastructure::{first_present, BrowserDriver};
use crate::models::{
    CaseCategory, CaseRecord, FieldKind, RecordMetadata, SessionHandle, SessionStatus, Step,
};
use crate::services::captcha::{CaptchaMode, CaptchaOutcome, CaptchaSolver, OcrEngine};
use crate::services::{infer_category, portal, CaseTableParser, DateResolver, FormNavigator, RecordWriter};
use crate::workflow::selection_source::{SelectionRequest, SelectionSource};

/// 下拉框异步加载选项时的重读间隔
const OPTIONS_RETRY: Duration = Duration::from_millis(500);

/// 级联字段的步骤与进度：(步骤, 读取选项, 等待选择, 应用选择)
const CASCADE: &[(FieldKind, Step, u8, u8, u8)] = &[
    (FieldKind::State, Step::StateSelection, 25, 30, 32),
    (FieldKind::District, Step::DistrictSelection, 35, 40, 42),
    (FieldKind::CourtComplex, Step::ComplexSelection, 45, 50, 52),
];

/// 在区选项中找与启动参数匹配的一项：先完全匹配，再包含匹配（均忽略大小写）
pub fn suggest_option(hint: &str, options: &[String]) -> Option<String> {
    let hint = hint.trim().to_lowercase();
    if hint.is_empty() {
        return None;
    }
    options
        .iter()
        .find(|o| o.trim().to_lowercase() == hint)
        .or_else(|| options.iter().find(|o| o.to_lowercase().contains(&hint)))
        .cloned()
}

/// 排期表抓取流程
///
/// - 编排完整的抓取步骤，决定何时等待外部选择
/// - 不持有浏览器，由编排层传入
/// - 只依赖业务能力（services）
pub struct CauseListFlow {
    config: Config,
    navigator: FormNavigator,
    solver: CaptchaSolver,
    parser: CaseTableParser,
    dates: DateResolver,
    writer: RecordWriter,
    source: Arc<dyn SelectionSource>,
    judge: String,
}

impl CauseListFlow {
    pub fn new(config: &Config, ocr: Arc<dyn OcrEngine>, source: Arc<dyn SelectionSource>) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            navigator: FormNavigator::new(config),
            solver: CaptchaSolver::new(ocr, config),
            parser: CaseTableParser::new()?,
            dates: DateResolver::new(config.max_advance_days),
            writer: RecordWriter::new(&config.output_dir),
            source,
            judge: String::new(),
        })
    }

    /// 执行完整流程，返回补全元数据后的案件列表
    pub async fn run(&mut self, driver: &dyn BrowserDriver, session: &SessionHandle) -> Result<Vec<CaseRecord>> {
        let id = session.id();

        self.load_page(driver, session, &id).await?;

        for &(field, step, p_list, p_wait, p_apply) in CASCADE {
            self.select_cascade(driver, session, &id, field, step, (p_list, p_wait, p_apply))
                .await?;
        }
        self.select_judge(driver, session, &id).await?;

        let date = self.set_date(driver, session, &id).await?;
        let category = self.solve_captcha(driver, session, &id).await?;

        self.scrape(driver, session, &id, date, category).await
    }

    fn ensure_active(&self, session: &SessionHandle) -> Result<()> {
        if session.status() == SessionStatus::Cancelled {
            return Err(AppError::Cancelled.into());
        }
        Ok(())
    }

    async fn settle(&self) {
        sleep(self.config.settle_delay()).await;
    }

    async fn load_page(&self, driver: &dyn BrowserDriver, session: &SessionHandle, id: &str) -> Result<()> {
        self.ensure_active(session)?;
        session.update_status(Step::PageLoad, 20, "正在打开排期表页面");
        info!("[会话 {}] 🌐 打开页面: {}", id, self.config.target_url);

        driver.navigate(&self.config.target_url).await?;
        if first_present(driver, portal::STATE_SELECT, self.config.element_timeout())
            .await?
            .is_none()
        {
            return Err(AppError::navigation("排期表页面未加载出州下拉框").into());
        }
        self.settle().await;
        session.mark_step_completed(Step::PageLoad);
        Ok(())
    }

    /// 向选择来源请求一个值
    #[allow(clippy::too_many_arguments)]
    async fn ask(
        &self,
        session: &SessionHandle,
        step: Step,
        progress: u8,
        field: FieldKind,
        options: Vec<String>,
        suggested: Option<String>,
        timeout: Duration,
    ) -> Result<String> {
        self.ensure_active(session)?;
        session.request_input(
            step,
            progress,
            format!("请选择 {}（{} 个选项）", field, options.len()),
            field,
            options.clone(),
            suggested.clone(),
        );

        let request = SelectionRequest {
            field,
            options,
            suggested,
            timeout,
        };
        match self.source.choose(session, &request).await? {
            Some(value) => Ok(value),
            None if session.status() == SessionStatus::Cancelled => Err(AppError::Cancelled.into()),
            None => Err(AppError::SelectionTimeout {
                field,
                timeout_secs: timeout.as_secs(),
            }
            .into()),
        }
    }

    /// 读取选项；上游刚选完时下游下拉框可能还只有占位项，在单元素超时内重读
    async fn wait_options(&self, driver: &dyn BrowserDriver, field: FieldKind) -> Result<Vec<String>> {
        let deadline = Instant::now() + self.config.element_timeout();
        loop {
            match self.navigator.field_options(driver, field).await {
                Ok(options) => return Ok(options),
                Err(e) if Instant::now() < deadline => {
                    debug!("{} 选项尚未就绪: {}", field, e);
                    sleep(OPTIONS_RETRY).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn select_cascade(
        &mut self,
        driver: &dyn BrowserDriver,
        session: &SessionHandle,
        id: &str,
        field: FieldKind,
        step: Step,
        (p_list, p_wait, p_apply): (u8, u8, u8),
    ) -> Result<()> {
        self.ensure_active(session)?;
        session.update_status(step, p_list, format!("正在读取 {} 选项", field));

        let options = self.wait_options(driver, field).await?;
        info!("[会话 {}] 📋 {} 共 {} 个选项", id, field, options.len());

        let suggested = match field {
            FieldKind::District => {
                let hint = session.read(|s| s.district_hint.clone());
                let suggested = suggest_option(&hint, &options);
                if suggested.is_none() {
                    warn!("[会话 {}] ⚠️ 区选项中没有与 '{}' 匹配的项", id, hint);
                }
                suggested
            }
            _ => None,
        };

        let value = self
            .ask(session, step, p_wait, field, options, suggested, self.config.dropdown_timeout())
            .await?;

        self.ensure_active(session)?;
        session.update_status(step, p_apply, format!("正在选择 {}: {}", field, value));
        self.navigator.select_field(driver, field, &value).await?;
        session.record_output(field, &value);
        session.mark_step_completed(step);
        self.settle().await;
        Ok(())
    }

    async fn select_judge(&mut self, driver: &dyn BrowserDriver, session: &SessionHandle, id: &str) -> Result<()> {
        self.ensure_active(session)?;
        session.update_status(Step::JudgeSelection, 55, "正在查找法官下拉框");

        let options = self.navigator.locate_judge(driver).await?;
        let value = self
            .ask(
                session,
                Step::JudgeSelection,
                60,
                FieldKind::Judge,
                options,
                None,
                self.config.dropdown_timeout(),
            )
            .await?;

        self.ensure_active(session)?;
        session.update_status(Step::JudgeSelection, 62, format!("正在选择法官: {}", value));
        self.navigator.select_field(driver, FieldKind::Judge, &value).await?;
        info!("[会话 {}] 👨‍⚖️ 法官: {}", id, value);
        self.judge = value;
        session.mark_step_completed(Step::JudgeSelection);
        self.settle().await;
        Ok(())
    }

    async fn set_date(
        &self,
        driver: &dyn BrowserDriver,
        session: &SessionHandle,
        id: &str,
    ) -> Result<chrono::NaiveDate> {
        self.ensure_active(session)?;
        let today = Local::now().date_naive();
        let when = session.read(|s| s.when.clone());
        let requested = self.dates.resolve_on(&when, today);
        session.update_status(Step::DateSetting, 65, format!("正在设置日期 {}", requested));

        let date = self.navigator.set_date(driver, requested, today).await?;
        info!("[会话 {}] 📅 日期: {}", id, date);
        session.mark_step_completed(Step::DateSetting);
        self.settle().await;
        Ok(date)
    }

    async fn solve_captcha(
        &mut self,
        driver: &dyn BrowserDriver,
        session: &SessionHandle,
        id: &str,
    ) -> Result<CaseCategory> {
        self.ensure_active(session)?;
        session.update_status(Step::CaptchaSolving, 70, "正在识别验证码");

        let mode = CaptchaMode::from_config(&self.config);
        let category = match self.solver.solve(driver, mode).await? {
            CaptchaOutcome::Solved { category, .. } => category,
            CaptchaOutcome::AwaitingCategory { .. } => {
                let answer = self
                    .ask(
                        session,
                        Step::CaptchaSolving,
                        75,
                        FieldKind::CaseCategory,
                        CaseCategory::options(),
                        None,
                        self.config.category_timeout(),
                    )
                    .await?;
                let category = CaseCategory::parse(&answer)
                    .ok_or_else(|| AppError::navigation(format!("未知的案件类别: {}", answer)))?;

                self.ensure_active(session)?;
                session.update_status(Step::CaptchaSolving, 80, format!("正在提交 {} 查询", category));
                match self.solver.resume(driver, category).await? {
                    CaptchaOutcome::Solved { category, .. } => category,
                    // resume 失败后以自动模式重试，不会再次进入等待
                    CaptchaOutcome::AwaitingCategory { .. } => category,
                }
            }
        };

        info!(
            "[会话 {}] ✅ 验证码通过（{} 次尝试），类别: {}",
            id,
            self.solver.attempts(),
            category
        );
        session.update_status(Step::CaptchaSolving, 85, "验证码已通过");
        session.mark_step_completed(Step::CaptchaSolving);
        Ok(category)
    }

    async fn scrape(
        &self,
        driver: &dyn BrowserDriver,
        session: &SessionHandle,
        id: &str,
        date: chrono::NaiveDate,
        category: CaseCategory,
    ) -> Result<Vec<CaseRecord>> {
        self.ensure_active(session)?;
        session.update_status(Step::Scraping, 90, "正在解析结果页");
        self.settle().await;

        let html = driver.page_source().await?;
        if self.config.save_results {
            if let Err(e) = self.writer.dump_page(&html) {
                warn!("[会话 {}] ⚠️ 保存结果页失败: {:#}", id, e);
            }
        }

        let parsed = self.parser.parse_document(&html);
        if parsed.records.is_empty() {
            return Err(AppError::ExtractionEmpty.into());
        }

        let outputs = session.outputs();
        let court_name = if self.judge.trim().is_empty() {
            parsed.page_court_name.clone().unwrap_or_default()
        } else {
            self.judge.clone()
        };
        let metadata = RecordMetadata {
            court_name,
            date: date.format("%Y-%m-%d").to_string(),
            case_type: category.name().to_string(),
            district: outputs.district.unwrap_or_default(),
            state: outputs.state.unwrap_or_default(),
            court_complex: outputs.court_complex.unwrap_or_default(),
        };

        let mut records = parsed.records;
        for record in &mut records {
            metadata.apply(record);
        }

        if let Some(inferred) = infer_category(&records) {
            if inferred != category {
                warn!(
                    "[会话 {}] ⚠️ 案号看起来属于 {}，但选择的是 {}",
                    id, inferred, category
                );
            }
        }

        info!("[会话 {}] 📊 解析到 {} 条案件", id, records.len());

        if self.config.save_results {
            if let Err(e) = self.writer.export(id, &records) {
                warn!("[会话 {}] ⚠️ 导出结果失败: {:#}", id, e);
            }
        }

        Ok(records)
    }
}
