//! # Cause List Scraper
//!
//! 从 eCourts 门户抓取法院每日排期表（cause list）的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `BrowserDriver` - 浏览器自动化原语，流程层只认识这个 trait
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `Locator` - 数据化的元素定位策略列表
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不认识会话
//! - `FormNavigator` - 级联下拉框与日期输入
//! - `DateResolver` - 日期规范化
//! - `CaptchaSolver` - 验证码预处理、OCR、校验与重试
//! - `CaseTableParser` - 结果表格 / 文本解析
//! - `RecordWriter` - CSV / JSON 导出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一次抓取"的完整步骤
//! - `SelectionWaiter` - 轮询等待外部选择
//! - `SelectionSource` - 选择来源（会话队列 / 终端）
//! - `CauseListFlow` - 流程编排（页面 → 下拉框 → 日期 → 验证码 → 解析）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/session_controller` - 每个会话一个工作任务，保证释放浏览器
//! - `orchestrator/session_store` - 会话表，面向 UI/HTTP 层
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{CaptchaModeSetting, Config};
pub use error::{ApiError, AppError, AppResult, ErrorKind};
pub use infrastructure::{BrowserDriver, ChromeDriverFactory, DriverFactory, JsExecutor, Locator};
pub use models::{CaseCategory, CaseRecord, FieldKind, SessionHandle, SessionSnapshot, SessionStatus, Step};
pub use orchestrator::{SessionController, SessionStore};
pub use services::captcha::{OcrEngine, TesseractCli};
pub use workflow::{CauseListFlow, SelectionSource, SelectionWaiter, SessionQueue, TerminalPrompt};
