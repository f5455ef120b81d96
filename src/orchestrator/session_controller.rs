//! 会话控制器 - 编排层
//!
//! ## 职责
//!
//! 1. **创建会话**：生成会话 ID，立即返回，不阻塞调用方
//! 2. **工作任务**：每个会话一个独立的 tokio 任务，执行 `CauseListFlow`
//! 3. **资源管理**：每个会话独占一个浏览器驱动，任何退出路径上都释放且只释放一次
//! 4. **错误收口**：流程中的错误在任务顶层捕获，写入会话的 `error_detail`

use anyhow::Result;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{ApiError, AppError, ErrorKind};
use crate::infrastructure::{BrowserDriver, DriverFactory};
use crate::models::{CaseRecord, Session, SessionHandle, Step};
use crate::services::captcha::OcrEngine;
use crate::utils::logging;
use crate::workflow::{CauseListFlow, SelectionSource};

/// 持有会话的浏览器驱动
///
/// 正常路径上调用 [`DriverGuard::release`]；任务被中止时由 `Drop` 在后台关闭
struct DriverGuard {
    driver: Option<Box<dyn BrowserDriver>>,
    session_id: String,
}

impl DriverGuard {
    fn new(driver: Box<dyn BrowserDriver>, session_id: String) -> Self {
        Self {
            driver: Some(driver),
            session_id,
        }
    }

    fn driver(&self) -> Option<&dyn BrowserDriver> {
        self.driver.as_deref()
    }

    async fn release(mut self) {
        if let Some(driver) = self.driver.take() {
            if let Err(e) = driver.close().await {
                warn!("[会话 {}] ⚠️ 关闭浏览器失败: {}", self.session_id, e);
            } else {
                debug!("[会话 {}] 浏览器已释放", self.session_id);
            }
        }
    }
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        let session_id = self.session_id.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = driver.close().await {
                        warn!("[会话 {}] ⚠️ 后台关闭浏览器失败: {}", session_id, e);
                    }
                });
            }
            Err(_) => warn!("[会话 {}] ⚠️ 运行时已关闭，浏览器未能释放", session_id),
        }
    }
}

/// 会话控制器
#[derive(Clone)]
pub struct SessionController {
    config: Config,
    drivers: Arc<dyn DriverFactory>,
    ocr: Arc<dyn OcrEngine>,
    source: Arc<dyn SelectionSource>,
}

impl SessionController {
    pub fn new(
        config: Config,
        drivers: Arc<dyn DriverFactory>,
        ocr: Arc<dyn OcrEngine>,
        source: Arc<dyn SelectionSource>,
    ) -> Self {
        Self {
            config,
            drivers,
            ocr,
            source,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 创建会话并启动工作任务，立即返回
    ///
    /// 必须在 tokio 运行时内调用
    pub fn start(&self, district_hint: &str, when: &str) -> Result<(SessionHandle, JoinHandle<()>), ApiError> {
        let district_hint = district_hint.trim();
        if district_hint.is_empty() {
            return Err(ApiError::InvalidRequest("district 不能为空".to_string()));
        }
        let when = match when.trim() {
            "" => "today",
            other => other,
        };

        let id = Uuid::new_v4().simple().to_string();
        let handle = SessionHandle::new(Session::new(id.clone(), district_hint, when));
        info!("[会话 {}] 🆕 创建会话: district={}, when={}", id, district_hint, when);

        let worker = tokio::spawn(self.clone().run_worker(handle.clone()));
        Ok((handle, worker))
    }

    /// 工作任务：获取浏览器 → 执行流程 → 释放浏览器 → 写入结果
    async fn run_worker(self, session: SessionHandle) {
        let id = session.id();
        session.update_status(Step::Initializing, 10, "正在启动浏览器");

        let driver = match self.drivers.acquire().await {
            Ok(driver) => driver,
            Err(e) => {
                error!("[会话 {}] ❌ 启动浏览器失败: {:#}", id, e);
                session.fail(ErrorKind::Browser, AppError::Browser(format!("{:#}", e)).to_string());
                return;
            }
        };
        let guard = DriverGuard::new(driver, id.clone());

        let outcome = AssertUnwindSafe(self.run_flow(&guard, &session))
            .catch_unwind()
            .await;
        guard.release().await;

        match outcome {
            Ok(Ok(records)) => {
                let count = records.len();
                if session.complete(records, format!("抓取完成，共 {} 条案件", count)) {
                    info!("[会话 {}] 🎉 完成，共 {} 条案件", id, count);
                } else {
                    info!("[会话 {}] 会话已结束，丢弃 {} 条结果", id, count);
                }
            }
            Ok(Err(e)) => {
                let kind = AppError::classify(&e);
                if kind == ErrorKind::Cancelled {
                    info!("[会话 {}] 🛑 会话已取消", id);
                } else {
                    error!("[会话 {}] ❌ {:#}", id, e);
                }
                session.fail(kind, format!("{:#}", e));
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "未知错误".to_string());
                error!("[会话 {}] 💥 工作任务异常: {}", id, detail);
                session.fail(ErrorKind::Internal, format!("工作任务异常: {}", detail));
            }
        }

        logging::log_session_summary(&session.snapshot());
    }

    async fn run_flow(&self, guard: &DriverGuard, session: &SessionHandle) -> Result<Vec<CaseRecord>> {
        let driver = guard
            .driver()
            .ok_or_else(|| AppError::Browser("浏览器驱动已释放".to_string()))?;
        let mut flow = CauseListFlow::new(&self.config, self.ocr.clone(), self.source.clone())?;
        flow.run(driver, session).await
    }
}
