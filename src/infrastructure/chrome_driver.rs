//! 基于 chromiumoxide 的驱动实现
//!
//! 读写操作大多通过 [`JsExecutor`] 在页面里执行脚本完成，
//! 截图、真实点击和键盘输入走 CDP 元素接口

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::element::Element;
use chromiumoxide::Browser;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::browser;
use crate::config::Config;
use crate::infrastructure::driver::{BrowserDriver, DriverFactory, SelectOption};
use crate::infrastructure::js_executor::JsExecutor;
use crate::infrastructure::locator::{By, Locator};

const WAIT_POLL: Duration = Duration::from_millis(250);

/// chromiumoxide 驱动
pub struct ChromeDriver {
    executor: JsExecutor,
    browser: Mutex<Option<Browser>>,
    handler: JoinHandle<()>,
    /// 自己启动的浏览器在关闭时整体退出；连接的浏览器只关闭页面
    owns_browser: bool,
}

impl ChromeDriver {
    pub fn new(
        browser: Browser,
        executor: JsExecutor,
        handler: JoinHandle<()>,
        owns_browser: bool,
    ) -> Self {
        Self {
            executor,
            browser: Mutex::new(Some(browser)),
            handler,
            owns_browser,
        }
    }

    async fn element(&self, locator: &Locator) -> Result<Element> {
        let page = self.executor.page();
        let element = match locator.by {
            By::XPath => page.find_xpath(locator.value.as_ref()).await,
            _ => {
                let css = locator
                    .to_css()
                    .ok_or_else(|| anyhow!("无法转换定位方式: {}", locator))?;
                page.find_element(css).await
            }
        };
        element.with_context(|| format!("未找到元素: {}", locator))
    }

    async fn eval_bool(&self, locator: &Locator, body: &str) -> Result<bool> {
        let value = self.executor.eval_on(locator, body, "false").await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!("导航到: {}", url);
        self.executor
            .page()
            .goto(url)
            .await
            .with_context(|| format!("导航到 {} 失败", url))?;
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.eval_bool(locator, "return true;").await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(WAIT_POLL).await;
        }
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        self.eval_bool(locator, "return els.some(__visible);").await
    }

    async fn select_options(&self, locator: &Locator) -> Result<Vec<SelectOption>> {
        let value = self
            .executor
            .eval_on(
                locator,
                r#"
                if (!el.options) return [];
                return Array.from(el.options).map(o => ({ text: (o.text || '').trim(), disabled: !!o.disabled }));
                "#,
                "[]",
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn selected_text(&self, locator: &Locator) -> Result<Option<String>> {
        let value = self
            .executor
            .eval_on(
                locator,
                r#"
                if (!el.options || el.selectedIndex < 0) return null;
                return (el.options[el.selectedIndex].text || '').trim();
                "#,
                "null",
            )
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn select_by_text(&self, locator: &Locator, text: &str) -> Result<()> {
        let body = format!(
            r#"
            const wanted = {};
            const opt = Array.from(el.options || []).find(o => (o.text || '').trim() === wanted);
            if (!opt) return false;
            el.value = opt.value;
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
            "#,
            serde_json::to_string(text)?
        );
        if self.eval_bool(locator, &body).await? {
            Ok(())
        } else {
            Err(anyhow!("{} 中没有选项 '{}'", locator, text))
        }
    }

    async fn select_by_index(&self, locator: &Locator, index: usize) -> Result<()> {
        let body = format!(
            r#"
            if (!el.options || {index} >= el.options.length) return false;
            el.selectedIndex = {index};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
            "#,
            index = index
        );
        if self.eval_bool(locator, &body).await? {
            Ok(())
        } else {
            Err(anyhow!("{} 没有下标 {}", locator, index))
        }
    }

    async fn execute_script(&self, locator: &Locator, script: &str) -> Result<JsonValue> {
        self.executor.eval_on(locator, script, "null").await
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let body = format!(
            r#"
            const name = {};
            if (name === 'value') return el.value;
            return el.getAttribute(name);
            "#,
            serde_json::to_string(name)?
        );
        let value = self.executor.eval_on(locator, &body, "null").await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn set_value(&self, locator: &Locator, text: &str) -> Result<()> {
        self.executor
            .eval_on(locator, "el.focus(); el.value = ''; return true;", "false")
            .await?;

        let typed = match self.element(locator).await {
            Ok(element) => element.type_str(text).await.map(|_| ()).map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };

        if let Err(e) = typed {
            // 键盘输入失败时直接写 value
            debug!("键盘输入失败，改为脚本赋值: {}", e);
            let body = format!(
                r#"
                el.value = {};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
                "#,
                serde_json::to_string(text)?
            );
            if !self.eval_bool(locator, &body).await? {
                return Err(anyhow!("无法输入到 {}", locator));
            }
        }
        Ok(())
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let clicked = match self.element(locator).await {
            Ok(element) => element.click().await.map(|_| ()).map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };
        if let Err(e) = clicked {
            debug!("CDP 点击失败，改为脚本点击: {}", e);
            if !self.eval_bool(locator, "el.click(); return true;").await? {
                return Err(anyhow!("无法点击 {}", locator));
            }
        }
        Ok(())
    }

    async fn screenshot(&self, locator: &Locator) -> Result<Vec<u8>> {
        let element = self.element(locator).await?;
        let bytes = element
            .screenshot(CaptureScreenshotFormat::Png)
            .await
            .with_context(|| format!("截图失败: {}", locator))?;
        Ok(bytes)
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.executor.page().url().await?.unwrap_or_default())
    }

    async fn body_text(&self) -> Result<String> {
        self.executor
            .eval_as::<String>("document.body ? document.body.innerText : ''")
            .await
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.executor.page().content().await?)
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.browser.lock().await;
        let Some(mut browser) = guard.take() else {
            return Ok(());
        };

        if self.owns_browser {
            if let Err(e) = browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("等待浏览器进程退出失败: {}", e);
            }
        } else if let Err(e) = self.executor.page().clone().close().await {
            warn!("关闭页面失败: {}", e);
        }

        self.handler.abort();
        debug!("浏览器资源已释放");
        Ok(())
    }
}

/// 按配置启动或连接浏览器
pub struct ChromeDriverFactory {
    config: Config,
}

impl ChromeDriverFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DriverFactory for ChromeDriverFactory {
    async fn acquire(&self) -> Result<Box<dyn BrowserDriver>> {
        let driver = match self.config.browser_debug_port {
            Some(port) => {
                let (browser, page, handler) =
                    browser::connect_to_browser_and_page(port).await?;
                ChromeDriver::new(browser, JsExecutor::new(page), handler, false)
            }
            None => {
                let (browser, page, handler) = browser::launch_browser(&self.config).await?;
                ChromeDriver::new(browser, JsExecutor::new(page), handler, true)
            }
        };
        Ok(Box::new(driver))
    }
}
