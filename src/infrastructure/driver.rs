//! 浏览器自动化驱动接口
//!
//! 流程层只通过这个 trait 操作页面，不直接接触 chromiumoxide

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::infrastructure::locator::Locator;

/// 下拉框中的一个选项
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SelectOption {
    pub text: String,
    #[serde(default)]
    pub disabled: bool,
}

impl SelectOption {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            disabled: false,
        }
    }

    pub fn disabled(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            disabled: true,
        }
    }
}

/// 浏览器自动化原语
///
/// 所有以 `Locator` 为参数的方法都作用于第一个匹配的元素
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// 导航到 URL
    async fn navigate(&self, url: &str) -> Result<()>;

    /// 在超时内等待元素出现
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<bool>;

    /// 是否存在可见的匹配元素
    async fn is_visible(&self, locator: &Locator) -> Result<bool>;

    /// 读取下拉框全部选项（按页面顺序）
    async fn select_options(&self, locator: &Locator) -> Result<Vec<SelectOption>>;

    /// 下拉框当前选中项的文本
    async fn selected_text(&self, locator: &Locator) -> Result<Option<String>>;

    /// 按显示文本选中（没有该选项时返回错误）
    async fn select_by_text(&self, locator: &Locator, text: &str) -> Result<()>;

    /// 按下标选中
    async fn select_by_index(&self, locator: &Locator, index: usize) -> Result<()>;

    /// 对元素执行脚本，脚本中用 `el` 引用该元素
    async fn execute_script(&self, locator: &Locator, script: &str) -> Result<JsonValue>;

    /// 读取属性（包括 `value`）
    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>>;

    /// 清空输入框并输入文本
    async fn set_value(&self, locator: &Locator, text: &str) -> Result<()>;

    /// 点击元素
    async fn click(&self, locator: &Locator) -> Result<()>;

    /// 元素截图（PNG）
    async fn screenshot(&self, locator: &Locator) -> Result<Vec<u8>>;

    async fn current_url(&self) -> Result<String>;

    /// `<body>` 的可见文本
    async fn body_text(&self) -> Result<String>;

    /// 当前页面 HTML
    async fn page_source(&self) -> Result<String>;

    /// 关闭会话，释放浏览器
    async fn close(&self) -> Result<()>;
}

/// 为每个会话创建一个独占的驱动
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn BrowserDriver>>;
}

/// 按顺序尝试定位列表，返回第一个在页面上存在的定位方式
///
/// 第一个定位方式最多等待 `timeout`，之后的只检查一次；全部缺失时返回 `None`
pub async fn first_present(
    driver: &dyn BrowserDriver,
    locators: &[Locator],
    timeout: Duration,
) -> Result<Option<Locator>> {
    let mut wait = timeout;
    for locator in locators {
        if driver.wait_for(locator, wait).await? {
            return Ok(Some(locator.clone()));
        }
        wait = Duration::ZERO;
    }
    Ok(None)
}
