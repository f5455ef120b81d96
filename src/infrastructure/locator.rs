//! 元素定位方式
//!
//! 定位策略以数据形式给出（`&[Locator]` 列表），调用方按顺序逐个尝试

use std::borrow::Cow;
use std::fmt::Display;

/// 定位类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum By {
    Id,
    Name,
    Css,
    XPath,
}

impl By {
    pub fn as_str(self) -> &'static str {
        match self {
            By::Id => "id",
            By::Name => "name",
            By::Css => "css",
            By::XPath => "xpath",
        }
    }
}

/// 一种元素定位方式
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub by: By,
    pub value: Cow<'static, str>,
}

impl Locator {
    pub const fn id(value: &'static str) -> Self {
        Self {
            by: By::Id,
            value: Cow::Borrowed(value),
        }
    }

    pub const fn name(value: &'static str) -> Self {
        Self {
            by: By::Name,
            value: Cow::Borrowed(value),
        }
    }

    pub const fn css(value: &'static str) -> Self {
        Self {
            by: By::Css,
            value: Cow::Borrowed(value),
        }
    }

    pub const fn xpath(value: &'static str) -> Self {
        Self {
            by: By::XPath,
            value: Cow::Borrowed(value),
        }
    }

    /// 运行时拼出来的 XPath
    pub fn xpath_owned(value: String) -> Self {
        Self {
            by: By::XPath,
            value: Cow::Owned(value),
        }
    }

    /// 转成 CSS 选择器；XPath 没有对应形式
    pub fn to_css(&self) -> Option<String> {
        match self.by {
            By::Id => Some(format!("[id=\"{}\"]", self.value)),
            By::Name => Some(format!("[name=\"{}\"]", self.value)),
            By::Css => Some(self.value.to_string()),
            By::XPath => None,
        }
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.by.as_str(), self.value)
    }
}
