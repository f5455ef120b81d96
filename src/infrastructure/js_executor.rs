//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use anyhow::Result;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::infrastructure::locator::Locator;

/// 页面内的元素查找辅助函数，每段针对元素的脚本都以它开头
const LOCATE_PRELUDE: &str = r#"
    const __find = (by, value) => {
        switch (by) {
            case 'id': { const e = document.getElementById(value); return e ? [e] : []; }
            case 'name': return Array.from(document.getElementsByName(value));
            case 'css': return Array.from(document.querySelectorAll(value));
            case 'xpath': {
                const r = document.evaluate(value, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
                const out = [];
                for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i));
                return out;
            }
        }
        return [];
    };
    const __visible = (e) => !!(e.offsetWidth || e.offsetHeight || e.getClientRects().length);
"#;

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力
/// - 不认识会话 / 案件
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于截图、导航等非脚本操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果，脚本返回 undefined 时得到 Null
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> Result<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 针对定位到的元素执行脚本
    ///
    /// `body` 中 `el` 是第一个匹配元素，`els` 是全部匹配元素；
    /// 没有匹配元素时脚本不执行，返回 `missing`
    pub async fn eval_on(&self, locator: &Locator, body: &str, missing: &str) -> Result<JsonValue> {
        let js_code = format!(
            r#"
            (() => {{
                {prelude}
                const els = __find({by}, {value});
                const el = els[0];
                if (!el) return {missing};
                {body}
            }})()
            "#,
            prelude = LOCATE_PRELUDE,
            by = serde_json::to_string(locator.by.as_str())?,
            value = serde_json::to_string(locator.value.as_ref())?,
            missing = missing,
            body = body,
        );
        self.eval(js_code).await
    }
}
