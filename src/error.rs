use serde::Serialize;
use thiserror::Error;

use crate::models::session::FieldKind;

/// 会话中记录的错误分类
///
/// 与 [`AppError`] 一一对应，但不携带数据，便于客户端轮询时判断失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SelectionTimeout,
    NoOptionsAvailable,
    NavigationFailure,
    CaptchaExhausted,
    ExtractionEmpty,
    Cancelled,
    Browser,
    Ocr,
    Internal,
}

/// 应用程序错误类型
///
/// 前五个变体是抓取流程的错误分类，工作线程捕获后写入会话的 `error_detail`
#[derive(Debug, Error)]
pub enum AppError {
    /// 外部客户端在限定时间内没有给出选择
    #[error("等待 {field} 选择超时 ({timeout_secs} 秒)")]
    SelectionTimeout { field: FieldKind, timeout_secs: u64 },

    /// 级联下拉框只有占位选项
    #[error("{field} 下拉框没有可选项")]
    NoOptionsAvailable { field: FieldKind },

    /// 所有定位/设置方式都失败
    #[error("表单操作失败: {what}")]
    NavigationFailure { what: String },

    /// 验证码识别与校验全部失败
    #[error("验证码识别失败，已尝试 {attempts} 次")]
    CaptchaExhausted { attempts: usize },

    /// 结果页看似成功但没有解析出有效案件
    #[error("结果页未解析到有效案件（法院可能休庭或当天无排期）")]
    ExtractionEmpty,

    /// 会话被外部取消
    #[error("会话已取消")]
    Cancelled,

    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(String),

    /// OCR 引擎错误
    #[error("OCR 错误: {0}")]
    Ocr(String),

    /// 图片解码/处理错误
    #[error("图片处理失败: {0}")]
    Image(#[from] image::ImageError),

    /// 文件读写错误
    #[error("文件错误 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

impl AppError {
    /// 错误分类
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::SelectionTimeout { .. } => ErrorKind::SelectionTimeout,
            AppError::NoOptionsAvailable { .. } => ErrorKind::NoOptionsAvailable,
            AppError::NavigationFailure { .. } => ErrorKind::NavigationFailure,
            AppError::CaptchaExhausted { .. } => ErrorKind::CaptchaExhausted,
            AppError::ExtractionEmpty => ErrorKind::ExtractionEmpty,
            AppError::Cancelled => ErrorKind::Cancelled,
            AppError::Browser(_) => ErrorKind::Browser,
            AppError::Ocr(_) | AppError::Image(_) => ErrorKind::Ocr,
            AppError::Io { .. } | AppError::Config(_) => ErrorKind::Internal,
        }
    }

    /// 创建表单操作失败错误
    pub fn navigation(what: impl Into<String>) -> Self {
        AppError::NavigationFailure { what: what.into() }
    }

    /// 创建文件错误
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// 从 anyhow 错误链中提取分类，未分类的错误视为内部错误
    pub fn classify(err: &anyhow::Error) -> ErrorKind {
        err.chain()
            .find_map(|cause| cause.downcast_ref::<AppError>())
            .map(AppError::kind)
            .unwrap_or(ErrorKind::Internal)
    }
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(err.to_string())
    }
}

/// 面向 UI/HTTP 层的调用错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("会话不存在: {0}")]
    UnknownSession(String),

    #[error("无效的选择 ({field}): {reason}")]
    BadField { field: String, reason: String },

    #[error("会话 {0} 尚未完成，结果不可用")]
    NotReady(String),

    #[error("请求无效: {0}")]
    InvalidRequest(String),
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_through_context() {
        let err = anyhow::Error::new(AppError::CaptchaExhausted { attempts: 4 })
            .context("验证码步骤失败");
        assert_eq!(AppError::classify(&err), ErrorKind::CaptchaExhausted);

        let other = anyhow::anyhow!("随便什么错误");
        assert_eq!(AppError::classify(&other), ErrorKind::Internal);
    }

    #[test]
    fn test_timeout_message_names_field() {
        let err = AppError::SelectionTimeout {
            field: FieldKind::State,
            timeout_secs: 120,
        };
        assert!(err.to_string().contains("state"));
        assert!(err.to_string().contains("120"));
    }
}
