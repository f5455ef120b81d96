//! OCR 引擎接口与 tesseract 命令行实现

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{GrayImage, ImageFormat};
use tokio::process::Command;
use tracing::debug;

use crate::error::AppError;

/// 验证码只包含小写字母和数字
pub const CAPTCHA_WHITELIST: &str = "abcdefghijklmnopqrstuvwxyz0123456789";

/// 验证码长度
pub const CAPTCHA_LENGTH: usize = 6;

/// 文本布局假设（对应 tesseract 的 `--psm`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSegMode {
    /// 单行文本
    SingleLine,
    /// 单个词
    SingleWord,
}

impl PageSegMode {
    pub fn psm(self) -> &'static str {
        match self {
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleWord => "8",
        }
    }
}

/// OCR 引擎
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// 在指定布局假设和字符白名单下识别图片文本（返回原始结果）
    async fn recognize(&self, image: &GrayImage, mode: PageSegMode, whitelist: &str) -> Result<String>;
}

/// 只保留字母数字并转为小写
pub fn clean_ocr_text(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// 调用本机 tesseract 可执行文件
pub struct TesseractCli {
    binary: String,
}

impl TesseractCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(&self, image: &GrayImage, mode: PageSegMode, whitelist: &str) -> Result<String> {
        let file = tempfile::Builder::new()
            .prefix("captcha_")
            .suffix(".png")
            .tempfile()
            .context("创建验证码临时文件失败")?;
        image
            .save_with_format(file.path(), ImageFormat::Png)
            .map_err(AppError::from)?;

        let output = Command::new(&self.binary)
            .arg(file.path())
            .arg("stdout")
            .arg("--oem")
            .arg("3")
            .arg("--psm")
            .arg(mode.psm())
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", whitelist))
            .output()
            .await
            .map_err(|e| AppError::Ocr(format!("无法启动 {}: {}", self.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Ocr(format!("tesseract 退出码 {}: {}", output.status, stderr.trim())).into());
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("tesseract (psm {}) 输出: {:?}", mode.psm(), text);
        Ok(text)
    }
}
