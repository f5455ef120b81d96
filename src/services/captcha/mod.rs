//! 验证码求解
//!
//! - `preprocess` - 图片解码与二值化
//! - `ocr` - OCR 引擎接口（tesseract 命令行实现）
//! - `solver` - 有限次数的求解状态机与结果页校验

pub mod ocr;
pub mod preprocess;
pub mod solver;

pub use ocr::{clean_ocr_text, OcrEngine, PageSegMode, TesseractCli, CAPTCHA_LENGTH, CAPTCHA_WHITELIST};
pub use solver::{CaptchaMode, CaptchaOutcome, CaptchaSolver, ValidationHeuristics};
