//! 业务能力层（Services）
//!
//! 每个服务只描述"我能做什么"，不认识会话，也不决定流程顺序

pub mod captcha;
pub mod case_parser;
pub mod date_resolver;
pub mod form_navigator;
pub mod portal;
pub mod record_writer;

pub use captcha::{CaptchaMode, CaptchaOutcome, CaptchaSolver, OcrEngine, TesseractCli};
pub use case_parser::{infer_category, CaseTableParser, ParsedPage};
pub use date_resolver::DateResolver;
pub use form_navigator::FormNavigator;
pub use record_writer::{ExportedFiles, RecordWriter};
