//! 选择来源
//!
//! 流程需要外部选择时只问 [`SelectionSource`]，不关心选择来自 UI 队列还是终端

use anyhow::Result;
use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::{FieldKind, SessionHandle};
use crate::workflow::selection_waiter::SelectionWaiter;

/// 一次选择请求
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    pub field: FieldKind,
    pub options: Vec<String>,
    pub suggested: Option<String>,
    pub timeout: Duration,
}

/// 选择来源；超时或会话停止时返回 `None`
#[async_trait]
pub trait SelectionSource: Send + Sync {
    async fn choose(&self, session: &SessionHandle, request: &SelectionRequest) -> Result<Option<String>>;
}

/// 等待外部客户端通过 `provide_selection` 写入会话
pub struct SessionQueue {
    waiter: SelectionWaiter,
}

impl SessionQueue {
    pub fn new(waiter: SelectionWaiter) -> Self {
        Self { waiter }
    }
}

#[async_trait]
impl SelectionSource for SessionQueue {
    async fn choose(&self, session: &SessionHandle, request: &SelectionRequest) -> Result<Option<String>> {
        if self.waiter.wait(session, request.field, request.timeout).await {
            Ok(session.take_selection(request.field))
        } else {
            Ok(None)
        }
    }
}

/// 把终端输入解析为选项
///
/// 空输入取推荐项（没有推荐时取第一项）；数字按 1 起的序号；其它按文本忽略大小写匹配
pub fn resolve_answer(answer: &str, options: &[String], suggested: Option<&str>) -> Option<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return suggested
            .map(str::to_string)
            .or_else(|| options.first().cloned());
    }
    if let Ok(n) = answer.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| options.get(i)).cloned();
    }
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(answer))
        .cloned()
}

/// 终端交互：打印编号列表，从输入读取选择
pub struct TerminalPrompt<R> {
    input: Mutex<R>,
}

impl TerminalPrompt<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R> TerminalPrompt<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(input),
        }
    }

    fn print_options(request: &SelectionRequest) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "\n请选择 {}:", request.field);
        for (i, option) in request.options.iter().enumerate() {
            let mark = if request.suggested.as_deref() == Some(option.as_str()) { " *" } else { "" };
            let _ = writeln!(out, "  {:>3}. {}{}", i + 1, option, mark);
        }
        let _ = write!(out, "输入序号或名称（回车使用默认）: ");
        let _ = out.flush();
    }

    async fn read_choice(&self, request: &SelectionRequest) -> Result<Option<String>> {
        let mut input = self.input.lock().await;
        loop {
            Self::print_options(request);
            let mut line = String::new();
            if input.read_line(&mut line).await? == 0 {
                warn!("⚠️ 输入已结束，未能选择 {}", request.field);
                return Ok(None);
            }
            match resolve_answer(&line, &request.options, request.suggested.as_deref()) {
                Some(choice) => return Ok(Some(choice)),
                None => println!("无效的选择: {}", line.trim()),
            }
        }
    }
}

#[async_trait]
impl<R> SelectionSource for TerminalPrompt<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn choose(&self, session: &SessionHandle, request: &SelectionRequest) -> Result<Option<String>> {
        if session.is_stopped() {
            return Ok(None);
        }
        match tokio::time::timeout(request.timeout, self.read_choice(request)).await {
            Ok(choice) => {
                let choice = choice?;
                if let Some(value) = &choice {
                    info!("⌨️ {} 选择: {}", request.field, value);
                }
                Ok(choice)
            }
            Err(_) => Ok(None),
        }
    }
}
