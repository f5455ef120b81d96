//! 抓取会话模型
//!
//! 会话由工作线程独占写入，唯一的例外是 `selections`（外部客户端写入）和取消信号。
//! 每次写入都在一次加锁内完成，轮询方看到的是一致（可能略旧）的快照。

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{ApiError, ErrorKind};
use crate::models::case_record::CaseRecord;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Running,
    WaitingInput,
    Completed,
    Error,
    Cancelled,
}

impl SessionStatus {
    /// completed / error / cancelled 是终止状态
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Error | SessionStatus::Cancelled
        )
    }
}

/// 需要外部客户端给出选择的字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    State,
    District,
    #[serde(rename = "complex")]
    CourtComplex,
    Judge,
    #[serde(rename = "case_type")]
    CaseCategory,
}

impl FieldKind {
    /// 与客户端约定的字段名
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKind::State => "state",
            FieldKind::District => "district",
            FieldKind::CourtComplex => "complex",
            FieldKind::Judge => "judge",
            FieldKind::CaseCategory => "case_type",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "state" => Some(FieldKind::State),
            "district" => Some(FieldKind::District),
            "complex" | "court_complex" => Some(FieldKind::CourtComplex),
            "judge" => Some(FieldKind::Judge),
            "case_type" | "category" => Some(FieldKind::CaseCategory),
            _ => None,
        }
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 流程步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Initializing,
    PageLoad,
    StateSelection,
    DistrictSelection,
    ComplexSelection,
    JudgeSelection,
    DateSetting,
    CaptchaSolving,
    Scraping,
    Completed,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Initializing => "initializing",
            Step::PageLoad => "page_load",
            Step::StateSelection => "state_selection",
            Step::DistrictSelection => "district_selection",
            Step::ComplexSelection => "complex_selection",
            Step::JudgeSelection => "judge_selection",
            Step::DateSetting => "date_setting",
            Step::CaptchaSolving => "captcha_solving",
            Step::Scraping => "scraping",
            Step::Completed => "completed",
        }
    }
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 当前等待的输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingInput {
    pub field: FieldKind,
    pub options: Vec<String>,
    /// 根据启动参数推荐的选项（例如与 district 提示匹配的区）
    pub suggested: Option<String>,
}

/// 供下游报表使用的已选值，选择被消费后仍然保留
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionOutputs {
    pub state: Option<String>,
    pub district: Option<String>,
    pub court_complex: Option<String>,
}

/// 一次抓取会话
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub district_hint: String,
    pub when: String,
    pub status: SessionStatus,
    pub current_step: Step,
    pub progress: u8,
    pub message: String,
    pub pending_input: Option<PendingInput>,
    pub selections: HashMap<FieldKind, String>,
    pub outputs: SessionOutputs,
    pub records: Vec<CaseRecord>,
    pub error_detail: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub completed_steps: Vec<Step>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(id: impl Into<String>, district_hint: impl Into<String>, when: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            district_hint: district_hint.into(),
            when: when.into(),
            status: SessionStatus::Idle,
            current_step: Step::Initializing,
            progress: 0,
            message: String::new(),
            pending_input: None,
            selections: HashMap::new(),
            outputs: SessionOutputs::default(),
            records: Vec::new(),
            error_detail: None,
            error_kind: None,
            completed_steps: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// 状态轮询用的只读投影
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub status: SessionStatus,
    pub current_step: Step,
    pub progress: u8,
    pub message: String,
    pub pending_input: Option<PendingInput>,
    pub outputs: SessionOutputs,
    pub record_count: usize,
    pub error_detail: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub completed_steps: Vec<Step>,
}

/// 会话的共享句柄
///
/// 工作线程与外部客户端各持一份克隆
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
}

impl SessionHandle {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(session)),
        }
    }

    /// 只读访问
    pub fn read<R>(&self, f: impl FnOnce(&Session) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// 单次原子写入
    fn update<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn id(&self) -> String {
        self.read(|s| s.id.clone())
    }

    pub fn status(&self) -> SessionStatus {
        self.read(|s| s.status)
    }

    /// 会话是否已经出错或被取消（等待循环据此提前退出）
    pub fn is_stopped(&self) -> bool {
        matches!(
            self.status(),
            SessionStatus::Error | SessionStatus::Cancelled
        )
    }

    /// 更新当前步骤，清除待输入项；进度只增不减；终止状态下不做任何事
    pub fn update_status(&self, step: Step, progress: u8, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| {
            if s.status.is_terminal() {
                return;
            }
            s.status = SessionStatus::Running;
            s.current_step = step;
            s.progress = s.progress.max(progress.min(100));
            s.message = message;
            s.pending_input = None;
        });
    }

    /// 进入等待输入状态，覆盖之前的待输入项
    pub fn request_input(
        &self,
        step: Step,
        progress: u8,
        message: impl Into<String>,
        field: FieldKind,
        options: Vec<String>,
        suggested: Option<String>,
    ) {
        let message = message.into();
        self.update(|s| {
            if s.status.is_terminal() {
                return;
            }
            s.status = SessionStatus::WaitingInput;
            s.current_step = step;
            s.progress = s.progress.max(progress.min(100));
            s.message = message;
            s.pending_input = Some(PendingInput {
                field,
                options,
                suggested,
            });
        });
    }

    /// 外部客户端提交选择
    pub fn provide_selection(&self, field: FieldKind, value: &str) -> Result<(), ApiError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ApiError::BadField {
                field: field.to_string(),
                reason: "选择值为空".to_string(),
            });
        }
        self.update(|s| {
            if s.status.is_terminal() {
                return Err(ApiError::BadField {
                    field: field.to_string(),
                    reason: "会话已结束".to_string(),
                });
            }
            if let Some(pending) = &s.pending_input {
                if pending.field != field {
                    return Err(ApiError::BadField {
                        field: field.to_string(),
                        reason: format!("当前等待的是 {}", pending.field),
                    });
                }
            }
            s.selections.insert(field, value.to_string());
            Ok(())
        })
    }

    /// 查看某字段的选择（不消费）
    pub fn selection(&self, field: FieldKind) -> Option<String> {
        self.read(|s| s.selections.get(&field).filter(|v| !v.is_empty()).cloned())
    }

    /// 取出并清除某字段的选择
    pub fn take_selection(&self, field: FieldKind) -> Option<String> {
        self.update(|s| s.selections.remove(&field))
            .filter(|v| !v.is_empty())
    }

    /// 取消会话；已终止的会话保持原状态
    pub fn cancel(&self) {
        self.update(|s| {
            if s.status.is_terminal() {
                return;
            }
            s.status = SessionStatus::Cancelled;
            s.message = "会话已取消".to_string();
            s.pending_input = None;
            s.finished_at = Some(Utc::now());
        });
    }

    pub fn mark_step_completed(&self, step: Step) {
        self.update(|s| {
            if !s.completed_steps.contains(&step) {
                s.completed_steps.push(step);
            }
        });
    }

    /// 记录已选值供报表使用
    pub fn record_output(&self, field: FieldKind, value: &str) {
        let value = Some(value.to_string());
        self.update(|s| match field {
            FieldKind::State => s.outputs.state = value,
            FieldKind::District => s.outputs.district = value,
            FieldKind::CourtComplex => s.outputs.court_complex = value,
            FieldKind::Judge | FieldKind::CaseCategory => {}
        });
    }

    pub fn outputs(&self) -> SessionOutputs {
        self.read(|s| s.outputs.clone())
    }

    /// 一次性写入结果并标记完成；会话已终止时返回 false
    pub fn complete(&self, records: Vec<CaseRecord>, message: impl Into<String>) -> bool {
        let message = message.into();
        self.update(|s| {
            if s.status.is_terminal() {
                return false;
            }
            s.records = records;
            s.status = SessionStatus::Completed;
            s.current_step = Step::Completed;
            s.progress = 100;
            s.message = message;
            s.pending_input = None;
            s.finished_at = Some(Utc::now());
            true
        })
    }

    /// 标记失败；已取消或已结束的会话不被覆盖
    pub fn fail(&self, kind: ErrorKind, detail: impl Into<String>) -> bool {
        let detail = detail.into();
        self.update(|s| {
            if s.status.is_terminal() {
                return false;
            }
            s.status = SessionStatus::Error;
            s.message = detail.clone();
            s.error_detail = Some(detail);
            s.error_kind = Some(kind);
            s.pending_input = None;
            s.finished_at = Some(Utc::now());
            true
        })
    }

    pub fn records(&self) -> Vec<CaseRecord> {
        self.read(|s| s.records.clone())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.read(|s| SessionSnapshot {
            id: s.id.clone(),
            status: s.status,
            current_step: s.current_step,
            progress: s.progress,
            message: s.message.clone(),
            pending_input: s.pending_input.clone(),
            outputs: s.outputs.clone(),
            record_count: s.records.len(),
            error_detail: s.error_detail.clone(),
            error_kind: s.error_kind,
            completed_steps: s.completed_steps.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> SessionHandle {
        SessionHandle::new(Session::new("s1", "Pune", "today"))
    }

    #[test]
    fn test_progress_never_decreases() {
        let h = handle();
        h.update_status(Step::StateSelection, 30, "a");
        h.update_status(Step::StateSelection, 25, "b");
        assert_eq!(h.snapshot().progress, 30);
        assert_eq!(h.snapshot().message, "b");
    }

    #[test]
    fn test_pending_input_only_while_waiting() {
        let h = handle();
        h.request_input(
            Step::StateSelection,
            30,
            "select",
            FieldKind::State,
            vec!["Maharashtra".into()],
            None,
        );
        let snap = h.snapshot();
        assert_eq!(snap.status, SessionStatus::WaitingInput);
        assert_eq!(snap.pending_input.map(|p| p.field), Some(FieldKind::State));

        h.update_status(Step::StateSelection, 32, "processing");
        let snap = h.snapshot();
        assert_eq!(snap.status, SessionStatus::Running);
        assert!(snap.pending_input.is_none());
    }

    #[test]
    fn test_selection_mismatch_rejected() {
        let h = handle();
        h.request_input(Step::StateSelection, 30, "", FieldKind::State, vec![], None);
        assert!(matches!(
            h.provide_selection(FieldKind::Judge, "X"),
            Err(ApiError::BadField { .. })
        ));
        assert!(h.provide_selection(FieldKind::State, "").is_err());
        assert!(h.provide_selection(FieldKind::State, "Maharashtra").is_ok());
        assert_eq!(h.take_selection(FieldKind::State).as_deref(), Some("Maharashtra"));
        assert!(h.selection(FieldKind::State).is_none());
    }

    #[test]
    fn test_cancel_is_not_overwritten() {
        let h = handle();
        h.update_status(Step::PageLoad, 20, "loading");
        h.cancel();
        assert!(!h.fail(ErrorKind::SelectionTimeout, "timeout"));
        h.update_status(Step::StateSelection, 30, "ignored");
        let snap = h.snapshot();
        assert_eq!(snap.status, SessionStatus::Cancelled);
        assert!(snap.error_detail.is_none());
    }

    #[test]
    fn test_complete_sets_records_once() {
        let h = handle();
        let records = vec![CaseRecord::new("1", "OS/1/2020", "A versus B", "")];
        assert!(h.complete(records.clone(), "done"));
        assert!(!h.complete(Vec::new(), "again"));
        assert_eq!(h.records(), records);
        assert_eq!(h.snapshot().progress, 100);
    }
}
