//! 会话表 - 编排层
//!
//! 显式的会话注册表，由 UI/HTTP 层持有并注入，取代进程级的全局字典。
//! 生命周期：`start` 创建 → 客户端轮询/选择/取消 → 终止后保留一段时间 → `evict_expired` 移除

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::models::{CaseRecord, FieldKind, SessionHandle, SessionSnapshot, SessionStatus};
use crate::orchestrator::session_controller::SessionController;

struct Entry {
    handle: SessionHandle,
    worker: Option<JoinHandle<()>>,
}

/// 会话表
pub struct SessionStore {
    controller: SessionController,
    sessions: RwLock<HashMap<String, Entry>>,
    retention: Duration,
}

impl SessionStore {
    pub fn new(controller: SessionController) -> Self {
        let retention = controller.config().session_retention();
        Self {
            controller,
            sessions: RwLock::new(HashMap::new()),
            retention,
        }
    }

    fn get(&self, id: &str) -> Result<SessionHandle, ApiError> {
        let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
        sessions
            .get(id)
            .map(|e| e.handle.clone())
            .ok_or_else(|| ApiError::UnknownSession(id.to_string()))
    }

    /// 创建会话，返回会话 ID
    pub fn start(&self, district_hint: &str, when: &str) -> Result<String, ApiError> {
        let (handle, worker) = self.controller.start(district_hint, when)?;
        let id = handle.id();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.insert(
            id.clone(),
            Entry {
                handle,
                worker: Some(worker),
            },
        );
        Ok(id)
    }

    /// 状态轮询
    pub fn poll(&self, id: &str) -> Result<SessionSnapshot, ApiError> {
        Ok(self.get(id)?.snapshot())
    }

    /// 外部客户端提交选择
    pub fn provide_selection(&self, id: &str, field: &str, value: &str) -> Result<(), ApiError> {
        let handle = self.get(id)?;
        let field = FieldKind::parse(field).ok_or_else(|| ApiError::BadField {
            field: field.to_string(),
            reason: "未知字段".to_string(),
        })?;
        handle.provide_selection(field, value)?;
        debug!("[会话 {}] 收到 {} 选择: {}", id, field, value);
        Ok(())
    }

    /// 取消会话，工作任务在下一个轮询点退出并释放浏览器
    pub fn cancel(&self, id: &str) -> Result<(), ApiError> {
        self.get(id)?.cancel();
        info!("[会话 {}] 🛑 收到取消请求", id);
        Ok(())
    }

    /// 获取结果；会话完成前返回 `NotReady`
    pub fn fetch_records(&self, id: &str) -> Result<Vec<CaseRecord>, ApiError> {
        let handle = self.get(id)?;
        if handle.status() != SessionStatus::Completed {
            return Err(ApiError::NotReady(id.to_string()));
        }
        Ok(handle.records())
    }

    /// 共享句柄（进程内调用方使用）
    pub fn handle(&self, id: &str) -> Result<SessionHandle, ApiError> {
        self.get(id)
    }

    /// 取出工作任务句柄以等待其结束；只能取一次
    pub fn take_worker(&self, id: &str) -> Result<Option<JoinHandle<()>>, ApiError> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| ApiError::UnknownSession(id.to_string()))?;
        Ok(entry.worker.take())
    }

    /// 移除终止时间早于 `now - retention` 的会话，返回移除数量
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let retention = chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry.handle.read(|s| match s.finished_at {
                Some(finished) if s.status.is_terminal() => {
                    now.signed_duration_since(finished) <= retention
                }
                _ => true,
            })
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("🧹 清理了 {} 个过期会话", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
