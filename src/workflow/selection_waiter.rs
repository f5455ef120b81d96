//! 等待外部选择
//!
//! 以固定的粗粒度间隔轮询会话，给慢速的人工操作留出时间

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::config::Config;
use crate::models::{FieldKind, SessionHandle};

/// 选择等待器
#[derive(Debug, Clone, Copy)]
pub struct SelectionWaiter {
    poll_interval: Duration,
}

impl SelectionWaiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.poll_interval())
    }

    /// 等待 `field` 出现非空选择
    ///
    /// 选择出现后在下一个轮询点返回 true；超时、会话出错或被取消时返回 false。不会返回错误
    pub async fn wait(&self, session: &SessionHandle, field: FieldKind, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if session.selection(field).is_some() {
                return true;
            }
            if session.is_stopped() {
                debug!("会话已停止，放弃等待 {}", field);
                return false;
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                debug!("等待 {} 超时 ({:?})", field, timeout);
                return false;
            }
            sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Session, Step};

    fn handle() -> SessionHandle {
        SessionHandle::new(Session::new("w1", "Pune", "today"))
    }

    fn assert_elapsed(start: Instant, secs: u64) {
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_secs(secs) && elapsed < Duration::from_secs(secs + 1),
            "elapsed {:?}, expected ~{}s",
            elapsed,
            secs
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_bound() {
        let session = handle();
        let waiter = SelectionWaiter::new(Duration::from_secs(15));
        let start = Instant::now();
        let got = waiter.wait(&session, FieldKind::State, Duration::from_secs(120)).await;
        assert!(!got);
        assert_elapsed(start, 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_on_first_tick_after_selection() {
        let session = handle();
        session.request_input(Step::StateSelection, 30, "", FieldKind::State, vec!["Goa".into()], None);
        let waiter = SelectionWaiter::new(Duration::from_secs(15));

        let poster = session.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(20)).await;
            poster.provide_selection(FieldKind::State, "Goa").unwrap();
        });

        let start = Instant::now();
        assert!(waiter.wait(&session, FieldKind::State, Duration::from_secs(120)).await);
        assert_elapsed(start, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_wait() {
        let session = handle();
        let waiter = SelectionWaiter::new(Duration::from_secs(15));

        let canceller = session.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(40)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        assert!(!waiter.wait(&session, FieldKind::District, Duration::from_secs(120)).await);
        assert_elapsed(start, 45);
    }
}
