//! 日期解析服务
//!
//! 把 "today" / "tomorrow" / 明确日期规范化到门户允许的窗口 `[today, today + N]`

use chrono::{Duration, Local, NaiveDate};
use tracing::{debug, warn};

/// 接受的明确日期格式
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%m-%Y"];

/// 允许提前查询的最大天数上限
pub const MAX_ADVANCE_CEILING: i64 = 365;

/// 日期解析
#[derive(Debug, Clone, Copy)]
pub struct DateResolver {
    max_advance_days: i64,
}

impl DateResolver {
    pub fn new(max_advance_days: i64) -> Self {
        Self {
            max_advance_days: max_advance_days.clamp(0, MAX_ADVANCE_CEILING),
        }
    }

    /// 以本地日期为"今天"解析
    pub fn resolve(&self, when: &str) -> NaiveDate {
        self.resolve_on(when, Local::now().date_naive())
    }

    /// 以给定日期为"今天"解析，结果总在 `[today, today + max_advance_days]` 内
    pub fn resolve_on(&self, when: &str, today: NaiveDate) -> NaiveDate {
        let latest = today
            .checked_add_signed(Duration::days(self.max_advance_days))
            .unwrap_or(today);
        let keyword = when.trim().to_ascii_lowercase();

        let requested = match keyword.as_str() {
            "today" | "" => today,
            "tomorrow" => today + Duration::days(1),
            _ => match parse_date(when.trim()) {
                Some(date) => date,
                None => {
                    warn!("无法解析日期 '{}'，使用今天", when);
                    today
                }
            },
        };

        let resolved = requested.clamp(today, latest);
        if resolved != requested {
            debug!("日期 {} 超出允许范围，调整为 {}", requested, resolved);
        }
        resolved
    }
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::new(30)
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}
