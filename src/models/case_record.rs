//! 案件记录模型

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// 案件类别（结果页上的 Civil / Criminal 按钮）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaseCategory {
    Civil,
    Criminal,
}

impl CaseCategory {
    /// 页面按钮上显示的名称
    pub fn name(self) -> &'static str {
        match self {
            CaseCategory::Civil => "Civil",
            CaseCategory::Criminal => "Criminal",
        }
    }

    /// 尝试从字符串解析类别（忽略大小写）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "civil" | "civ" => Some(CaseCategory::Civil),
            "criminal" | "cri" => Some(CaseCategory::Criminal),
            _ => None,
        }
    }

    /// 供外部客户端选择的全部类别
    pub fn options() -> Vec<String> {
        vec![
            CaseCategory::Civil.name().to_string(),
            CaseCategory::Criminal.name().to_string(),
        ]
    }
}

impl Display for CaseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 一条抓取到的案件
///
/// 前四个字段来自结果表格，其余字段是会话级元数据，在提取完成后统一填入。
/// CSV 与 JSON 输出使用同一组字段。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub serial: String,
    /// 可能内嵌 "Next hearing date" 片段，片段前有一个空行
    pub case_number: String,
    pub party_name: String,
    #[serde(default)]
    pub advocate: String,
    #[serde(default)]
    pub court_name: String,
    /// ISO 日期 (YYYY-MM-DD)
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub case_type: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub court_complex: String,
}

impl CaseRecord {
    /// 只带表格字段的记录，元数据留空
    pub fn new(
        serial: impl Into<String>,
        case_number: impl Into<String>,
        party_name: impl Into<String>,
        advocate: impl Into<String>,
    ) -> Self {
        Self {
            serial: serial.into(),
            case_number: case_number.into(),
            party_name: party_name.into(),
            advocate: advocate.into(),
            court_name: String::new(),
            date: String::new(),
            case_type: String::new(),
            district: String::new(),
            state: String::new(),
            court_complex: String::new(),
        }
    }

    /// 序号、案号、当事人三者去空白后都非空才算有效记录
    pub fn is_valid(&self) -> bool {
        is_valid_case(&self.serial, &self.case_number, &self.party_name)
    }
}

/// 有效性判断的纯函数版本，解析器的累加器也用它
pub fn is_valid_case(serial: &str, case_number: &str, party_name: &str) -> bool {
    !serial.trim().is_empty() && !case_number.trim().is_empty() && !party_name.trim().is_empty()
}

/// 会话级元数据，提取成功后复制进每条记录
#[derive(Debug, Clone, Default)]
pub struct RecordMetadata {
    pub court_name: String,
    pub date: String,
    pub case_type: String,
    pub district: String,
    pub state: String,
    pub court_complex: String,
}

impl RecordMetadata {
    pub fn apply(&self, record: &mut CaseRecord) {
        record.court_name = self.court_name.clone();
        record.date = self.date.clone();
        record.case_type = self.case_type.clone();
        record.district = self.district.clone();
        record.state = self.state.clone();
        record.court_complex = self.court_complex.clone();
    }
}
