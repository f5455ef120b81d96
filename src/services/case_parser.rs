//! 结果页解析服务
//!
//! 表格模式：单遍扫描表格行，维护一个"当前案件"累加器。
//! - 表头行（含 "Sr No" / "Cases"）跳过一次
//! - 只有一个非空单元格且不以数字开头的行是分节标记：提交并清空累加器
//! - 首个单元格以数字开头的行开始新案件：先提交上一个累加器
//! - 其它行（状态标签、空白行）忽略
//!
//! 页面没有表格时退回到按行扫描页面文本的文本模式。

use anyhow::{anyhow, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::models::{case_record::is_valid_case, CaseCategory, CaseRecord};

const NEXT_HEARING: &str = "Next hearing date";

const CIVIL_INDICATORS: &[&str] = &[
    "original suits",
    "os/",
    "civil suit",
    "civil application",
    "execution",
    "declaration",
    "recovery",
    "succession",
    "misc. civil",
];

const CRIMINAL_INDICATORS: &[&str] = &[
    "criminal appeal",
    "criminal revision",
    "bail application",
    "fir",
    "police case",
    "criminal complaint",
];

/// 一个结果页的解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPage {
    pub records: Vec<CaseRecord>,
    /// 页面上第一处提到法官的文本行
    pub page_court_name: Option<String>,
}

/// 正在组装的案件
#[derive(Debug, Default)]
struct Accumulator {
    serial: String,
    case_number: String,
    party_name: String,
    advocate: String,
}

impl Accumulator {
    fn into_record(self) -> Option<CaseRecord> {
        is_valid_case(&self.serial, &self.case_number, &self.party_name)
            .then(|| CaseRecord::new(self.serial, self.case_number, self.party_name, self.advocate))
    }
}

/// 把累加器中的有效案件写入输出
fn flush(current: &mut Option<Accumulator>, out: &mut Vec<CaseRecord>) {
    if let Some(record) = current.take().and_then(Accumulator::into_record) {
        out.push(record);
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 合并空白，并在 "Next hearing date" 前插入空行
pub fn normalize_case_number(raw: &str) -> String {
    let collapsed = collapse_whitespace(raw);
    match collapsed.split_once(NEXT_HEARING) {
        Some((head, tail)) => format!("{}\n\n{}{}", head.trim(), NEXT_HEARING, tail),
        None => collapsed,
    }
}

/// 当事人名称：换行改为空格，"versus" 两侧补空格，去掉尾部的下次开庭日期
pub fn normalize_party_name(raw: &str) -> String {
    let spaced = raw.replace('\n', " ").replace("versus", " versus ");
    let mut name = collapse_whitespace(&spaced);
    if let Some(pos) = name.to_ascii_lowercase().find(&NEXT_HEARING.to_ascii_lowercase()) {
        name.truncate(pos);
        name = name.trim().to_string();
    }
    name
}

/// 结果页解析
pub struct CaseTableParser {
    table: Selector,
    row: Selector,
    cell: Selector,
    body: Selector,
    serial_line: Regex,
    case_number_line: Regex,
}

impl CaseTableParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            table: selector("table")?,
            row: selector("tr")?,
            cell: selector("td")?,
            body: selector("body")?,
            serial_line: Regex::new(r"^(\d+)\.?\s*$")?,
            case_number_line: Regex::new(r"(?i)(View)?(OS|AS|ARBTN|CS)/\d+/\d+")?,
        })
    }

    /// 解析整个结果页 HTML
    pub fn parse_document(&self, html: &str) -> ParsedPage {
        let document = Html::parse_document(html);
        let text = self.page_text(&document);
        let page_court_name = extract_court_name(&text);

        let records = match document.select(&self.table).next() {
            Some(table) => {
                let rows = self.table_rows(table);
                debug!("表格共 {} 行", rows.len());
                self.parse_rows(&rows)
            }
            None => {
                info!("页面中没有表格，改用文本模式解析");
                self.parse_text(&text)
            }
        };

        ParsedPage {
            records,
            page_court_name,
        }
    }

    fn page_text(&self, document: &Html) -> String {
        let root = document
            .select(&self.body)
            .next()
            .unwrap_or_else(|| document.root_element());
        root.text().collect::<Vec<_>>().join("\n")
    }

    /// 每行的 `<td>` 文本，单元格内各文本片段以换行连接
    fn table_rows(&self, table: ElementRef<'_>) -> Vec<Vec<String>> {
        table
            .select(&self.row)
            .map(|row| {
                row.select(&self.cell)
                    .map(|td| {
                        td.text()
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .collect::<Vec<_>>()
                            .join("\n")
                    })
                    .collect()
            })
            .collect()
    }

    /// 表格模式
    pub fn parse_rows<S: AsRef<str>>(&self, rows: &[Vec<S>]) -> Vec<CaseRecord> {
        let mut records = Vec::new();
        let mut current: Option<Accumulator> = None;
        let mut header_seen = false;

        for row in rows {
            let cells: Vec<&str> = row.iter().map(|c| c.as_ref().trim()).collect();
            let non_empty: Vec<&str> = cells.iter().copied().filter(|c| !c.is_empty()).collect();
            if non_empty.is_empty() {
                continue;
            }

            if !header_seen && cells.iter().any(|c| c.contains("Sr No") || c.contains("Cases")) {
                header_seen = true;
                continue;
            }

            if non_empty.len() == 1 && !starts_with_digit(non_empty[0]) {
                debug!("📂 分节: {}", non_empty[0]);
                flush(&mut current, &mut records);
                continue;
            }

            let first = cells.first().copied().unwrap_or_default();
            if starts_with_digit(first) {
                flush(&mut current, &mut records);
                current = Some(Accumulator {
                    serial: first.to_string(),
                    case_number: cells.get(1).map(|c| normalize_case_number(c)).unwrap_or_default(),
                    party_name: cells.get(2).map(|c| normalize_party_name(c)).unwrap_or_default(),
                    advocate: cells.get(3).map(|c| collapse_whitespace(c)).unwrap_or_default(),
                });
            }
        }

        flush(&mut current, &mut records);
        records
    }

    /// 文本模式：序号行 → 案号行 → 含 versus 的当事人行 → 可选的短律师行
    pub fn parse_text(&self, text: &str) -> Vec<CaseRecord> {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let mut records = Vec::new();
        let mut current: Option<Accumulator> = None;
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            if line.is_empty() {
                i += 1;
                continue;
            }

            if current.is_none() {
                if let Some(caps) = self.serial_line.captures(line) {
                    current = Some(Accumulator {
                        serial: caps[1].to_string(),
                        ..Default::default()
                    });
                }
                i += 1;
                continue;
            }

            let Some(acc) = current.as_mut() else {
                i += 1;
                continue;
            };

            if acc.case_number.is_empty() && self.case_number_line.is_match(line) {
                acc.case_number = line.to_string();
            } else if acc.party_name.is_empty() && line.to_lowercase().contains("versus") {
                acc.party_name = normalize_party_name(line);
            } else if !acc.party_name.is_empty()
                && acc.advocate.is_empty()
                && line.split_whitespace().count() <= 4
                && !line.chars().all(|c| c.is_ascii_digit())
                && !self.serial_line.is_match(line)
                && !self.case_number_line.is_match(line)
            {
                acc.advocate = line.to_string();
            } else if !acc.case_number.is_empty() && !acc.party_name.is_empty() {
                flush(&mut current, &mut records);
                // 当前行可能是下一个案件的序号，重新处理
                continue;
            }
            i += 1;
        }

        if current
            .as_ref()
            .is_some_and(|acc| !acc.case_number.is_empty() && !acc.party_name.is_empty())
        {
            flush(&mut current, &mut records);
        }
        records
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("无效的选择器 {}: {}", css, e))
}

fn starts_with_digit(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// 页面文本中第一处提到法官的行（不以 "Select" 开头）
pub fn extract_court_name(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("Select"))
        .find(|line| line.contains("Judge") || line.contains("Additional District"))
        .map(str::to_string)
}

/// 按案号中的类别特征词推断类别；两类计数相同时返回 `None`
pub fn infer_category(records: &[CaseRecord]) -> Option<CaseCategory> {
    let mut civil = 0usize;
    let mut criminal = 0usize;
    for record in records {
        let number = record.case_number.to_lowercase();
        if CIVIL_INDICATORS.iter().any(|i| number.contains(i)) {
            civil += 1;
        }
        if CRIMINAL_INDICATORS.iter().any(|i| number.contains(i)) {
            criminal += 1;
        }
    }
    match civil.cmp(&criminal) {
        std::cmp::Ordering::Greater => Some(CaseCategory::Civil),
        std::cmp::Ordering::Less => Some(CaseCategory::Criminal),
        std::cmp::Ordering::Equal => None,
    }
}
