//! 结果写入服务 - 业务能力层
//!
//! 只负责把案件列表写成 CSV / JSON 文件，以及保存结果页 HTML 供排查

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::CaseRecord;

/// 一次导出生成的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFiles {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// 结果写入服务
///
/// CSV 与 JSON 使用同一组字段（`CaseRecord` 的 serde 定义）
pub struct RecordWriter {
    output_dir: PathBuf,
}

impl RecordWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .map_err(|e| AppError::io(self.output_dir.display().to_string(), e))?;
        Ok(())
    }

    /// 写出 `web_cause_list_<会话>_<时间戳>.csv/.json`
    pub fn export(&self, session_id: &str, records: &[CaseRecord]) -> Result<ExportedFiles> {
        self.ensure_dir()?;
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let stem = format!("web_cause_list_{}_{}", session_id, stamp);

        let csv_path = self.output_dir.join(format!("{}.csv", stem));
        let mut writer = csv::Writer::from_path(&csv_path)
            .with_context(|| format!("创建 {} 失败", csv_path.display()))?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush().map_err(|e| AppError::io(csv_path.display().to_string(), e))?;

        let json_path = self.output_dir.join(format!("{}.json", stem));
        let json = serde_json::to_string_pretty(records)?;
        fs::write(&json_path, json).map_err(|e| AppError::io(json_path.display().to_string(), e))?;

        info!(
            "💾 已保存 {} 条记录: {}, {}",
            records.len(),
            csv_path.display(),
            json_path.display()
        );
        Ok(ExportedFiles {
            csv: csv_path,
            json: json_path,
        })
    }

    /// 保存结果页 HTML 为 `debug_page.html`
    pub fn dump_page(&self, html: &str) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.output_dir.join("debug_page.html");
        fs::write(&path, html).map_err(|e| AppError::io(path.display().to_string(), e))?;
        debug!("结果页已保存: {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<CaseRecord> {
        let mut record = CaseRecord::new("1", "OS/1/2020\n\nNext hearing date 20-10-2026", "A versus B", "X");
        record.district = "Pune".into();
        record.case_type = "Civil".into();
        vec![record, CaseRecord::new("2", "CS/2/2021", "C versus D", "")]
    }

    #[test]
    fn test_export_writes_same_records_to_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RecordWriter::new(dir.path().join("out"));
        let files = writer.export("abc", &sample()).unwrap();

        let name = files.csv.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("web_cause_list_abc_"));

        let from_json: Vec<CaseRecord> =
            serde_json::from_str(&fs::read_to_string(&files.json).unwrap()).unwrap();
        let mut reader = csv::Reader::from_path(&files.csv).unwrap();
        let from_csv: Vec<CaseRecord> = reader.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(from_json, sample());
        assert_eq!(from_csv, from_json);
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "serial");
        assert_eq!(headers.len(), 10);
    }

    #[test]
    fn test_dump_page() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RecordWriter::new(dir.path());
        let path = writer.dump_page("<html></html>").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "<html></html>");
    }
}
