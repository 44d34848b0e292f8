//! 警告写入服务 - 业务能力层
//!
//! 只负责"写 warn.txt"能力，不关心流程

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

/// 警告写入服务
///
/// 职责：
/// - 将分组失败的科目目录写入 warn.txt
/// - 将表头识别失败的文件写入 warn.txt
/// - 每次只写一条
pub struct WarnWriter {
    warn_file_path: String,
}

impl WarnWriter {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            warn_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.warn_file_path
    }

    /// 记录分组失败的科目目录
    pub fn write_subject(&self, directory: &str, reason: &str) -> Result<()> {
        self.append(&format!("科目 {} | 分组失败: {}\n", directory, reason))
    }

    /// 记录表头识别失败的文件
    pub fn write_file(&self, path: &str, reason: &str) -> Result<()> {
        self.append(&format!("文件 {} | 表头识别失败: {}\n", path, reason))
    }

    /// 记录其他警告（例如未被分组引用的文件）
    pub fn write_note(&self, message: &str) -> Result<()> {
        self.append(&format!("{}\n", message))
    }

    fn append(&self, line: &str) -> Result<()> {
        debug!("写入警告: {}", line.trim_end());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.warn_file_path)?;

        file.write_all(line.as_bytes())?;

        Ok(())
    }
}

impl Default for WarnWriter {
    fn default() -> Self {
        Self::with_path("warn.txt")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warn.txt");
        let writer = WarnWriter::with_path(path.to_string_lossy());

        writer.write_subject("2016Chemie", "已重试 5 次").unwrap();
        writer.write_file("/exams/a.md", "超时").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("科目 2016Chemie"));
        assert!(lines[1].contains("/exams/a.md"));
    }
}
