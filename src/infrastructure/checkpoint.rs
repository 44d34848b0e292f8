//! 检查点文件
//!
//! - 表头检查点：JSON Lines，每行一条 `{file, header}`，按文件路径索引。每拿到一个结果就追加一行，
//!   中途崩溃最多丢掉最后一行。
//! - 科目检查点：目录名 → {科目, 年份} 的 JSON 对象，每新增一条就整体重写。

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::FileError;
use crate::models::{FileHeader, SubjectYear};

/// 读取表头检查点
///
/// 文件不存在时返回空表。最后一行不完整（写到一半被中断）时忽略它，
/// 中间行损坏则报错。同一路径出现多次时以后出现的为准。
pub async fn load_header_checkpoint(path: &Path) -> Result<HashMap<String, FileHeader>, FileError> {
    let path_str = path.display().to_string();

    // 截断的末行可能停在多字节字符中间
    let content = match fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("表头检查点不存在，从头开始: {}", path_str);
            return Ok(HashMap::new());
        }
        Err(e) => return Err(FileError::read_failed(&path_str, e)),
    };

    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let last_index = lines.len().saturating_sub(1);

    let mut entries = HashMap::with_capacity(lines.len());
    for (index, line) in lines.into_iter().enumerate() {
        match serde_json::from_str::<FileHeader>(line) {
            Ok(entry) => {
                entries.insert(entry.file.key(), entry);
            }
            Err(e) if index == last_index => {
                warn!("⚠️ 忽略表头检查点末尾不完整的一行 ({}): {}", path_str, e);
            }
            Err(e) => {
                return Err(FileError::CheckpointCorrupt {
                    path: path_str,
                    source: e,
                })
            }
        }
    }

    info!("📂 已加载表头检查点: {} 条记录", entries.len());
    Ok(entries)
}

/// 表头检查点的追加写入器
///
/// 只由编排层持有，worker 不直接写文件
pub struct HeaderCheckpointWriter {
    path: String,
    file: File,
}

impl HeaderCheckpointWriter {
    /// 以追加模式打开（不存在则创建）
    ///
    /// 上次中断留下的不完整末行会被截掉
    pub async fn open(path: &Path) -> Result<Self, FileError> {
        let path_str = path.display().to_string();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| FileError::write_failed(&path_str, e))?;

        let content = fs::read(path)
            .await
            .map_err(|e| FileError::read_failed(&path_str, e))?;
        if let Some(keep) = complete_prefix_len(&content) {
            warn!("⚠️ 截掉表头检查点末尾不完整的一行 ({} 字节)", content.len() - keep);
            file.set_len(keep as u64)
                .await
                .map_err(|e| FileError::write_failed(&path_str, e))?;
        }

        Ok(Self {
            path: path_str,
            file,
        })
    }

    /// 追加一条记录并立即落盘
    pub async fn append(&mut self, entry: &FileHeader) -> Result<(), FileError> {
        let mut line = serde_json::to_string(entry).map_err(|e| FileError::CheckpointCorrupt {
            path: self.path.clone(),
            source: e,
        })?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| FileError::write_failed(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| FileError::write_failed(&self.path, e))?;
        Ok(())
    }
}

/// 最后一个换行符之后还有内容时，返回需要保留的长度
fn complete_prefix_len(content: &[u8]) -> Option<usize> {
    match content.last() {
        None | Some(b'\n') => None,
        Some(_) => Some(content.iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1)),
    }
}

/// 读取科目检查点，文件不存在时返回空表
pub async fn load_subject_checkpoint(path: &Path) -> Result<BTreeMap<String, SubjectYear>, FileError> {
    let path_str = path.display().to_string();

    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(FileError::read_failed(&path_str, e)),
    };

    let mapping: BTreeMap<String, SubjectYear> =
        serde_json::from_str(&content).map_err(|e| FileError::CheckpointCorrupt {
            path: path_str,
            source: e,
        })?;

    info!("📂 已加载科目检查点: {} 个目录", mapping.len());
    Ok(mapping)
}

/// 整体重写科目检查点
///
/// 先写临时文件再改名，写到一半中断时旧文件保持完整
pub async fn save_subject_checkpoint(
    path: &Path,
    mapping: &BTreeMap<String, SubjectYear>,
) -> Result<(), FileError> {
    let path_str = path.display().to_string();
    let json = serde_json::to_string_pretty(mapping).map_err(|e| FileError::CheckpointCorrupt {
        path: path_str.clone(),
        source: e,
    })?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)
        .await
        .map_err(|e| FileError::write_failed(tmp_path.display().to_string(), e))?;
    fs::rename(&tmp_path, path)
        .await
        .map_err(|e| FileError::write_failed(&path_str, e))?;

    debug!("科目检查点已保存: {} 个目录", mapping.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileRecord, HeaderMetadata};

    fn entry(path: &str) -> FileHeader {
        FileHeader {
            file: FileRecord::new(path),
            header: HeaderMetadata::without_header(),
        }
    }

    #[tokio::test]
    async fn test_missing_checkpoint_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_header_checkpoint(&dir.path().join("none.jsonl")).await.unwrap();
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_append_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headers.jsonl");

        let mut writer = HeaderCheckpointWriter::open(&path).await.unwrap();
        writer.append(&entry("/exams/a.md")).await.unwrap();
        writer.append(&entry("/exams/b.md")).await.unwrap();
        drop(writer);

        let loaded = load_header_checkpoint(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains_key("/exams/a.md"));
    }

    #[tokio::test]
    async fn test_truncated_last_line_is_ignored_and_repaired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headers.jsonl");

        let good = serde_json::to_string(&entry("/exams/a.md")).unwrap();
        std::fs::write(&path, format!("{}\n{{\"file\":{{\"pa", good)).unwrap();

        let loaded = load_header_checkpoint(&path).await.unwrap();
        assert_eq!(loaded.len(), 1);

        let mut writer = HeaderCheckpointWriter::open(&path).await.unwrap();
        writer.append(&entry("/exams/b.md")).await.unwrap();
        drop(writer);

        let loaded = load_header_checkpoint(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains_key("/exams/b.md"));
    }

    #[test]
    fn test_complete_prefix_len() {
        assert_eq!(complete_prefix_len(b""), None);
        assert_eq!(complete_prefix_len(b"a\n"), None);
        assert_eq!(complete_prefix_len(b"a\nbc"), Some(2));
        assert_eq!(complete_prefix_len(b"abc"), Some(0));
    }

    #[tokio::test]
    async fn test_corrupt_middle_line_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("headers.jsonl");
        let good = serde_json::to_string(&entry("/exams/a.md")).unwrap();
        std::fs::write(&path, format!("kaputt\n{}\n", good)).unwrap();

        let err = load_header_checkpoint(&path).await.unwrap_err();
        assert!(matches!(err, FileError::CheckpointCorrupt { .. }));
    }

    #[tokio::test]
    async fn test_subject_checkpoint_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.json");

        let mut mapping = BTreeMap::new();
        mapping.insert(
            "2016Chemie".to_string(),
            SubjectYear {
                subject_name: "Chemie".to_string(),
                year: 2016,
            },
        );
        save_subject_checkpoint(&path, &mapping).await.unwrap();

        let loaded = load_subject_checkpoint(&path).await.unwrap();
        assert_eq!(loaded, mapping);
    }
}
