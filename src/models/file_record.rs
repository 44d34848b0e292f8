use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 清单中的单个文件
///
/// 扫描时创建一次，之后只读
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub name: String,
}

impl FileRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }

    /// 文件所在的科目目录（相对于考试根目录的第一级目录）
    pub fn subject_directory(&self, root: &Path) -> Option<String> {
        let relative = self.path.strip_prefix(root).ok()?;
        let mut components = relative.components();
        let first = components.next()?;
        // 根目录下直接放着的文件不属于任何科目目录
        components.next()?;
        Some(first.as_os_str().to_string_lossy().into_owned())
    }

    /// 检查点和数据库使用的自然键
    pub fn key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

impl std::fmt::Display for FileRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}
