//! 文件清单
//!
//! 递归扫描考试根目录，按文件名（不是完整路径）建立索引。
//! 不同目录下的同名文件会互相覆盖，后续的分组校验依赖"文件名在整个目录树内唯一"这一前提。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::FileError;
use crate::models::FileRecord;

/// 沙箱软件留下的目录，整个子树都跳过
pub const EXCLUDED_DIRECTORY: &str = "~BROMIUM";

/// 文件名 → 文件 的只读索引
#[derive(Debug, Clone)]
pub struct Inventory {
    root: PathBuf,
    files: HashMap<String, FileRecord>,
}

impl Inventory {
    /// 扫描目录树
    ///
    /// 遍历过程中任何错误都会让整个扫描失败，不返回部分结果
    pub fn scan(root: &Path) -> Result<Self, FileError> {
        let mut files = HashMap::new();

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry.file_type().is_dir(), entry.file_name()));

        for entry in walker {
            let entry = entry.map_err(|e| FileError::WalkFailed {
                path: root.display().to_string(),
                source: e,
            })?;

            if entry.file_type().is_dir() {
                continue;
            }

            let record = FileRecord::new(entry.into_path());
            if let Some(previous) = files.insert(record.name.clone(), record) {
                debug!("同名文件被覆盖: {}", previous.path.display());
            }
        }

        debug!("扫描完成: {} 个文件 ({})", files.len(), root.display());

        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    /// 由已有记录构建清单（同名规则与扫描一致）
    pub fn from_records(root: impl Into<PathBuf>, records: impl IntoIterator<Item = FileRecord>) -> Self {
        let files = records
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        Self {
            root: root.into(),
            files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// 所有文件，顺序不固定
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    /// 某个科目目录下的所有文件
    pub fn files_in_subject<'a>(&'a self, directory: &'a str) -> impl Iterator<Item = &'a FileRecord> + 'a {
        self.files
            .values()
            .filter(move |file| file.subject_directory(&self.root).as_deref() == Some(directory))
    }
}

/// 列出根目录下的科目目录（按名称排序）
pub fn list_subject_directories(root: &Path) -> Result<Vec<String>, FileError> {
    let entries = std::fs::read_dir(root).map_err(|e| FileError::read_failed(root.display().to_string(), e))?;

    let mut directories = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FileError::read_failed(root.display().to_string(), e))?;
        let is_dir = match entry.file_type() {
            Ok(file_type) => file_type.is_dir(),
            Err(e) => {
                warn!("无法读取文件类型 {}: {}", entry.path().display(), e);
                continue;
            }
        };
        if is_dir && !is_excluded(true, &entry.file_name()) {
            directories.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    directories.sort();
    Ok(directories)
}

fn is_excluded(is_dir: bool, name: &std::ffi::OsStr) -> bool {
    is_dir && name == EXCLUDED_DIRECTORY
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_scan_prunes_excluded_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("2016Chemie/2016ChemieA1.md"));
        touch(&root.join("2016Chemie/eA/2016ChemieA1L.md"));
        touch(&root.join("2016Chemie/~BROMIUM/2016ChemieGhost.md"));
        touch(&root.join("~BROMIUM/deep/nested/2016ChemieGhost2.md"));

        let inventory = Inventory::scan(root).unwrap();

        assert_eq!(inventory.len(), 2);
        assert!(inventory.contains("2016ChemieA1.md"));
        assert!(inventory.contains("2016ChemieA1L.md"));
        assert!(!inventory.contains("2016ChemieGhost.md"));
        assert!(!inventory.contains("2016ChemieGhost2.md"));
    }

    #[test]
    fn test_file_named_like_excluded_directory_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("2017Physik/~BROMIUM"));

        let inventory = Inventory::scan(dir.path()).unwrap();
        assert!(inventory.contains("~BROMIUM"));
    }

    #[test]
    fn test_duplicate_names_collapse_to_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/Deckblatt.md"));
        touch(&dir.path().join("b/Deckblatt.md"));

        let inventory = Inventory::scan(dir.path()).unwrap();
        assert_eq!(inventory.len(), 1);
    }

    #[test]
    fn test_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Inventory::scan(&dir.path().join("does-not-exist"));
        assert!(matches!(result, Err(FileError::WalkFailed { .. })));
    }

    #[test]
    fn test_list_subject_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("2017Physik/a.md"));
        touch(&dir.path().join("2016Chemie/b.md"));
        touch(&dir.path().join("~BROMIUM/c.md"));
        touch(&dir.path().join("README.md"));

        let directories = list_subject_directories(dir.path()).unwrap();
        assert_eq!(directories, vec!["2016Chemie", "2017Physik"]);
    }

    #[test]
    fn test_files_in_subject() {
        let root = PathBuf::from("/exams");
        let inventory = Inventory::from_records(
            &root,
            vec![
                FileRecord::new("/exams/2016Chemie/a.md"),
                FileRecord::new("/exams/2016Chemie/eA/b.md"),
                FileRecord::new("/exams/2017Physik/c.md"),
            ],
        );

        let mut names: Vec<&str> = inventory
            .files_in_subject("2016Chemie")
            .map(|f| f.name.as_str())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.md", "b.md"]);
    }
}
