use crate::error::{ConfigError, FileError};
use crate::models::subject::SubjectVocabulary;
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize)]
struct SubjectsFile {
    subjects: Vec<String>,
}

/// 从 TOML 文件加载科目词表
///
/// 文件格式：
/// ```toml
/// subjects = ["Deutsch", "Chemie"]
/// ```
pub async fn load_subject_vocabulary(path: &Path) -> Result<SubjectVocabulary, crate::AppError> {
    let path_str = path.display().to_string();

    let content = fs::read_to_string(path)
        .await
        .map_err(|e| FileError::read_failed(&path_str, e))?;

    let parsed: SubjectsFile = toml::from_str(&content).map_err(|e| FileError::TomlParseFailed {
        path: path_str.clone(),
        source: e,
    })?;

    let vocabulary = SubjectVocabulary::new(parsed.subjects);
    if vocabulary.is_empty() {
        return Err(ConfigError::EmptyVocabulary { path: path_str }.into());
    }

    tracing::info!("已加载科目词表: {} 个科目 ({})", vocabulary.len(), path_str);
    Ok(vocabulary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppError;

    #[tokio::test]
    async fn test_load_subject_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.toml");
        std::fs::write(&path, "subjects = [\"Chemie\", \"Physik\", \"Chemie\"]\n").unwrap();

        let vocabulary = load_subject_vocabulary(&path).await.unwrap();
        assert_eq!(vocabulary.names(), &["Chemie".to_string(), "Physik".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_vocabulary_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subjects.toml");
        std::fs::write(&path, "subjects = []\n").unwrap();

        let err = load_subject_vocabulary(&path).await.unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::EmptyVocabulary { .. })));
    }

    #[tokio::test]
    async fn test_missing_file_is_file_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_subject_vocabulary(&dir.path().join("nope.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::File(FileError::ReadFailed { .. })));
    }
}
