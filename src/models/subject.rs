use serde::{Deserialize, Serialize};

/// 默认科目词表（下萨克森州中央考试的全部科目）
const DEFAULT_SUBJECTS: &[&str] = &[
    "Deutsch",
    "Englisch",
    "Französisch",
    "Spanisch",
    "Latein",
    "Griechisch",
    "Kunst",
    "Musik",
    "Erdkunde",
    "Geschichte",
    "Politik-Wirtschaft",
    "Evangelische Religion",
    "Katholische Religion",
    "Werte und Normen",
    "Mathematik",
    "Mathematik (berufliches Gymnasium)",
    "Mathematik (zweiter Bildungsweg)",
    "Mechatronik",
    "Biologie",
    "Chemie",
    "Physik",
    "Informatik",
    "Sport",
    "Ernährung",
    "Betriebswirtschaft mit Rechnungswesen-Controlling",
    "Pädagogik-Psychologie",
    "Betriebs- und Volkswirtschaft",
    "Volkswirtschaft",
    "Gesundheit-Pflege",
];

/// 科目词表
///
/// 全局唯一的一份科目列表，同时注入 Oracle 的 schema 构建和数据库写入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectVocabulary {
    subjects: Vec<String>,
}

impl SubjectVocabulary {
    /// 从名称列表创建（去重，保持顺序）
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut subjects: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if !name.is_empty() && !subjects.contains(&name) {
                subjects.push(name);
            }
        }
        Self { subjects }
    }

    pub fn names(&self) -> &[String] {
        &self.subjects
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// 查找科目的标准名称
    ///
    /// 先精确匹配，再忽略大小写和首尾空白匹配
    pub fn find(&self, name: &str) -> Option<&str> {
        if let Some(exact) = self.subjects.iter().find(|s| s.as_str() == name) {
            return Some(exact.as_str());
        }

        let wanted = name.trim().to_lowercase();
        self.subjects
            .iter()
            .find(|s| s.to_lowercase() == wanted)
            .map(String::as_str)
    }
}

impl Default for SubjectVocabulary {
    fn default() -> Self {
        Self::new(DEFAULT_SUBJECTS.iter().copied())
    }
}

/// 目录名解析出的科目和年份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectYear {
    pub subject_name: String,
    pub year: i32,
}

impl std::fmt::Display for SubjectYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.subject_name, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_vocabulary() {
        let vocabulary = SubjectVocabulary::default();
        assert_eq!(vocabulary.len(), 29);
        assert_eq!(vocabulary.find("Chemie"), Some("Chemie"));
    }

    #[test]
    fn test_find_ignores_case_and_whitespace() {
        let vocabulary = SubjectVocabulary::default();
        assert_eq!(vocabulary.find("  volkswirtschaft "), Some("Volkswirtschaft"));
        assert_eq!(vocabulary.find("Alchemie"), None);
    }

    #[test]
    fn test_new_dedups_and_skips_blank() {
        let vocabulary = SubjectVocabulary::new(["Physik", "", "Physik", " Chemie "]);
        assert_eq!(vocabulary.names(), &["Physik".to_string(), "Chemie".to_string()]);
    }
}
