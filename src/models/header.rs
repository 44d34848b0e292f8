use serde::{Deserialize, Serialize};

use crate::models::file_record::FileRecord;

/// 材料类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialType {
    /// 试题（Schülermaterial）
    Exam,
    /// 答案（Lehrermaterial / Erwartungshorizont）
    Answer,
    /// 封面、提示等其他材料
    Other,
}

impl MaterialType {
    pub fn as_str(self) -> &'static str {
        match self {
            MaterialType::Exam => "exam",
            MaterialType::Answer => "answer",
            MaterialType::Other => "other",
        }
    }
}

/// 难度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// grundlegendes Anforderungsniveau
    #[serde(rename = "gA")]
    Basic,
    /// erhöhtes Anforderungsniveau
    #[serde(rename = "eA")]
    Advanced,
    /// 表头中没有写难度
    #[serde(rename = "none")]
    NotStated,
    /// 文件中没有表头，未经 Oracle 判断
    #[serde(rename = "")]
    Unknown,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Basic => "gA",
            Difficulty::Advanced => "eA",
            Difficulty::NotStated => "none",
            Difficulty::Unknown => "",
        }
    }
}

/// 文件表头元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderMetadata {
    pub exam_type: String,
    pub material_type: MaterialType,
    pub task_label: String,
    pub difficulty: Difficulty,
    /// 作答时间（分钟），-1 表示未知
    #[serde(rename = "work_time")]
    pub work_time_minutes: i32,
}

impl HeaderMetadata {
    /// 整个文件都找不到表头时使用的默认值
    pub fn without_header() -> Self {
        Self {
            exam_type: String::new(),
            material_type: MaterialType::Other,
            task_label: String::new(),
            difficulty: Difficulty::Unknown,
            work_time_minutes: -1,
        }
    }
}

/// 检查点中的一条记录：文件和它的表头元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub file: FileRecord,
    pub header: HeaderMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_oracle_header() {
        let raw = r#"{
            "exam_type": "Zentralabitur",
            "material_type": "exam",
            "task_label": "Aufgabe I",
            "difficulty": "gA",
            "work_time": 220
        }"#;

        let header: HeaderMetadata = serde_json::from_str(raw).unwrap();
        assert_eq!(header.material_type, MaterialType::Exam);
        assert_eq!(header.difficulty, Difficulty::Basic);
        assert_eq!(header.work_time_minutes, 220);
    }

    #[test]
    fn test_unknown_material_type_rejected() {
        let raw = r#"{"exam_type":"","material_type":"deckblatt","task_label":"",
                      "difficulty":"none","work_time":-1}"#;
        assert!(serde_json::from_str::<HeaderMetadata>(raw).is_err());
    }

    #[test]
    fn test_without_header_serializes_empty_difficulty() {
        let value = serde_json::to_value(HeaderMetadata::without_header()).unwrap();
        assert_eq!(value["difficulty"], "");
        assert_eq!(value["material_type"], "other");
        assert_eq!(value["work_time"], -1);
    }
}
