//! Oracle 请求的 JSON Schema 与提示词
//!
//! 科目枚举来自同一份 `SubjectVocabulary`，和数据库写入保持一致

use serde_json::{json, Value};

use crate::models::SubjectVocabulary;

pub const GROUPING_SCHEMA_NAME: &str = "exam_grouping";
pub const HEADER_SCHEMA_NAME: &str = "file_header";
pub const SUBJECT_YEAR_SCHEMA_NAME: &str = "subject_year";

/// 目录树 → 分组方案
pub fn grouping_schema(vocabulary: &SubjectVocabulary) -> Value {
    json!({
        "type": "object",
        "description": "Exams of one subject directory grouped into exam/answer sets",
        "properties": {
            "friendlySubjectName": {
                "type": "string",
                "enum": vocabulary.names(),
                "description": "The subject name from the enum, e.g. 2016VW -> Volkswirtschaft"
            },
            "year": {
                "type": "string",
                "description": "The year of the exams, e.g. 2016VW -> 2016"
            },
            "exams": {
                "type": "array",
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "examPart": {
                                "type": "string",
                                "description": "File name of the exam, e.g. 2017DeutschEAAufg1.md"
                            },
                            "answerPart": {
                                "type": "string",
                                "description": "File name of the matching answer, e.g. 2017DeutschEAA1L.md. File name only, no path"
                            },
                            "additionalParts": {
                                "type": "array",
                                "items": { "type": "string" },
                                "description": "Cover sheets, notes and material, e.g. 2016ChemieEAmitExpA1LHinweise.md"
                            }
                        },
                        "required": ["examPart", "answerPart", "additionalParts"],
                        "additionalProperties": false
                    }
                }
            }
        },
        "required": ["friendlySubjectName", "year", "exams"],
        "additionalProperties": false
    })
}

/// 表头文本 → 表头元数据
pub fn header_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "exam_type": {
                "type": "string",
                "description": "The exam type without the year, e.g. Zentralabitur 2017 -> Zentralabitur. Never include the year. Return 'none' when no exam type is present. A topic title is not an exam type"
            },
            "material_type": {
                "type": "string",
                "enum": ["exam", "answer", "other"],
                "description": "Whether the file is an exam, the answers to one, or something else such as a cover sheet. Schülermaterial=exam, Material für Prüflinge=exam, Lehrermaterial=answer, Erwartungshorizont=answer"
            },
            "task_label": {
                "type": "string",
                "description": "The task label, e.g. Aufgabe I, Wahlteil Rechnertyp: GTR, Prüfungsteil B Rechnertyp: CAS Analysis. A subject name is not a task label"
            },
            "difficulty": {
                "type": "string",
                "enum": ["gA", "eA", "none"],
                "description": "The level, gA or eA. Return none when it cannot be determined"
            },
            "work_time": {
                "type": "integer",
                "description": "The working time in minutes, e.g. Bearbeitungszeit: 220 min -> 220. Return -1 when no time is stated"
            }
        },
        "required": ["exam_type", "material_type", "task_label", "difficulty", "work_time"],
        "additionalProperties": false
    })
}

/// 目录名 → 科目和年份
pub fn subject_year_schema(vocabulary: &SubjectVocabulary) -> Value {
    json!({
        "type": "object",
        "properties": {
            "subject_name": {
                "type": "string",
                "enum": vocabulary.names(),
                "description": "The subject name, e.g. 2016VW -> Volkswirtschaft"
            },
            "year": {
                "type": "integer",
                "description": "The year of the exam, e.g. 2016VW -> 2016"
            }
        },
        "required": ["subject_name", "year"],
        "additionalProperties": false
    })
}

pub fn grouping_prompt(listing: &str) -> String {
    format!(
        "You are given a file tree of exam documents for one subject. Group the files into exams, \
         each with exactly one exam part and one answer part. Return file names only, never paths, \
         and never alter a file name in any way. Every file must be used exactly once: \
         each file of the tree appears in the output, none twice. Cover sheets, notes (Hinweise) and material files \
         belong in additionalParts, which may be empty. Also return the subject name and the year, \
         e.g. 2016VW -> Volkswirtschaft, 2016.\n\n{}",
        listing
    )
}

pub fn header_prompt(snippet: &str) -> String {
    format!(
        "You are given the header of an exam document. Extract the fields from it. \
         Return plain text values without line breaks or tabs.\n\n{}",
        snippet
    )
}

pub fn subject_year_prompt(directory_name: &str) -> String {
    format!(
        "You are given the name of a directory of exam documents. Extract the subject and the year from it: {}",
        directory_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_is_injected_into_enums() {
        let vocabulary = SubjectVocabulary::new(["Chemie", "Physik"]);

        let grouping = grouping_schema(&vocabulary);
        assert_eq!(
            grouping["properties"]["friendlySubjectName"]["enum"],
            json!(["Chemie", "Physik"])
        );

        let subject = subject_year_schema(&vocabulary);
        assert_eq!(subject["properties"]["subject_name"]["enum"], json!(["Chemie", "Physik"]));
    }

    #[test]
    fn test_header_schema_requires_every_field() {
        let schema = header_schema();
        assert_eq!(schema["required"].as_array().unwrap().len(), 5);
        assert_eq!(
            schema["properties"]["difficulty"]["enum"],
            json!(["gA", "eA", "none"])
        );
    }

    #[test]
    fn test_prompts_embed_input() {
        assert!(grouping_prompt("├── 2016ChemieA1.md").contains("2016ChemieA1.md"));
        assert!(subject_year_prompt("2016VW").ends_with("2016VW"));
    }
}
