use serde::{Deserialize, Serialize};

/// 一份完整的考试：试题、答案和可选的附加材料（封面、提示、材料）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamUnit {
    pub exam_part: String,
    pub answer_part: String,
    #[serde(default)]
    pub additional_parts: Vec<String>,
}

impl ExamUnit {
    /// 该考试引用的全部文件名
    pub fn referenced_files(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.exam_part.as_str())
            .chain(std::iter::once(self.answer_part.as_str()))
            .chain(self.additional_parts.iter().map(String::as_str))
    }
}

/// 同一难度/同一套题下的考试列表
pub type ExamGroup = Vec<ExamUnit>;

/// Oracle 返回的分组方案
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupingProposal {
    pub friendly_subject_name: String,
    #[serde(deserialize_with = "deserialize_year")]
    pub year: i32,
    #[serde(rename = "exams", default)]
    pub groups: Vec<ExamGroup>,
}

impl GroupingProposal {
    pub fn units(&self) -> impl Iterator<Item = &ExamUnit> {
        self.groups.iter().flatten()
    }

    pub fn unit_count(&self) -> usize {
        self.groups.iter().map(Vec::len).sum()
    }
}

/// 最终输出文件中的一个科目目录
///
/// 由文件移动工具读取，按 科目/年份/考试 重新摆放文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGrouping {
    /// 原始目录名
    pub subject_name: String,
    pub friendly_subject_name: String,
    #[serde(deserialize_with = "deserialize_year")]
    pub year: i32,
    pub exams: Vec<ExamGroup>,
}

impl SubjectGrouping {
    pub fn from_proposal(directory_name: impl Into<String>, proposal: GroupingProposal) -> Self {
        Self {
            subject_name: directory_name.into(),
            friendly_subject_name: proposal.friendly_subject_name,
            year: proposal.year,
            exams: proposal.groups,
        }
    }
}

// 年份既可能是字符串也可能是整数
fn deserialize_year<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;
    use std::fmt;

    struct YearVisitor;

    impl<'de> Visitor<'de> for YearVisitor {
        type Value = i32;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer representing a year")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            value
                .trim()
                .parse::<i32>()
                .map_err(|_| E::custom(format!("invalid year: {value}")))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            i32::try_from(value).map_err(|_| E::custom(format!("year out of range: {value}")))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            i32::try_from(value).map_err(|_| E::custom(format!("year out of range: {value}")))
        }
    }

    deserializer.deserialize_any(YearVisitor)
}
