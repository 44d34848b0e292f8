//! 表头识别服务 - 业务能力层
//!
//! 只处理单个文件：找到表头、压成一行、交给 Oracle 分类。
//! 不关心检查点和并发。

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::clients::Oracle;
use crate::error::{AppResult, FileError};
use crate::models::{FileRecord, HeaderMetadata};
use crate::utils::logging::truncate_text;

/// 出现这些词的行视为表头开始
pub const HEADER_MARKERS: [&str; 2] = ["Zentralabitur", "Erwartungshorizont"];

/// 表头行之后再取的行数
pub const HEADER_TRAILING_LINES: usize = 7;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("constant whitespace pattern"));

/// 单个文件的识别结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderClassification {
    pub header: HeaderMetadata,
    /// 本次消耗的 token 数，没有调用 Oracle 时为 0
    pub usage: u64,
    pub oracle_called: bool,
}

/// 在文件内容中找到第一处表头，返回压成一行的文本
///
/// 取表头所在行和其后 7 行（文件不够长时取到末尾）
pub fn extract_header_snippet(content: &str) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines
        .iter()
        .position(|line| HEADER_MARKERS.iter().any(|marker| line.contains(marker)))?;
    let end = (start + 1 + HEADER_TRAILING_LINES).min(lines.len());

    Some(normalize_header(&lines[start..end].join("\n")))
}

/// 去掉 `<br>`、`**` 加粗、制表符、换行和多余空格
pub fn normalize_header(raw: &str) -> String {
    let text = raw.replace("<br>", " ").replace("**", "");
    WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
}

/// 表头识别服务
pub struct HeaderService {
    oracle: Arc<dyn Oracle>,
}

impl HeaderService {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }

    /// 读取文件并识别表头
    ///
    /// 找不到表头时直接返回占位元数据，不调用 Oracle
    pub async fn classify(&self, file: &FileRecord) -> AppResult<HeaderClassification> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| FileError::read_failed(file.key(), e))?;
        let content = String::from_utf8_lossy(&bytes);

        let Some(snippet) = extract_header_snippet(&content) else {
            debug!("{} 没有表头，使用占位元数据", file.name);
            return Ok(HeaderClassification {
                header: HeaderMetadata::without_header(),
                usage: 0,
                oracle_called: false,
            });
        };

        debug!("{} 表头: {}", file.name, truncate_text(&snippet, 80));

        let reply = self.oracle.extract_header_metadata(&snippet).await?;
        Ok(HeaderClassification {
            header: reply.value,
            usage: reply.usage,
            oracle_called: true,
        })
    }
}
