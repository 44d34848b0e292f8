//! 科目解析服务 - 业务能力层
//!
//! 科目目录名（如 `2016VW`）→ 科目和年份。每个目录只问一次 Oracle，
//! 结果写入科目检查点，重复运行直接命中缓存。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::clients::Oracle;
use crate::error::{AppResult, FileError};
use crate::infrastructure::{load_subject_checkpoint, save_subject_checkpoint};
use crate::models::SubjectYear;

/// 科目解析服务
pub struct SubjectService {
    oracle: Arc<dyn Oracle>,
    checkpoint_path: PathBuf,
    mapping: BTreeMap<String, SubjectYear>,
}

impl SubjectService {
    /// 创建服务并加载已有的科目检查点
    pub async fn load(oracle: Arc<dyn Oracle>, checkpoint_path: impl Into<PathBuf>) -> Result<Self, FileError> {
        let checkpoint_path = checkpoint_path.into();
        let mapping = load_subject_checkpoint(&checkpoint_path).await?;
        Ok(Self {
            oracle,
            checkpoint_path,
            mapping,
        })
    }

    /// 解析一个科目目录
    pub async fn resolve(&mut self, directory: &str) -> AppResult<SubjectYear> {
        if let Some(cached) = self.mapping.get(directory) {
            debug!("[{}] 科目缓存命中: {}", directory, cached);
            return Ok(cached.clone());
        }

        let reply = self.oracle.resolve_subject_year(directory).await?;
        info!(
            "[{}] ✓ 科目解析为 {} ({} tokens)",
            directory, reply.value, reply.usage
        );

        self.mapping.insert(directory.to_string(), reply.value.clone());
        save_subject_checkpoint(&self.checkpoint_path, &self.mapping).await?;

        Ok(reply.value)
    }

    pub fn get(&self, directory: &str) -> Option<&SubjectYear> {
        self.mapping.get(directory)
    }
}
