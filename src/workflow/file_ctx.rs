//! 文件处理上下文
//!
//! 封装"我正在处理第几个文件"这一信息

use std::fmt::Display;

use crate::models::FileRecord;

/// 文件处理上下文
#[derive(Debug, Clone)]
pub struct FileCtx {
    /// 任务序号（从1开始，仅用于日志显示）
    pub job_index: usize,

    /// 任务总数
    pub total_jobs: usize,

    pub file: FileRecord,
}

impl FileCtx {
    pub fn new(job_index: usize, total_jobs: usize, file: FileRecord) -> Self {
        Self {
            job_index,
            total_jobs,
            file,
        }
    }
}

impl Display for FileCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[文件 {}/{} {}]",
            self.job_index, self.total_jobs, self.file.name
        )
    }
}
