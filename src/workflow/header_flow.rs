//! 表头处理流程 - 流程层
//!
//! 核心职责：定义"一个文件"的表头处理流程
//!
//! 流程顺序：
//! 1. 检查点命中 → 直接返回
//! 2. 读文件找表头 → Oracle 分类
//! 3. 没有表头 → 占位元数据

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::AppResult;
use crate::models::{FileHeader, HeaderMetadata};
use crate::services::HeaderService;
use crate::workflow::file_ctx::FileCtx;

/// 元数据的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSource {
    /// 上次运行的检查点
    Checkpoint,
    /// 本次调用 Oracle 得到
    Oracle,
    /// 文件中没有表头
    NoHeader,
}

/// 单个文件的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDone {
    pub header: HeaderMetadata,
    pub source: HeaderSource,
    pub usage: u64,
}

/// 表头处理流程
///
/// - 只读共享检查点快照，不写文件
/// - 不持有并发资源
pub struct HeaderFlow {
    service: HeaderService,
    checkpoint: Arc<HashMap<String, FileHeader>>,
}

impl HeaderFlow {
    pub fn new(service: HeaderService, checkpoint: Arc<HashMap<String, FileHeader>>) -> Self {
        Self { service, checkpoint }
    }

    pub async fn run(&self, ctx: &FileCtx) -> AppResult<HeaderDone> {
        if let Some(cached) = self.checkpoint.get(&ctx.file.key()) {
            debug!("{} 检查点命中", ctx);
            return Ok(HeaderDone {
                header: cached.header.clone(),
                source: HeaderSource::Checkpoint,
                usage: 0,
            });
        }

        let classification = self.service.classify(&ctx.file).await?;

        if classification.oracle_called {
            info!(
                "{} ✓ {} | {} | {}",
                ctx,
                classification.header.material_type.as_str(),
                classification.header.task_label,
                classification.header.difficulty.as_str()
            );
        }

        Ok(HeaderDone {
            header: classification.header,
            source: if classification.oracle_called {
                HeaderSource::Oracle
            } else {
                HeaderSource::NoHeader
            },
            usage: classification.usage,
        })
    }
}
