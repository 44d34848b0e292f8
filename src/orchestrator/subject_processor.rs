//! 科目分组处理器 - 编排层
//!
//! 依次处理每个科目目录：生成目录树 → 请求并校验分组。
//! 单个科目失败只记录下来，不影响其他科目。

use std::path::Path;

use tracing::{info, warn};

use crate::infrastructure::directory_tree;
use crate::models::SubjectGrouping;
use crate::services::{ClaimRegistry, GroupingService, ReconcileOutcome};

/// 所有科目的分组汇总
#[derive(Debug, Default)]
pub struct GroupingReport {
    pub groupings: Vec<SubjectGrouping>,
    /// (科目目录, 失败原因)
    pub failed: Vec<(String, String)>,
    pub usage: u64,
}

/// 按顺序为每个科目目录求分组
///
/// 文件名在整次运行中只能被一个方案使用，所以科目之间串行处理
pub async fn reconcile_subjects(
    service: &GroupingService,
    root: &Path,
    directories: &[String],
) -> GroupingReport {
    let mut report = GroupingReport::default();
    let mut claims = ClaimRegistry::new();
    let total = directories.len();

    for (index, directory) in directories.iter().enumerate() {
        info!("\n{}", "─".repeat(60));
        info!("📚 [{}/{}] 科目目录: {}", index + 1, total, directory);

        let listing = match directory_tree(&root.join(directory)).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("[{}] ⚠️ 无法生成目录树: {}", directory, e);
                report.failed.push((directory.clone(), e.to_string()));
                continue;
            }
        };

        match service.reconcile(directory, &listing, &mut claims).await {
            ReconcileOutcome::Valid {
                grouping, usage, ..
            } => {
                report.usage += usage;
                report.groupings.push(grouping);
            }
            ReconcileOutcome::ExhaustedRetries {
                attempts,
                last_failure,
                usage,
            } => {
                report.usage += usage;
                warn!(
                    "[{}] ❌ {} 次尝试后仍未得到有效分组: {}",
                    directory, attempts, last_failure
                );
                report.failed.push((
                    directory.clone(),
                    format!("{} 次尝试均失败，最后一次: {}", attempts, last_failure),
                ));
            }
        }

        info!(
            "📊 分组进度: {}/{} (成功 {} / 失败 {}) | 累计 {} tokens",
            index + 1,
            total,
            report.groupings.len(),
            report.failed.len(),
            report.usage
        );
    }

    report
}
