//! 整体运行编排 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责一次完整运行的资源管理和阶段调度。
//!
//! ## 核心流程
//!
//! 1. **扫描清单**：遍历考试根目录，建立 文件名 → 文件 的索引
//! 2. **并行两条线**：科目分组（逐个科目校验）与表头识别（worker 池）同时进行
//! 3. **输出分组**：把通过校验的分组写成 JSON，供文件移动工具使用
//! 4. **解析科目**：每个科目目录解析出科目名和年份（带检查点）
//! 5. **持久化**：一个事务写入 SQLite
//! 6. **全局统计**：token 用量、成功/失败数量
//!
//! ## 设计特点
//!
//! - **顶层编排**：不处理单个文件或单个科目的细节
//! - **资源所有者**：唯一持有 Oracle 客户端、检查点写入器和数据库连接的模块

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::clients::{Oracle, OracleClient};
use crate::config::Config;
use crate::error::PersistenceError;
use crate::infrastructure::{
    list_subject_directories, load_header_checkpoint, ClassifiedFile, Database,
    HeaderCheckpointWriter, Inventory, PersistReport,
};
use crate::orchestrator::header_pool::{run_header_pool, HeaderPoolReport};
use crate::orchestrator::subject_processor::{reconcile_subjects, GroupingReport};
use crate::services::{GroupingService, HeaderService, SubjectService, WarnWriter};
use crate::utils::logging::{append_log_file, init_log_file, log_stage, log_startup};
use crate::workflow::HeaderFlow;

/// 应用主结构
pub struct App {
    config: Config,
    oracle: Arc<dyn Oracle>,
    warn_writer: WarnWriter,
}

/// 一次运行的汇总
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub files_total: usize,
    pub subjects_total: usize,
    pub subjects_grouped: usize,
    pub subjects_failed: usize,
    pub files_classified: usize,
    pub files_failed: usize,
    /// 已识别但无法对应到科目/年份的文件
    pub files_unmapped: usize,
    pub headers_from_checkpoint: usize,
    pub headers_from_oracle: usize,
    pub headers_missing: usize,
    pub persisted: PersistReport,
    pub total_tokens: u64,
}

impl RunSummary {
    /// 写入日志文件的文本形式
    pub fn render(&self) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "{}", "=".repeat(60));
        let _ = writeln!(
            text,
            "完成时间: {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(text, "文件总数: {}", self.files_total);
        let _ = writeln!(
            text,
            "科目分组: 成功 {}/{}，失败 {}",
            self.subjects_grouped, self.subjects_total, self.subjects_failed
        );
        let _ = writeln!(
            text,
            "表头识别: 成功 {}，失败 {} (检查点 {} / Oracle {} / 无表头 {})",
            self.files_classified,
            self.files_failed,
            self.headers_from_checkpoint,
            self.headers_from_oracle,
            self.headers_missing
        );
        let _ = writeln!(text, "无法对应科目的文件: {}", self.files_unmapped);
        let _ = writeln!(
            text,
            "已写入数据库: {} 个文件 (试题 {} / 答案 {} / 其他 {})",
            self.persisted.files, self.persisted.exams, self.persisted.answers, self.persisted.others
        );
        let _ = writeln!(text, "累计 tokens: {}", self.total_tokens);
        let _ = writeln!(text, "{}", "=".repeat(60));
        text
    }
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)
            .with_context(|| format!("无法创建日志文件: {}", config.output_log_file))?;

        log_startup(config.header_workers, &config.llm_model_name);

        let oracle: Arc<dyn Oracle> = Arc::new(OracleClient::new(&config)?);

        Ok(Self::with_oracle(config, oracle))
    }

    /// 使用指定的 Oracle 创建应用
    pub fn with_oracle(config: Config, oracle: Arc<dyn Oracle>) -> Self {
        let warn_writer = WarnWriter::with_path(config.warn_file.clone());
        Self {
            config,
            oracle,
            warn_writer,
        }
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<RunSummary> {
        let root = self.config.exams_root.clone();

        // ========== 阶段 1: 扫描清单 ==========
        log_stage("📁 正在扫描考试目录...");
        let inventory = Arc::new(self.scan_inventory().await?);
        let directories = list_subject_directories(&root)?;

        if inventory.is_empty() {
            warn!("⚠️ 考试目录中没有文件，程序结束");
            return Ok(RunSummary::default());
        }
        info!("✓ 找到 {} 个文件，{} 个科目目录", inventory.len(), directories.len());

        // ========== 阶段 2: 分组与表头识别并行 ==========
        log_stage("🔀 科目分组与表头识别同时进行");

        let checkpoint = Arc::new(load_header_checkpoint(&self.config.header_checkpoint_path).await?);
        let mut checkpoint_writer = HeaderCheckpointWriter::open(&self.config.header_checkpoint_path).await?;

        let grouping_service = GroupingService::new(
            Arc::clone(&self.oracle),
            Arc::clone(&inventory),
            self.config.max_grouping_attempts,
        );
        let header_flow = Arc::new(HeaderFlow::new(
            HeaderService::new(Arc::clone(&self.oracle)),
            checkpoint,
        ));

        let mut files: Vec<_> = inventory.files().cloned().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let (grouping_report, header_report) = tokio::join!(
            reconcile_subjects(&grouping_service, &root, &directories),
            run_header_pool(
                header_flow,
                files,
                self.config.header_workers,
                &mut checkpoint_writer,
            )
        );
        let header_report = header_report?;
        info!(
            "🔢 分组消耗 {} tokens，表头识别消耗 {} tokens",
            grouping_report.usage, header_report.usage
        );

        // ========== 阶段 3: 输出分组 ==========
        self.write_grouping_artifact(&grouping_report).await?;
        self.record_failures(&grouping_report, &header_report);

        // ========== 阶段 4: 解析科目和年份 ==========
        log_stage("🏷️ 正在解析科目目录...");
        let (classified, unmapped) = self.resolve_subjects(&inventory, &header_report).await?;

        // ========== 阶段 5: 持久化 ==========
        log_stage("💾 正在写入数据库...");
        let persisted = self.persist(classified).await?;

        let summary = RunSummary {
            files_total: inventory.len(),
            subjects_total: directories.len(),
            subjects_grouped: grouping_report.groupings.len(),
            subjects_failed: grouping_report.failed.len(),
            files_classified: header_report.headers.len(),
            files_failed: header_report.failures.len(),
            files_unmapped: unmapped,
            headers_from_checkpoint: header_report.from_checkpoint,
            headers_from_oracle: header_report.from_oracle,
            headers_missing: header_report.without_header,
            persisted,
            total_tokens: self.oracle.total_usage(),
        };

        print_final_stats(&summary, &self.config);
        append_log_file(&self.config.output_log_file, &summary.render())?;

        Ok(summary)
    }

    /// 扫描清单（阻塞 IO 放到专用线程）
    async fn scan_inventory(&self) -> Result<Inventory> {
        let root = self.config.exams_root.clone();
        let inventory = tokio::task::spawn_blocking(move || Inventory::scan(&root))
            .await
            .context("清单扫描线程异常退出")??;
        Ok(inventory)
    }

    /// 写出分组结果
    async fn write_grouping_artifact(&self, report: &GroupingReport) -> Result<()> {
        let path = &self.config.grouping_output_path;
        let json = serde_json::to_string_pretty(&report.groupings)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("无法写入分组结果: {}", path.display()))?;
        info!(
            "✓ 分组结果已写入 {} ({} 个科目)",
            path.display(),
            report.groupings.len()
        );
        Ok(())
    }

    /// 把失败的科目和文件写入 warn.txt
    fn record_failures(&self, grouping: &GroupingReport, headers: &HeaderPoolReport) {
        let mut write_errors = 0;

        for (directory, reason) in &grouping.failed {
            write_errors += self.warn_writer.write_subject(directory, reason).is_err() as usize;
        }
        for (file, reason) in &headers.failures {
            write_errors += self.warn_writer.write_file(&file.key(), reason).is_err() as usize;
        }

        if write_errors > 0 {
            error!(
                "❌ {} 条警告未能写入 {}",
                write_errors,
                self.warn_writer.path()
            );
        }
    }

    /// 为每个已识别的文件找到科目和年份
    ///
    /// 返回可写入数据库的文件，以及无法对应科目的文件数
    async fn resolve_subjects(
        &self,
        inventory: &Inventory,
        headers: &HeaderPoolReport,
    ) -> Result<(Vec<ClassifiedFile>, usize)> {
        let root = inventory.root();
        let mut subjects =
            SubjectService::load(Arc::clone(&self.oracle), self.config.subject_checkpoint_path.clone())
                .await?;

        let directories: BTreeSet<String> = headers
            .headers
            .iter()
            .filter_map(|entry| entry.file.subject_directory(root))
            .collect();

        for directory in &directories {
            if let Err(e) = subjects.resolve(directory).await {
                warn!("[{}] ⚠️ 无法解析科目: {}", directory, e);
                if self.warn_writer.write_subject(directory, &format!("科目解析失败: {}", e)).is_err() {
                    error!("❌ 警告未能写入 {}", self.warn_writer.path());
                }
            }
        }

        let mut classified = Vec::with_capacity(headers.headers.len());
        let mut unmapped = 0;
        for entry in &headers.headers {
            let mapping = entry
                .file
                .subject_directory(root)
                .and_then(|directory| subjects.get(&directory).cloned());

            match mapping {
                Some(subject) => classified.push(ClassifiedFile {
                    file: entry.file.clone(),
                    subject_name: subject.subject_name,
                    year: subject.year,
                    header: entry.header.clone(),
                }),
                None => {
                    warn!("⚠️ {} 无法对应到科目，跳过", entry.file);
                    let note = format!("文件 {} | 无法对应到科目，未写入数据库", entry.file.key());
                    if self.warn_writer.write_note(&note).is_err() {
                        error!("❌ 警告未能写入 {}", self.warn_writer.path());
                    }
                    unmapped += 1;
                }
            }
        }

        Ok((classified, unmapped))
    }

    /// 一个事务写入所有结果
    async fn persist(&self, classified: Vec<ClassifiedFile>) -> Result<PersistReport> {
        let database_path = self.config.database_path.clone();
        let vocabulary = self.config.subjects.clone();

        let report = tokio::task::spawn_blocking(move || -> Result<PersistReport, PersistenceError> {
            let mut db = Database::open(&database_path)?;
            db.persist(&vocabulary, &classified)
        })
        .await
        .context("数据库线程异常退出")??;

        Ok(report)
    }
}

// ========== 日志辅助函数 ==========

fn print_final_stats(summary: &RunSummary, config: &Config) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!(
        "📚 科目分组: 成功 {}/{}，失败 {}",
        summary.subjects_grouped, summary.subjects_total, summary.subjects_failed
    );
    info!(
        "✅ 表头识别: 成功 {}/{}",
        summary.files_classified, summary.files_total
    );
    info!("❌ 表头失败: {}", summary.files_failed);
    info!("💾 写入数据库: {} 个文件", summary.persisted.files);
    info!("🔢 累计 tokens: {}", summary.total_tokens);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", config.output_log_file);
    if summary.subjects_failed + summary.files_failed + summary.files_unmapped > 0 {
        info!("失败记录见: {}", config.warn_file);
    }
}
