//! 表头识别 worker 池 - 编排层
//!
//! ## 结构
//!
//! - 一个有界任务队列，所有 worker 共享同一个接收端
//! - 一个有界结果通道，每条结果都带着它的文件
//! - 编排层正好收取"任务数"条结果，边收边追加检查点
//!
//! 单个文件失败只记录在结果里，不会中断其他 worker。

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::infrastructure::HeaderCheckpointWriter;
use crate::models::{FileHeader, FileRecord};
use crate::workflow::{FileCtx, HeaderDone, HeaderFlow, HeaderSource};

/// 一个任务的结果，带着它对应的文件
#[derive(Debug)]
pub struct HeaderJobResult {
    pub file: FileRecord,
    pub outcome: Result<HeaderDone, AppError>,
}

/// 整个 worker 池的汇总
#[derive(Debug, Default)]
pub struct HeaderPoolReport {
    pub headers: Vec<FileHeader>,
    pub failures: Vec<(FileRecord, String)>,
    pub from_checkpoint: usize,
    pub from_oracle: usize,
    pub without_header: usize,
    pub usage: u64,
}

impl HeaderPoolReport {
    /// 收到的结果总数（成功 + 失败）
    pub fn result_count(&self) -> usize {
        self.headers.len() + self.failures.len()
    }
}

/// 用 `workers` 个并发 worker 处理所有文件
///
/// 新得到的结果（不是来自检查点的）会立刻追加到检查点文件
pub async fn run_header_pool(
    flow: Arc<HeaderFlow>,
    files: Vec<FileRecord>,
    workers: usize,
    checkpoint: &mut HeaderCheckpointWriter,
) -> Result<HeaderPoolReport> {
    let total = files.len();
    let mut report = HeaderPoolReport::default();
    if total == 0 {
        return Ok(report);
    }

    let workers = workers.clamp(1, total);
    let (job_tx, job_rx) = mpsc::channel::<FileCtx>(workers * 2);
    let (result_tx, mut result_rx) = mpsc::channel::<HeaderJobResult>(workers * 2);
    let job_rx = Arc::new(Mutex::new(job_rx));

    info!("🧵 启动 {} 个表头 worker，共 {} 个文件", workers, total);

    // 投递任务
    let producer = tokio::spawn(async move {
        for (index, file) in files.into_iter().enumerate() {
            if job_tx.send(FileCtx::new(index + 1, total, file)).await.is_err() {
                break;
            }
        }
    });

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let job_rx = Arc::clone(&job_rx);
        let result_tx = result_tx.clone();
        let flow = Arc::clone(&flow);

        handles.push(tokio::spawn(async move {
            loop {
                let job = { job_rx.lock().await.recv().await };
                let Some(ctx) = job else { break };

                let outcome = flow.run(&ctx).await;
                let result = HeaderJobResult {
                    file: ctx.file,
                    outcome,
                };
                if result_tx.send(result).await.is_err() {
                    warn!("worker {} 结果通道已关闭", worker_id);
                    break;
                }
            }
        }));
    }
    drop(result_tx);

    // 正好收取 total 条结果
    while report.result_count() < total {
        let Some(result) = result_rx.recv().await else {
            error!(
                "❌ 结果通道提前关闭: 收到 {}/{} 条结果",
                report.result_count(),
                total
            );
            break;
        };

        match result.outcome {
            Ok(done) => {
                report.usage += done.usage;
                let entry = FileHeader {
                    file: result.file,
                    header: done.header,
                };
                match done.source {
                    HeaderSource::Checkpoint => report.from_checkpoint += 1,
                    HeaderSource::Oracle => report.from_oracle += 1,
                    HeaderSource::NoHeader => report.without_header += 1,
                }
                if done.source != HeaderSource::Checkpoint {
                    checkpoint
                        .append(&entry)
                        .await
                        .with_context(|| format!("追加表头检查点失败: {}", entry.file))?;
                }
                report.headers.push(entry);
            }
            Err(e) => {
                warn!("⚠️ {} 表头识别失败: {}", result.file.name, e);
                report.failures.push((result.file, e.to_string()));
            }
        }

        let received = report.result_count();
        if received % 100 == 0 || received == total {
            info!("📄 表头进度: {}/{}", received, total);
        }
    }

    producer.await.context("任务投递线程异常退出")?;
    for handle in handles {
        if let Err(e) = handle.await {
            error!("worker 执行失败: {}", e);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{Oracle, OracleReply};
    use crate::error::OracleError;
    use crate::infrastructure::load_header_checkpoint;
    use crate::models::{
        Difficulty, GroupingProposal, HeaderMetadata, MaterialType, SubjectYear,
    };
    use crate::services::HeaderService;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingOracle {
        calls: AtomicU64,
    }

    #[async_trait]
    impl Oracle for CountingOracle {
        async fn propose_grouping(&self, _: &str) -> Result<OracleReply<GroupingProposal>, OracleError> {
            unimplemented!()
        }

        async fn extract_header_metadata(&self, snippet: &str) -> Result<OracleReply<HeaderMetadata>, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if snippet.contains("kaputt") {
                return Err(OracleError::EmptyContent {
                    model: "test".to_string(),
                });
            }
            Ok(OracleReply {
                value: HeaderMetadata {
                    exam_type: "Zentralabitur".to_string(),
                    material_type: MaterialType::Exam,
                    task_label: "Aufgabe I".to_string(),
                    difficulty: Difficulty::Basic,
                    work_time_minutes: 220,
                },
                usage: 10,
            })
        }

        async fn resolve_subject_year(&self, _: &str) -> Result<OracleReply<SubjectYear>, OracleError> {
            unimplemented!()
        }

        fn total_usage(&self) -> u64 {
            self.calls.load(Ordering::SeqCst) * 10
        }
    }

    #[tokio::test]
    async fn test_every_job_yields_one_result() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for i in 0..25 {
            let path = dir.path().join(format!("f{}.md", i));
            let content = match i % 3 {
                0 => "Deckblatt\n".to_string(),
                1 => format!("Zentralabitur 2017\nAufgabe {}\n", i),
                _ => "Zentralabitur kaputt\n".to_string(),
            };
            std::fs::write(&path, content).unwrap();
            files.push(FileRecord::new(path));
        }

        let oracle = Arc::new(CountingOracle {
            calls: AtomicU64::new(0),
        });
        let flow = Arc::new(HeaderFlow::new(
            HeaderService::new(oracle.clone()),
            Arc::new(HashMap::new()),
        ));
        let checkpoint_path = dir.path().join("headers.jsonl");
        let mut writer = HeaderCheckpointWriter::open(&checkpoint_path).await.unwrap();

        let report = run_header_pool(flow, files.clone(), 4, &mut writer).await.unwrap();

        assert_eq!(report.result_count(), 25);
        assert_eq!(report.without_header, 9);
        assert_eq!(report.from_oracle, 8);
        assert_eq!(report.failures.len(), 8);

        let distinct: HashSet<String> = report
            .headers
            .iter()
            .map(|h| h.file.key())
            .chain(report.failures.iter().map(|(f, _)| f.key()))
            .collect();
        assert_eq!(distinct.len(), 25);

        drop(writer);
        let saved = load_header_checkpoint(&checkpoint_path).await.unwrap();
        assert_eq!(saved.len(), 17);
    }
}
