//! # Exam Mapper
//!
//! 把散落在多级目录中的考试/答案文件整理成结构化数据的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有文件系统、检查点和数据库，只暴露能力
//! - `Inventory` - 文件名 → 文件 的只读清单
//! - `Database` - 唯一的 SQLite 连接所有者
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，一次只处理一个科目或一个文件
//! - `GroupingService` - 请求分组并对照清单校验
//! - `HeaderService` - 表头抽取和分类
//! - `SubjectService` - 目录名 → 科目和年份
//! - `WarnWriter` - 写 warn.txt 能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文件"的完整处理流程
//! - `FileCtx` - 上下文封装（任务序号 + 文件）
//! - `HeaderFlow` - 流程编排（检查点 → 表头 → Oracle）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 整次运行，管理资源和阶段
//! - `orchestrator/subject_processor` - 逐个科目分组
//! - `orchestrator/header_pool` - 表头识别 worker 池
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{Oracle, OracleClient, OracleReply};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{Database, Inventory};
pub use orchestrator::{App, RunSummary};
pub use services::ReconcileOutcome;
pub use workflow::{FileCtx, HeaderFlow};
