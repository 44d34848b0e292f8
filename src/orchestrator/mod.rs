//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责整次运行的阶段调度和并发，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 整体运行
//! - 管理应用生命周期（初始化、运行）
//! - 并行启动科目分组和表头识别，二者都结束后再写数据库
//! - 输出全局统计信息
//!
//! ### `subject_processor` - 科目分组
//! - 逐个科目目录生成目录树、请求并校验分组
//! - 维护整次运行的文件名占用表
//!
//! ### `header_pool` - 表头识别 worker 池
//! - 固定数量的 worker 共享一个有界任务队列
//! - 收取恰好等于任务数的结果并追加检查点
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (整次运行)
//!     ↓                    ↓
//! subject_processor    header_pool (Vec<FileRecord>)
//!     ↓                    ↓
//! services::Grouping   workflow::HeaderFlow (单个文件)
//!     ↓                    ↓
//! services (能力层：grouping / header / subject / warn)
//!     ↓
//! infrastructure (基础设施：清单、检查点、数据库) + clients (Oracle)
//! ```

pub mod batch_processor;
pub mod header_pool;
pub mod subject_processor;

// 重新导出主要类型
pub use batch_processor::{App, RunSummary};
pub use header_pool::{run_header_pool, HeaderPoolReport};
pub use subject_processor::{reconcile_subjects, GroupingReport};
