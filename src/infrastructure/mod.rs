//! 基础设施层（Infrastructure Layer）
//!
//! 持有文件系统、检查点文件和数据库连接，只暴露能力，不包含业务判断。

pub mod checkpoint;
pub mod database;
pub mod inventory;
pub mod tree_listing;

pub use checkpoint::{
    load_header_checkpoint, load_subject_checkpoint, save_subject_checkpoint, HeaderCheckpointWriter,
};
pub use database::{ClassifiedFile, Database, PersistReport};
pub use inventory::{list_subject_directories, Inventory};
pub use tree_listing::directory_tree;
