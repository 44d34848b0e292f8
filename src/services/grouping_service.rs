//! 分组校验服务 - 业务能力层
//!
//! 对单个科目目录反复请求分组方案，直到方案里的每个文件名都能在清单中找到，
//! 并且目录中的每个文件都恰好被引用一次。
//! 方案只要有一处问题就整体丢弃，重新发起一次完整请求。尝试次数有上限。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clients::Oracle;
use crate::infrastructure::Inventory;
use crate::models::{ExamUnit, GroupingProposal, SubjectGrouping};

/// 方案被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// 方案里一份考试都没有
    EmptyProposal,
    /// 清单里没有这个文件
    UnknownFile(String),
    /// 同一方案里引用了两次
    DuplicateInProposal(String),
    /// 已被之前接受的方案占用
    AlreadyClaimed { name: String, owner: String },
    /// 科目目录中有文件没被引用
    Uncovered(Vec<String>),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::EmptyProposal => write!(f, "方案中没有任何考试"),
            Rejection::UnknownFile(name) => write!(f, "文件不存在: {}", name),
            Rejection::DuplicateInProposal(name) => write!(f, "文件重复引用: {}", name),
            Rejection::AlreadyClaimed { name, owner } => {
                write!(f, "文件已被 {} 使用: {}", owner, name)
            }
            Rejection::Uncovered(names) => write!(f, "文件未被引用: {}", names.join(", ")),
        }
    }
}

/// 整次运行中已被接受的文件名 → 所属科目目录
#[derive(Debug, Default)]
pub struct ClaimRegistry {
    claimed: HashMap<String, String>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self, name: &str) -> Option<&str> {
        self.claimed.get(name).map(String::as_str)
    }

    /// 登记一份已接受方案的所有文件名
    fn claim_all(&mut self, directory: &str, proposal: &GroupingProposal) {
        for unit in proposal.units() {
            for name in unit.referenced_files() {
                self.claimed.insert(name.to_string(), directory.to_string());
            }
        }
    }
}

/// 校验科目目录 `directory` 的一份方案，返回所有问题（为空表示通过）
pub fn validate_proposal(
    directory: &str,
    proposal: &GroupingProposal,
    inventory: &Inventory,
    claims: &ClaimRegistry,
) -> Vec<Rejection> {
    if proposal.unit_count() == 0 {
        return vec![Rejection::EmptyProposal];
    }

    let mut rejections = Vec::new();
    let mut seen = HashSet::new();

    for name in proposal.units().flat_map(|unit| unit.referenced_files()) {
        if !inventory.contains(name) {
            rejections.push(Rejection::UnknownFile(name.to_string()));
        } else if !seen.insert(name) {
            rejections.push(Rejection::DuplicateInProposal(name.to_string()));
        } else if let Some(owner) = claims.owner(name) {
            rejections.push(Rejection::AlreadyClaimed {
                name: name.to_string(),
                owner: owner.to_string(),
            });
        }
    }

    let uncovered = uncovered_files(inventory, directory, proposal.units());
    if !uncovered.is_empty() {
        rejections.push(Rejection::Uncovered(uncovered));
    }

    rejections
}

/// 科目目录中没有被这些考试引用的文件（按名称排序）
pub fn uncovered_files<'a>(
    inventory: &Inventory,
    directory: &str,
    units: impl IntoIterator<Item = &'a ExamUnit>,
) -> Vec<String> {
    let referenced: HashSet<&str> = units
        .into_iter()
        .flat_map(|unit| unit.referenced_files())
        .collect();

    let mut uncovered: Vec<String> = inventory
        .files_in_subject(directory)
        .filter(|file| !referenced.contains(file.name.as_str()))
        .map(|file| file.name.clone())
        .collect();
    uncovered.sort();
    uncovered
}

/// 单个科目的分组结果
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// 方案通过校验
    Valid {
        grouping: SubjectGrouping,
        attempts: usize,
        usage: u64,
    },
    /// 用完了所有尝试次数
    ExhaustedRetries {
        attempts: usize,
        last_failure: String,
        usage: u64,
    },
}

/// 分组校验服务
pub struct GroupingService {
    oracle: Arc<dyn Oracle>,
    inventory: Arc<Inventory>,
    max_attempts: usize,
}

impl GroupingService {
    pub fn new(oracle: Arc<dyn Oracle>, inventory: Arc<Inventory>, max_attempts: usize) -> Self {
        Self {
            oracle,
            inventory,
            max_attempts: max_attempts.max(1),
        }
    }

    /// 对一个科目目录请求分组，直到通过校验或用完尝试次数
    ///
    /// 通过的方案会立刻登记到 `claims`，后续科目不能再使用其中的文件名
    pub async fn reconcile(
        &self,
        directory: &str,
        listing: &str,
        claims: &mut ClaimRegistry,
    ) -> ReconcileOutcome {
        let mut usage = 0;
        let mut last_failure = String::new();

        for attempt in 1..=self.max_attempts {
            debug!("[{}] 第 {}/{} 次请求分组", directory, attempt, self.max_attempts);

            let reply = match self.oracle.propose_grouping(listing).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("[{}] ⚠️ 第 {} 次请求失败: {}", directory, attempt, e);
                    last_failure = e.to_string();
                    continue;
                }
            };
            usage += reply.usage;

            let rejections = validate_proposal(directory, &reply.value, &self.inventory, claims);
            if rejections.is_empty() {
                claims.claim_all(directory, &reply.value);
                info!(
                    "[{}] ✓ 分组通过校验: {} 份考试 (第 {} 次尝试, {} tokens)",
                    directory,
                    reply.value.unit_count(),
                    attempt,
                    usage
                );
                return ReconcileOutcome::Valid {
                    grouping: SubjectGrouping::from_proposal(directory, reply.value),
                    attempts: attempt,
                    usage,
                };
            }

            for rejection in &rejections {
                debug!("[{}] {}", directory, rejection);
            }
            warn!(
                "[{}] ⚠️ 第 {} 次方案被拒绝: {} 处问题，例如 {}",
                directory,
                attempt,
                rejections.len(),
                rejections[0]
            );
            last_failure = rejections[0].to_string();
        }

        ReconcileOutcome::ExhaustedRetries {
            attempts: self.max_attempts,
            last_failure,
            usage,
        }
    }
}
