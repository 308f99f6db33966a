//! 批处理流水线
//! 统一导出批量写入、批量删除、状态读取及其依赖的租约与等待组件
pub mod lease;
pub mod retry;
pub mod settle;
pub mod writer;
pub mod deleter;
pub mod reader;

use crate::config::SyncConfig;

pub use lease::{Lease, LeaseRegistry, ResourceKind};
pub use retry::{poll_until, PollPolicy};
pub use settle::{ConsistencyWait, FixedDelay, PollUntilAbsent};
pub use writer::{group_by_destination, BatchWriter, Run};
pub use deleter::BatchDeleter;
pub use reader::{Fetched, StateReader};

/// 过滤与分页上限（删除与读取共用同一个编码长度上限）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterLimits {
    pub max_url_param_length: usize,
    pub max_count: usize,
    pub page_size: usize,
}

impl From<&SyncConfig> for FilterLimits {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_url_param_length: config.max_url_param_length,
            max_count: config.bulk_size_delete,
            page_size: config.page_size,
        }
    }
}
