//! 同步门面：校验、整体替换、读取刷新、接管已有远端对象
pub mod synchronizer;

use rulesync_engine::RuleSet;

use crate::error::{SyncError, SyncResult};

pub use synchronizer::Synchronizer;

/// 一次同步/读取操作的结果
///
/// 出错时 `state` 仍然是已在远端生效的部分，调用方据此驱动清理或下一次刷新
#[derive(Debug)]
pub struct SyncOutcome {
    pub state: RuleSet,
    pub error: Option<SyncError>,
}

impl SyncOutcome {
    pub(crate) fn ok(state: RuleSet) -> Self {
        Self { state, error: None }
    }

    pub(crate) fn failed(state: RuleSet, error: SyncError) -> Self {
        Self {
            state,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// 丢弃部分结果，只保留成功状态或错误
    pub fn into_result(self) -> SyncResult<RuleSet> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.state),
        }
    }
}
