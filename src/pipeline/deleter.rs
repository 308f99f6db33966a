//! 批量删除：按过滤参数长度与数量双上限切分 id，依次删除后等待远端生效

use rulesync_engine::FilterBatcher;
use std::sync::Arc;

use super::settle::ConsistencyWait;
use super::FilterLimits;
use crate::api::{FilterKey, PolicyApi};
use crate::error::{SyncError, SyncResult};

pub struct BatchDeleter {
    api: Arc<dyn PolicyApi>,
    limits: FilterLimits,
    settle: Arc<dyn ConsistencyWait>,
}

impl BatchDeleter {
    pub fn new(api: Arc<dyn PolicyApi>, limits: FilterLimits, settle: Arc<dyn ConsistencyWait>) -> Self {
        Self { api, limits, settle }
    }

    /// 按 id 批量删除规则，空输入不发起任何调用
    ///
    /// 批次依次提交；任一批次失败立即返回，已删除的批次不回滚
    pub async fn delete(&self, policy_id: &str, ids: &[String]) -> SyncResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let batcher = FilterBatcher::new(
            FilterKey::Ids.prefix(),
            self.limits.max_url_param_length,
            self.limits.max_count,
        )?;
        let batches = batcher.partition(ids)?;
        let total = batches.len();

        for (index, batch) in batches.iter().enumerate() {
            log::debug!("bulk delete batch {}/{}: {} rule(s)", index + 1, total, batch.values.len());
            self.api
                .bulk_delete_rules(policy_id, &batch.filter)
                .await
                .map_err(|e| SyncError::batch("bulk delete", index, total, e))?;
        }

        log::info!("deleted {} rule(s) from policy {} in {} batch(es)", ids.len(), policy_id, total);
        self.settle.wait(&self.api, policy_id, ids).await
    }
}
