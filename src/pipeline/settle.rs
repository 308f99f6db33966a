//! 批量删除后的一致性等待
//! 远端批量删除在 HTTP 响应之后才真正生效，立即重建可能与尚未完成的删除交错

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::reader::StateReader;
use super::retry::{poll_until, PollPolicy};
use super::FilterLimits;
use crate::api::{FilterKey, PolicyApi};
use crate::config::SettleStrategy;
use crate::error::SyncResult;

/// 删除生效等待策略
#[async_trait]
pub trait ConsistencyWait: Send + Sync {
    /// 等待 `deleted_ids` 的删除在远端生效
    async fn wait(&self, api: &Arc<dyn PolicyApi>, policy_id: &str, deleted_ids: &[String]) -> SyncResult<()>;
}

/// 固定时长等待
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl ConsistencyWait for FixedDelay {
    async fn wait(&self, _api: &Arc<dyn PolicyApi>, _policy_id: &str, deleted_ids: &[String]) -> SyncResult<()> {
        if self.0.is_zero() {
            return Ok(());
        }
        log::debug!("settling {} deleted rule(s) for {:?}", deleted_ids.len(), self.0);
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

/// 轮询直到被删除的 id 全部不可见
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollUntilAbsent {
    pub policy: PollPolicy,
    pub limits: FilterLimits,
}

#[async_trait]
impl ConsistencyWait for PollUntilAbsent {
    async fn wait(&self, api: &Arc<dyn PolicyApi>, policy_id: &str, deleted_ids: &[String]) -> SyncResult<()> {
        let reader = StateReader::new(Arc::clone(api), self.limits);
        let reader = &reader;
        poll_until(&self.policy, "deleted rules to disappear", || async move {
            let fetched = reader.fetch(policy_id, FilterKey::Ids, deleted_ids).await?;
            if fetched.items.is_empty() {
                Ok(Some(()))
            } else {
                log::debug!("{} deleted rule(s) still visible", fetched.items.len());
                Ok(None)
            }
        })
        .await
    }
}

/// 按配置构造等待策略
pub fn from_strategy(strategy: &SettleStrategy, limits: FilterLimits) -> Arc<dyn ConsistencyWait> {
    match strategy {
        SettleStrategy::FixedDelay(delay) => Arc::new(FixedDelay(*delay)),
        SettleStrategy::PollUntilAbsent(policy) => Arc::new(PollUntilAbsent {
            policy: *policy,
            limits,
        }),
    }
}
