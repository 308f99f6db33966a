//! 批量写入
//! 远端按收到调用的顺序把规则追加到目标分类/区段末尾，
//! 多批次创建期间持有资源类型租约，保证本次提交的规则在远端连续且保序

use rulesync_engine::{chunk_by_count, Destination, Rule};
use std::sync::Arc;

use super::lease::{LeaseRegistry, ResourceKind};
use crate::api::PolicyApi;
use crate::error::{CreateFailure, SyncError, SyncResult};

/// 一段写入同一目标的连续规则
#[derive(Debug, Clone, PartialEq)]
pub struct Run<'a> {
    pub destination: Destination,
    pub rules: &'a [Rule],
}

/// 把规则序列按目标切分为最长连续段
///
/// 规则集级别归属存在时，全部规则写入同一目标；否则按各规则自身的分类/区段分段
pub fn group_by_destination<'a>(rules: &'a [Rule], placement: Option<&Destination>) -> Vec<Run<'a>> {
    if rules.is_empty() {
        return Vec::new();
    }
    if let Some(destination) = placement {
        return vec![Run {
            destination: destination.clone(),
            rules,
        }];
    }

    let mut runs = Vec::new();
    let mut start = 0;
    while start < rules.len() {
        let destination = rules[start].destination();
        let mut end = start + 1;
        while end < rules.len() && rules[end].destination() == destination {
            end += 1;
        }
        runs.push(Run {
            destination,
            rules: &rules[start..end],
        });
        start = end;
    }
    runs
}

pub struct BatchWriter {
    api: Arc<dyn PolicyApi>,
    leases: Arc<LeaseRegistry>,
    bulk_size: usize,
}

impl BatchWriter {
    pub fn new(api: Arc<dyn PolicyApi>, leases: Arc<LeaseRegistry>, bulk_size: usize) -> Self {
        Self { api, leases, bulk_size }
    }

    /// 把有序规则全部写入同一目标
    ///
    /// # 返回值
    /// - `Ok`: 按提交顺序的规则（已带远端 id）
    /// - `Err(CreateFailure)`: 某批次失败；`applied` 为此前已成功的规则，剩余批次不再提交
    pub async fn create(
        &self,
        policy_id: &str,
        rules: &[Rule],
        destination: &Destination,
    ) -> Result<Vec<Rule>, CreateFailure> {
        let runs = [Run {
            destination: destination.clone(),
            rules,
        }];
        self.create_runs(policy_id, &runs).await
    }

    /// 依次写入多个目标段，整个过程只获取一次租约
    pub async fn create_runs(&self, policy_id: &str, runs: &[Run<'_>]) -> Result<Vec<Rule>, CreateFailure> {
        let total: usize = runs.iter().map(|r| r.rules.len()).sum();
        let mut applied = Vec::with_capacity(total);
        if total == 0 {
            return Ok(applied);
        }

        let _lease = self.leases.acquire(ResourceKind::AccessRule).await;
        for run in runs {
            if let Err(error) = self.create_run(policy_id, run, &mut applied).await {
                log::warn!(
                    "bulk create into {} stopped after {} of {} rule(s): {}",
                    run.destination,
                    applied.len(),
                    total,
                    error
                );
                return Err(CreateFailure { applied, error });
            }
        }

        log::info!("created {} rule(s) in policy {} across {} run(s)", applied.len(), policy_id, runs.len());
        Ok(applied)
    }

    async fn create_run(&self, policy_id: &str, run: &Run<'_>, applied: &mut Vec<Rule>) -> SyncResult<()> {
        let batches: Vec<&[Rule]> = chunk_by_count(run.rules, self.bulk_size)?.collect();
        let total = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            log::debug!(
                "bulk create batch {}/{}: {} rule(s) into {}",
                index + 1,
                total,
                batch.len(),
                run.destination
            );
            let created = self
                .api
                .bulk_create_rules(policy_id, &run.destination, batch)
                .await
                .map_err(|e| SyncError::batch("bulk create", index, total, e))?;

            let returned = created.len();
            applied.extend(batch.iter().zip(created).map(|(planned, remote)| Rule {
                id: remote.rule.id,
                ..planned.clone()
            }));
            if returned != batch.len() {
                return Err(SyncError::batch(
                    "bulk create",
                    index,
                    total,
                    SyncError::RemoteError(format!("expected {} created rules, got {}", batch.len(), returned)),
                ));
            }
        }
        Ok(())
    }
}
