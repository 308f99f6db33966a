//! 同步器：规则集级别的校验、整体替换、读取刷新与接管
//!
//! 远端没有重排或定点插入原语，规则集的任何变化都以"整体销毁后按序重建"落地：
//! 1. 校验（任何远端调用之前）
//! 2. 与当前状态内容等价时直接返回
//! 3. 删除旧规则（等待生效）与旧分类
//! 4. 按声明顺序创建分类，再按目标分段批量创建规则

use rulesync_engine::{
    needs_replacement, Category, Destination, Placement, RankValidator, Reconcile, ReconcileMode, RuleSet,
};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use super::SyncOutcome;
use crate::api::{FilterKey, PolicyApi, RemoteRule};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::pipeline::lease::{LeaseRegistry, ResourceKind};
use crate::pipeline::settle::{self, ConsistencyWait};
use crate::pipeline::writer::{group_by_destination, BatchWriter};
use crate::pipeline::{BatchDeleter, Fetched, FilterLimits, StateReader};

/// 规则集同步器
pub struct Synchronizer {
    api: Arc<dyn PolicyApi>,
    config: SyncConfig,
    leases: Arc<LeaseRegistry>,
    settle: Arc<dyn ConsistencyWait>,
}

/// 由远端读取结果构造快照
///
/// - 单一归属模式：归属取自共识（没有任何规则时沿用本地值），规则自身不带归属字段
/// - 分类模式：分类列表取自远端
fn build_snapshot(state: &RuleSet, fetched: Fetched, categories: Option<Vec<Category>>) -> RuleSet {
    let single = state.placement.is_some();
    let placement = if !single {
        None
    } else if fetched.items.is_empty() {
        state.placement.clone()
    } else {
        fetched.consensus
    };
    if placement == Some(Placement::Conflicting) {
        log::warn!(
            "rules of policy {} disagree on their category/section, the rule set will be replaced",
            state.policy_id
        );
    }

    let rules = fetched
        .items
        .into_iter()
        .map(|remote| {
            let mut rule = remote.into_snapshot_rule();
            if single {
                rule.category_name = None;
                rule.section = None;
            }
            rule
        })
        .collect();

    RuleSet {
        policy_id: state.policy_id.clone(),
        categories,
        placement,
        rules,
    }
}

/// 与声明同归属模式、但不含任何远端对象的空状态
fn empty_like(plan: &RuleSet) -> RuleSet {
    RuleSet {
        policy_id: plan.policy_id.clone(),
        categories: plan.categories.as_ref().map(|_| Vec::new()),
        placement: plan.placement.clone(),
        rules: Vec::new(),
    }
}

impl Synchronizer {
    /// 创建同步器（使用进程级租约表与配置中的等待策略）
    pub fn new(api: Arc<dyn PolicyApi>, config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let settle = settle::from_strategy(&config.settle, FilterLimits::from(&config));
        Ok(Self {
            api,
            config,
            leases: LeaseRegistry::global(),
            settle,
        })
    }

    pub fn with_leases(mut self, leases: Arc<LeaseRegistry>) -> Self {
        self.leases = leases;
        self
    }

    pub fn with_consistency_wait(mut self, wait: Arc<dyn ConsistencyWait>) -> Self {
        self.settle = wait;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn limits(&self) -> FilterLimits {
        FilterLimits::from(&self.config)
    }

    fn reader(&self) -> StateReader {
        StateReader::new(Arc::clone(&self.api), self.limits())
    }

    fn writer(&self) -> BatchWriter {
        BatchWriter::new(Arc::clone(&self.api), Arc::clone(&self.leases), self.config.bulk_size_create)
    }

    fn deleter(&self) -> BatchDeleter {
        BatchDeleter::new(Arc::clone(&self.api), self.limits(), Arc::clone(&self.settle))
    }

    /// 校验规则集，不发起任何远端调用
    pub fn validate(&self, plan: &RuleSet) -> SyncResult<()> {
        RankValidator::validate_rule_set(plan)?;
        Ok(())
    }

    /// 使远端与声明一致
    ///
    /// # 参数
    /// - `plan`: 期望的规则集
    /// - `current`: 上一次同步/读取得到的状态，首次创建时为 `None`
    ///
    /// # 返回值
    /// - 成功时为带远端 id 的新状态
    /// - 失败时为已在远端生效的部分状态与错误；销毁阶段失败时返回原状态
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(policy = %plan.policy_id)))]
    pub async fn synchronize(&self, plan: &RuleSet, current: Option<&RuleSet>) -> SyncOutcome {
        // 1. 校验
        if let Err(e) = self.validate(plan) {
            let state = current.cloned().unwrap_or_else(|| empty_like(plan));
            return SyncOutcome::failed(state, e);
        }

        if let Some(current) = current {
            // 2. 内容等价
            if !needs_replacement(current, plan) {
                log::info!("policy {} is up to date, nothing to synchronize", plan.policy_id);
                return SyncOutcome::ok(current.clone());
            }

            // 3. 销毁
            if let Err(e) = self.destroy(current).await {
                return SyncOutcome::failed(current.clone(), e);
            }
        }

        // 4. 重建
        let mut state = empty_like(plan);
        match self.recreate(plan, &mut state).await {
            Ok(()) => {
                log::info!(
                    "synchronized policy {}: {} categor(ies), {} rule(s)",
                    plan.policy_id,
                    state.declared_categories().len(),
                    state.rules.len()
                );
                SyncOutcome::ok(state)
            }
            Err(e) => SyncOutcome::failed(state, e),
        }
    }

    async fn recreate(&self, plan: &RuleSet, state: &mut RuleSet) -> SyncResult<()> {
        if let Some(created) = state.categories.as_mut() {
            self.create_categories(&plan.policy_id, plan.declared_categories(), created)
                .await?;
        }

        let placement = plan
            .placement
            .as_ref()
            .map(|p| Destination::try_from(p))
            .transpose()?;
        let runs = group_by_destination(&plan.rules, placement.as_ref());

        match self.writer().create_runs(&plan.policy_id, &runs).await {
            Ok(applied) => {
                state.rules = applied;
                Ok(())
            }
            Err(failure) => {
                state.rules = failure.applied;
                Err(failure.error)
            }
        }
    }

    /// 按声明顺序逐个创建分类（远端追加到区段末尾）
    async fn create_categories(
        &self,
        policy_id: &str,
        declared: &[Category],
        created: &mut Vec<Category>,
    ) -> SyncResult<()> {
        if declared.is_empty() {
            return Ok(());
        }

        let _lease = self.leases.acquire(ResourceKind::Category).await;
        let total = declared.len();
        for (index, category) in declared.iter().enumerate() {
            let body = Category {
                id: None,
                ..category.clone()
            };
            let remote = self
                .api
                .create_category(policy_id, &body)
                .await
                .map_err(|e| SyncError::batch("create category", index, total, e))?;
            created.push(Category {
                id: remote.id,
                ..category.clone()
            });
        }
        log::debug!("created {} categor(ies) in policy {}", total, policy_id);
        Ok(())
    }

    /// 删除状态中的全部远端对象：先规则（等待生效），再按逆序删除分类
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(policy = %state.policy_id)))]
    pub async fn destroy(&self, state: &RuleSet) -> SyncResult<()> {
        self.deleter().delete(&state.policy_id, &state.rule_ids()).await?;

        let category_ids = state.category_ids();
        if category_ids.is_empty() {
            return Ok(());
        }

        let _lease = self.leases.acquire(ResourceKind::Category).await;
        let total = category_ids.len();
        for (index, id) in category_ids.iter().rev().enumerate() {
            self.api
                .delete_category(&state.policy_id, id)
                .await
                .map_err(|e| SyncError::batch("delete category", index, total, e))?;
        }
        log::debug!("deleted {} categor(ies) from policy {}", total, state.policy_id);
        Ok(())
    }

    /// 读取远端并合并进本地状态
    ///
    /// 按 id 定位规则；本地有而远端已不存在的规则/集合元素会被剪除。
    /// 出错时返回原状态与错误。
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(policy = %state.policy_id)))]
    pub async fn read(&self, state: &RuleSet, mode: ReconcileMode) -> SyncOutcome {
        match self.refresh(state, mode).await {
            Ok(refreshed) => SyncOutcome::ok(refreshed),
            Err(e) => SyncOutcome::failed(state.clone(), e),
        }
    }

    async fn refresh(&self, state: &RuleSet, mode: ReconcileMode) -> SyncResult<RuleSet> {
        let reader = self.reader();
        let fetched = reader
            .fetch(&state.policy_id, FilterKey::Ids, &state.rule_ids())
            .await?;
        let categories = match state.categories {
            Some(_) => Some(reader.list_categories(&state.policy_id).await?),
            None => None,
        };

        let snapshot = build_snapshot(state, fetched, categories);
        let mut merged = state.clone();
        merged.reconcile(&snapshot, mode);
        Ok(merged)
    }

    /// 接管已存在的远端对象：按名称查找规则与分类，复制其 id 后以 `Full` 模式合并
    ///
    /// 远端找不到的规则不会出现在返回状态中，随后的同步会整体重建
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(policy = %plan.policy_id)))]
    pub async fn adopt(&self, plan: &RuleSet) -> SyncOutcome {
        match self.adopt_existing(plan).await {
            Ok(state) => SyncOutcome::ok(state),
            Err(e) => SyncOutcome::failed(empty_like(plan), e),
        }
    }

    async fn adopt_existing(&self, plan: &RuleSet) -> SyncResult<RuleSet> {
        self.validate(plan)?;

        let reader = self.reader();
        let names: Vec<String> = plan.rules.iter().map(|r| r.name.clone()).collect();
        let fetched = reader.fetch(&plan.policy_id, FilterKey::Names, &names).await?;

        let mut state = plan.clone();
        {
            let mut by_name: FxHashMap<&str, &RemoteRule> = FxHashMap::default();
            for remote in &fetched.items {
                match by_name.entry(remote.rule.name.as_str()) {
                    Entry::Occupied(_) => log::warn!(
                        "policy {} holds several rules named {:?}, adopting the first one",
                        plan.policy_id,
                        remote.rule.name
                    ),
                    Entry::Vacant(slot) => {
                        slot.insert(remote);
                    }
                }
            }
            for rule in &mut state.rules {
                rule.id = by_name.get(rule.name.as_str()).and_then(|r| r.rule.id.clone());
            }
        }

        let categories = match state.categories.as_mut() {
            Some(declared) => {
                let remote = reader.list_categories(&plan.policy_id).await?;
                for category in declared.iter_mut() {
                    category.id = remote
                        .iter()
                        .find(|c| c.name == category.name)
                        .and_then(|c| c.id.clone());
                }
                Some(remote)
            }
            None => None,
        };

        let snapshot = build_snapshot(&state, fetched, categories);
        state.reconcile(&snapshot, ReconcileMode::Full);
        log::info!(
            "adopted {} of {} rule(s) in policy {}",
            state.rules.len(),
            plan.rules.len(),
            plan.policy_id
        );
        Ok(state)
    }
}
