//! Remote policy API
//! 远端策略存储的调用接口（线格式见 `wire`）
//! - 分页列表：offset/limit/expanded，返回条目与是否有下一页
//! - 过滤列表：逗号拼接的名称或 id，长度上限由调用方保证
//! - 批量创建：有序规则数组 + 分类/区段目标，按提交顺序返回
//! - 批量删除：逗号拼接的 id 过滤参数，完成时间相对 HTTP 响应是异步的

pub mod wire;
#[cfg(feature = "remote-client")]
pub mod client;

use async_trait::async_trait;
use rulesync_engine::{Category, Destination, Placement, Rule};

use crate::error::SyncResult;

#[cfg(feature = "remote-client")]
pub use client::FmcClient;

/// 列表查询参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub offset: usize,
    pub limit: usize,
    pub expanded: bool,
    /// 已拼接的过滤参数值，例如 `ids:a,b`
    pub filter: Option<String>,
}

/// 一页列表结果
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

/// 过滤键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey {
    Ids,
    Names,
}

impl FilterKey {
    /// 过滤参数前缀
    pub fn prefix(&self) -> &'static str {
        match self {
            FilterKey::Ids => "ids:",
            FilterKey::Names => "name:",
        }
    }
}

/// 远端规则元数据（归属信息）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleMetadata {
    pub category: Option<String>,
    pub section: Option<String>,
}

/// 远端返回的一条规则
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRule {
    pub rule: Rule,
    pub metadata: RuleMetadata,
}

impl RemoteRule {
    /// 远端元数据给出的归属
    pub fn placement(&self) -> Option<Placement> {
        Placement::from_metadata(self.metadata.category.as_deref(), self.metadata.section.as_deref())
    }

    /// 转为快照规则：按元数据设置 `category_name`/`section`（至多其一）
    pub fn into_snapshot_rule(self) -> Rule {
        let placement = self.placement();
        let mut rule = self.rule;
        match placement {
            Some(Placement::Category(name)) => {
                rule.category_name = Some(name);
                rule.section = None;
            }
            Some(Placement::Section(section)) => {
                rule.category_name = None;
                rule.section = Some(section);
            }
            _ => {
                rule.category_name = None;
                rule.section = None;
            }
        }
        rule
    }
}

/// 远端策略存储
#[async_trait]
pub trait PolicyApi: Send + Sync {
    /// 分页列出规则
    async fn list_rules(&self, policy_id: &str, query: &ListQuery) -> SyncResult<Page<RemoteRule>>;

    /// 批量创建：规则追加到目标分类/区段末尾，按提交顺序返回
    async fn bulk_create_rules(
        &self,
        policy_id: &str,
        destination: &Destination,
        rules: &[Rule],
    ) -> SyncResult<Vec<RemoteRule>>;

    /// 按 id 过滤参数批量删除
    async fn bulk_delete_rules(&self, policy_id: &str, filter: &str) -> SyncResult<()>;

    /// 分页列出分类
    async fn list_categories(&self, policy_id: &str, query: &ListQuery) -> SyncResult<Page<Category>>;

    /// 创建单个分类（追加到其区段末尾）
    async fn create_category(&self, policy_id: &str, category: &Category) -> SyncResult<Category>;

    /// 删除单个分类
    async fn delete_category(&self, policy_id: &str, category_id: &str) -> SyncResult<()>;
}
