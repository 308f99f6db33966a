//! 状态读取：按 id 或名称批量过滤拉取远端规则，处理分页并推断归属共识

use rulesync_engine::{infer_consensus, Category, FilterBatcher, Placement};
use std::future::Future;
use std::sync::Arc;

use super::FilterLimits;
use crate::api::{FilterKey, ListQuery, Page, PolicyApi, RemoteRule};
use crate::error::{SyncError, SyncResult};

/// 一次批量读取的结果
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    /// 按过滤批次与远端分页顺序拼接的规则
    pub items: Vec<RemoteRule>,
    /// 所有条目的归属共识；不一致时为 `Placement::Conflicting`
    pub consensus: Option<Placement>,
}

pub struct StateReader {
    api: Arc<dyn PolicyApi>,
    limits: FilterLimits,
}

/// 逐页拉取直到远端表示没有下一页
async fn collect_pages<T, F, Fut>(page_size: usize, mut list: F) -> SyncResult<Vec<T>>
where
    F: FnMut(ListQuery) -> Fut,
    Fut: Future<Output = SyncResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut offset = 0usize;
    loop {
        let page = list(ListQuery {
            offset,
            limit: page_size,
            expanded: true,
            filter: None,
        })
        .await?;

        let count = page.items.len();
        items.extend(page.items);
        if !page.has_next {
            break;
        }
        if count == 0 {
            log::warn!("remote reported another page after an empty page at offset {}", offset);
            break;
        }
        offset += count;
    }
    Ok(items)
}

impl StateReader {
    pub fn new(api: Arc<dyn PolicyApi>, limits: FilterLimits) -> Self {
        Self { api, limits }
    }

    /// 按过滤键批量读取规则
    ///
    /// # 参数
    /// - `key`: 按 id 或名称过滤
    /// - `values`: 过滤值；按编码长度与数量上限切分为多次列表调用
    ///
    /// # 返回值
    /// - 全部批次、全部分页的规则（批次内保持远端顺序）及归属共识
    pub async fn fetch(&self, policy_id: &str, key: FilterKey, values: &[String]) -> SyncResult<Fetched> {
        if values.is_empty() {
            return Ok(Fetched::default());
        }

        let batcher = FilterBatcher::new(
            key.prefix(),
            self.limits.max_url_param_length,
            self.limits.max_count,
        )?;
        let batches = batcher.partition(values)?;
        let total = batches.len();
        log::debug!(
            "fetching {} rule(s) of policy {} in {} filter batch(es)",
            values.len(),
            policy_id,
            total
        );

        let api = &self.api;
        let mut items = Vec::with_capacity(values.len());
        for (index, batch) in batches.into_iter().enumerate() {
            let filter = batch.filter;
            let page_items = collect_pages(self.limits.page_size, |mut query| {
                query.filter = Some(filter.clone());
                async move { api.list_rules(policy_id, &query).await }
            })
            .await
            .map_err(|e| SyncError::batch("list rules", index, total, e))?;
            items.extend(page_items);
        }

        let consensus = infer_consensus(items.iter().map(RemoteRule::placement));
        Ok(Fetched { items, consensus })
    }

    /// 列出策略下的全部分类（远端顺序）
    pub async fn list_categories(&self, policy_id: &str) -> SyncResult<Vec<Category>> {
        let api = &self.api;
        collect_pages(self.limits.page_size, |query| async move {
            api.list_categories(policy_id, &query).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, MemoryPolicyApi};
    use rulesync_engine::{Action, Destination, Rule, Section};

    fn limits(max_len: usize, max_count: usize, page_size: usize) -> FilterLimits {
        FilterLimits {
            max_url_param_length: max_len,
            max_count,
            page_size,
        }
    }

    fn seed(memory: &MemoryPolicyApi, count: usize, destination: Destination) -> Vec<String> {
        (0..count)
            .map(|i| memory.seed_rule("p", destination.clone(), Rule::new(format!("r{}", i), Action::Allow)))
            .collect()
    }

    #[tokio::test]
    async fn test_paginates_until_no_next_page() {
        let memory = Arc::new(MemoryPolicyApi::new().with_page_cap(2));
        let ids = seed(&memory, 5, Destination::Section(Section::Mandatory));

        let reader = StateReader::new(memory.clone(), limits(7000, 1000, 1000));
        let fetched = reader.fetch("p", FilterKey::Ids, &ids).await.unwrap();

        let names: Vec<_> = fetched.items.iter().map(|r| r.rule.name.as_str()).collect();
        assert_eq!(names, vec!["r0", "r1", "r2", "r3", "r4"]);
        assert_eq!(fetched.consensus, Some(Placement::Section(Section::Mandatory)));

        let offsets: Vec<_> = memory
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ListRules { offset, .. } => Some(offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_splits_filter_by_encoded_length() {
        // "ids:rule-0001,rule-0002" 编码后 27 字节，上限 20 时每批只能放一个 id
        let memory = Arc::new(MemoryPolicyApi::new().with_max_filter_len(20));
        let ids = seed(&memory, 3, Destination::Section(Section::Default));

        let reader = StateReader::new(memory.clone(), limits(20, 1000, 1000));
        let fetched = reader.fetch("p", FilterKey::Ids, &ids).await.unwrap();
        assert_eq!(fetched.items.len(), 3);

        let filters: Vec<_> = memory
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::ListRules { filter, .. } => filter,
                _ => None,
            })
            .collect();
        assert_eq!(filters.len(), 3);
        assert!(filters.iter().all(|f| f.len() <= 20));
    }

    #[tokio::test]
    async fn test_fetch_by_name() {
        let memory = Arc::new(MemoryPolicyApi::new());
        seed(&memory, 3, Destination::Section(Section::Default));

        let reader = StateReader::new(memory.clone(), limits(7000, 1000, 1000));
        let fetched = reader
            .fetch("p", FilterKey::Names, &["r2".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(fetched.items.len(), 1);
        assert_eq!(fetched.items[0].rule.name, "r2");
    }

    #[tokio::test]
    async fn test_consensus_conflicting_across_categories() {
        let memory = Arc::new(MemoryPolicyApi::new());
        let mut ids = seed(&memory, 1, Destination::Category("Web".into()));
        ids.extend(seed(&memory, 1, Destination::Category("Mail".into())));

        let reader = StateReader::new(memory.clone(), limits(7000, 1000, 1000));
        let fetched = reader.fetch("p", FilterKey::Ids, &ids).await.unwrap();
        assert_eq!(fetched.consensus, Some(Placement::Conflicting));
    }

    #[tokio::test]
    async fn test_empty_values_make_no_calls() {
        let memory = Arc::new(MemoryPolicyApi::new());
        let reader = StateReader::new(memory.clone(), limits(7000, 1000, 1000));
        let fetched = reader.fetch("p", FilterKey::Ids, &[]).await.unwrap();
        assert!(fetched.items.is_empty());
        assert_eq!(fetched.consensus, None);
        assert!(memory.calls().is_empty());
    }

    #[tokio::test]
    async fn test_list_error_is_wrapped_with_batch() {
        let memory = Arc::new(MemoryPolicyApi::new());
        memory.set_fail_list(true);
        let reader = StateReader::new(memory.clone(), limits(7000, 1000, 1000));
        let err = reader
            .fetch("p", FilterKey::Ids, &["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Batch { batch: 1, batches: 1, .. }));
    }

    #[tokio::test]
    async fn test_list_categories_paginates() {
        let memory = Arc::new(MemoryPolicyApi::new().with_page_cap(1));
        memory.seed_category("p", Category::new("A", Section::Mandatory));
        memory.seed_category("p", Category::new("B", Section::Default));

        let reader = StateReader::new(memory.clone(), limits(7000, 1000, 1000));
        let categories = reader.list_categories("p").await.unwrap();
        let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}
