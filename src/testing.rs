//! In-memory policy store used by unit tests
//! 内存版远端策略存储：模拟追加顺序、分页上限、过滤长度上限、批量删除延迟生效与故障注入

use async_trait::async_trait;
use rulesync_engine::batching::encoded_len;
use rulesync_engine::{Category, Destination, NetworkLiteral, ObjectRef, PortLiteral, Rule, Section, UNDEFINED_CATEGORY};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::api::{FilterKey, ListQuery, Page, PolicyApi, RemoteRule, RuleMetadata};
use crate::error::{SyncError, SyncResult};

/// 记录下来的远端调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ListRules { filter: Option<String>, offset: usize },
    BulkCreate { destination: Destination, count: usize },
    BulkDelete { count: usize },
    ListCategories { offset: usize },
    CreateCategory { name: String },
    DeleteCategory { id: String },
}

#[derive(Debug, Clone)]
struct StoredRule {
    policy_id: String,
    destination: Destination,
    rule: Rule,
}

#[derive(Debug, Clone)]
struct StoredCategory {
    policy_id: String,
    category: Category,
}

#[derive(Debug, Default)]
struct Store {
    next_id: u64,
    rules: Vec<StoredRule>,
    categories: Vec<StoredCategory>,
    calls: Vec<Call>,
    create_calls: usize,
    fail_create_on: Option<usize>,
    fail_list: bool,
    delete_lag: usize,
    pending_delete: Option<(Vec<String>, usize)>,
}

pub(crate) struct MemoryPolicyApi {
    store: Mutex<Store>,
    page_cap: usize,
    max_filter_len: usize,
}

fn status(code: u16, body: &str) -> SyncError {
    SyncError::Status {
        status: http::StatusCode::from_u16(code).unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR),
        body: body.to_string(),
    }
}

fn capitalized(section: Section) -> String {
    match section {
        Section::Mandatory => "Mandatory".to_string(),
        Section::Default => "Default".to_string(),
    }
}

/// 后端回填默认值
fn backend_filled(rule: &Rule) -> Rule {
    let mut rule = rule.clone();
    rule.category_name = None;
    rule.section = None;
    rule.enabled.get_or_insert(true);
    for flag in [
        &mut rule.log_begin,
        &mut rule.log_end,
        &mut rule.log_files,
        &mut rule.send_events_to_fmc,
        &mut rule.send_syslog,
    ] {
        flag.get_or_insert(false);
    }
    let fill_ref = |refs: &mut Option<Vec<ObjectRef>>, kind: &str| {
        for r in refs.iter_mut().flatten() {
            r.kind.get_or_insert_with(|| kind.to_string());
        }
    };
    fill_ref(&mut rule.source_zones, "SecurityZone");
    fill_ref(&mut rule.destination_zones, "SecurityZone");
    fill_ref(&mut rule.source_network_objects, "Network");
    fill_ref(&mut rule.destination_network_objects, "Network");
    fill_ref(&mut rule.source_port_objects, "ProtocolPortObject");
    fill_ref(&mut rule.destination_port_objects, "ProtocolPortObject");
    for literals in [&mut rule.source_network_literals, &mut rule.destination_network_literals] {
        for l in literals.iter_mut().flatten() {
            let l: &mut NetworkLiteral = l;
            l.kind.get_or_insert_with(|| "Host".to_string());
        }
    }
    for l in rule.destination_port_literals.iter_mut().flatten() {
        let l: &mut PortLiteral = l;
        l.kind.get_or_insert_with(|| "PortLiteral".to_string());
    }
    rule
}

impl Default for MemoryPolicyApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPolicyApi {
    pub(crate) fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            page_cap: 1000,
            max_filter_len: usize::MAX,
        }
    }

    pub(crate) fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = cap;
        self
    }

    pub(crate) fn with_max_filter_len(mut self, len: usize) -> Self {
        self.max_filter_len = len;
        self
    }

    /// 第 `n` 次（从 1 开始）批量创建调用失败
    pub(crate) fn fail_create_on(self, n: usize) -> Self {
        self.lock().fail_create_on = Some(n);
        self
    }

    /// 批量删除在之后 `reads` 次列表调用中仍然可见
    pub(crate) fn with_delete_lag(self, reads: usize) -> Self {
        self.lock().delete_lag = reads;
        self
    }

    pub(crate) fn set_fail_list(&self, fail: bool) {
        self.lock().fail_list = fail;
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn create_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::BulkCreate { count, .. } => Some(count),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn delete_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::BulkDelete { count } => Some(count),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// 远端当前可见的规则（存储顺序）
    pub(crate) fn remote_rules(&self, policy_id: &str) -> Vec<(Destination, Rule)> {
        self.lock()
            .rules
            .iter()
            .filter(|s| s.policy_id == policy_id)
            .map(|s| (s.destination.clone(), s.rule.clone()))
            .collect()
    }

    pub(crate) fn remote_categories(&self, policy_id: &str) -> Vec<Category> {
        self.lock()
            .categories
            .iter()
            .filter(|s| s.policy_id == policy_id)
            .map(|s| s.category.clone())
            .collect()
    }

    /// 预置一条远端规则，返回其 id
    pub(crate) fn seed_rule(&self, policy_id: &str, destination: Destination, rule: Rule) -> String {
        let mut store = self.lock();
        store.next_id += 1;
        let id = format!("rule-{:04}", store.next_id);
        store.rules.push(StoredRule {
            policy_id: policy_id.to_string(),
            destination,
            rule: Rule {
                id: Some(id.clone()),
                ..rule
            },
        });
        id
    }

    /// 预置一个远端分类，返回其 id
    pub(crate) fn seed_category(&self, policy_id: &str, category: Category) -> String {
        let mut store = self.lock();
        store.next_id += 1;
        let id = format!("cat-{:04}", store.next_id);
        store.categories.push(StoredCategory {
            policy_id: policy_id.to_string(),
            category: Category {
                id: Some(id.clone()),
                ..category
            },
        });
        id
    }

    /// 带外修改一条规则
    pub(crate) fn edit_rule<F: FnOnce(&mut Rule)>(&self, rule_id: &str, edit: F) {
        let mut store = self.lock();
        if let Some(stored) = store.rules.iter_mut().find(|s| s.rule.id.as_deref() == Some(rule_id)) {
            edit(&mut stored.rule);
        }
    }

    /// 带外把一条规则移动到另一个分类/区段
    pub(crate) fn move_rule(&self, rule_id: &str, destination: Destination) {
        let mut store = self.lock();
        if let Some(stored) = store.rules.iter_mut().find(|s| s.rule.id.as_deref() == Some(rule_id)) {
            stored.destination = destination;
        }
    }

    /// 带外删除一条规则
    pub(crate) fn remove_rule(&self, rule_id: &str) {
        self.lock().rules.retain(|s| s.rule.id.as_deref() != Some(rule_id));
    }

    fn check_filter(&self, filter: &str) -> SyncResult<()> {
        if encoded_len(filter) > self.max_filter_len {
            return Err(status(414, "Request-URI Too Long"));
        }
        Ok(())
    }
}

impl Store {
    fn metadata(&self, policy_id: &str, destination: &Destination) -> RuleMetadata {
        match destination {
            Destination::Category(name) => {
                let section = self
                    .categories
                    .iter()
                    .find(|c| c.policy_id == policy_id && &c.category.name == name)
                    .map_or(Section::Default, |c| c.category.section);
                RuleMetadata {
                    category: Some(name.clone()),
                    section: Some(capitalized(section)),
                }
            }
            Destination::Section(section) => RuleMetadata {
                category: Some(UNDEFINED_CATEGORY.to_string()),
                section: Some(capitalized(*section)),
            },
        }
    }

    /// 列表调用之后推进延迟删除
    fn tick_pending_delete(&mut self) {
        if let Some((ids, remaining)) = self.pending_delete.take() {
            if remaining <= 1 {
                self.rules.retain(|s| !s.rule.id.as_ref().map_or(false, |id| ids.contains(id)));
            } else {
                self.pending_delete = Some((ids, remaining - 1));
            }
        }
    }
}

fn parse_filter(filter: &str) -> Option<(FilterKey, Vec<String>)> {
    let (key, rest) = if let Some(rest) = filter.strip_prefix(FilterKey::Ids.prefix()) {
        (FilterKey::Ids, rest)
    } else {
        (FilterKey::Names, filter.strip_prefix(FilterKey::Names.prefix())?)
    };
    Some((key, rest.split(',').map(str::to_string).collect()))
}

#[async_trait]
impl PolicyApi for MemoryPolicyApi {
    async fn list_rules(&self, policy_id: &str, query: &ListQuery) -> SyncResult<Page<RemoteRule>> {
        if let Some(filter) = &query.filter {
            self.check_filter(filter)?;
        }
        tokio::task::yield_now().await;

        let mut store = self.lock();
        store.calls.push(Call::ListRules {
            filter: query.filter.clone(),
            offset: query.offset,
        });
        if store.fail_list {
            return Err(status(503, "Service Unavailable"));
        }

        let wanted = match &query.filter {
            Some(filter) => Some(parse_filter(filter).ok_or_else(|| status(400, "bad filter"))?),
            None => None,
        };
        let matching: Vec<&StoredRule> = store
            .rules
            .iter()
            .filter(|s| s.policy_id == policy_id)
            .filter(|s| match &wanted {
                Some((FilterKey::Ids, ids)) => s.rule.id.as_ref().map_or(false, |id| ids.contains(id)),
                Some((FilterKey::Names, names)) => names.contains(&s.rule.name),
                None => true,
            })
            .collect();

        let limit = query.limit.min(self.page_cap);
        let items: Vec<RemoteRule> = matching
            .iter()
            .skip(query.offset)
            .take(limit)
            .map(|s| RemoteRule {
                rule: backend_filled(&s.rule),
                metadata: store.metadata(policy_id, &s.destination),
            })
            .collect();
        let has_next = query.offset + items.len() < matching.len();

        store.tick_pending_delete();
        Ok(Page { items, has_next })
    }

    async fn bulk_create_rules(
        &self,
        policy_id: &str,
        destination: &Destination,
        rules: &[Rule],
    ) -> SyncResult<Vec<RemoteRule>> {
        tokio::task::yield_now().await;

        let mut store = self.lock();
        store.calls.push(Call::BulkCreate {
            destination: destination.clone(),
            count: rules.len(),
        });
        store.create_calls += 1;
        if store.fail_create_on == Some(store.create_calls) {
            return Err(status(500, "Internal Server Error"));
        }
        if let Destination::Category(name) = destination {
            let exists = store
                .categories
                .iter()
                .any(|c| c.policy_id == policy_id && &c.category.name == name);
            if !exists {
                return Err(status(400, "category does not exist"));
            }
        }

        let mut created = Vec::with_capacity(rules.len());
        for rule in rules {
            store.next_id += 1;
            let stored = Rule {
                id: Some(format!("rule-{:04}", store.next_id)),
                ..rule.clone()
            };
            created.push(RemoteRule {
                rule: backend_filled(&stored),
                metadata: store.metadata(policy_id, destination),
            });
            store.rules.push(StoredRule {
                policy_id: policy_id.to_string(),
                destination: destination.clone(),
                rule: stored,
            });
        }
        Ok(created)
    }

    async fn bulk_delete_rules(&self, policy_id: &str, filter: &str) -> SyncResult<()> {
        self.check_filter(filter)?;
        tokio::task::yield_now().await;

        let ids = match parse_filter(filter) {
            Some((FilterKey::Ids, ids)) => ids,
            _ => return Err(status(400, "bulk delete requires an ids filter")),
        };

        let mut store = self.lock();
        store.calls.push(Call::BulkDelete { count: ids.len() });
        let lag = store.delete_lag;
        if lag > 0 {
            let mut pending = store.pending_delete.take().map(|(ids, _)| ids).unwrap_or_default();
            pending.extend(ids);
            store.pending_delete = Some((pending, lag));
        } else {
            store
                .rules
                .retain(|s| s.policy_id != policy_id || !s.rule.id.as_ref().map_or(false, |id| ids.contains(id)));
        }
        Ok(())
    }

    async fn list_categories(&self, policy_id: &str, query: &ListQuery) -> SyncResult<Page<Category>> {
        let mut store = self.lock();
        store.calls.push(Call::ListCategories { offset: query.offset });

        let matching: Vec<&StoredCategory> = store.categories.iter().filter(|c| c.policy_id == policy_id).collect();
        let limit = query.limit.min(self.page_cap);
        let items: Vec<Category> = matching
            .iter()
            .skip(query.offset)
            .take(limit)
            .map(|c| c.category.clone())
            .collect();
        let has_next = query.offset + items.len() < matching.len();
        Ok(Page { items, has_next })
    }

    async fn create_category(&self, policy_id: &str, category: &Category) -> SyncResult<Category> {
        tokio::task::yield_now().await;

        let mut store = self.lock();
        store.calls.push(Call::CreateCategory {
            name: category.name.clone(),
        });
        if store
            .categories
            .iter()
            .any(|c| c.policy_id == policy_id && c.category.name == category.name)
        {
            return Err(status(409, "category already exists"));
        }

        store.next_id += 1;
        let created = Category {
            id: Some(format!("cat-{:04}", store.next_id)),
            ..category.clone()
        };
        store.categories.push(StoredCategory {
            policy_id: policy_id.to_string(),
            category: created.clone(),
        });
        Ok(created)
    }

    async fn delete_category(&self, policy_id: &str, category_id: &str) -> SyncResult<()> {
        let mut store = self.lock();
        store.calls.push(Call::DeleteCategory {
            id: category_id.to_string(),
        });
        let before = store.categories.len();
        store
            .categories
            .retain(|c| c.policy_id != policy_id || c.category.id.as_deref() != Some(category_id));
        if store.categories.len() == before {
            return Err(status(404, "category not found"));
        }
        Ok(())
    }
}
