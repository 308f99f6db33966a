//! Partial reconciler
//! 把新拉取的远端快照逐字段合并进本地状态
//!
//! 标量字段：
//! - `Partial` 模式下本地缺省的字段保持缺省（不接收调用方未声明的字段）
//! - 否则取远端值；远端缺省则本地清空
//! - 有声明默认值的字段，在 `Partial` 模式下远端值等于默认值时清空
//!
//! 集合字段：按元素自身声明的复合键匹配（而不是按位置），
//! 匹配到的元素递归合并，匹配不到的本地元素视为已被带外删除并剪除。
//! 两种模式的集合匹配算法完全相同。

use rustc_hash::FxHashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::core::{
    Category, NetworkLiteral, ObjectRef, PortLiteral, Rule, RuleSet, UrlLiteral, VlanTagLiteral,
};

/// 合并模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// 接收先前缺省的字段（接管已有远端对象后使用）
    Full,
    /// 只刷新调用方已声明的字段（常规刷新）
    Partial,
}

/// 集合元素的匹配键提取策略（1~3 个自身字段）
pub trait Keyed {
    type Key: Eq + Hash + Ord + Clone + Debug;

    fn key(&self) -> Self::Key;
}

/// 用同类型的远端值就地合并
pub trait Reconcile {
    fn reconcile(&mut self, remote: &Self, mode: ReconcileMode);
}

/// 合并无声明默认值的可选标量字段
pub fn merge_scalar<T: Clone>(local: &mut Option<T>, remote: Option<&T>, mode: ReconcileMode) {
    if mode == ReconcileMode::Partial && local.is_none() {
        return;
    }
    *local = remote.cloned();
}

/// 合并带声明默认值的可选标量字段
pub fn merge_scalar_with_default<T: Clone + PartialEq>(
    local: &mut Option<T>,
    remote: Option<&T>,
    default: &T,
    mode: ReconcileMode,
) {
    if mode == ReconcileMode::Partial {
        if local.is_none() {
            return;
        }
        if remote == Some(default) {
            *local = None;
            return;
        }
    }
    *local = remote.cloned();
}

/// 合并可选集合字段：集合整体按标量规则取舍，存在时逐元素按键合并
pub fn merge_collection<T>(local: &mut Option<Vec<T>>, remote: Option<&Vec<T>>, mode: ReconcileMode)
where
    T: Keyed + Reconcile + Clone,
{
    match (local.as_mut(), remote) {
        (None, _) if mode == ReconcileMode::Partial => {}
        (_, None) => *local = None,
        (None, Some(remote)) => *local = Some(remote.clone()),
        (Some(items), Some(remote)) => {
            reconcile_keyed(items, remote, mode);
        }
    }
}

/// 按键匹配合并一个集合，返回被剪除的本地元素数量
///
/// 本地元素的顺序保持不变；远端中多出的元素不会被加入
pub fn reconcile_keyed<T>(local: &mut Vec<T>, remote: &[T], mode: ReconcileMode) -> usize
where
    T: Keyed + Reconcile,
{
    let mut index: FxHashMap<T::Key, &T> = FxHashMap::default();
    for item in remote {
        index.entry(item.key()).or_insert(item);
    }

    let before = local.len();
    local.retain_mut(|item| match index.get(&item.key()) {
        Some(remote_item) => {
            item.reconcile(remote_item, mode);
            true
        }
        None => {
            log::warn!("element {:?} no longer exists remotely, pruning it", item.key());
            false
        }
    });
    before - local.len()
}

// ===================== 各集合元素的匹配键 =====================

impl Keyed for ObjectRef {
    type Key = String;

    fn key(&self) -> Self::Key {
        self.id.clone()
    }
}

impl Keyed for NetworkLiteral {
    type Key = String;

    fn key(&self) -> Self::Key {
        self.value.clone()
    }
}

impl Keyed for PortLiteral {
    type Key = (String, Option<String>, Option<String>);

    fn key(&self) -> Self::Key {
        (self.protocol.clone(), self.port.clone(), self.icmp_type.clone())
    }
}

impl Keyed for UrlLiteral {
    type Key = String;

    fn key(&self) -> Self::Key {
        self.url.clone()
    }
}

impl Keyed for VlanTagLiteral {
    type Key = (u16, u16);

    fn key(&self) -> Self::Key {
        (self.start_tag, self.end_tag)
    }
}

impl Keyed for Rule {
    type Key = String;

    fn key(&self) -> Self::Key {
        self.id.clone().unwrap_or_default()
    }
}

impl Keyed for Category {
    type Key = String;

    fn key(&self) -> Self::Key {
        self.id.clone().unwrap_or_default()
    }
}

// ===================== 各类型的逐字段合并 =====================

impl Reconcile for ObjectRef {
    fn reconcile(&mut self, remote: &Self, mode: ReconcileMode) {
        merge_scalar(&mut self.kind, remote.kind.as_ref(), mode);
        merge_scalar(&mut self.name, remote.name.as_ref(), mode);
    }
}

impl Reconcile for NetworkLiteral {
    fn reconcile(&mut self, remote: &Self, mode: ReconcileMode) {
        merge_scalar(&mut self.kind, remote.kind.as_ref(), mode);
    }
}

impl Reconcile for PortLiteral {
    fn reconcile(&mut self, remote: &Self, mode: ReconcileMode) {
        merge_scalar(&mut self.kind, remote.kind.as_ref(), mode);
    }
}

// 只有键字段
impl Reconcile for UrlLiteral {
    fn reconcile(&mut self, _remote: &Self, _mode: ReconcileMode) {}
}

impl Reconcile for VlanTagLiteral {
    fn reconcile(&mut self, _remote: &Self, _mode: ReconcileMode) {}
}

impl Reconcile for Category {
    fn reconcile(&mut self, remote: &Self, _mode: ReconcileMode) {
        self.name = remote.name.clone();
        self.section = remote.section;
    }
}

impl Reconcile for Rule {
    fn reconcile(&mut self, remote: &Self, mode: ReconcileMode) {
        use ReconcileMode::Partial;

        if remote.id.is_some() {
            self.id = remote.id.clone();
        }
        self.name = remote.name.clone();
        self.action = remote.action;

        merge_scalar(&mut self.category_name, remote.category_name.as_ref(), mode);
        merge_scalar_with_default(&mut self.section, remote.section.as_ref(), &Rule::DEFAULT_SECTION, mode);
        merge_scalar_with_default(&mut self.enabled, remote.enabled.as_ref(), &Rule::DEFAULT_ENABLED, mode);

        merge_collection(&mut self.source_zones, remote.source_zones.as_ref(), mode);
        merge_collection(&mut self.destination_zones, remote.destination_zones.as_ref(), mode);
        merge_collection(&mut self.source_network_objects, remote.source_network_objects.as_ref(), mode);
        merge_collection(&mut self.source_network_literals, remote.source_network_literals.as_ref(), mode);
        merge_collection(&mut self.destination_network_objects, remote.destination_network_objects.as_ref(), mode);
        merge_collection(&mut self.destination_network_literals, remote.destination_network_literals.as_ref(), mode);
        merge_collection(&mut self.source_port_objects, remote.source_port_objects.as_ref(), mode);
        merge_collection(&mut self.destination_port_objects, remote.destination_port_objects.as_ref(), mode);
        merge_collection(&mut self.destination_port_literals, remote.destination_port_literals.as_ref(), mode);
        merge_collection(&mut self.url_literals, remote.url_literals.as_ref(), mode);
        merge_collection(&mut self.vlan_tag_literals, remote.vlan_tag_literals.as_ref(), mode);

        let flag = &Rule::DEFAULT_LOG_FLAG;
        merge_scalar_with_default(&mut self.log_begin, remote.log_begin.as_ref(), flag, mode);
        merge_scalar_with_default(&mut self.log_end, remote.log_end.as_ref(), flag, mode);
        merge_scalar_with_default(&mut self.log_files, remote.log_files.as_ref(), flag, mode);
        merge_scalar_with_default(&mut self.send_events_to_fmc, remote.send_events_to_fmc.as_ref(), flag, mode);
        merge_scalar_with_default(&mut self.send_syslog, remote.send_syslog.as_ref(), flag, mode);

        merge_scalar(&mut self.description, remote.description.as_ref(), mode);
        merge_scalar(&mut self.intrusion_policy_id, remote.intrusion_policy_id.as_ref(), mode);
        merge_scalar(&mut self.file_policy_id, remote.file_policy_id.as_ref(), mode);
        merge_scalar(&mut self.variable_set_id, remote.variable_set_id.as_ref(), mode);
        merge_scalar(&mut self.syslog_config_id, remote.syslog_config_id.as_ref(), mode);

        // 分类与区段互斥：远端给出分类时不保留本地区段
        if mode != Partial && self.category_name.is_some() {
            self.section = None;
        }
    }
}

impl Reconcile for RuleSet {
    fn reconcile(&mut self, remote: &Self, mode: ReconcileMode) {
        merge_collection(&mut self.categories, remote.categories.as_ref(), mode);
        merge_scalar(&mut self.placement, remote.placement.as_ref(), mode);
        let pruned = reconcile_keyed(&mut self.rules, &remote.rules, mode);
        if pruned > 0 {
            log::warn!("{} rule(s) of policy {} were deleted out of band", pruned, self.policy_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Action, Placement, Section};

    fn remote_rule(id: &str, name: &str) -> Rule {
        Rule {
            id: Some(id.to_string()),
            category_name: Some("Web".to_string()),
            enabled: Some(true),
            log_begin: Some(false),
            log_end: Some(true),
            log_files: Some(false),
            send_events_to_fmc: Some(false),
            send_syslog: Some(false),
            description: Some("from backend".to_string()),
            source_zones: Some(vec![
                ObjectRef {
                    id: "z1".to_string(),
                    kind: Some("SecurityZone".to_string()),
                    name: Some("inside".to_string()),
                },
                ObjectRef {
                    id: "z2".to_string(),
                    kind: Some("SecurityZone".to_string()),
                    name: Some("dmz".to_string()),
                },
            ]),
            destination_port_literals: Some(vec![PortLiteral {
                protocol: "6".to_string(),
                port: Some("443".to_string()),
                icmp_type: None,
                kind: Some("PortLiteral".to_string()),
            }]),
            ..Rule::new(name, Action::Allow)
        }
    }

    fn local_rule(id: &str, name: &str) -> Rule {
        Rule {
            id: Some(id.to_string()),
            category_name: Some("Web".to_string()),
            log_end: Some(true),
            source_zones: Some(vec![ObjectRef::new("z1"), ObjectRef::new("z2")]),
            ..Rule::new(name, Action::Allow)
        }
    }

    #[test]
    fn test_partial_mode_keeps_undeclared_fields_absent() {
        let mut local = local_rule("1", "r1");
        local.reconcile(&remote_rule("1", "r1"), ReconcileMode::Partial);

        assert_eq!(local.description, None);
        assert_eq!(local.enabled, None);
        assert_eq!(local.destination_port_literals, None);
        assert_eq!(local.log_end, Some(true));
        // 集合元素内部同样遵循 partial 规则
        let zones = local.source_zones.as_ref().unwrap();
        assert_eq!(zones[0].kind, None);
    }

    #[test]
    fn test_partial_mode_clears_backend_defaults() {
        let mut local = Rule {
            enabled: Some(true),
            send_syslog: Some(false),
            ..local_rule("1", "r1")
        };
        local.reconcile(&remote_rule("1", "r1"), ReconcileMode::Partial);
        assert_eq!(local.enabled, None);
        assert_eq!(local.send_syslog, None);

        let mut local = Rule {
            enabled: Some(true),
            ..local_rule("1", "r1")
        };
        let remote = Rule {
            enabled: Some(false),
            ..remote_rule("1", "r1")
        };
        local.reconcile(&remote, ReconcileMode::Partial);
        assert_eq!(local.enabled, Some(false));
    }

    #[test]
    fn test_full_mode_adopts_everything() {
        let mut local = local_rule("1", "r1");
        let remote = remote_rule("1", "r1");
        local.reconcile(&remote, ReconcileMode::Full);
        assert_eq!(local, remote);
    }

    #[test]
    fn test_remote_omission_clears_declared_field() {
        let mut local = Rule {
            description: Some("mine".to_string()),
            ..local_rule("1", "r1")
        };
        let remote = Rule {
            description: None,
            ..remote_rule("1", "r1")
        };
        local.reconcile(&remote, ReconcileMode::Partial);
        assert_eq!(local.description, None);
    }

    #[test]
    fn test_pruning_removes_only_missing_element() {
        let mut local = Rule {
            source_zones: Some(vec![
                ObjectRef {
                    id: "z1".to_string(),
                    kind: Some("SecurityZone".to_string()),
                    name: Some("inside".to_string()),
                },
                ObjectRef::new("gone"),
                ObjectRef {
                    id: "z2".to_string(),
                    kind: Some("SecurityZone".to_string()),
                    name: Some("dmz".to_string()),
                },
            ]),
            ..local_rule("1", "r1")
        };
        let untouched = local.source_zones.clone().unwrap();

        local.reconcile(&remote_rule("1", "r1"), ReconcileMode::Partial);

        let zones = local.source_zones.unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0], untouched[0]);
        assert_eq!(zones[1], untouched[2]);
    }

    #[test]
    fn test_compound_key_matching() {
        let mut local = vec![
            PortLiteral {
                protocol: "6".to_string(),
                port: Some("80".to_string()),
                icmp_type: None,
                kind: None,
            },
            PortLiteral {
                protocol: "17".to_string(),
                port: Some("53".to_string()),
                icmp_type: None,
                kind: Some("PortLiteral".to_string()),
            },
        ];
        let remote = vec![PortLiteral {
            protocol: "17".to_string(),
            port: Some("53".to_string()),
            icmp_type: None,
            kind: Some("PortLiteral".to_string()),
        }];
        let pruned = reconcile_keyed(&mut local, &remote, ReconcileMode::Full);
        assert_eq!(pruned, 1);
        assert_eq!(local, remote);
    }

    #[test]
    fn test_rule_set_matches_rules_by_id_not_position() {
        let mut local = RuleSet::new("policy");
        local.rules = vec![local_rule("1", "r1"), local_rule("2", "r2"), local_rule("3", "r3")];

        let mut remote = RuleSet::new("policy");
        // 远端顺序不同，且 r2 已被带外删除
        remote.rules = vec![remote_rule("3", "r3-renamed"), remote_rule("1", "r1")];
        remote.placement = Some(Placement::Category("Web".to_string()));

        local.reconcile(&remote, ReconcileMode::Partial);

        let names: Vec<&str> = local.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["r1", "r3-renamed"]);
        assert_eq!(local.placement, None);
    }

    #[test]
    fn test_partial_reconcile_is_idempotent() {
        let mut remote = RuleSet::new("policy");
        remote.rules = vec![remote_rule("1", "r1"), remote_rule("2", "r2")];
        remote.placement = Some(Placement::Section(Section::Mandatory));

        let mut state = RuleSet::new("policy");
        state.placement = Some(Placement::Section(Section::Mandatory));
        state.rules = vec![
            Rule {
                enabled: Some(true),
                ..local_rule("1", "r1")
            },
            local_rule("2", "r2"),
        ];

        state.reconcile(&remote, ReconcileMode::Partial);
        let first = serde_json::to_vec(&state).unwrap();
        state.reconcile(&remote, ReconcileMode::Partial);
        let second = serde_json::to_vec(&state).unwrap();
        assert_eq!(first, second);
    }
}
