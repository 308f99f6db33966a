//! 替换判定
//! 远端没有重排/定点插入原语，任何规则或分类的增删改、重排都意味着整体销毁后重建。
//! 这里只判断"内容是否等价"：忽略 id，补齐声明默认值，集合按键排序后比较。

use crate::core::{
    Category, NetworkLiteral, ObjectRef, PortLiteral, Rule, RuleSet, Section, UrlLiteral, VlanTagLiteral,
};
use crate::reconcile::Keyed;

/// 当前状态与期望声明是否需要整体替换
pub fn needs_replacement(current: &RuleSet, desired: &RuleSet) -> bool {
    if current.policy_id != desired.policy_id {
        return true;
    }
    if current.placement != desired.placement {
        log::debug!(
            "placement differs ({:?} -> {:?}), replacement required",
            current.placement,
            desired.placement
        );
        return true;
    }
    if canonical_categories(current.declared_categories()) != canonical_categories(desired.declared_categories()) {
        log::debug!("category list differs, replacement required");
        return true;
    }
    if current.rules.len() != desired.rules.len() {
        log::debug!(
            "rule count differs ({} -> {}), replacement required",
            current.rules.len(),
            desired.rules.len()
        );
        return true;
    }

    current
        .rules
        .iter()
        .zip(&desired.rules)
        .any(|(have, want)| canonical_rule(have) != canonical_rule(want))
}

fn canonical_categories(categories: &[Category]) -> Vec<(&str, Section)> {
    categories.iter().map(|c| (c.name.as_str(), c.section)).collect()
}

/// 规范化一条规则：清除 id，补齐默认值，归一化集合
fn canonical_rule(rule: &Rule) -> Rule {
    let mut rule = rule.clone();
    rule.id = None;

    if rule.category_name.is_none() {
        rule.section.get_or_insert(Rule::DEFAULT_SECTION);
    }
    rule.enabled.get_or_insert(Rule::DEFAULT_ENABLED);
    for flag in [
        &mut rule.log_begin,
        &mut rule.log_end,
        &mut rule.log_files,
        &mut rule.send_events_to_fmc,
        &mut rule.send_syslog,
    ] {
        flag.get_or_insert(Rule::DEFAULT_LOG_FLAG);
    }

    for refs in [
        &mut rule.source_zones,
        &mut rule.destination_zones,
        &mut rule.source_network_objects,
        &mut rule.destination_network_objects,
        &mut rule.source_port_objects,
        &mut rule.destination_port_objects,
    ] {
        canonical_collection(refs, |r: &ObjectRef| ObjectRef::new(r.id.clone()));
    }
    for literals in [&mut rule.source_network_literals, &mut rule.destination_network_literals] {
        canonical_collection(literals, |l: &NetworkLiteral| NetworkLiteral {
            value: l.value.clone(),
            kind: None,
        });
    }
    canonical_collection(&mut rule.destination_port_literals, |l: &PortLiteral| PortLiteral {
        kind: None,
        ..l.clone()
    });
    canonical_collection(&mut rule.url_literals, UrlLiteral::clone);
    canonical_collection(&mut rule.vlan_tag_literals, VlanTagLiteral::clone);

    rule
}

/// 空集合视同缺省；元素去除服务端回填字段后按键排序
fn canonical_collection<T, F>(items: &mut Option<Vec<T>>, strip: F)
where
    T: Keyed,
    F: Fn(&T) -> T,
{
    *items = match items.take() {
        Some(list) if !list.is_empty() => {
            let mut list: Vec<T> = list.iter().map(&strip).collect();
            list.sort_by_key(|item| item.key());
            Some(list)
        }
        _ => None,
    };
}
