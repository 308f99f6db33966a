//! Wire mapping
//! 内核模型与远端 JSON 结构之间的映射

use rulesync_engine::{Action, Category, NetworkLiteral, ObjectRef, PortLiteral, Rule, UrlLiteral, VlanTagLiteral};
use serde::{Deserialize, Serialize};

use super::{Page, RemoteRule, RuleMetadata};
use crate::error::{SyncError, SyncResult};

/// 匹配条件容器：`{"objects": [...], "literals": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(deserialize = "L: Deserialize<'de>"))]
pub struct Criteria<L = serde_json::Value> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<ObjectRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literals: Option<Vec<L>>,
}

impl<L> Criteria<L> {
    fn pack(objects: &Option<Vec<ObjectRef>>, literals: Option<Vec<L>>) -> Option<Self> {
        if objects.is_none() && literals.is_none() {
            return None;
        }
        Some(Self {
            objects: objects.clone(),
            literals,
        })
    }
}

fn unpack<L>(criteria: &mut Option<Criteria<L>>) -> (Option<Vec<ObjectRef>>, Option<Vec<L>>) {
    match criteria.take() {
        Some(c) => (c.objects, c.literals),
        None => (None, None),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortLiteralBody {
    #[serde(rename = "type", default = "port_literal_type")]
    pub kind: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<String>,
}

fn port_literal_type() -> String {
    "PortLiteral".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlLiteralBody {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VlanTagBody {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub start_tag: u16,
    pub end_tag: u16,
}

/// 策略引用：`{"id": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataBody {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
}

/// 访问规则的线格式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_zones: Option<Criteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_zones: Option<Criteria>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_networks: Option<Criteria<NetworkLiteral>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_networks: Option<Criteria<NetworkLiteral>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ports: Option<Criteria<PortLiteralBody>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ports: Option<Criteria<PortLiteralBody>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Criteria<UrlLiteralBody>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_tags: Option<Criteria<VlanTagBody>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_begin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_end: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_files: Option<bool>,
    #[serde(rename = "sendEventsToFMC", default, skip_serializing_if = "Option::is_none")]
    pub send_events_to_fmc: Option<bool>,
    #[serde(rename = "enableSyslog", default, skip_serializing_if = "Option::is_none")]
    pub send_syslog: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ips_policy: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_policy: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_set: Option<IdRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog_config: Option<IdRef>,

    #[serde(default, skip_serializing)]
    pub metadata: Option<MetadataBody>,
}

fn id_ref(id: &Option<String>) -> Option<IdRef> {
    id.as_ref().map(|id| IdRef { id: id.clone() })
}

impl RuleBody {
    /// 构造批量创建请求体（归属通过查询参数传递，不进请求体）
    pub fn from_rule(rule: &Rule) -> Self {
        let port_literals = rule.destination_port_literals.as_ref().map(|literals| {
            literals
                .iter()
                .map(|l| PortLiteralBody {
                    kind: l.kind.clone().unwrap_or_else(port_literal_type),
                    protocol: l.protocol.clone(),
                    port: l.port.clone(),
                    icmp_type: l.icmp_type.clone(),
                })
                .collect()
        });
        let url_literals = rule.url_literals.as_ref().map(|literals| {
            literals
                .iter()
                .map(|l| UrlLiteralBody {
                    kind: Some("Url".to_string()),
                    url: l.url.clone(),
                })
                .collect()
        });
        let vlan_literals = rule.vlan_tag_literals.as_ref().map(|literals| {
            literals
                .iter()
                .map(|l| VlanTagBody {
                    kind: Some("VlanTagLiteral".to_string()),
                    start_tag: l.start_tag,
                    end_tag: l.end_tag,
                })
                .collect()
        });

        Self {
            id: None,
            kind: Some("AccessRule".to_string()),
            name: rule.name.clone(),
            action: rule.action,
            enabled: rule.enabled,
            source_zones: Criteria::pack(&rule.source_zones, None),
            destination_zones: Criteria::pack(&rule.destination_zones, None),
            source_networks: Criteria::pack(&rule.source_network_objects, rule.source_network_literals.clone()),
            destination_networks: Criteria::pack(
                &rule.destination_network_objects,
                rule.destination_network_literals.clone(),
            ),
            source_ports: Criteria::pack(&rule.source_port_objects, None),
            destination_ports: Criteria::pack(&rule.destination_port_objects, port_literals),
            urls: Criteria::pack(&None, url_literals),
            vlan_tags: Criteria::pack(&None, vlan_literals),
            log_begin: rule.log_begin,
            log_end: rule.log_end,
            log_files: rule.log_files,
            send_events_to_fmc: rule.send_events_to_fmc,
            send_syslog: rule.send_syslog,
            description: rule.description.clone(),
            ips_policy: id_ref(&rule.intrusion_policy_id),
            file_policy: id_ref(&rule.file_policy_id),
            variable_set: id_ref(&rule.variable_set_id),
            syslog_config: id_ref(&rule.syslog_config_id),
            metadata: None,
        }
    }

    /// 解析远端返回的规则，远端规则必须带 id
    pub fn into_remote(mut self) -> SyncResult<RemoteRule> {
        let id = self
            .id
            .take()
            .ok_or_else(|| SyncError::RemoteError(format!("rule {:?} returned without id", self.name)))?;

        let (source_zones, _) = unpack(&mut self.source_zones);
        let (destination_zones, _) = unpack(&mut self.destination_zones);
        let (source_network_objects, source_network_literals) = unpack(&mut self.source_networks);
        let (destination_network_objects, destination_network_literals) = unpack(&mut self.destination_networks);
        let (source_port_objects, _) = unpack(&mut self.source_ports);
        let (destination_port_objects, port_literals) = unpack(&mut self.destination_ports);
        let (_, url_literals) = unpack(&mut self.urls);
        let (_, vlan_literals) = unpack(&mut self.vlan_tags);

        let rule = Rule {
            id: Some(id),
            enabled: self.enabled,
            source_zones,
            destination_zones,
            source_network_objects,
            source_network_literals,
            destination_network_objects,
            destination_network_literals,
            source_port_objects,
            destination_port_objects,
            destination_port_literals: port_literals.map(|literals| {
                literals
                    .into_iter()
                    .map(|l| PortLiteral {
                        protocol: l.protocol,
                        port: l.port,
                        icmp_type: l.icmp_type,
                        kind: Some(l.kind),
                    })
                    .collect()
            }),
            url_literals: url_literals
                .map(|literals| literals.into_iter().map(|l| UrlLiteral { url: l.url }).collect()),
            vlan_tag_literals: vlan_literals.map(|literals| {
                literals
                    .into_iter()
                    .map(|l| VlanTagLiteral {
                        start_tag: l.start_tag,
                        end_tag: l.end_tag,
                    })
                    .collect()
            }),
            log_begin: self.log_begin,
            log_end: self.log_end,
            log_files: self.log_files,
            send_events_to_fmc: self.send_events_to_fmc,
            send_syslog: self.send_syslog,
            description: self.description,
            intrusion_policy_id: self.ips_policy.map(|r| r.id),
            file_policy_id: self.file_policy.map(|r| r.id),
            variable_set_id: self.variable_set.map(|r| r.id),
            syslog_config_id: self.syslog_config.map(|r| r.id),
            ..Rule::new(self.name, self.action)
        };

        let metadata = self.metadata.unwrap_or_default();
        Ok(RemoteRule {
            rule,
            metadata: RuleMetadata {
                category: metadata.category,
                section: metadata.section,
            },
        })
    }
}

/// 分类的线格式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing)]
    pub metadata: Option<MetadataBody>,
}

impl CategoryBody {
    pub fn from_category(category: &Category) -> Self {
        Self {
            id: None,
            name: category.name.clone(),
            kind: Some("Category".to_string()),
            metadata: None,
        }
    }

    /// 远端未返回区段时沿用 `fallback`
    pub fn into_category(self, fallback: rulesync_engine::Section) -> Category {
        let section = self
            .metadata
            .and_then(|m| m.section)
            .and_then(|s| s.parse().ok())
            .unwrap_or(fallback);
        Category {
            id: self.id,
            name: self.name,
            section,
        }
    }
}

/// 分页信息
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub pages: usize,
    #[serde(default)]
    pub next: Vec<String>,
}

/// 列表响应
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ListBody<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

impl<T> ListBody<T> {
    pub fn into_page<U, F>(self, convert: F) -> SyncResult<Page<U>>
    where
        F: FnMut(T) -> SyncResult<U>,
    {
        let has_next = self.paging.as_ref().map_or(false, |p| !p.next.is_empty());
        let items = self.items.into_iter().map(convert).collect::<SyncResult<Vec<U>>>()?;
        Ok(Page { items, has_next })
    }
}

/// 批量创建响应：`{"items": [...]}` 或裸数组
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged, bound(deserialize = "T: Deserialize<'de>"))]
pub enum BulkBody<T> {
    Wrapped { items: Vec<T> },
    Bare(Vec<T>),
}

impl<T> BulkBody<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            BulkBody::Wrapped { items } => items,
            BulkBody::Bare(items) => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let rule = Rule {
            enabled: Some(true),
            send_events_to_fmc: Some(true),
            source_network_literals: Some(vec![NetworkLiteral {
                value: "10.0.0.0/8".to_string(),
                kind: Some("Network".to_string()),
            }]),
            destination_port_literals: Some(vec![PortLiteral {
                protocol: "6".to_string(),
                port: Some("443".to_string()),
                icmp_type: None,
                kind: None,
            }]),
            intrusion_policy_id: Some("ips-1".to_string()),
            category_name: Some("Web".to_string()),
            ..Rule::new("allow-https", Action::Allow)
        };

        let body = serde_json::to_value(RuleBody::from_rule(&rule)).unwrap();
        assert_eq!(body["name"], "allow-https");
        assert_eq!(body["action"], "ALLOW");
        assert_eq!(body["sendEventsToFMC"], true);
        assert_eq!(body["sourceNetworks"]["literals"][0]["value"], "10.0.0.0/8");
        assert_eq!(body["destinationPorts"]["literals"][0]["type"], "PortLiteral");
        assert_eq!(body["ipsPolicy"]["id"], "ips-1");
        assert!(body.get("metadata").is_none());
        assert!(body.get("id").is_none());
        assert!(body.get("sourceZones").is_none());
    }

    #[test]
    fn test_parse_list_response() {
        let raw = json!({
            "items": [{
                "id": "rule-1",
                "type": "AccessRule",
                "name": "allow-https",
                "action": "ALLOW",
                "enabled": true,
                "sourceZones": {"objects": [{"id": "z1", "type": "SecurityZone", "name": "inside"}]},
                "destinationPorts": {"literals": [{"type": "PortLiteral", "protocol": "6", "port": "443"}]},
                "vlanTags": {"literals": [{"type": "VlanTagLiteral", "startTag": 10, "endTag": 20}]},
                "metadata": {"category": "--Undefined--", "section": "Mandatory", "ruleIndex": 1}
            }],
            "paging": {"offset": 0, "limit": 1, "count": 2, "pages": 2, "next": ["https://fmc/next"]}
        });

        let body: ListBody<RuleBody> = serde_json::from_value(raw).unwrap();
        let page = body.into_page(RuleBody::into_remote).unwrap();
        assert!(page.has_next);

        let remote = &page.items[0];
        assert_eq!(remote.rule.id.as_deref(), Some("rule-1"));
        assert_eq!(remote.rule.source_zones.as_ref().unwrap()[0].id, "z1");
        assert_eq!(
            remote.rule.destination_port_literals.as_ref().unwrap()[0].kind.as_deref(),
            Some("PortLiteral")
        );
        assert_eq!(remote.rule.vlan_tag_literals.as_ref().unwrap()[0].end_tag, 20);
        assert_eq!(remote.metadata.section.as_deref(), Some("Mandatory"));
    }

    #[test]
    fn test_rule_without_id_is_rejected() {
        let body: RuleBody = serde_json::from_value(json!({"name": "x", "action": "BLOCK"})).unwrap();
        assert!(body.into_remote().is_err());
    }

    #[test]
    fn test_bulk_response_forms() {
        let wrapped: BulkBody<CategoryBody> =
            serde_json::from_value(json!({"items": [{"id": "c1", "name": "Web"}]})).unwrap();
        assert_eq!(wrapped.into_items().len(), 1);

        let bare: BulkBody<CategoryBody> = serde_json::from_value(json!([{"id": "c1", "name": "Web"}])).unwrap();
        assert_eq!(bare.into_items()[0].name, "Web");
    }
}
