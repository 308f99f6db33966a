use serde::{Deserialize, Serialize};

use super::enums::{Action, Destination, Section};

/// 对象引用（安全区、网络对象、端口对象、URL对象等），以 id 作为匹配键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ObjectRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            name: None,
        }
    }
}

/// 网络字面量（Host/Network/Range），以 value 作为匹配键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkLiteral {
    pub value: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// 端口字面量，无 id，以 (protocol, port, icmp_type) 三元组作为匹配键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortLiteral {
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icmp_type: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// URL 字面量
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UrlLiteral {
    pub url: String,
}

/// VLAN 标签范围字面量，以 (start_tag, end_tag) 作为匹配键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VlanTagLiteral {
    pub start_tag: u16,
    pub end_tag: u16,
}

/// 访问控制规则
///
/// `category_name` 与 `section` 至多设置其一；二者都未设置时，
/// 规则属于 default 区段的未分类部分。
/// `Option` 字段为 `None` 表示调用方未声明该字段。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    // 匹配条件集合
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_zones: Option<Vec<ObjectRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_zones: Option<Vec<ObjectRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_network_objects: Option<Vec<ObjectRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_network_literals: Option<Vec<NetworkLiteral>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_network_objects: Option<Vec<ObjectRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_network_literals: Option<Vec<NetworkLiteral>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port_objects: Option<Vec<ObjectRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port_objects: Option<Vec<ObjectRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port_literals: Option<Vec<PortLiteral>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_literals: Option<Vec<UrlLiteral>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_tag_literals: Option<Vec<VlanTagLiteral>>,

    // 日志开关
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_begin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_end: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_files: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_events_to_fmc: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_syslog: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    // 策略引用
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intrusion_policy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_policy_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syslog_config_id: Option<String>,
}

impl Rule {
    /// 声明默认值：远端在未显式设置时回填这些值
    pub const DEFAULT_ENABLED: bool = true;
    pub const DEFAULT_LOG_FLAG: bool = false;
    pub const DEFAULT_SECTION: Section = Section::Default;

    pub fn new(name: impl Into<String>, action: Action) -> Self {
        Self {
            id: None,
            name: name.into(),
            action,
            category_name: None,
            section: None,
            enabled: None,
            source_zones: None,
            destination_zones: None,
            source_network_objects: None,
            source_network_literals: None,
            destination_network_objects: None,
            destination_network_literals: None,
            source_port_objects: None,
            destination_port_objects: None,
            destination_port_literals: None,
            url_literals: None,
            vlan_tag_literals: None,
            log_begin: None,
            log_end: None,
            log_files: None,
            send_events_to_fmc: None,
            send_syslog: None,
            description: None,
            intrusion_policy_id: None,
            file_policy_id: None,
            variable_set_id: None,
            syslog_config_id: None,
        }
    }

    /// 规则自身声明的创建目标（分类优先，其次区段，缺省为 default 区段）
    pub fn destination(&self) -> Destination {
        match &self.category_name {
            Some(name) => Destination::Category(name.clone()),
            None => Destination::Section(self.section.unwrap_or(Self::DEFAULT_SECTION)),
        }
    }
}
