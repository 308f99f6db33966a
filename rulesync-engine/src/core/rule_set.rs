use serde::{Deserialize, Serialize};

use super::enums::{Placement, Section};
use super::rule::Rule;

/// 规则分类：有序、具名、带区段归属
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub section: Section,
}

impl Category {
    pub fn new(name: impl Into<String>, section: Section) -> Self {
        Self {
            id: None,
            name: name.into(),
            section,
        }
    }
}

/// 作为一个整体声明与同步的有序规则集
///
/// 两种互斥的归属模式：
/// - `categories`：规则集自己管理一组有序分类，规则按 `category_name`/`section` 逐条归属
/// - `placement`：所有规则写入同一个（外部管理的）分类或区段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// 远端访问控制策略 id
    pub policy_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(policy_id: impl Into<String>) -> Self {
        Self {
            policy_id: policy_id.into(),
            categories: None,
            placement: None,
            rules: Vec::new(),
        }
    }

    /// 声明的分类（未管理分类时为空切片）
    pub fn declared_categories(&self) -> &[Category] {
        self.categories.as_deref().unwrap_or(&[])
    }

    /// 所有已知的远端规则 id
    pub fn rule_ids(&self) -> Vec<String> {
        self.rules.iter().filter_map(|r| r.id.clone()).collect()
    }

    /// 所有已知的远端分类 id
    pub fn category_ids(&self) -> Vec<String> {
        self.declared_categories()
            .iter()
            .filter_map(|c| c.id.clone())
            .collect()
    }
}
