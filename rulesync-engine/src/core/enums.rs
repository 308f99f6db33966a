use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::CoreError;

/// 远端为"未分类"规则返回的保留分类名，本地声明中禁止使用
pub const UNDEFINED_CATEGORY: &str = "--Undefined--";

/// 区段：mandatory 永远排在 default 之前
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Mandatory,
    #[default]
    Default,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Mandatory => "mandatory",
            Section::Default => "default",
        }
    }
}

impl Display for Section {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 大小写不敏感解析（远端元数据返回 "Mandatory"/"Default"）
impl FromStr for Section {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("mandatory") {
            Ok(Section::Mandatory)
        } else if s.eq_ignore_ascii_case("default") {
            Ok(Section::Default)
        } else {
            Err(CoreError::MalformedRemote(format!("unknown section {:?}", s)))
        }
    }
}

/// 规则动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Allow,
    Block,
    BlockReset,
    Trust,
    Monitor,
    BlockInteractive,
    BlockResetInteractive,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "ALLOW",
            Action::Block => "BLOCK",
            Action::BlockReset => "BLOCK_RESET",
            Action::Trust => "TRUST",
            Action::Monitor => "MONITOR",
            Action::BlockInteractive => "BLOCK_INTERACTIVE",
            Action::BlockResetInteractive => "BLOCK_RESET_INTERACTIVE",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 规则集整体归属（单一归属模式）
/// `Conflicting` 是读取时推断出的哨兵值：远端规则的归属互相矛盾，
/// 它不等于任何合法声明，因此会迫使下游执行替换
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    Category(String),
    Section(Section),
    Conflicting,
}

impl Placement {
    /// 从远端元数据构造归属，`--Undefined--` 分类视为未分类
    pub fn from_metadata(category: Option<&str>, section: Option<&str>) -> Option<Placement> {
        if let Some(name) = category.filter(|c| !c.is_empty() && *c != UNDEFINED_CATEGORY) {
            return Some(Placement::Category(name.to_string()));
        }
        section
            .and_then(|s| s.parse::<Section>().ok())
            .map(Placement::Section)
    }
}

impl Display for Placement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Placement::Category(name) => write!(f, "category {:?}", name),
            Placement::Section(section) => write!(f, "section {}", section),
            Placement::Conflicting => f.write_str("<conflicting placement>"),
        }
    }
}

/// 批量创建的目标位置：分类名或区段
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Category(String),
    Section(Section),
}

impl Display for Destination {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Category(name) => write!(f, "category {:?}", name),
            Destination::Section(section) => write!(f, "section {}", section),
        }
    }
}

impl TryFrom<&Placement> for Destination {
    type Error = CoreError;

    fn try_from(placement: &Placement) -> Result<Self, Self::Error> {
        match placement {
            Placement::Category(name) => Ok(Destination::Category(name.clone())),
            Placement::Section(section) => Ok(Destination::Section(*section)),
            Placement::Conflicting => Err(CoreError::InvalidInput(
                "conflicting placement cannot be used as a create destination".to_string(),
            )),
        }
    }
}
