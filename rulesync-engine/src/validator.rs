//! Rank validator
//! 规则顺序校验器：为 (区段, 分类) 计算全序，拒绝违反该顺序的规则集
//! 纯函数，无 I/O，返回遇到的第一个违规

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::{Display, Formatter};
use thiserror::Error;

use crate::core::{Action, Category, Placement, Rule, RuleSet, Section, UNDEFINED_CATEGORY};

/// 单个规则集允许的最大分类数
pub const MAX_CATEGORIES: usize = 1000;
/// 单个规则集允许的最大规则数
pub const MAX_RULES: usize = 1000;

/// 规则在全序中的位置；`category` 为 `None` 表示该区段的未分类部分
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    pub section: Section,
    pub category: Option<String>,
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.category {
            Some(name) => write!(f, "category {:?} (section {})", name, self.section),
            None => write!(f, "uncategorized (section {})", self.section),
        }
    }
}

/// 违规信息中对一条规则的引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRef {
    /// 规则在声明列表中的下标（从 0 开始）
    pub index: usize,
    pub name: String,
    pub slot: Slot,
}

impl Display for RuleRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "rules[{}] {:?} in {}", self.index, self.name, self.slot)
    }
}

/// 校验错误：在任何远端调用之前检出，原样报告给调用方
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("{count} categories exceed the limit of {limit}")]
    TooManyCategories { count: usize, limit: usize },

    #[error("{count} rules exceed the limit of {limit}")]
    TooManyRules { count: usize, limit: usize },

    #[error("categories[{index}] has an empty name")]
    EmptyCategoryName { index: usize },

    #[error("category name {name:?} is declared more than once")]
    DuplicateCategory { name: String },

    #[error("category name \"--Undefined--\" is reserved ({context})")]
    ReservedCategoryName { context: String },

    #[error(
        "categories[{index}] {name:?} belongs to the mandatory section but follows a default-section category; \
         mandatory-section categories must all come before default-section categories"
    )]
    SectionPartition { index: usize, name: String },

    #[error("rules[{index}] has an empty name")]
    EmptyRuleName { index: usize },

    #[error("rule name {name:?} is declared more than once")]
    DuplicateRuleName { name: String },

    #[error("rules[{index}] {rule:?} sets both category_name and section; at most one of them may be set")]
    CategoryAndSection { index: usize, rule: String },

    #[error("rules[{index}] {rule:?} references unknown category {category:?}")]
    UnknownCategory {
        index: usize,
        rule: String,
        category: String,
    },

    #[error("rules[{index}] {rule:?} has action MONITOR, which {reason}")]
    MonitorLogging {
        index: usize,
        rule: String,
        reason: &'static str,
    },

    #[error("a rule set cannot declare both categories and a placement")]
    MixedOwnership,

    #[error("the conflicting-placement sentinel is not a valid declaration")]
    SentinelPlacement,

    #[error(
        "rules[{index}] {rule:?} sets its own category_name or section, \
         but the rule set places every rule in {placement}"
    )]
    RuleOverridesPlacement {
        index: usize,
        rule: String,
        placement: Placement,
    },

    #[error(
        "{rule} cannot follow {predecessor}. Rules must be listed in four tiers: \
         (1) rules of mandatory-section categories, in category order; \
         (2) uncategorized rules of the mandatory section; \
         (3) rules of default-section categories, in category order; \
         (4) uncategorized rules of the default section"
    )]
    Ordering { rule: RuleRef, predecessor: RuleRef },
}

/// 排名表：(区段, 分类名) → 排名；空分类名代表该区段的未分类部分
struct RankTable<'a> {
    ranks: FxHashMap<(Section, &'a str), usize>,
    sections: FxHashMap<&'a str, Section>,
}

impl<'a> RankTable<'a> {
    /// 在分区边界 `insertion_point` 处插入 (mandatory, "") 合成节点，
    /// 并在末尾追加排名为 +∞ 的 (default, "") 合成节点
    fn build(categories: &'a [Category], insertion_point: usize) -> Self {
        let mut ranks = FxHashMap::default();
        let mut sections = FxHashMap::default();
        let mut next = 0usize;

        for (index, category) in categories.iter().enumerate() {
            if index == insertion_point {
                ranks.insert((Section::Mandatory, ""), next);
                next += 1;
            }
            ranks.insert((category.section, category.name.as_str()), next);
            sections.insert(category.name.as_str(), category.section);
            next += 1;
        }
        if insertion_point >= categories.len() {
            ranks.insert((Section::Mandatory, ""), next);
        }
        ranks.insert((Section::Default, ""), usize::MAX);

        Self { ranks, sections }
    }

    fn slot_of(&self, index: usize, rule: &Rule) -> Result<Slot, Violation> {
        match &rule.category_name {
            Some(name) => {
                let section = self.sections.get(name.as_str()).copied().ok_or_else(|| {
                    Violation::UnknownCategory {
                        index,
                        rule: rule.name.clone(),
                        category: name.clone(),
                    }
                })?;
                Ok(Slot {
                    section,
                    category: Some(name.clone()),
                })
            }
            None => Ok(Slot {
                section: rule.section.unwrap_or(Rule::DEFAULT_SECTION),
                category: None,
            }),
        }
    }

    fn rank_of(&self, slot: &Slot) -> usize {
        let key = (slot.section, slot.category.as_deref().unwrap_or(""));
        // 所有分类及两个合成节点在构建时均已登记
        self.ranks.get(&key).copied().unwrap_or(usize::MAX)
    }
}

/// 规则顺序校验器
pub struct RankValidator;

impl RankValidator {
    /// 校验完整规则集（含归属模式检查）
    pub fn validate_rule_set(rule_set: &RuleSet) -> Result<(), Violation> {
        let has_categories = rule_set
            .categories
            .as_ref()
            .map_or(false, |c| !c.is_empty());

        match &rule_set.placement {
            Some(_) if has_categories => Err(Violation::MixedOwnership),
            Some(Placement::Conflicting) => Err(Violation::SentinelPlacement),
            Some(placement) => Self::validate_single_placement(placement, &rule_set.rules),
            None => Self::validate(rule_set.declared_categories(), &rule_set.rules),
        }
    }

    /// 校验分类序列与规则序列
    ///
    /// # 步骤
    /// 1. 数量上限
    /// 2. 分类必须是 mandatory 前缀 + default 后缀，记录分界点
    /// 3. 构建排名表
    /// 4. 按声明顺序遍历规则，排名不得回退
    pub fn validate(categories: &[Category], rules: &[Rule]) -> Result<(), Violation> {
        // 1. 数量上限
        Self::check_limits(categories.len(), rules.len())?;

        // 2. 分区检查，同时确定分界点
        let insertion_point = Self::check_partition(categories)?;

        // 3. 排名表
        let table = RankTable::build(categories, insertion_point);

        // 4. 逐条规则检查
        let mut names = FxHashSet::default();
        let mut reached = 0usize;
        let mut previous: Option<RuleRef> = None;

        for (index, rule) in rules.iter().enumerate() {
            Self::check_rule(index, rule, &mut names)?;

            let slot = table.slot_of(index, rule)?;
            let rank = table.rank_of(&slot);
            let current = RuleRef {
                index,
                name: rule.name.clone(),
                slot,
            };

            if rank < reached {
                if let Some(predecessor) = previous {
                    log::debug!("ordering violation at rules[{}]: rank {} < {}", index, rank, reached);
                    return Err(Violation::Ordering {
                        rule: current,
                        predecessor,
                    });
                }
            }

            reached = rank;
            previous = Some(current);
        }

        Ok(())
    }

    /// 单一归属模式：所有规则写入同一位置，不存在排序问题
    fn validate_single_placement(placement: &Placement, rules: &[Rule]) -> Result<(), Violation> {
        Self::check_limits(0, rules.len())?;

        if let Placement::Category(name) = placement {
            if name == UNDEFINED_CATEGORY {
                return Err(Violation::ReservedCategoryName {
                    context: "placement".to_string(),
                });
            }
            if name.is_empty() {
                return Err(Violation::EmptyCategoryName { index: 0 });
            }
        }

        let mut names = FxHashSet::default();
        for (index, rule) in rules.iter().enumerate() {
            Self::check_rule(index, rule, &mut names)?;
            if rule.category_name.is_some() || rule.section.is_some() {
                return Err(Violation::RuleOverridesPlacement {
                    index,
                    rule: rule.name.clone(),
                    placement: placement.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_limits(categories: usize, rules: usize) -> Result<(), Violation> {
        if categories > MAX_CATEGORIES {
            return Err(Violation::TooManyCategories {
                count: categories,
                limit: MAX_CATEGORIES,
            });
        }
        if rules > MAX_RULES {
            return Err(Violation::TooManyRules {
                count: rules,
                limit: MAX_RULES,
            });
        }
        Ok(())
    }

    /// 返回第一个 default 区段分类的下标（全为 mandatory 时返回 `len`）
    fn check_partition(categories: &[Category]) -> Result<usize, Violation> {
        let mut insertion_point = categories.len();
        let mut names = FxHashSet::default();

        for (index, category) in categories.iter().enumerate() {
            if category.name.is_empty() {
                return Err(Violation::EmptyCategoryName { index });
            }
            if category.name == UNDEFINED_CATEGORY {
                return Err(Violation::ReservedCategoryName {
                    context: format!("categories[{}]", index),
                });
            }
            if !names.insert(category.name.as_str()) {
                return Err(Violation::DuplicateCategory {
                    name: category.name.clone(),
                });
            }

            match category.section {
                Section::Default if insertion_point == categories.len() => insertion_point = index,
                Section::Mandatory if insertion_point < index => {
                    return Err(Violation::SectionPartition {
                        index,
                        name: category.name.clone(),
                    });
                }
                _ => {}
            }
        }

        Ok(insertion_point)
    }

    /// 与排名无关的单条规则检查
    fn check_rule<'a>(index: usize, rule: &'a Rule, names: &mut FxHashSet<&'a str>) -> Result<(), Violation> {
        if rule.name.is_empty() {
            return Err(Violation::EmptyRuleName { index });
        }
        if !names.insert(rule.name.as_str()) {
            return Err(Violation::DuplicateRuleName {
                name: rule.name.clone(),
            });
        }
        if rule.category_name.is_some() && rule.section.is_some() {
            return Err(Violation::CategoryAndSection {
                index,
                rule: rule.name.clone(),
            });
        }
        if rule.category_name.as_deref() == Some(UNDEFINED_CATEGORY) {
            return Err(Violation::ReservedCategoryName {
                context: format!("rules[{}] {:?}", index, rule.name),
            });
        }
        if rule.action == Action::Monitor {
            let reason = if rule.log_begin == Some(true) {
                Some("must not set log_begin = true")
            } else if rule.log_end != Some(true) {
                Some("requires log_end = true")
            } else if rule.send_events_to_fmc != Some(true) {
                Some("requires send_events_to_fmc = true")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(Violation::MonitorLogging {
                    index,
                    rule: rule.name.clone(),
                    reason,
                });
            }
        }
        Ok(())
    }
}
