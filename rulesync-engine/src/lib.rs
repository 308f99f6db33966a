// 核心公共结构体+枚举
pub mod core;
// 内核错误定义
pub mod error;
// 规则顺序校验（Rank Validator）
pub mod validator;
// 批次切分（数量 + 编码长度双上限）
pub mod batching;
// 远端分类/区段一致性推断
pub mod consensus;
// 远端快照 → 本地状态的部分合并
pub mod reconcile;
// 期望状态与当前状态的替换判定
pub mod diff;

// 顶层导出常用类型
pub use self::core::{
    Action, Category, Destination, NetworkLiteral, ObjectRef, Placement, PortLiteral, Rule,
    RuleSet, Section, UrlLiteral, VlanTagLiteral, UNDEFINED_CATEGORY,
};
pub use error::{CoreError, CoreResult};
pub use validator::{RankValidator, RuleRef, Slot, Violation, MAX_CATEGORIES, MAX_RULES};
pub use batching::{chunk_by_count, encoded_len, FilterBatch, FilterBatcher};
pub use consensus::infer_consensus;
pub use reconcile::{Keyed, Reconcile, ReconcileMode};
pub use diff::needs_replacement;
