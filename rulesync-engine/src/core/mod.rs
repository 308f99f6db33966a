pub mod enums;
pub mod rule;
pub mod rule_set;

pub use enums::{Action, Destination, Placement, Section, UNDEFINED_CATEGORY};
pub use rule::{NetworkLiteral, ObjectRef, PortLiteral, Rule, UrlLiteral, VlanTagLiteral};
pub use rule_set::{Category, RuleSet};
