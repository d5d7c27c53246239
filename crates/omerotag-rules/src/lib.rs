//! omerotag rules - rule records, validation, and compilation into a traversal tree

pub mod compile;
pub mod record;
pub mod rule;
pub mod template;
pub mod tree;
pub mod validate;

pub use compile::{compile, compile_rules, AttributeIndex, CompiledRules};
pub use record::{ConditionRecord, RawValue, RuleRecord};
pub use rule::{
    AttributeRule, AttributeRuleBuilder, Condition, Incomparable, Literal, NameRule,
    NameRuleBuilder, Operator, Rule,
};
pub use template::FormatTemplate;
pub use tree::PathTree;
pub use validate::PathValidator;
