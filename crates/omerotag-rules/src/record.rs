//! Rule records as they arrive from a rule file, before validation.

use serde::{Deserialize, Serialize};

/// One entry of a rule file. Carries `capture` for a name rule or `name` + `rules` for an
/// attribute rule; which fields are legal together is checked by `Rule::try_from`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_extension: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blacklist: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<ConditionRecord>>,
}

impl RuleRecord {
    /// Keys only a name rule may carry that are present on this record.
    pub(crate) fn name_rule_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.format.is_some() {
            keys.push("format");
        }
        if self.object.is_some() {
            keys.push("object");
        }
        if self.include_extension.is_some() {
            keys.push("include_extension");
        }
        if self.blacklist.is_some() {
            keys.push("blacklist");
        }
        keys
    }

    /// Keys only an attribute rule may carry that are present on this record.
    pub(crate) fn attribute_rule_keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.absolute.is_some() {
            keys.push("absolute");
        }
        if self.rules.is_some() {
            keys.push("rules");
        }
        keys
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionRecord {
    #[serde(default)]
    pub attribute_path: Option<Vec<String>>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default)]
    pub value: Option<RawValue>,
}

/// A comparison value as written. Numbers and numeric-looking strings become numeric
/// literals during compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<i32> for RawValue {
    fn from(n: i32) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}
