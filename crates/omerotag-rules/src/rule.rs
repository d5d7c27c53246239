//! Validated rule types.
//!
//! Records become rules through builders that fill every default explicitly and
//! reject conflicting keys, so nothing downstream ever sees a half-specified rule.

use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use omerotag_core::value::format_number;
use omerotag_core::{Error, Result, Value};

use crate::record::{RawValue, RuleRecord};
use crate::template::FormatTemplate;

pub const DEFAULT_FORMAT: &str = "{}";
pub const DEFAULT_OBJECT: &str = "image";

// ---------------------------------------------------------------------------
// Operators and literals
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Gt,
    Lt,
    Eq,
    Ge,
    Le,
    Ne,
    Match,
}

impl Operator {
    pub const ALL: [Operator; 7] = [
        Self::Gt,
        Self::Lt,
        Self::Eq,
        Self::Ge,
        Self::Le,
        Self::Ne,
        Self::Match,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Eq => "eq",
            Self::Ge => "ge",
            Self::Le => "le",
            Self::Ne => "ne",
            Self::Match => "match",
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::compile(format!("unknown operation: {}", s)))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a condition.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

impl Literal {
    /// Numeric when the text parses as a number, text otherwise.
    pub fn coerce(raw: &RawValue) -> Self {
        match raw {
            RawValue::Number(n) => Self::Number(*n),
            RawValue::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            RawValue::Text(s) => match s.trim().parse::<f64>() {
                Ok(n) => Self::Number(n),
                Err(_) => Self::Text(s.clone()),
            },
        }
    }

    fn equals(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Number(n), v) => v.as_number() == Some(*n),
            (Self::Text(t), Value::Text(s)) => s == t,
            _ => false,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

/// An ordering comparison between values that have no common ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Incomparable {
    pub operator: Operator,
    pub found: &'static str,
    pub expected: Literal,
}

impl fmt::Display for Incomparable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot apply {} to a {} value and {}",
            self.operator, self.found, self.expected
        )
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Condition {
    pub path: Vec<String>,
    pub operator: Operator,
    pub value: Literal,
    pattern: Option<Regex>,
}

impl Condition {
    pub fn new(path: Vec<String>, operator: Operator, raw: &RawValue) -> Result<Self> {
        if path.len() < 2 {
            return Err(Error::compile(format!(
                "attribute path {:?} needs at least two items, the root object and the attribute",
                path
            )));
        }
        if let Some(empty) = path.iter().position(|s| s.trim().is_empty()) {
            return Err(Error::compile(format!(
                "attribute path {:?} has an empty segment at position {}",
                path, empty
            )));
        }
        let pattern = match operator {
            Operator::Match => {
                let source = match raw {
                    RawValue::Text(s) => s.clone(),
                    RawValue::Number(n) => format_number(*n),
                    RawValue::Bool(b) => b.to_string(),
                };
                let re = Regex::new(&source).map_err(|e| {
                    Error::compile(format!("invalid match pattern {:?}: {}", source, e))
                })?;
                Some(re)
            }
            _ => None,
        };
        Ok(Self {
            path,
            operator,
            value: Literal::coerce(raw),
            pattern,
        })
    }

    /// The attribute read at the end of the path.
    pub fn leaf(&self) -> &str {
        &self.path[self.path.len() - 1]
    }

    /// The object type that owns the leaf attribute.
    pub fn owner(&self) -> &str {
        &self.path[self.path.len() - 2]
    }

    /// Whether the leaf is read on the object reached by walking `owner_path`.
    pub fn is_owned_by<S: AsRef<str>>(&self, owner_path: &[S]) -> bool {
        self.path.len() == owner_path.len() + 1 && self.starts_with(owner_path)
    }

    /// The child segment this condition walks through below `at`, if its leaf lies deeper.
    pub fn branch_below<S: AsRef<str>>(&self, at: &[S]) -> Option<&str> {
        (self.path.len() > at.len() + 1 && self.starts_with(at)).then(|| self.path[at.len()].as_str())
    }

    fn starts_with<S: AsRef<str>>(&self, prefix: &[S]) -> bool {
        prefix.len() <= self.path.len()
            && self.path.iter().zip(prefix).all(|(a, b)| a == b.as_ref())
    }

    /// Apply the operator as `attribute <op> literal`.
    ///
    /// Equality never fails; values of different kinds are simply unequal. Ordering
    /// between unrelated kinds, and `match` against a value with no string form, are
    /// reported as `Incomparable`.
    pub fn test(&self, attribute: &Value) -> std::result::Result<bool, Incomparable> {
        let incomparable = || Incomparable {
            operator: self.operator,
            found: attribute.kind(),
            expected: self.value.clone(),
        };
        match self.operator {
            Operator::Eq => Ok(self.value.equals(attribute)),
            Operator::Ne => Ok(!self.value.equals(attribute)),
            Operator::Match => {
                let subject = attribute.string_form().ok_or_else(incomparable)?;
                Ok(self.pattern.as_ref().is_some_and(|re| re.is_match(&subject)))
            }
            op => match (&self.value, attribute) {
                (Literal::Number(b), v) => {
                    let a = v.as_number().ok_or_else(incomparable)?;
                    Ok(compare(op, a, *b))
                }
                (Literal::Text(b), Value::Text(a)) => Ok(compare(op, a.as_str(), b.as_str())),
                _ => Err(incomparable()),
            },
        }
    }
}

fn compare<T: PartialOrd>(op: Operator, a: T, b: T) -> bool {
    match op {
        Operator::Gt => a > b,
        Operator::Lt => a < b,
        Operator::Ge => a >= b,
        Operator::Le => a <= b,
        Operator::Eq => a == b,
        Operator::Ne => a != b,
        Operator::Match => false,
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.path.join("."), self.operator, self.value)
    }
}

// ---------------------------------------------------------------------------
// Name rules
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct NameRule {
    pub capture: Regex,
    pub format: FormatTemplate,
    pub object_type: String,
    pub include_extension: bool,
    pub blacklist: BTreeSet<String>,
}

impl NameRule {
    pub fn builder(capture: impl Into<String>) -> NameRuleBuilder {
        NameRuleBuilder {
            capture: capture.into(),
            format: DEFAULT_FORMAT.to_string(),
            object: DEFAULT_OBJECT.to_string(),
            include_extension: false,
            blacklist: Vec::new(),
        }
    }

    /// Number of capture groups in the pattern.
    pub fn groups(&self) -> usize {
        self.capture.captures_len() - 1
    }
}

#[derive(Clone, Debug)]
pub struct NameRuleBuilder {
    capture: String,
    format: String,
    object: String,
    include_extension: bool,
    blacklist: Vec<String>,
}

impl NameRuleBuilder {
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn object(mut self, object: impl Into<String>) -> Self {
        self.object = object.into();
        self
    }

    pub fn include_extension(mut self, include: bool) -> Self {
        self.include_extension = include;
        self
    }

    pub fn blacklist<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.blacklist = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> Result<NameRule> {
        let capture = Regex::new(&self.capture).map_err(|e| {
            Error::compile(format!("invalid capture regex {:?}: {}", self.capture, e))
        })?;
        let groups = capture.captures_len() - 1;
        if groups < 1 {
            return Err(Error::compile(format!(
                "capture regex {:?} has no capture groups",
                self.capture
            )));
        }
        let format = FormatTemplate::parse(&self.format).map_err(Error::compile)?;
        format.check(groups).map_err(|e| {
            Error::compile(format!(
                "capture {:?} yields {} values but format {:?} expects otherwise: {}",
                self.capture, groups, self.format, e
            ))
        })?;
        if self.object.trim().is_empty() {
            return Err(Error::compile("name rule object type is empty"));
        }
        Ok(NameRule {
            capture,
            format,
            object_type: self.object,
            include_extension: self.include_extension,
            blacklist: self.blacklist.into_iter().collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Attribute rules
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct AttributeRule {
    pub name: String,
    pub absolute: bool,
    pub conditions: Vec<Condition>,
}

impl AttributeRule {
    pub fn builder(name: impl Into<String>) -> AttributeRuleBuilder {
        AttributeRuleBuilder {
            name: name.into(),
            absolute: true,
            conditions: Vec::new(),
        }
    }

    /// Conditions whose leaf attribute is read on the object reached by `owner_path`.
    pub fn conditions_at<'a, S: AsRef<str>>(
        &'a self,
        owner_path: &'a [S],
    ) -> impl Iterator<Item = &'a Condition> + 'a {
        self.conditions.iter().filter(move |c| c.is_owned_by(owner_path))
    }

    /// Child segments below `at` that some condition still has to walk through.
    pub fn branches_below<S: AsRef<str>>(&self, at: &[S]) -> BTreeSet<&str> {
        self.conditions.iter().filter_map(|c| c.branch_below(at)).collect()
    }
}

#[derive(Clone, Debug)]
pub struct AttributeRuleBuilder {
    name: String,
    absolute: bool,
    conditions: Vec<(Vec<String>, String, RawValue)>,
}

impl AttributeRuleBuilder {
    pub fn absolute(mut self, absolute: bool) -> Self {
        self.absolute = absolute;
        self
    }

    pub fn condition<P, S>(mut self, path: P, operation: &str, value: impl Into<RawValue>) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions.push((
            path.into_iter().map(Into::into).collect(),
            operation.to_string(),
            value.into(),
        ));
        self
    }

    pub fn build(self) -> Result<AttributeRule> {
        if self.name.trim().is_empty() {
            return Err(Error::compile("attribute rule has an empty tag name"));
        }
        if self.conditions.is_empty() {
            return Err(Error::compile(format!("no rules provided for tag {:?}", self.name)));
        }
        let conditions = self
            .conditions
            .into_iter()
            .map(|(path, op, value)| {
                let operator = op.parse::<Operator>()?;
                Condition::new(path, operator, &value)
            })
            .collect::<Result<Vec<_>>>()
            .map_err(|e| match e {
                Error::Compile(msg) => Error::compile(format!("tag {:?}: {}", self.name, msg)),
                other => other,
            })?;
        Ok(AttributeRule {
            name: self.name,
            absolute: self.absolute,
            conditions,
        })
    }
}

// ---------------------------------------------------------------------------
// Records → rules
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub enum Rule {
    Name(NameRule),
    Attribute(AttributeRule),
}

impl TryFrom<RuleRecord> for Rule {
    type Error = Error;

    fn try_from(record: RuleRecord) -> Result<Self> {
        match (&record.capture, &record.name) {
            (Some(_), Some(_)) => Err(Error::compile(
                "\"capture\" and \"name\" are incompatible; did you mean \"format\"?",
            )),
            (None, None) => Err(Error::compile(
                "rule has neither \"capture\" (name rule) nor \"name\" (attribute rule)",
            )),
            (Some(_), None) => name_rule_from(record).map(Rule::Name),
            (None, Some(_)) => attribute_rule_from(record).map(Rule::Attribute),
        }
    }
}

fn name_rule_from(record: RuleRecord) -> Result<NameRule> {
    let stray = record.attribute_rule_keys();
    if !stray.is_empty() {
        return Err(Error::compile(format!(
            "name rule carries attribute rule keys: {}",
            stray.join(", ")
        )));
    }
    let mut builder = NameRule::builder(record.capture.unwrap_or_default());
    if let Some(format) = record.format {
        builder = builder.format(format);
    }
    if let Some(object) = record.object {
        builder = builder.object(object);
    }
    if let Some(include) = record.include_extension {
        builder = builder.include_extension(include);
    }
    if let Some(blacklist) = record.blacklist {
        builder = builder.blacklist(blacklist);
    }
    builder.build()
}

fn attribute_rule_from(record: RuleRecord) -> Result<AttributeRule> {
    let stray = record.name_rule_keys();
    let name = record.name.unwrap_or_default();
    if !stray.is_empty() {
        return Err(Error::compile(format!(
            "attribute rule {:?} carries name rule keys: {}",
            name,
            stray.join(", ")
        )));
    }
    let Some(conditions) = record.rules else {
        return Err(Error::compile(format!("no rules provided for tag {:?}", name)));
    };
    let mut builder = AttributeRule::builder(name.clone());
    if let Some(absolute) = record.absolute {
        builder = builder.absolute(absolute);
    }
    for condition in conditions {
        match (condition.attribute_path, condition.operation, condition.value) {
            (Some(path), Some(op), Some(value)) => {
                builder = builder.condition(path, &op, value);
            }
            (path, op, value) => {
                return Err(Error::compile(format!(
                    "incomplete rule for tag {:?}: path: {:?}, operation: {:?}, value: {:?}",
                    name, path, op, value
                )));
            }
        }
    }
    builder.build()
}
