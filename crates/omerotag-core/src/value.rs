//! Values produced by accessor capabilities.

use std::fmt;

use crate::object::ObjectRef;

/// What an accessor returns when invoked on a graph object.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// A typed wrapper around a scalar (unit-carrying lengths and the like).
    /// The evaluator unwraps it exactly once.
    Boxed(Box<Value>),
    /// A child collection.
    Objects(Vec<ObjectRef>),
    /// Returned by the fallback capability when no accessor exists for a property.
    Missing(String),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn boxed(inner: Value) -> Self {
        Self::Boxed(Box::new(inner))
    }

    /// Strip one level of boxing, if any.
    pub fn unwrap_boxed(self) -> Value {
        match self {
            Self::Boxed(inner) => *inner,
            other => other,
        }
    }

    /// Numeric view used by ordering comparisons. Booleans count as 0/1.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// String form used by regex matching. Collections and absent values have none.
    pub fn string_form(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Bool(b) => Some(b.to_string()),
            Self::Boxed(inner) => inner.string_form(),
            Self::Null | Self::Objects(_) | Self::Missing(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Boxed(_) => "boxed",
            Self::Objects(_) => "objects",
            Self::Missing(_) => "missing",
        }
    }
}

/// Integral floats print without a fractional part so `6000.0` reads as `6000`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Boxed(a), Self::Boxed(b)) => a == b,
            (Self::Missing(a), Self::Missing(b)) => a == b,
            (Self::Objects(a), Self::Objects(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id() == y.id())
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Number(n) => write!(f, "{}", format_number(*n)),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Boxed(inner) => write!(f, "<{}>", inner),
            Self::Objects(objs) => write!(f, "[{} objects]", objs.len()),
            Self::Missing(name) => write!(f, "<missing {}>", name),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
