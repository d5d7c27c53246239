//! Graph objects and the tag entities linked to them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

pub type ObjectId = i64;
pub type TagId = i64;
pub type LinkId = i64;

/// A node of the external object graph.
///
/// Implementations expose raw fields by name; the capability registry decides which
/// accessor names map onto which fields. `call` is the instance-level escape hatch for
/// accessors a type never declared up front.
pub trait GraphObject: fmt::Debug + Send + Sync {
    fn id(&self) -> ObjectId;

    /// Type name as used in attribute paths (e.g. "image").
    fn kind(&self) -> &str;

    /// Display name.
    fn name(&self) -> String;

    /// Read a backing field.
    fn field(&self, name: &str) -> Option<Value>;

    /// Whether the instance answers `method` without a registered capability.
    fn responds_to(&self, _method: &str) -> bool {
        false
    }

    /// Invoke an instance-level accessor. Only meaningful when `responds_to` is true.
    fn call(&self, _method: &str) -> Option<Value> {
        None
    }
}

pub type ObjectRef = Arc<dyn GraphObject>;

/// Human-readable label for log lines.
pub fn describe(obj: &dyn GraphObject) -> String {
    format!("{} {} ({:?})", obj.kind(), obj.id(), obj.name())
}

/// Store-side identity of a tag value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntity {
    pub id: TagId,
    pub value: String,
    #[serde(default)]
    pub description: String,
}

/// An annotation link on an object.
#[derive(Clone, Debug, PartialEq)]
pub enum Annotation {
    Tag { link_id: LinkId, tag: TagEntity },
    Other { link_id: LinkId, kind: String },
}

impl Annotation {
    pub fn link_id(&self) -> LinkId {
        match self {
            Self::Tag { link_id, .. } | Self::Other { link_id, .. } => *link_id,
        }
    }

    /// Tag value when this is a tag annotation.
    pub fn tag_value(&self) -> Option<&str> {
        match self {
            Self::Tag { tag, .. } => Some(&tag.value),
            Self::Other { .. } => None,
        }
    }
}
