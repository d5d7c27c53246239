//! Capability registry: maps (object type, accessor name) to a zero-argument accessor.
//!
//! Accessors follow the `get<Name>` / `list<Name>` convention. Lookup is tolerant of
//! case, and the registry can be extended at startup through `CapabilityExtension`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::inflect::{capitalize, singular};
use crate::object::{describe, GraphObject};
use crate::value::Value;

/// Reads one property of a graph object.
pub type Accessor = Arc<dyn Fn(&dyn GraphObject) -> Result<Value> + Send + Sync>;

/// A resolved accessor together with the name it was found under.
#[derive(Clone)]
pub struct Capability {
    name: String,
    accessor: Accessor,
    missing: bool,
}

impl Capability {
    pub fn new(name: impl Into<String>, accessor: Accessor) -> Self {
        Self {
            name: name.into(),
            accessor,
            missing: false,
        }
    }

    /// Stand-in for a property nobody provides. Invoking it yields `Value::Missing`.
    pub fn missing(property: &str) -> Self {
        let property = property.to_string();
        let reported = property.clone();
        Self {
            name: property,
            accessor: Arc::new(move |_: &dyn GraphObject| Ok(Value::Missing(reported.clone()))),
            missing: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_missing(&self) -> bool {
        self.missing
    }

    pub fn invoke(&self, obj: &dyn GraphObject) -> Result<Value> {
        (self.accessor)(obj)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("missing", &self.missing)
            .finish()
    }
}

/// Startup hook that adds capabilities before any lookup happens.
pub trait CapabilityExtension {
    /// Label used in log lines.
    fn name(&self) -> &str;

    fn install(&self, registry: &mut CapabilityRegistry) -> Result<()>;
}

/// Accessors every object answers regardless of type.
const BUILTIN: &[&str] = &["getName", "getId"];

fn builtin_accessor(method: &str) -> Option<Accessor> {
    match method {
        "getName" => Some(Arc::new(|o: &dyn GraphObject| Ok(Value::Text(o.name())))),
        "getId" => Some(Arc::new(|o: &dyn GraphObject| Ok(Value::Number(o.id() as f64)))),
        _ => None,
    }
}

#[derive(Default)]
pub struct CapabilityRegistry {
    types: HashMap<String, BTreeMap<String, Accessor>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a type with no accessors beyond the builtins.
    pub fn register_type(&mut self, kind: &str) {
        self.types.entry(kind.to_string()).or_default();
    }

    /// Register an accessor. Replaces any existing accessor with the same name.
    pub fn register(&mut self, kind: &str, method: &str, accessor: Accessor) {
        self.types
            .entry(kind.to_string())
            .or_default()
            .insert(method.to_string(), accessor);
    }

    /// Register an accessor that reads a backing field. An unset field reads as null.
    pub fn register_field(&mut self, kind: &str, method: &str, field: &str) {
        let field = field.to_string();
        self.register(
            kind,
            method,
            Arc::new(move |o: &dyn GraphObject| Ok(o.field(&field).unwrap_or(Value::Null))),
        );
    }

    pub fn install(&mut self, extension: &dyn CapabilityExtension) -> Result<()> {
        let before = self.method_count();
        extension.install(self)?;
        tracing::info!(
            "Installed capability extension {} ({} accessors added)",
            extension.name(),
            self.method_count().saturating_sub(before)
        );
        Ok(())
    }

    pub fn is_known(&self, kind: &str) -> bool {
        self.types.contains_key(kind)
    }

    /// The registered type a path segment names, trying the segment and then its singular.
    pub fn known_type(&self, segment: &str) -> Option<String> {
        if self.is_known(segment) {
            return Some(segment.to_string());
        }
        singular(segment).filter(|s| self.is_known(s))
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.types.keys().map(|s| s.as_str()).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Accessor names declared for a type, builtins included.
    pub fn methods(&self, kind: &str) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .types
            .get(kind)
            .map(|m| m.keys().map(|s| s.as_str()).collect())
            .unwrap_or_default();
        names.extend(BUILTIN.iter().copied());
        names
    }

    pub fn method_count(&self) -> usize {
        self.types.values().map(|m| m.len()).sum()
    }

    /// Case-insensitive scan of a type's declared names for `get<attr>` or `list<attr>`.
    fn scan(&self, kind: &str, attr: &str) -> Option<Capability> {
        let lower = attr.to_lowercase();
        let wanted = [format!("get{}", lower), format!("list{}", lower)];
        let declared = self.types.get(kind);
        if let Some(methods) = declared {
            for (name, accessor) in methods {
                if wanted.contains(&name.to_lowercase()) {
                    return Some(Capability::new(name.clone(), accessor.clone()));
                }
            }
        }
        BUILTIN
            .iter()
            .find(|name| wanted.contains(&name.to_lowercase()))
            .and_then(|name| builtin_accessor(name).map(|a| Capability::new(*name, a)))
    }

    fn exact(&self, kind: &str, method: &str) -> Option<Capability> {
        self.types
            .get(kind)
            .and_then(|m| m.get(method))
            .map(|a| Capability::new(method, a.clone()))
    }

    /// Static lookup against a type, without an instance. Used by path validation.
    pub fn resolve_type(&self, kind: &str, attr: &str) -> Option<Capability> {
        if let Some(cap) = self.scan(kind, attr) {
            return Some(cap);
        }
        let (get, list) = conventional_names(attr);
        self.exact(kind, &get).or_else(|| self.exact(kind, &list))
    }

    /// Full lookup on an instance.
    ///
    /// Declared accessors of the object's type come first, then the instance's own
    /// `get<Name>` and `list<Name>`. When nothing answers, a diagnostic is logged and the
    /// returned capability reports the property as missing when invoked.
    pub fn resolve(&self, obj: &dyn GraphObject, attr: &str) -> Capability {
        if let Some(cap) = self.scan(obj.kind(), attr) {
            return cap;
        }
        let (get, list) = conventional_names(attr);
        for method in [get, list] {
            if obj.responds_to(&method) {
                let name = method.clone();
                return Capability::new(
                    method,
                    Arc::new(move |o: &dyn GraphObject| {
                        o.call(&name)
                            .ok_or_else(|| Error::traversal(describe(o), format!("{} stopped answering", name)))
                    }),
                );
            }
        }
        tracing::warn!("No accessor for {} on {}", attr, describe(obj));
        Capability::missing(attr)
    }
}

fn conventional_names(attr: &str) -> (String, String) {
    let normalized = capitalize(&attr.to_lowercase());
    (format!("get{}", normalized), format!("list{}", normalized))
}
