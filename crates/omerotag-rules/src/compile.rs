//! Rule compilation: records → validated rules → path tree and lookup indexes.

use std::collections::{BTreeMap, BTreeSet};

use omerotag_core::{CapabilityRegistry, Error, Result};

use crate::record::RuleRecord;
use crate::rule::{AttributeRule, NameRule, Rule};
use crate::tree::PathTree;
use crate::validate::PathValidator;

/// Attribute rules indexed by the object type owning each condition's leaf attribute.
#[derive(Clone, Debug, Default)]
pub struct AttributeIndex {
    rules: Vec<AttributeRule>,
    by_owner: BTreeMap<String, Vec<usize>>,
}

impl AttributeIndex {
    fn push(&mut self, rule: AttributeRule) {
        let idx = self.rules.len();
        for condition in &rule.conditions {
            let slot = self.by_owner.entry(condition.owner().to_string()).or_default();
            if !slot.contains(&idx) {
                slot.push(idx);
            }
        }
        self.rules.push(rule);
    }

    /// Rules with at least one condition on an attribute of `kind`, in declaration order,
    /// each with its position in `all()`.
    pub fn for_type<'a>(&'a self, kind: &str) -> impl Iterator<Item = (usize, &'a AttributeRule)> + 'a {
        self.by_owner
            .get(kind)
            .into_iter()
            .flatten()
            .map(move |&i| (i, &self.rules[i]))
    }

    pub fn get(&self, index: usize) -> Option<&AttributeRule> {
        self.rules.get(index)
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.by_owner.keys().map(|k| k.as_str())
    }

    pub fn all(&self) -> &[AttributeRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Everything the evaluator needs, fixed after compilation.
#[derive(Clone, Debug, Default)]
pub struct CompiledRules {
    pub name_rules: Vec<NameRule>,
    pub attr_rules: AttributeIndex,
    pub attr_names: BTreeSet<String>,
    pub path_tree: PathTree,
}

impl CompiledRules {
    /// Name rules that target objects of `kind`.
    pub fn name_rules_for<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a NameRule> + 'a {
        self.name_rules.iter().filter(move |r| r.object_type == kind)
    }

    pub fn root_types(&self) -> impl Iterator<Item = &str> {
        self.path_tree.segments()
    }

    /// Whether `segment` is read as an attribute rather than walked as a collection.
    pub fn is_attribute(&self, segment: &str) -> bool {
        self.attr_names.contains(segment)
    }
}

/// Compile raw records. Any malformed record aborts the whole compilation.
pub fn compile(records: Vec<RuleRecord>, registry: &CapabilityRegistry) -> Result<CompiledRules> {
    let rules = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| Rule::try_from(record).map_err(|e| at_rule(i, e)))
        .collect::<Result<Vec<_>>>()?;
    compile_rules(rules, registry)
}

/// Compile rules that were already built, validating every attribute path.
pub fn compile_rules(rules: Vec<Rule>, registry: &CapabilityRegistry) -> Result<CompiledRules> {
    let validator = PathValidator::new(registry);
    let mut compiled = CompiledRules::default();

    for (i, rule) in rules.into_iter().enumerate() {
        match rule {
            Rule::Name(rule) => {
                compiled.path_tree.ensure_root(&rule.object_type);
                compiled.name_rules.push(rule);
            }
            Rule::Attribute(rule) => {
                for condition in &rule.conditions {
                    validator.validate(&condition.path).map_err(|e| at_rule(i, e))?;
                    compiled.path_tree.insert_path(&condition.path);
                    compiled.attr_names.insert(condition.leaf().to_string());
                }
                compiled.attr_rules.push(rule);
            }
        }
    }

    tracing::info!(
        "Compiled {} name rules and {} attribute rules over {} root types",
        compiled.name_rules.len(),
        compiled.attr_rules.len(),
        compiled.path_tree.segments().count()
    );
    Ok(compiled)
}

fn at_rule(index: usize, err: Error) -> Error {
    match err {
        Error::Compile(msg) => Error::compile(format!("rule #{}: {}", index + 1, msg)),
        other => other,
    }
}
