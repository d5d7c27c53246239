//! Recursive tree walker: reads leaf attributes, descends into child collections and
//! turns attribute rules into tag decisions.
//!
//! Every object answers, per attribute rule, whether the rule's conditions in its subtree
//! hold. A parent combines its own conditions with what its children answered, so a rule
//! spanning several levels is only satisfied when all of them agree. Among siblings one
//! satisfying child is enough.

use std::collections::{BTreeMap, BTreeSet};

use omerotag_core::inflect::{plural, singular};
use omerotag_core::object::describe;
use omerotag_core::{CapabilityRegistry, Error, ObjectRef, Result, Value};
use omerotag_rules::{AttributeRule, CompiledRules, PathTree};

/// Tags to apply and tags to remove for one object.
///
/// A value may sit in both sets when one rule is satisfied and another absolute rule
/// with the same tag name is violated; reconciliation keeps such a tag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagDecision {
    pub true_tags: BTreeSet<String>,
    pub false_tags: BTreeSet<String>,
}

impl TagDecision {
    pub fn merge(&mut self, other: TagDecision) {
        self.true_tags.extend(other.true_tags);
        self.false_tags.extend(other.false_tags);
    }

    pub fn is_empty(&self) -> bool {
        self.true_tags.is_empty() && self.false_tags.is_empty()
    }

    /// False tags that are not also true.
    pub fn removals(&self) -> impl Iterator<Item = &str> {
        self.false_tags
            .difference(&self.true_tags)
            .map(|s| s.as_str())
    }
}

/// Rule position in `AttributeIndex::all()` → satisfied (`true`) or violated (`false`).
/// Rules with no verdict had nothing to judge in the subtree.
type Verdicts = BTreeMap<usize, bool>;

pub struct Evaluator<'a> {
    registry: &'a CapabilityRegistry,
    rules: &'a CompiledRules,
}

impl<'a> Evaluator<'a> {
    pub fn new(registry: &'a CapabilityRegistry, rules: &'a CompiledRules) -> Self {
        Self { registry, rules }
    }

    /// Evaluate a root object against the subtree compiled for its type.
    pub fn evaluate_root(&self, obj: &ObjectRef, kind: &str) -> Result<TagDecision> {
        let Some(subtree) = self.rules.path_tree.get(kind) else {
            return Ok(TagDecision::default());
        };
        let verdicts = self.evaluate(obj, &[kind], subtree)?;

        let mut decision = TagDecision::default();
        for (index, satisfied) in verdicts {
            let Some(rule) = self.rules.attr_rules.get(index) else {
                continue;
            };
            if satisfied {
                decision.true_tags.insert(rule.name.clone());
            } else if rule.absolute {
                decision.false_tags.insert(rule.name.clone());
            }
        }
        Ok(decision)
    }

    /// Verdicts for `obj`, reached by walking `path` (root type first, `obj`'s segment last).
    ///
    /// Recoverable failures cost only the leaf, branch, child or rule they happened in.
    /// Store failures are returned.
    fn evaluate(&self, obj: &ObjectRef, path: &[&str], subtree: &PathTree) -> Result<Verdicts> {
        let mut readings: BTreeMap<&str, Value> = BTreeMap::new();
        let mut branches: BTreeMap<&str, Verdicts> = BTreeMap::new();

        for (segment, child_tree) in subtree.iter() {
            let outcome = if self.rules.is_attribute(segment) {
                self.read(obj, segment).map(|value| {
                    readings.insert(segment, value);
                })
            } else {
                self.descend(obj, path, segment, child_tree).map(|found| {
                    branches.insert(segment, found);
                })
            };
            match outcome {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Skipping {} on {}: {}", segment, describe(obj.as_ref()), e);
                }
                Err(e) => return Err(e),
            }
        }

        let kind = path[path.len() - 1];
        let mut candidates: BTreeSet<usize> = self
            .rules
            .attr_rules
            .for_type(kind)
            .filter(|(_, rule)| rule.conditions_at(path).next().is_some())
            .map(|(index, _)| index)
            .collect();
        candidates.extend(branches.values().flat_map(|found| found.keys().copied()));

        let mut verdicts = Verdicts::new();
        for index in candidates {
            let Some(rule) = self.rules.attr_rules.get(index) else {
                continue;
            };
            if let Some(satisfied) = self.judge(obj, path, rule, index, &readings, &branches) {
                verdicts.insert(index, satisfied);
            }
        }
        Ok(verdicts)
    }

    fn read(&self, obj: &ObjectRef, segment: &str) -> Result<Value> {
        let capability = self.registry.resolve(obj.as_ref(), segment);
        let value = capability.invoke(obj.as_ref())?.unwrap_boxed();
        tracing::debug!("{}.{} = {}", describe(obj.as_ref()), segment, value);
        Ok(value)
    }

    /// Verdicts of the children in one collection. One satisfying child satisfies the
    /// branch; otherwise any violating child violates it.
    fn descend(
        &self,
        obj: &ObjectRef,
        path: &[&str],
        segment: &str,
        subtree: &PathTree,
    ) -> Result<Verdicts> {
        let one = singular(segment).unwrap_or_else(|| segment.to_string());
        let collection = plural(&one);
        let capability = self.registry.resolve(obj.as_ref(), &collection);
        let children = match capability.invoke(obj.as_ref())?.unwrap_boxed() {
            Value::Objects(children) => children,
            Value::Null | Value::Missing(_) => {
                tracing::debug!("{} has no {}", describe(obj.as_ref()), collection);
                Vec::new()
            }
            other => {
                return Err(Error::traversal(
                    describe(obj.as_ref()),
                    format!("{} gave a {} value, expected a collection", collection, other.kind()),
                ))
            }
        };

        let mut child_path = path.to_vec();
        child_path.push(segment);

        let mut found = Verdicts::new();
        for child in &children {
            let child_verdicts = match self.evaluate_child(child, &child_path, &one, subtree) {
                Ok(v) => v,
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("Skipping {}: {}", describe(child.as_ref()), e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            for (index, satisfied) in child_verdicts {
                let entry = found.entry(index).or_insert(satisfied);
                *entry |= satisfied;
            }
        }
        Ok(found)
    }

    fn evaluate_child(
        &self,
        child: &ObjectRef,
        path: &[&str],
        one: &str,
        subtree: &PathTree,
    ) -> Result<Verdicts> {
        let segment = path[path.len() - 1];
        let kind = child.kind();
        if !kind.eq_ignore_ascii_case(one) && !kind.eq_ignore_ascii_case(segment) {
            return Err(Error::traversal(
                describe(child.as_ref()),
                format!("expected a {} under {}", one, segment),
            ));
        }
        self.evaluate(child, path, subtree)
    }

    /// AND over the rule's conditions read here and its verdicts from every branch it
    /// walks into. `None` when the rule cannot be judged at this object.
    fn judge(
        &self,
        obj: &ObjectRef,
        path: &[&str],
        rule: &AttributeRule,
        index: usize,
        readings: &BTreeMap<&str, Value>,
        branches: &BTreeMap<&str, Verdicts>,
    ) -> Option<bool> {
        let mut undecided = false;

        for condition in rule.conditions_at(path) {
            let Some(value) = readings.get(condition.leaf()) else {
                undecided = true;
                continue;
            };
            match condition.test(value) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::trace!("{} fails {} on {}", rule.name, condition, describe(obj.as_ref()));
                    return Some(false);
                }
                Err(e) => {
                    tracing::warn!(
                        "Tag {:?} skipped on {}: {}",
                        rule.name,
                        describe(obj.as_ref()),
                        e
                    );
                    return None;
                }
            }
        }

        for segment in rule.branches_below(path) {
            match branches.get(segment).and_then(|found| found.get(&index)) {
                Some(true) => {}
                Some(false) => return Some(false),
                None => undecided = true,
            }
        }

        (!undecided).then_some(true)
    }
}
