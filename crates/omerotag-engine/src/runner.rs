//! The run loop: for every root type, fetch its objects, decide their tags and either
//! apply them or record them in a dry-run report.

use std::fmt;

use omerotag_core::object::describe;
use omerotag_core::{CapabilityRegistry, ObjectRef, ObjectStore, Result, TagStore};
use omerotag_rules::CompiledRules;

use crate::evaluate::{Evaluator, TagDecision};
use crate::names::match_name;
use crate::reconcile::{Reconciliation, TagCache, TagReconciler, DEFAULT_TAG_DESCRIPTION};
use crate::report::DryRunReport;

/// Whether a run mutates the store.
pub enum RunMode<'r> {
    Apply,
    DryRun(&'r mut DryRunReport),
}

/// Per-object result of a run.
#[derive(Clone, Debug)]
pub struct ObjectOutcome {
    pub name: String,
    pub kind: String,
    pub decision: TagDecision,
    /// `None` in dry-run mode.
    pub reconciliation: Option<Reconciliation>,
}

impl fmt::Display for ObjectOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:", self.kind, self.name)?;
        match &self.reconciliation {
            Some(r) => write!(
                f,
                " +[{}] -[{}]",
                joined(&r.links_added),
                joined(&r.links_removed)
            ),
            None => write!(
                f,
                " true [{}] false [{}]",
                joined(&self.decision.true_tags),
                joined(&self.decision.false_tags)
            ),
        }
    }
}

fn joined<'a>(tags: impl IntoIterator<Item = &'a String>) -> String {
    tags.into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<ObjectOutcome>,
    pub links_added: usize,
    pub links_removed: usize,
}

impl RunSummary {
    pub fn objects(&self) -> usize {
        self.outcomes.len()
    }
}

pub struct Engine<'a> {
    objects: &'a dyn ObjectStore,
    tags: &'a dyn TagStore,
    registry: &'a CapabilityRegistry,
    rules: &'a CompiledRules,
    description: String,
}

impl<'a> Engine<'a> {
    pub fn new(
        objects: &'a dyn ObjectStore,
        tags: &'a dyn TagStore,
        registry: &'a CapabilityRegistry,
        rules: &'a CompiledRules,
    ) -> Self {
        Self {
            objects,
            tags,
            registry,
            rules,
            description: DEFAULT_TAG_DESCRIPTION.to_string(),
        }
    }

    pub fn with_tag_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Name-rule tags plus the attribute decision for one root object.
    ///
    /// A recoverable traversal failure on the root is logged and leaves only the name tags.
    pub fn decide(&self, obj: &ObjectRef, kind: &str) -> Result<TagDecision> {
        let mut decision = TagDecision::default();
        decision
            .true_tags
            .extend(match_name(obj.as_ref(), self.rules.name_rules_for(kind)));

        match Evaluator::new(self.registry, self.rules).evaluate_root(obj, kind) {
            Ok(found) => decision.merge(found),
            Err(e) if e.is_recoverable() => {
                tracing::warn!("Attribute rules skipped for {}: {}", describe(obj.as_ref()), e);
            }
            Err(e) => return Err(e),
        }
        Ok(decision)
    }

    pub fn run(&self, mut mode: RunMode<'_>, cache: &mut TagCache) -> Result<RunSummary> {
        let reconciler =
            TagReconciler::new(self.objects, self.tags).with_description(self.description.clone());
        let mut summary = RunSummary::default();

        for kind in self.rules.root_types() {
            let objects = self.objects.list_objects(kind)?;
            tracing::info!("Processing {} {} objects", objects.len(), kind);

            for obj in &objects {
                let decision = self.decide(obj, kind)?;
                tracing::debug!(
                    "{}: true {:?} false {:?}",
                    describe(obj.as_ref()),
                    decision.true_tags,
                    decision.false_tags
                );

                let reconciliation = match &mut mode {
                    RunMode::DryRun(report) => {
                        report.record(&obj.name(), &decision)?;
                        None
                    }
                    RunMode::Apply => {
                        let done = reconciler.reconcile(obj, &decision, cache)?;
                        summary.links_added += done.links_added.len();
                        summary.links_removed += done.links_removed.len();
                        Some(done)
                    }
                };

                summary.outcomes.push(ObjectOutcome {
                    name: obj.name(),
                    kind: kind.to_string(),
                    decision,
                    reconciliation,
                });
            }
        }

        if let RunMode::DryRun(report) = &mut mode {
            report.flush()?;
        }
        tracing::info!(
            "Run finished: {} objects, {} links added, {} removed",
            summary.objects(),
            summary.links_added,
            summary.links_removed
        );
        Ok(summary)
    }
}
