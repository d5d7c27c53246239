//! Tag reconciliation: bring an object's tag links in line with a decision.

use std::collections::HashMap;

use omerotag_core::object::describe;
use omerotag_core::{ObjectRef, ObjectStore, Result, TagEntity, TagStore};

use crate::evaluate::TagDecision;

pub const DEFAULT_TAG_DESCRIPTION: &str = "Autotagged";

/// Run-scoped memo of tag value → tag entity. Entries are never evicted.
///
/// Get-or-create is not atomic against the store; callers sharing one cache across
/// threads must serialize access.
#[derive(Debug, Default)]
pub struct TagCache {
    entries: HashMap<String, TagEntity>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, value: &str) -> Option<&TagEntity> {
        self.entries.get(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached entity, else the store's entity with this exact value, else a new one.
    pub fn get_or_create(
        &mut self,
        store: &dyn TagStore,
        value: &str,
        description: &str,
    ) -> Result<TagEntity> {
        if let Some(tag) = self.entries.get(value) {
            tracing::trace!("tag cache hit: {}", value);
            return Ok(tag.clone());
        }
        let tag = match store.find_tag_by_value(value)? {
            Some(existing) => existing,
            None => {
                tracing::info!("Creating tag {:?}", value);
                store.create_tag(value, description)?
            }
        };
        self.entries.insert(value.to_string(), tag.clone());
        Ok(tag)
    }
}

/// What a reconciliation changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub links_added: Vec<String>,
    pub links_removed: Vec<String>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.links_added.is_empty() && self.links_removed.is_empty()
    }
}

pub struct TagReconciler<'a> {
    objects: &'a dyn ObjectStore,
    tags: &'a dyn TagStore,
    description: String,
}

impl<'a> TagReconciler<'a> {
    pub fn new(objects: &'a dyn ObjectStore, tags: &'a dyn TagStore) -> Self {
        Self {
            objects,
            tags,
            description: DEFAULT_TAG_DESCRIPTION.to_string(),
        }
    }

    /// Description given to tags this reconciler creates.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Unlink false tags (unless also true) in one batch, then link every true tag.
    pub fn reconcile(
        &self,
        obj: &ObjectRef,
        decision: &TagDecision,
        cache: &mut TagCache,
    ) -> Result<Reconciliation> {
        let existing = self.objects.list_annotations(obj)?;
        let mut outcome = Reconciliation::default();

        let mut doomed = Vec::new();
        for value in decision.removals() {
            let links: Vec<_> = existing
                .iter()
                .filter(|a| a.tag_value() == Some(value))
                .map(|a| a.link_id())
                .collect();
            if !links.is_empty() {
                doomed.extend(links);
                outcome.links_removed.push(value.to_string());
            }
        }
        if !doomed.is_empty() {
            tracing::debug!("Deleting {} links on {}", doomed.len(), describe(obj.as_ref()));
            self.tags.delete_links(&doomed)?;
        }

        for value in &decision.true_tags {
            let tag = cache.get_or_create(self.tags, value, &self.description)?;
            if self.objects.link_annotation(obj, &tag)? {
                outcome.links_added.push(value.clone());
            }
        }

        Ok(outcome)
    }
}
