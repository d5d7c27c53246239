//! In-memory object graph and tag store, loaded from and saved to a JSON snapshot.
//!
//! The snapshot lists objects with their scalar fields and child collections, the tag
//! entities, and the links between them:
//!
//! ```json
//! {
//!   "objects": [
//!     {"id": 1, "type": "slide", "name": "P7_sample.svs", "children": {"images": [2]}},
//!     {"id": 2, "type": "image", "name": "main", "fields": {"sizeX": 6000}}
//!   ],
//!   "tags": [{"id": 1, "value": "large", "description": "Autotagged"}],
//!   "links": [{"id": 1, "parent": 2, "tag": 1}]
//! }
//! ```
//!
//! A field written as `{"value": v, ...}` is a boxed value. Links with `kind` other than
//! `tag` are non-tag annotations and never touched by reconciliation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use omerotag_core::inflect::capitalize;
use omerotag_core::{
    Annotation, CapabilityExtension, CapabilityRegistry, Error, GraphObject, LinkId, ObjectId,
    ObjectRef, ObjectStore, Result, TagEntity, TagId, TagStore, Value,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
    #[serde(default)]
    pub tags: Vec<TagEntity>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Collection name → child ids.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, Vec<ObjectId>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: LinkId,
    pub parent: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<TagId>,
    /// Annotation kind for non-tag links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A node of the snapshot graph. Collections are held as `Value::Objects`.
#[derive(Debug)]
pub struct MemoryObject {
    id: ObjectId,
    kind: String,
    name: String,
    fields: BTreeMap<String, Value>,
}

impl MemoryObject {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).or_else(|| {
            self.fields
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Field addressed by a `get<Field>` or `list<Field>` method name.
    fn method_field(&self, method: &str) -> Option<&Value> {
        let rest = method
            .strip_prefix("get")
            .or_else(|| method.strip_prefix("list"))?;
        if rest.is_empty() {
            return None;
        }
        self.lookup(rest)
    }
}

impl GraphObject for MemoryObject {
    fn id(&self) -> ObjectId {
        self.id
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn field(&self, name: &str) -> Option<Value> {
        self.lookup(name).cloned()
    }

    fn responds_to(&self, method: &str) -> bool {
        self.method_field(method).is_some()
    }

    fn call(&self, method: &str) -> Option<Value> {
        self.method_field(method).cloned()
    }
}

/// Operation to fail on, for exercising error paths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailOn {
    ListObjects,
    ListAnnotations,
    LinkAnnotation,
    FindTag,
    CreateTag,
    DeleteLinks,
}

/// Mutation counters since the store was opened.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub tags_created: usize,
    pub links_created: usize,
    pub links_deleted: usize,
}

#[derive(Debug, Default)]
struct TagState {
    tags: BTreeMap<TagId, TagEntity>,
    links: Vec<LinkRecord>,
    stats: StoreStats,
    fail_on: Option<FailOn>,
}

impl TagState {
    fn check(&self, op: FailOn) -> Result<()> {
        if self.fail_on == Some(op) {
            return Err(Error::store(format!("injected failure on {:?}", op)));
        }
        Ok(())
    }

    fn next_link_id(&self) -> LinkId {
        self.links.iter().map(|l| l.id).max().unwrap_or(0) + 1
    }

    fn next_tag_id(&self) -> TagId {
        self.tags.keys().next_back().copied().unwrap_or(0) + 1
    }
}

pub struct MemoryStore {
    records: Vec<ObjectRecord>,
    objects: Vec<ObjectRef>,
    state: Mutex<TagState>,
}

impl MemoryStore {
    /// Load a snapshot file. Any failure to read or parse it is a connection failure.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Connection(format!("cannot open graph {}: {}", path.display(), e)))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .map_err(|e| Error::Connection(format!("malformed graph {}: {}", path.display(), e)))?;
        let store = Self::from_snapshot(snapshot)?;
        tracing::info!(
            "Opened graph {} ({} objects, {} tags)",
            path.display(),
            store.records.len(),
            store.lock()?.tags.len()
        );
        Ok(store)
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self> {
        let Snapshot {
            objects: records,
            tags,
            links,
        } = snapshot;

        let by_id: HashMap<ObjectId, &ObjectRecord> = records.iter().map(|r| (r.id, r)).collect();
        if by_id.len() != records.len() {
            return Err(Error::Connection("duplicate object ids in graph".into()));
        }

        let mut built = HashMap::new();
        let mut objects = Vec::with_capacity(records.len());
        for record in &records {
            let mut visiting = HashSet::new();
            objects.push(build(record.id, &by_id, &mut built, &mut visiting)?);
        }

        let tags: BTreeMap<TagId, TagEntity> = tags.into_iter().map(|t| (t.id, t)).collect();
        for link in &links {
            if !by_id.contains_key(&link.parent) {
                return Err(Error::Connection(format!(
                    "link {} points at unknown object {}",
                    link.id, link.parent
                )));
            }
            if let Some(tag) = link.tag.filter(|t| !tags.contains_key(t)) {
                return Err(Error::Connection(format!(
                    "link {} points at unknown tag {}",
                    link.id, tag
                )));
            }
        }

        Ok(Self {
            records,
            objects,
            state: Mutex::new(TagState {
                tags,
                links,
                ..TagState::default()
            }),
        })
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        let state = self.lock()?;
        Ok(Snapshot {
            objects: self.records.clone(),
            tags: state.tags.values().cloned().collect(),
            links: state.links.clone(),
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.snapshot()?)?;
        std::fs::write(path.as_ref(), json)?;
        tracing::debug!("Saved graph to {}", path.as_ref().display());
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.lock()?.stats)
    }

    /// Make every later call of `op` fail with a store error.
    pub fn fail_on(&self, op: FailOn) -> Result<()> {
        self.lock()?.fail_on = Some(op);
        Ok(())
    }

    /// Tag values currently linked to `obj`, sorted.
    pub fn tag_values(&self, obj: ObjectId) -> Result<Vec<String>> {
        let state = self.lock()?;
        let mut values: Vec<String> = state
            .links
            .iter()
            .filter(|l| l.parent == obj)
            .filter_map(|l| l.tag.and_then(|t| state.tags.get(&t)))
            .map(|t| t.value.clone())
            .collect();
        values.sort();
        Ok(values)
    }

    pub fn object(&self, id: ObjectId) -> Option<ObjectRef> {
        self.objects.iter().find(|o| o.id() == id).cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, TagState>> {
        self.state
            .lock()
            .map_err(|_| Error::store("tag state lock poisoned"))
    }
}

fn build(
    id: ObjectId,
    by_id: &HashMap<ObjectId, &ObjectRecord>,
    built: &mut HashMap<ObjectId, ObjectRef>,
    visiting: &mut HashSet<ObjectId>,
) -> Result<ObjectRef> {
    if let Some(done) = built.get(&id) {
        return Ok(done.clone());
    }
    let record = by_id
        .get(&id)
        .ok_or_else(|| Error::Connection(format!("unknown child object {}", id)))?;
    if !visiting.insert(id) {
        return Err(Error::Connection(format!("object {} is its own ancestor", id)));
    }

    let mut fields = BTreeMap::new();
    for (name, raw) in &record.fields {
        let value = field_value(raw).ok_or_else(|| {
            Error::Connection(format!("object {}: unsupported value for field {}", id, name))
        })?;
        fields.insert(name.clone(), value);
    }
    for (collection, ids) in &record.children {
        let children = ids
            .iter()
            .map(|child| build(*child, by_id, built, visiting))
            .collect::<Result<Vec<_>>>()?;
        fields.insert(collection.clone(), Value::Objects(children));
    }

    visiting.remove(&id);
    let object: ObjectRef = Arc::new(MemoryObject {
        id,
        kind: record.kind.clone(),
        name: record.name.clone(),
        fields,
    });
    built.insert(id, object.clone());
    Ok(object)
}

fn field_value(raw: &serde_json::Value) -> Option<Value> {
    use serde_json::Value as Json;
    match raw {
        Json::Null => Some(Value::Null),
        Json::Bool(b) => Some(Value::Bool(*b)),
        Json::Number(n) => n.as_f64().map(Value::Number),
        Json::String(s) => Some(Value::text(s.as_str())),
        Json::Object(map) => map
            .get("value")
            .filter(|v| !v.is_object())
            .and_then(field_value)
            .map(Value::boxed),
        Json::Array(_) => None,
    }
}

impl ObjectStore for MemoryStore {
    fn list_objects(&self, kind: &str) -> Result<Vec<ObjectRef>> {
        self.lock()?.check(FailOn::ListObjects)?;
        Ok(self
            .objects
            .iter()
            .filter(|o| o.kind() == kind)
            .cloned()
            .collect())
    }

    fn list_annotations(&self, obj: &ObjectRef) -> Result<Vec<Annotation>> {
        let state = self.lock()?;
        state.check(FailOn::ListAnnotations)?;
        state
            .links
            .iter()
            .filter(|l| l.parent == obj.id())
            .map(|l| match l.tag {
                Some(tag) => state
                    .tags
                    .get(&tag)
                    .map(|t| Annotation::Tag {
                        link_id: l.id,
                        tag: t.clone(),
                    })
                    .ok_or_else(|| Error::store(format!("link {} lost its tag {}", l.id, tag))),
                None => Ok(Annotation::Other {
                    link_id: l.id,
                    kind: l.kind.clone().unwrap_or_default(),
                }),
            })
            .collect()
    }

    fn link_annotation(&self, obj: &ObjectRef, tag: &TagEntity) -> Result<bool> {
        let mut state = self.lock()?;
        state.check(FailOn::LinkAnnotation)?;
        if !state.tags.contains_key(&tag.id) {
            return Err(Error::store(format!("no tag with id {}", tag.id)));
        }
        let linked = state
            .links
            .iter()
            .any(|l| l.parent == obj.id() && l.tag == Some(tag.id));
        if linked {
            tracing::debug!("{} already linked to object {}", tag.value, obj.id());
            return Ok(false);
        }
        let id = state.next_link_id();
        state.links.push(LinkRecord {
            id,
            parent: obj.id(),
            tag: Some(tag.id),
            kind: None,
        });
        state.stats.links_created += 1;
        Ok(true)
    }
}

impl TagStore for MemoryStore {
    fn find_tag_by_value(&self, value: &str) -> Result<Option<TagEntity>> {
        let state = self.lock()?;
        state.check(FailOn::FindTag)?;
        tracing::debug!("find_tag_by_value({:?})", value);
        Ok(state.tags.values().find(|t| t.value == value).cloned())
    }

    fn create_tag(&self, value: &str, description: &str) -> Result<TagEntity> {
        let mut state = self.lock()?;
        state.check(FailOn::CreateTag)?;
        let tag = TagEntity {
            id: state.next_tag_id(),
            value: value.to_string(),
            description: description.to_string(),
        };
        state.tags.insert(tag.id, tag.clone());
        state.stats.tags_created += 1;
        Ok(tag)
    }

    fn delete_links(&self, link_ids: &[LinkId]) -> Result<()> {
        let mut state = self.lock()?;
        state.check(FailOn::DeleteLinks)?;
        if let Some(unknown) = link_ids
            .iter()
            .find(|id| !state.links.iter().any(|l| l.id == **id))
        {
            return Err(Error::store(format!("no link with id {}", unknown)));
        }
        let before = state.links.len();
        state.links.retain(|l| !link_ids.contains(&l.id));
        let removed = before - state.links.len();
        state.stats.links_deleted += removed;
        Ok(())
    }
}

/// Every snapshot type becomes a known type with `get<Field>` for scalar fields and
/// `list<Collection>` for child collections.
impl CapabilityExtension for MemoryStore {
    fn name(&self) -> &str {
        "snapshot"
    }

    fn install(&self, registry: &mut CapabilityRegistry) -> Result<()> {
        for record in &self.records {
            registry.register_type(&record.kind);
            for field in record.fields.keys() {
                registry.register_field(&record.kind, &format!("get{}", capitalize(field)), field);
            }
            for collection in record.children.keys() {
                registry.register_field(
                    &record.kind,
                    &format!("list{}", capitalize(collection)),
                    collection,
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn store() -> MemoryStore {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "objects": [
                {"id": 1, "type": "slide", "name": "a.svs", "children": {"images": [2, 3]}},
                {"id": 2, "type": "image", "name": "main", "fields": {"sizeX": 6000, "pixel": {"value": 0.25, "unit": "um"}}},
                {"id": 3, "type": "image", "name": "thumb", "fields": {"sizeX": 300}}
            ],
            "tags": [{"id": 4, "value": "large", "description": "Autotagged"}],
            "links": [
                {"id": 1, "parent": 1, "tag": 4},
                {"id": 2, "parent": 1, "kind": "comment"}
            ]
        }))
        .unwrap();
        MemoryStore::from_snapshot(snapshot).unwrap()
    }

    #[test]
    fn builds_children_and_boxed_fields() {
        let store = store();
        let slide = store.object(1).unwrap();
        match slide.field("images").unwrap() {
            Value::Objects(children) => assert_eq!(children.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        let image = store.object(2).unwrap();
        assert_eq!(image.field("pixel"), Some(Value::boxed(Value::Number(0.25))));
        assert!(image.responds_to("getSizex"));
        assert_eq!(image.call("getSizeX"), Some(Value::Number(6000.0)));
        assert!(!image.responds_to("getStain"));
    }

    #[test]
    fn rejects_cycles_and_dangling_children() {
        let cyclic: Snapshot = serde_json::from_value(json!({
            "objects": [
                {"id": 1, "type": "a", "name": "x", "children": {"bs": [2]}},
                {"id": 2, "type": "b", "name": "y", "children": {"as": [1]}}
            ]
        }))
        .unwrap();
        assert!(matches!(
            MemoryStore::from_snapshot(cyclic),
            Err(Error::Connection(_))
        ));

        let dangling: Snapshot = serde_json::from_value(json!({
            "objects": [{"id": 1, "type": "a", "name": "x", "children": {"bs": [9]}}]
        }))
        .unwrap();
        assert!(MemoryStore::from_snapshot(dangling).is_err());
    }

    #[test]
    fn shared_children_are_built_once() {
        let snapshot: Snapshot = serde_json::from_value(json!({
            "objects": [
                {"id": 1, "type": "slide", "name": "a", "children": {"images": [3]}},
                {"id": 2, "type": "slide", "name": "b", "children": {"images": [3]}},
                {"id": 3, "type": "image", "name": "shared"}
            ]
        }))
        .unwrap();
        let store = MemoryStore::from_snapshot(snapshot).unwrap();
        assert_eq!(store.list_objects("slide").unwrap().len(), 2);
    }

    #[test]
    fn annotations_include_non_tag_links() {
        let store = store();
        let slide = store.object(1).unwrap();
        let annotations = store.list_annotations(&slide).unwrap();
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].tag_value(), Some("large"));
        assert_eq!(annotations[1].tag_value(), None);
    }

    #[test]
    fn link_deduplicates() {
        let store = store();
        let image = store.object(2).unwrap();
        let tag = store.create_tag("new", "Autotagged").unwrap();
        assert_eq!(tag.id, 5);
        assert!(store.link_annotation(&image, &tag).unwrap());
        assert!(!store.link_annotation(&image, &tag).unwrap());
        assert_eq!(
            store.stats().unwrap(),
            StoreStats {
                tags_created: 1,
                links_created: 1,
                links_deleted: 0
            }
        );
    }

    #[test]
    fn delete_links_rejects_unknown_ids() {
        let store = store();
        assert!(store.delete_links(&[1, 99]).is_err());
        store.delete_links(&[1]).unwrap();
        assert!(store.tag_values(1).unwrap().is_empty());
        assert_eq!(store.stats().unwrap().links_deleted, 1);
    }

    #[test]
    fn injected_failures_are_store_errors() {
        let store = store();
        store.fail_on(FailOn::CreateTag).unwrap();
        assert!(matches!(
            store.create_tag("x", "y"),
            Err(Error::Store(_))
        ));
    }

    #[test]
    fn installs_capabilities_for_every_type() {
        let store = store();
        let mut registry = CapabilityRegistry::new();
        registry.install(&store).unwrap();
        assert!(registry.is_known("slide"));
        assert!(registry.resolve_type("slide", "images").is_some());
        assert!(registry.resolve_type("image", "sizeX").is_some());
        assert_eq!(registry.known_type("images").as_deref(), Some("image"));
    }

    #[test]
    fn save_round_trips_tag_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let store = store();
        let tag = store.create_tag("fresh", "Autotagged").unwrap();
        store.link_annotation(&store.object(3).unwrap(), &tag).unwrap();
        store.save(&path).unwrap();

        let reopened = MemoryStore::open(&path).unwrap();
        assert_eq!(reopened.tag_values(3).unwrap(), vec!["fresh".to_string()]);
        assert_eq!(reopened.snapshot().unwrap(), store.snapshot().unwrap());
    }

    #[test]
    fn missing_file_is_a_connection_failure() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MemoryStore::open(dir.path().join("nope.json")),
            Err(Error::Connection(_))
        ));
    }
}
