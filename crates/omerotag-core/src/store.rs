//! Store collaborators. Every call is a blocking request/response; failures are fatal
//! to the run and surface as `Error::Store`.

use crate::error::Result;
use crate::object::{Annotation, LinkId, ObjectRef, TagEntity};

/// The object graph.
pub trait ObjectStore {
    /// All objects of a root type.
    fn list_objects(&self, kind: &str) -> Result<Vec<ObjectRef>>;

    /// Annotation links currently attached to `obj`.
    fn list_annotations(&self, obj: &ObjectRef) -> Result<Vec<Annotation>>;

    /// Link a tag to `obj`. Returns `false` when the link already existed.
    fn link_annotation(&self, obj: &ObjectRef, tag: &TagEntity) -> Result<bool>;
}

/// Tag entities.
pub trait TagStore {
    fn find_tag_by_value(&self, value: &str) -> Result<Option<TagEntity>>;

    fn create_tag(&self, value: &str, description: &str) -> Result<TagEntity>;

    /// Delete annotation links in one request.
    fn delete_links(&self, link_ids: &[LinkId]) -> Result<()>;
}
