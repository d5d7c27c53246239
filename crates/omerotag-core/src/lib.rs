//! omerotag core - object model, store traits, capability lookup and errors

pub mod capability;
pub mod error;
pub mod inflect;
pub mod object;
pub mod store;
pub mod value;

pub use capability::{Accessor, Capability, CapabilityExtension, CapabilityRegistry};
pub use error::{Error, Result};
pub use object::{Annotation, GraphObject, LinkId, ObjectId, ObjectRef, TagEntity, TagId};
pub use store::{ObjectStore, TagStore};
pub use value::Value;
