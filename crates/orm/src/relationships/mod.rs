//! Relationships Module - connection inference between loosely declared models
//!
//! Relationship fields only name their target model (and, for collections,
//! the reciprocal attribute). The connection type is inferred by looking at
//! both ends once, when the model registry is built, and kept in a read-only
//! [`RelationshipGraph`].

pub mod inference;
pub mod pivot;
pub mod registry;
pub mod types;

pub use inference::resolve_connection;
pub use pivot::{join_definition, join_model_key};
pub use registry::RelationshipGraph;
pub use types::*;
