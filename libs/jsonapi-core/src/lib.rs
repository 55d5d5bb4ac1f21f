//! JSON:API query model: resource schemas, relationship path resolution,
//! query-parameter parsing into an immutable [`QueryPlan`], request body
//! validation and the shared error vocabulary.

pub mod body;
pub mod config;
pub mod cursor;
pub mod error;
pub mod parser;
pub mod path;
pub mod plan;
pub mod pointer;
pub mod registry;
pub mod resource;
pub mod schema;

#[cfg(test)]
mod test_support;

pub use body::{validate_resource_document, ResourcePayload, WriteMode};
pub use config::{PageSizePolicy, QueryConfig, QueryConfigError};
pub use cursor::{CursorError, CursorV1};
pub use error::{ErrorKind, SourceError, SourceLocator};
pub use parser::QueryParser;
pub use path::{Hop, HopTarget, PathPurpose, PathResolver, ResolvedPath};
pub use plan::{
    FilterOp, FilterPredicate, IncludeSet, PageDescriptor, PagePosition, QueryPlan, SortDir,
    SortKey,
};
pub use pointer::JsonPointer;
pub use registry::{RegistryError, SchemaRegistry, SchemaRegistryBuilder};
pub use resource::{Linkage, RelationshipData, Resource, ResourceIdentifier};
pub use schema::{
    Attribute, Cardinality, FieldCategory, FieldKind, Relationship, ResourceSchema, SchemaDecl,
};

/// URL-safe base64 without padding, used for opaque cursor tokens.
pub mod base64_url {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

    pub fn encode(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
        URL_SAFE_NO_PAD.decode(s)
    }
}
