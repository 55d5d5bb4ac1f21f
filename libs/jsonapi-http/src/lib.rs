//! Thin axum adapter: raw query extraction, document rendering and routing.

pub mod document;
pub mod extract;
pub mod response;
pub mod router;

pub use document::{CollectionDocument, RequestTarget, JSONAPI_VERSION};
pub use extract::QueryPairs;
pub use response::{ErrorResponse, JsonApi, JSONAPI_MEDIA_TYPE};
pub use router::{router, JsonApiState};
