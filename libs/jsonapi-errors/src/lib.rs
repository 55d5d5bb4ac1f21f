//! JSON:API error objects: per-kind definitions, source rendering and
//! coalescing of many errors into one document.

pub mod catalog;
pub mod coalesce;
pub mod object;

pub use catalog::{def_of, ErrDef};
pub use coalesce::{to_error_document, ErrorCoalescer};
pub use object::{method_not_allowed, not_found, ErrorDocument, ErrorLinks, ErrorObject, ErrorSource};
