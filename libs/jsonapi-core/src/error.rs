//! Error kinds raised while parsing, resolving, validating and executing requests.
//!
//! Kinds carry their payload; HTTP status, code and title are assigned later by an
//! exhaustive match in `jsonapi-errors`.

use thiserror::Error;

use crate::schema::FieldCategory;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("resource type '{resource_type}' is not registered")]
    UnknownResource { resource_type: String },

    #[error("'{segment}' is not a relationship of '{resource_type}' (in path '{path}')")]
    InvalidRelationshipPath {
        path: String,
        segment: String,
        resource_type: String,
    },

    #[error("path '{path}' is deeper than the maximum of {max_depth} segments")]
    PathTooDeep { path: String, max_depth: usize },

    #[error("'{field}' is not a filterable attribute of '{resource_type}' (in path '{path}')")]
    FieldNotFilterable {
        path: String,
        field: String,
        resource_type: String,
    },

    #[error("'{field}' is not a sortable attribute of '{resource_type}' (in path '{path}')")]
    FieldNotSortable {
        path: String,
        field: String,
        resource_type: String,
    },

    #[error("relationship '{field}' of '{resource_type}' cannot be included (in path '{path}')")]
    FieldNotIncludable {
        path: String,
        field: String,
        resource_type: String,
    },

    #[error("sort key '{path}' is given more than once")]
    DuplicateSortKey { path: String },

    #[error("'{first}' cannot be combined with '{second}'")]
    ConflictingPageParams { first: String, second: String },

    #[error("query parameter '{name}' is not supported")]
    UnsupportedParameter { name: String },

    #[error("query parameter '{name}' is malformed: {reason}")]
    MalformedParameter { name: String, reason: String },

    #[error("page size {requested} exceeds the maximum of {max}")]
    PageSizeExceeded { requested: u64, max: u64 },

    #[error("{count} {family} entries exceed the maximum of {max}")]
    LimitExceeded {
        family: String,
        count: usize,
        max: usize,
    },

    #[error("invalid document: {reason}")]
    InvalidDocument { reason: String },

    #[error("invalid field '{field}': {reason}")]
    FieldValidation { field: String, reason: String },

    #[error("resource type '{given}' does not match the endpoint type '{expected}'")]
    ResourceTypeConflict { given: String, expected: String },

    #[error("{reason}")]
    RepositoryConstraintViolation { reason: String },

    #[error("resource repository unavailable: {reason}")]
    RepositoryUnavailable { reason: String },
}

impl ErrorKind {
    /// Fatal kinds are reported alone; everything else accumulates.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::RepositoryUnavailable { .. })
    }
}

/// Where an error originated, before it is rendered into a JSON:API `source`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceLocator {
    /// Raw query parameter name, e.g. `filter[author.name]`.
    Parameter(String),
    /// A member of the resource payload.
    Field {
        name: String,
        category: FieldCategory,
    },
    /// An explicit RFC 6901 pointer into the request document; `""` is the whole document.
    Pointer(String),
}

/// A classified error together with its origin. `locator` rather than `source`:
/// the latter would be taken by `thiserror` as the error cause.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{message}")]
pub struct SourceError {
    pub kind: ErrorKind,
    pub message: String,
    pub locator: SourceLocator,
}

impl SourceError {
    pub fn new(kind: ErrorKind, locator: SourceLocator) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            locator,
        }
    }

    pub fn parameter(kind: ErrorKind, name: impl Into<String>) -> Self {
        Self::new(kind, SourceLocator::Parameter(name.into()))
    }

    pub fn field(kind: ErrorKind, name: impl Into<String>, category: FieldCategory) -> Self {
        Self::new(
            kind,
            SourceLocator::Field {
                name: name.into(),
                category,
            },
        )
    }

    pub fn pointer(kind: ErrorKind, pointer: impl Into<String>) -> Self {
        Self::new(kind, SourceLocator::Pointer(pointer.into()))
    }

    /// Error about the request as a whole (pointer `""`).
    pub fn document(kind: ErrorKind) -> Self {
        Self::pointer(kind, "")
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}
