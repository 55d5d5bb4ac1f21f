//! Static status/code/title definitions for every [`ErrorKind`].

use http::StatusCode;
use jsonapi_core::ErrorKind;

const FILTERING: &str = "https://jsonapi.org/format/#fetching-filtering";
const INCLUDES: &str = "https://jsonapi.org/format/#fetching-includes";
const SORTING: &str = "https://jsonapi.org/format/#fetching-sorting";
const PAGINATION: &str = "https://jsonapi.org/format/#fetching-pagination";
const QUERY_PARAMETERS: &str = "https://jsonapi.org/format/#query-parameters";
const TOP_LEVEL: &str = "https://jsonapi.org/format/#document-top-level";
const RESOURCE_OBJECTS: &str = "https://jsonapi.org/format/#document-resource-objects";
const CREATING: &str = "https://jsonapi.org/format/#crud-creating-responses-409";
const ERRORS: &str = "https://jsonapi.org/format/#errors";

/// Static error definition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrDef {
    pub status: u16,
    pub title: &'static str,
    pub code: &'static str,
    pub about: &'static str,
}

impl ErrDef {
    #[inline]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Exhaustive mapping; adding a kind without a definition does not compile.
pub fn def_of(kind: &ErrorKind) -> ErrDef {
    use ErrorKind::*;
    let (status, title, code, about) = match kind {
        UnknownResource { .. } => (404, "Unknown resource type", "UNKNOWN_RESOURCE", ERRORS),
        InvalidRelationshipPath { .. } => (
            400,
            "Invalid relationship path",
            "INVALID_RELATIONSHIP_PATH",
            INCLUDES,
        ),
        PathTooDeep { .. } => (400, "Relationship path too deep", "PATH_TOO_DEEP", INCLUDES),
        FieldNotFilterable { .. } => (
            400,
            "Field not filterable",
            "FIELD_NOT_FILTERABLE",
            FILTERING,
        ),
        FieldNotSortable { .. } => (400, "Field not sortable", "FIELD_NOT_SORTABLE", SORTING),
        FieldNotIncludable { .. } => (
            400,
            "Relationship not includable",
            "FIELD_NOT_INCLUDABLE",
            INCLUDES,
        ),
        DuplicateSortKey { .. } => (400, "Duplicate sort key", "DUPLICATE_SORT_KEY", SORTING),
        ConflictingPageParams { .. } => (
            400,
            "Conflicting page parameters",
            "CONFLICTING_PAGE_PARAMS",
            PAGINATION,
        ),
        UnsupportedParameter { .. } => (
            400,
            "Unsupported query parameter",
            "UNSUPPORTED_PARAMETER",
            QUERY_PARAMETERS,
        ),
        MalformedParameter { .. } => (
            400,
            "Malformed query parameter",
            "MALFORMED_PARAMETER",
            QUERY_PARAMETERS,
        ),
        PageSizeExceeded { .. } => (400, "Page size exceeded", "PAGE_SIZE_EXCEEDED", PAGINATION),
        LimitExceeded { .. } => (400, "Too many values", "LIMIT_EXCEEDED", QUERY_PARAMETERS),
        InvalidDocument { .. } => (400, "Invalid document", "INVALID_DOCUMENT", TOP_LEVEL),
        FieldValidation { .. } => (400, "Invalid field", "FIELD_VALIDATION", RESOURCE_OBJECTS),
        ResourceTypeConflict { .. } => (
            409,
            "Resource type conflict",
            "RESOURCE_TYPE_CONFLICT",
            CREATING,
        ),
        RepositoryConstraintViolation { .. } => (
            422,
            "Constraint violation",
            "REPOSITORY_CONSTRAINT_VIOLATION",
            ERRORS,
        ),
        RepositoryUnavailable { .. } => (
            503,
            "Service unavailable",
            "REPOSITORY_UNAVAILABLE",
            ERRORS,
        ),
    };
    ErrDef {
        status,
        title,
        code,
        about,
    }
}
