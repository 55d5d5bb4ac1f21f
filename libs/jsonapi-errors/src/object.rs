//! JSON:API error objects and error documents.

use http::StatusCode;
use jsonapi_core::{pointer::JsonPointer, SourceError, SourceLocator};
use serde::{Deserialize, Serialize};

use crate::catalog::def_of;

/// Exactly one of `pointer` or `parameter`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    Pointer(String),
    Parameter(String),
}

impl From<&SourceLocator> for ErrorSource {
    fn from(locator: &SourceLocator) -> Self {
        match locator {
            SourceLocator::Parameter(name) => ErrorSource::Parameter(name.clone()),
            SourceLocator::Pointer(p) => ErrorSource::Pointer(p.clone()),
            SourceLocator::Field { name, category } => ErrorSource::Pointer(
                JsonPointer::root()
                    .push("data")
                    .push(category.member())
                    .push(name)
                    .into_string(),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLinks {
    pub about: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// HTTP status code as a string, e.g. `"400"`.
    pub status: String,
    pub code: String,
    pub title: String,
    pub detail: String,
    pub source: ErrorSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<ErrorLinks>,
}

impl ErrorObject {
    pub fn new(
        status: StatusCode,
        code: impl Into<String>,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            status: status.as_u16().to_string(),
            code: code.into(),
            title: title.into(),
            detail: detail.into(),
            source: ErrorSource::Pointer(String::new()),
            links: None,
        }
    }

    pub fn with_source(mut self, source: ErrorSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_about(mut self, about: impl Into<String>) -> Self {
        self.links = Some(ErrorLinks {
            about: about.into(),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
            .parse::<u16>()
            .ok()
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<&SourceError> for ErrorObject {
    fn from(err: &SourceError) -> Self {
        let def = def_of(&err.kind);
        ErrorObject::new(def.status_code(), def.code, def.title, &err.message)
            .with_source(ErrorSource::from(&err.locator))
            .with_about(def.about)
    }
}

/// `{ "errors": [...] }` plus the HTTP status it should be served with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
    #[serde(skip)]
    status: u16,
}

impl ErrorDocument {
    /// Status is the most severe (numerically highest) of the objects.
    pub fn new(errors: Vec<ErrorObject>) -> Self {
        let status = errors
            .iter()
            .map(|e| e.status_code().as_u16())
            .max()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR.as_u16());
        Self { errors, status }
    }

    pub fn single(error: ErrorObject) -> Self {
        Self::new(vec![error])
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Error document for requests that matched no route.
pub fn not_found(detail: impl Into<String>) -> ErrorDocument {
    ErrorDocument::single(ErrorObject::new(
        StatusCode::NOT_FOUND,
        "ROUTE_NOT_FOUND",
        "Not Found",
        detail,
    ))
}

/// Error document for a known route hit with a method it does not serve.
pub fn method_not_allowed(detail: impl Into<String>) -> ErrorDocument {
    ErrorDocument::single(ErrorObject::new(
        StatusCode::METHOD_NOT_ALLOWED,
        "METHOD_NOT_ALLOWED",
        "Method Not Allowed",
        detail,
    ))
}
