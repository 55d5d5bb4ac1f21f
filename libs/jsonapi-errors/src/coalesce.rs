//! Collects [`SourceError`]s from every stage into one error document.

use jsonapi_core::SourceError;
use tracing::{debug, warn};

use crate::object::{ErrorDocument, ErrorObject};

/// Accumulates errors in encounter order, dropping exact duplicates.
#[derive(Debug, Default, Clone)]
pub struct ErrorCoalescer {
    errors: Vec<SourceError>,
}

impl ErrorCoalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: SourceError) {
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// A fatal error replaces everything collected so far.
    pub fn into_document(self) -> ErrorDocument {
        if let Some(fatal) = self.errors.iter().find(|e| e.kind.is_fatal()) {
            debug!(dropped = self.errors.len() - 1, "fatal error reported alone");
            return ErrorDocument::single(ErrorObject::from(fatal));
        }
        if self.errors.is_empty() {
            warn!("building an error document without errors");
        }
        ErrorDocument::new(self.errors.iter().map(ErrorObject::from).collect())
    }
}

impl Extend<SourceError> for ErrorCoalescer {
    fn extend<I: IntoIterator<Item = SourceError>>(&mut self, iter: I) {
        for error in iter {
            self.push(error);
        }
    }
}

impl FromIterator<SourceError> for ErrorCoalescer {
    fn from_iter<I: IntoIterator<Item = SourceError>>(iter: I) -> Self {
        let mut coalescer = Self::new();
        coalescer.extend(iter);
        coalescer
    }
}

pub fn to_error_document(errors: impl IntoIterator<Item = SourceError>) -> ErrorDocument {
    errors.into_iter().collect::<ErrorCoalescer>().into_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ErrorSource;
    use http::StatusCode;
    use jsonapi_core::ErrorKind;

    fn unsupported(name: &str) -> SourceError {
        SourceError::parameter(
            ErrorKind::UnsupportedParameter {
                name: name.into(),
            },
            name,
        )
    }

    #[test]
    fn keeps_order_and_drops_exact_duplicates() {
        let doc = to_error_document([
            unsupported("b"),
            unsupported("a"),
            unsupported("b"),
            unsupported("b").with_message("something else"),
        ]);
        let sources: Vec<&ErrorSource> = doc.errors.iter().map(|e| &e.source).collect();
        assert_eq!(
            sources,
            vec![
                &ErrorSource::Parameter("b".into()),
                &ErrorSource::Parameter("a".into()),
                &ErrorSource::Parameter("b".into()),
            ]
        );
        assert_eq!(doc.errors[2].detail, "something else");
        assert_eq!(doc.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn mixed_statuses_pick_most_severe() {
        let doc = to_error_document([
            unsupported("x"),
            SourceError::document(ErrorKind::UnknownResource {
                resource_type: "robots".into(),
            }),
            SourceError::parameter(
                ErrorKind::RepositoryConstraintViolation {
                    reason: "bad literal".into(),
                },
                "filter[age]",
            ),
        ]);
        assert_eq!(doc.errors.len(), 3);
        assert_eq!(doc.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn unavailable_is_reported_alone() {
        let doc = to_error_document([
            unsupported("x"),
            SourceError::document(ErrorKind::RepositoryUnavailable {
                reason: "connection refused".into(),
            }),
            unsupported("y"),
        ]);
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].code, "REPOSITORY_UNAVAILABLE");
        assert_eq!(doc.errors[0].source, ErrorSource::Pointer(String::new()));
        assert_eq!(doc.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
