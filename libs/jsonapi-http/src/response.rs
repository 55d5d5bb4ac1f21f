use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use jsonapi_errors::ErrorDocument;
use serde::Serialize;

/// JSON:API media type, used on every response.
pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Serializes `T` with the JSON:API content type.
#[derive(Debug, Clone)]
pub struct JsonApi<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for JsonApi<T> {
    fn into_response(self) -> Response {
        let mut resp = axum::Json(self.1).into_response();
        if resp.status().is_success() {
            *resp.status_mut() = self.0;
        }
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSONAPI_MEDIA_TYPE),
        );
        resp
    }
}

/// Axum response wrapper that renders an [`ErrorDocument`] with its coalesced status.
#[derive(Debug, Clone)]
pub struct ErrorResponse(pub ErrorDocument);

impl From<ErrorDocument> for ErrorResponse {
    fn from(doc: ErrorDocument) -> Self {
        Self(doc)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = self.0.status();
        JsonApi(status, self.0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonapi_errors::not_found;

    #[test]
    fn error_response_sets_status_and_content_type() {
        let resp = ErrorResponse(not_found("nothing here")).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let ct = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        assert_eq!(ct, JSONAPI_MEDIA_TYPE);
    }
}
