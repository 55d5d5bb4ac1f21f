use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use jsonapi_core::QueryParser;
use jsonapi_errors::{method_not_allowed, not_found, to_error_document};
use jsonapi_exec::{Executor, ResourceRepository};
use tracing::{debug, info, instrument};

use crate::document::{CollectionDocument, RequestTarget};
use crate::extract::QueryPairs;
use crate::response::{ErrorResponse, JsonApi};

/// Everything a request handler needs; built once at startup.
pub struct JsonApiState {
    pub parser: QueryParser,
    pub executor: Executor,
    pub repository: Arc<dyn ResourceRepository>,
}

impl JsonApiState {
    pub fn new(
        parser: QueryParser,
        executor: Executor,
        repository: Arc<dyn ResourceRepository>,
    ) -> Self {
        Self {
            parser,
            executor,
            repository,
        }
    }
}

/// `GET /{resource_type}` for every registered type plus JSON:API 404 and 405 fallbacks.
pub fn router(state: Arc<JsonApiState>) -> Router {
    Router::new()
        .route("/{resource_type}", get(list_resources))
        .fallback(route_not_found)
        .method_not_allowed_fallback(route_method_not_allowed)
        .with_state(state)
}

#[instrument(name = "jsonapi.http.list", skip(state, uri, query))]
async fn list_resources(
    State(state): State<Arc<JsonApiState>>,
    Path(resource_type): Path<String>,
    uri: Uri,
    query: QueryPairs,
) -> Response {
    let plan = match state.parser.parse(&resource_type, query.iter()) {
        Ok(plan) => plan,
        Err(errors) => {
            debug!(errors = errors.len(), "rejecting query");
            return ErrorResponse(to_error_document(errors)).into_response();
        }
    };

    match state
        .executor
        .execute(&plan, state.repository.as_ref())
        .await
    {
        Ok(execution) => {
            let target = RequestTarget::new(uri.path(), query);
            JsonApi(StatusCode::OK, CollectionDocument::new(execution, &target)).into_response()
        }
        Err(errors) => {
            info!(errors = errors.len(), "query execution failed");
            ErrorResponse(to_error_document(errors)).into_response()
        }
    }
}

async fn route_not_found(uri: Uri) -> ErrorResponse {
    ErrorResponse(not_found(format!("no route matches '{}'", uri.path())))
}

async fn route_method_not_allowed(method: Method, uri: Uri) -> ErrorResponse {
    ErrorResponse(method_not_allowed(format!(
        "{method} is not supported on '{}'",
        uri.path()
    )))
}
