//! Request-scoped configuration contexts.
//! Every request sees one stable set of values, even if a refresh lands mid-request.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::registry::Registry;

/// Opens a [`ConfigContext`](crate::registry::ConfigContext) per request and inserts
/// it as a request extension. The context is cleared when the request finishes, or
/// when the handler future is dropped.
///
/// ```ignore
/// let app = Router::new()
///     .route("/", get(handler))
///     .layer(axum::middleware::from_fn_with_state(registry.clone(), config_context_middleware));
/// ```
pub async fn config_context_middleware(
    State(registry): State<Arc<Registry>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let context = registry.open_context();
    let guard = context.guard();
    req.extensions_mut().insert(context);

    let response = next.run(req).await;
    drop(guard);
    response
}
