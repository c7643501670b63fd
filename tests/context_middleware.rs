//! Per-request configuration contexts through the axum middleware.

use std::sync::{Arc, Mutex};

use axum::{body::Body, http::Request, routing::get, Extension, Router};
use tower::ServiceExt;

use config_client::config::{BootstrapSettings, Environment};
use config_client::http::config_context_middleware;
use config_client::{ConfigContext, Registry, View};

fn registry() -> Arc<Registry> {
    Registry::builder("console")
        .bootstrap(BootstrapSettings {
            uri: Some("http://127.0.0.1:9/config".to_string()),
            ..Default::default()
        })
        .environment(Environment::empty())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_request_sees_stable_values() {
    let registry = registry();
    registry.merge(vec![("a", Some("1"))]);
    let seen: Arc<Mutex<Option<ConfigContext>>> = Arc::default();

    let handler_registry = registry.clone();
    let handler_seen = seen.clone();
    let app = Router::new()
        .route(
            "/",
            get(move |Extension(ctx): Extension<ConfigContext>| async move {
                let cell = handler_registry.get("a");
                let before = cell.value(View::Context(&ctx)).unwrap_or_default();
                handler_registry.merge(vec![("a", Some("2"))]);
                let after = cell.value(View::Context(&ctx)).unwrap_or_default();
                *handler_seen.lock().unwrap() = Some(ctx);
                format!("{},{}", before, after)
            }),
        )
        .layer(axum::middleware::from_fn_with_state(
            registry.clone(),
            config_context_middleware,
        ));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    assert_eq!(&body[..], b"1,1");
    assert_eq!(registry.get("a").value(View::Shared).as_deref(), Some("2"));

    let ctx = seen.lock().unwrap().take().unwrap();
    assert!(ctx.is_empty());
    assert_eq!(registry.get("a").value(View::Context(&ctx)).as_deref(), Some("2"));
}

#[tokio::test]
async fn test_each_request_gets_its_own_context() {
    let registry = registry();
    let ids: Arc<Mutex<Vec<uuid::Uuid>>> = Arc::default();

    let handler_ids = ids.clone();
    let app = Router::new()
        .route(
            "/",
            get(move |Extension(ctx): Extension<ConfigContext>| async move {
                handler_ids.lock().unwrap().push(ctx.id());
                "ok"
            }),
        )
        .layer(axum::middleware::from_fn_with_state(
            registry.clone(),
            config_context_middleware,
        ));

    for _ in 0..2 {
        app.clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
    }

    let ids = ids.lock().unwrap();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    assert_eq!(registry.live_contexts(), 0);
}
