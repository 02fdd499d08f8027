use std::net::SocketAddr;

use axum::{
    http::{header, HeaderValue},
    Router,
};
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::openapi::ApiDoc;
use crate::state::AppState;
use crate::{auth, health, products, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/v1",
            Router::new()
                .merge(auth::router())
                .merge(users::router())
                .merge(products::router())
                .merge(health::router()),
        )
        .merge(SwaggerUi::new("/v1/docs").url("/v1/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::auth::repo_types::{NewUser, Role};
    use crate::store::memory::MemoryStore;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, name: &str, email: &str, password: &str) -> Value {
        let (status, body) = call(
            app,
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({ "name": name, "email": email, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }

    async fn login(app: &Router, email: &str, password: &str) -> String {
        let (status, body) = call(
            app,
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// App with an admin account `root@x.com` / `root-password`.
    async fn app_with_admin() -> Router {
        let state = AppState::fake();
        let password_hash = state.hasher.hash("root-password").unwrap();
        state
            .users
            .create(NewUser {
                name: "Root".into(),
                email: "root@x.com".into(),
                password_hash,
                role: Role::Admin,
            })
            .await
            .unwrap();
        build_app(state)
    }

    #[tokio::test]
    async fn ownership_scenario() {
        let app = app_with_admin().await;
        register(&app, "Alice", "alice@x.com", "pw1-pw1-pw1").await;
        register(&app, "Bob", "bob@x.com", "pw2-pw2-pw2").await;
        let alice = login(&app, "alice@x.com", "pw1-pw1-pw1").await;
        let bob = login(&app, "bob@x.com", "pw2-pw2-pw2").await;
        let admin = login(&app, "root@x.com", "root-password").await;

        let (status, product) = call(
            &app,
            Method::POST,
            "/v1/products",
            Some(&alice),
            Some(json!({ "name": "Widget", "price": 10.5, "stock": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let uri = format!("/v1/products/{}", product["id"].as_str().unwrap());

        let (status, _) =
            call(&app, Method::PATCH, &uri, Some(&bob), Some(json!({ "price": 1 }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (_, unchanged) = call(&app, Method::GET, &uri, Some(&bob), None).await;
        assert_eq!(unchanged["price"], json!(10.5));

        let (status, updated) =
            call(&app, Method::PATCH, &uri, Some(&alice), Some(json!({ "price": 5 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["price"].as_f64(), Some(5.0));
        assert_eq!(updated["ownerId"], product["ownerId"]);

        let (status, _) = call(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&app, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::DELETE, &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn register_hides_hash_and_rejects_duplicates() {
        let app = build_app(AppState::fake());
        let user = register(&app, "Alice", "Alice@X.com", "pw1-pw1-pw1").await;
        assert_eq!(user["email"], "alice@x.com");
        assert_eq!(user["name"], "Alice");
        assert!(user["id"].is_string());
        let keys: Vec<String> = user.as_object().unwrap().keys().cloned().collect();
        assert!(keys.iter().all(|k| !k.to_lowercase().contains("password")));

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/auth/register",
            None,
            Some(json!({ "name": "Other", "email": "ALICE@x.com", "password": "pw9-pw9-pw9" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["statusCode"], 409);
    }

    #[tokio::test]
    async fn bad_login_attempts_look_the_same() {
        let app = build_app(AppState::fake());
        register(&app, "Alice", "alice@x.com", "pw1-pw1-pw1").await;

        let wrong = call(
            &app,
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "alice@x.com", "password": "not-it" })),
        )
        .await;
        let unknown = call(
            &app,
            Method::POST,
            "/v1/auth/login",
            None,
            Some(json!({ "email": "nobody@x.com", "password": "pw1-pw1-pw1" })),
        )
        .await;
        assert_eq!(wrong.0, StatusCode::UNAUTHORIZED);
        assert_eq!(wrong, unknown);
    }

    #[tokio::test]
    async fn user_listing_is_admin_only() {
        let app = app_with_admin().await;
        register(&app, "Alice", "alice@x.com", "pw1-pw1-pw1").await;
        let alice = login(&app, "alice@x.com", "pw1-pw1-pw1").await;
        let admin = login(&app, "root@x.com", "root-password").await;

        let (status, _) = call(&app, Method::GET, "/v1/users", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, Method::GET, "/v1/users", Some(&alice), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = call(&app, Method::GET, "/v1/users", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 2);
        for u in users {
            assert!(u.get("passwordHash").is_none());
            assert!(u.get("password_hash").is_none());
        }
    }

    #[tokio::test]
    async fn products_require_a_valid_token() {
        let app = build_app(AppState::fake());
        let (status, _) = call(&app, Method::GET, "/v1/products", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, Method::GET, "/v1/products", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn product_reads_and_validation() {
        let app = build_app(AppState::fake());
        register(&app, "Alice", "alice@x.com", "pw1-pw1-pw1").await;
        let alice = login(&app, "alice@x.com", "pw1-pw1-pw1").await;

        let (status, _) = call(
            &app,
            Method::POST,
            "/v1/products",
            Some(&alice),
            Some(json!({ "name": "Widget", "price": -1, "stock": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, created) = call(
            &app,
            Method::POST,
            "/v1/products",
            Some(&alice),
            Some(json!({ "name": "Widget", "description": "blue", "price": 2.25, "stock": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["description"], "blue");

        let (status, list) = call(&app, Method::GET, "/v1/products", Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let missing = format!("/v1/products/{}", uuid::Uuid::new_v4());
        let (status, _) = call(&app, Method::GET, &missing, Some(&alice), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            call(&app, Method::GET, "/v1/products/not-a-uuid", Some(&alice), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["error"], "Bad Request");

        let (status, body) = call(
            &app,
            Method::POST,
            "/v1/products",
            Some(&alice),
            Some(json!({ "name": "Widget", "price": 1, "stock": 1, "ownerId": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["statusCode"], 400);
        assert!(body["message"].as_str().unwrap().contains("ownerId"));
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = build_app(AppState::fake());
        let (status, doc) = call(&app, Method::GET, "/v1/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["info"]["title"], "Storefront API");
        assert!(doc["paths"].get("/v1/products/{id}").is_some());
        assert!(doc["components"]["securitySchemes"].get("bearer_auth").is_some());
    }

    #[tokio::test]
    async fn healthz_reports_store_state() {
        let store = Arc::new(MemoryStore::new());
        let app = build_app(AppState::fake_with(store.clone()));

        let (status, body) = call(&app, Method::GET, "/v1/healthz", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "database": "connected" }));

        store.set_healthy(false);
        let (status, body) = call(&app, Method::GET, "/v1/healthz", None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["database"], "disconnected");
    }

    #[tokio::test]
    async fn responses_carry_security_headers() {
        let app = build_app(AppState::fake());
        let req = Request::builder().uri("/v1/healthz").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(res.headers()[header::X_FRAME_OPTIONS], "DENY");
    }
}
