use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{recipes, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest("/user", users::router())
        .nest("/recipe", recipes::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
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
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    // No bearer token: the gate rejects before any handler or database
    // access, so these run against the fake state.

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app.oneshot(request(Method::GET, "/health")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_require_auth() {
        for uri in [
            "/user/me",
            "/recipe/tags",
            "/recipe/ingredients",
            "/recipe/recipes",
            "/recipe/recipes/1",
        ] {
            let app = build_app(AppState::fake());
            let res = app.oneshot(request(Method::GET, uri)).await.unwrap();
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "GET {}", uri);
        }
    }

    #[tokio::test]
    async fn bad_auth_scheme_is_rejected() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/recipe/recipes")
                    .header("Authorization", "Basic abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn post_to_me_is_method_not_allowed() {
        let app = build_app(AppState::fake());
        let res = app.oneshot(request(Method::POST, "/user/me")).await.unwrap();
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
