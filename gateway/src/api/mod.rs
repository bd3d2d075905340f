use axum::{
    extract::Request,
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::Gateway;

mod http;

pub struct Api {
    gateway: Arc<Gateway>,
}

impl Api {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    pub fn router(&self) -> Router {
        let allowed_origins = parse_allowed_origins("ALLOWED_HTTP_ORIGINS");
        let allow_any_origin = allowed_origins.contains("*");
        let cors_origins = allowed_origins
            .iter()
            .filter(|origin| *origin != "*")
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Invalid origin in ALLOWED_HTTP_ORIGINS: {}", origin);
                    None
                }
            })
            .collect::<Vec<_>>();

        let cors = if allow_any_origin {
            CorsLayer::new().allow_origin(AllowOrigin::any())
        } else {
            CorsLayer::new().allow_origin(AllowOrigin::list(cors_origins))
        }
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::HeaderName::from_static("x-admin-token"),
            header::HeaderName::from_static("x-request-id"),
        ])
        .expose_headers([header::HeaderName::from_static("x-request-id")]);

        let router = Router::new()
            .route("/healthz", get(http::healthz))
            .route("/accounts/:id", get(http::get_account))
            .route("/accounts/:id/ledger", get(http::get_ledger))
            .route("/accounts/:id/audit", get(http::get_audit))
            .route("/leaderboard/:game_id", get(http::get_leaderboard))
            .route("/withdrawals/:id", get(http::get_withdrawal))
            .route("/admin/accounts", post(http::put_account))
            .route("/admin/accounts/:id/adjust", post(http::adjust_balance))
            .route("/admin/tournaments", post(http::create_tournament))
            .route("/admin/tournaments/:id/join", post(http::join_tournament))
            .route("/admin/tournaments/:id/results", post(http::submit_result))
            .route("/admin/withdrawals", post(http::create_withdrawal))
            .route(
                "/admin/withdrawals/:id/resolve",
                post(http::resolve_withdrawal),
            );

        let router = router.layer(cors);
        let router = router.layer(middleware::from_fn(request_id_middleware));
        let router = router.layer(TraceLayer::new_for_http());

        router.with_state(self.gateway.clone())
    }
}

fn parse_allowed_origins(var: &str) -> HashSet<String> {
    std::env::var(var)
        .unwrap_or_default()
        .split(',')
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(header::HeaderName::from_static("x-request-id"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();
    let mut response = next.run(req).await;
    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(
            header::HeaderName::from_static("x-request-id"),
            header_value,
        );
    }
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "http.request"
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use tower::ServiceExt;

    fn api() -> Api {
        Api::new(Arc::new(Gateway::new()))
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let response = api()
            .router()
            .oneshot(
                HttpRequest::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_routes_reject_requests_without_a_token() {
        let response = api()
            .router()
            .oneshot(
                HttpRequest::builder()
                    .method("POST")
                    .uri("/admin/tournaments")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"id": 1, "name": "Night Cup", "entry_fee": 0}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_accounts_are_not_found() {
        let response = api()
            .router()
            .oneshot(
                HttpRequest::builder()
                    .uri("/accounts/acct-missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
