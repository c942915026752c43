//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum
//! server. Routes are nested under `/api/` and CORS-permissive so a
//! browser frontend served elsewhere can call them.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the API router.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/chat", post(endpoints::chat::send))
        .route("/html-progress", get(endpoints::progress::stream))
        .route("/latest-report", get(endpoints::reports::latest))
        .route("/reports/:filename", get(endpoints::reports::fetch))
        .with_state(ctx);

    Router::new()
        .nest("/api", routes)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::Settings;
    use crate::progress::ProgressKind;

    /// Context with a temp report store and an unreachable backend.
    fn test_ctx() -> (tempfile::TempDir, ApiContext) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            reports_dir: dir.path().to_path_buf(),
            // Nothing listens on port 1; connection attempts fail fast.
            ollama_base_url: "http://127.0.0.1:1".to_string(),
            ..Settings::default()
        };
        (dir, ApiContext::new(settings))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (_dir, ctx) = test_ctx();
        let response = api_router(ctx)
            .oneshot(Request::get("/nonexistent").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_dir, ctx) = test_ctx();
        let response = api_router(ctx)
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn report_fetch_rejects_malformed_names() {
        let (_dir, ctx) = test_ctx();
        for name in ["evil.html", "report_1234_123456.html", "report_20260807_120000.txt"] {
            let response = api_router(ctx.clone())
                .oneshot(
                    Request::get(format!("/api/reports/{name}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{name}");
        }
    }

    #[tokio::test]
    async fn report_fetch_absent_file_is_404() {
        let (_dir, ctx) = test_ctx();
        let response = api_router(ctx)
            .oneshot(
                Request::get("/api/reports/report_20260807_120000.html")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn report_fetch_serves_content_with_caching_disabled() {
        let (_dir, ctx) = test_ctx();
        let name = ctx.reports.save("<html>report</html>").unwrap();

        let response = api_router(ctx)
            .oneshot(
                Request::get(format!("/api/reports/{name}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("cache-control").unwrap(),
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(response.headers().get("pragma").unwrap(), "no-cache");
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        assert_eq!(&bytes[..], b"<html>report</html>");
    }

    #[tokio::test]
    async fn latest_report_empty_store() {
        let (_dir, ctx) = test_ctx();
        let response = api_router(ctx)
            .oneshot(
                Request::get("/api/latest-report")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["latestReportFile"].is_null());
        assert_eq!(json["allReportFiles"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn latest_report_lists_newest_first() {
        use chrono::TimeZone;

        let (_dir, ctx) = test_ctx();
        let early = chrono::Utc.with_ymd_and_hms(2026, 8, 7, 8, 0, 0).unwrap();
        let late = chrono::Utc.with_ymd_and_hms(2026, 8, 7, 9, 0, 0).unwrap();
        ctx.reports.save_at("a", early).unwrap();
        ctx.reports.save_at("b", late).unwrap();

        let response = api_router(ctx)
            .oneshot(
                Request::get("/api/latest-report")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["latestReportFile"], "report_20260807_090000.html");
        assert_eq!(
            json["allReportFiles"],
            serde_json::json!([
                "report_20260807_090000.html",
                "report_20260807_080000.html",
            ])
        );
    }

    #[tokio::test]
    async fn chat_with_unreachable_backend_is_upstream_error() {
        let (_dir, ctx) = test_ctx();
        let response = api_router(ctx.clone())
            .oneshot(
                Request::post("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"messages":[{"role":"user","content":"analyze"}]}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "UPSTREAM_UNAVAILABLE");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Ollama"));

        // The failure is also surfaced on the progress channel.
        let last = ctx.progress.channel("default").take().unwrap();
        assert_eq!(last.kind, ProgressKind::Error);
    }

    #[tokio::test]
    async fn chat_rejects_bodyless_requests() {
        let (_dir, ctx) = test_ctx();
        let response = api_router(ctx)
            .oneshot(
                Request::post("/api/chat")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        // Missing `messages` fails JSON extraction before the handler.
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
