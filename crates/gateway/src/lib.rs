//! HTTP relay for PaperDesk.
//!
//! Keeps the Anthropic credential on the server. Browser and CLI clients
//! post messages requests to `/api/analyze`; the relay attaches the key
//! and forwards them. It also serves the static UI bundle and a health
//! probe.
//!
//! Layers applied:
//! - CORS (any origin unless `relay.cors_origins` lists some)
//! - Request body size limit (`relay.body_limit_mb`, 50 MB by default)
//! - HTTP trace logging

pub mod relay;

use std::path::Path;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use paperdesk_config::{AppConfig, RelayConfig};
use paperdesk_providers::AnthropicClient;
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

pub use relay::{RelayRequest, RelayState};

/// Build the relay router.
pub fn build_router(state: Arc<RelayState>, config: &RelayConfig) -> Router {
    let static_dir = Path::new(&config.static_dir);
    let ui = ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/api/analyze", post(relay::analyze_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .fallback_service(ui)
        .layer(DefaultBodyLimit::max(body_limit_bytes(config.body_limit_mb)))
        .layer(cors_layer(&config.cors_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn body_limit_bytes(megabytes: usize) -> usize {
    megabytes.saturating_mul(1024 * 1024)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Build relay state from configuration. Without a key the relay still
/// starts, and every forward request reports the missing key.
pub fn state_from_config(config: &AppConfig) -> Result<Arc<RelayState>, Box<dyn std::error::Error>> {
    let upstream = match &config.api_key {
        Some(key) => Some(Arc::new(AnthropicClient::from_config(key, &config.upstream)?)),
        None => {
            warn!(
                "{} is not set; /api/analyze will answer 500 until it is",
                paperdesk_config::API_KEY_ENV
            );
            None
        }
    };
    Ok(Arc::new(RelayState {
        upstream,
        default_model: config.models.default_model.clone(),
        default_max_tokens: config.models.relay_max_tokens,
    }))
}

/// Start the relay HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.relay.host, config.relay.port);
    let state = state_from_config(&config)?;
    let app = build_router(state, &config.relay);

    if !Path::new(&config.relay.static_dir).is_dir() {
        warn!(dir = %config.relay.static_dir, "Static UI directory not found; only the API is served");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Relay listening");
    info!("API proxy available at http://{addr}/api/analyze");
    axum::serve(listener, app).await?;
    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn state(upstream: Option<AnthropicClient>) -> Arc<RelayState> {
        Arc::new(RelayState {
            upstream: upstream.map(Arc::new),
            default_model: "claude-sonnet-4-20250514".into(),
            default_max_tokens: 4000,
        })
    }

    fn relay_config(static_dir: &Path) -> RelayConfig {
        RelayConfig {
            static_dir: static_dir.display().to_string(),
            ..Default::default()
        }
    }

    fn analyze(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/analyze")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Upstream that echoes the forwarded body and the key it received.
    async fn echo_upstream() -> String {
        spawn_upstream(Router::new().route(
            "/v1/messages",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                Json(serde_json::json!({
                    "content": [{"type": "text", "text": "ok"}],
                    "echo": body,
                    "key": headers["x-api-key"].to_str().unwrap(),
                }))
            }),
        ))
        .await
    }

    #[tokio::test]
    async fn health_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(None), &relay_config(dir.path()));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn missing_key_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(None), &relay_config(dir.path()));
        let resp = app.oneshot(analyze(r#"{"messages": []}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await["error"], relay::KEY_MISSING_MESSAGE);
    }

    #[tokio::test]
    async fn forwards_with_defaults_and_key() {
        let base = echo_upstream().await;
        let client = AnthropicClient::new("sk-server", None).unwrap().with_base_url(base);
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(Some(client)), &relay_config(dir.path()));

        let resp = app
            .oneshot(analyze(r#"{"messages": [{"role": "user", "content": "hi"}]}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["key"], "sk-server");
        assert_eq!(body["echo"]["model"], "claude-sonnet-4-20250514");
        assert_eq!(body["echo"]["max_tokens"], 4000);
        assert_eq!(body["echo"]["messages"][0]["content"], "hi");
        assert_eq!(body["content"][0]["text"], "ok");
    }

    #[tokio::test]
    async fn caller_model_and_max_tokens_win() {
        let base = echo_upstream().await;
        let client = AnthropicClient::new("k", None).unwrap().with_base_url(base);
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(Some(client)), &relay_config(dir.path()));

        let resp = app
            .oneshot(analyze(r#"{"messages": [], "model": "claude-x", "max_tokens": 2000}"#))
            .await
            .unwrap();
        let body = json_body(resp).await;
        assert_eq!(body["echo"]["model"], "claude-x");
        assert_eq!(body["echo"]["max_tokens"], 2000);
    }

    #[tokio::test]
    async fn upstream_status_is_propagated() {
        let base = spawn_upstream(Router::new().route(
            "/v1/messages",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        ))
        .await;
        let client = AnthropicClient::new("k", None).unwrap().with_base_url(base);
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(Some(client)), &relay_config(dir.path()));

        let resp = app.oneshot(analyze(r#"{"messages": []}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            json_body(resp).await["error"],
            "Anthropic API error: 429 - slow down"
        );
    }

    #[tokio::test]
    async fn unreachable_upstream_is_internal_error() {
        let client = AnthropicClient::new("k", None)
            .unwrap()
            .with_base_url("http://127.0.0.1:1");
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(Some(client)), &relay_config(dir.path()));

        let resp = app.oneshot(analyze(r#"{"messages": []}"#)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(resp).await["error"], "Internal server error");
    }

    #[test]
    fn body_limit_saturates() {
        assert_eq!(body_limit_bytes(50), 50 * 1024 * 1024);
        assert_eq!(body_limit_bytes(usize::MAX), usize::MAX);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = RelayConfig {
            body_limit_mb: 1,
            ..relay_config(dir.path())
        };
        let app = build_router(state(None), &config);
        let padding = "a".repeat(2 * 1024 * 1024);
        let resp = app
            .oneshot(analyze(&format!(r#"{{"messages": [], "pad": "{padding}"}}"#)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn invalid_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(state(None), &relay_config(dir.path()));
        let resp = app.oneshot(analyze("{not json")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn static_files_and_index_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>PaperDesk</h1>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        let app = build_router(state(None), &relay_config(dir.path()));

        let resp = app
            .clone()
            .oneshot(Request::builder().uri("/app.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let js = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&js[..], b"console.log(1)");

        let resp = app
            .oneshot(Request::builder().uri("/papers/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let html = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&html[..], b"<h1>PaperDesk</h1>");
    }

    #[test]
    fn state_without_key_has_no_upstream() {
        let state = state_from_config(&AppConfig::default()).unwrap();
        assert!(state.upstream.is_none());
        assert_eq!(state.default_max_tokens, 4000);
    }
}
