pub mod handlers;
pub mod routes;
pub mod state;
pub mod static_files;

use crate::config::WebConfig;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Request-body cap for the router. Uploads arrive base64-encoded inside a
/// JSON envelope, so the raw upload limit inflates by 4/3 plus headroom for
/// the envelope itself. The handler's own `max_bytes` check stays the
/// authoritative cap on decoded content.
fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes / 3 * 4 + 1024 * 1024
}

pub fn build_router(app_state: Arc<AppState>) -> Router {
    let limit = body_limit(app_state.config.upload.max_bytes);

    routes::ui_routes()
        .merge(routes::api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(CompressionLayer::new()),
        )
        .layer(DefaultBodyLimit::max(limit))
        .with_state(app_state)
}

pub async fn run_server(
    config: WebConfig,
    app_state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::dataset::Dataset;
    use crate::dispatch::QueryDispatcher;
    use crate::llm::{ChartGenerator, ChartOutput, LlmError, TabularAgent};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use tower::ServiceExt;

    struct NullChart;

    #[async_trait]
    impl ChartGenerator for NullChart {
        async fn generate(&self, _: &Dataset, _: &str) -> Result<ChartOutput, LlmError> {
            Err(LlmError::ConfigError("unused".to_string()))
        }
    }

    struct NullAgent;

    #[async_trait]
    impl TabularAgent for NullAgent {
        async fn answer(&self, _: &Dataset, _: &str) -> Result<String, LlmError> {
            Err(LlmError::ConfigError("unused".to_string()))
        }
    }

    fn test_state(config: AppConfig) -> Arc<AppState> {
        Arc::new(AppState::new(
            config,
            QueryDispatcher::new(Box::new(NullChart), Box::new(NullAgent)),
        ))
    }

    async fn send_json(
        app: Router,
        method: &str,
        uri: &str,
        session: &str,
        body: String,
    ) -> axum::response::Response {
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-session-id", session)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap()
    }

    fn csv_of_at_least(bytes: usize) -> String {
        let mut csv = String::from("a,b\n");
        while csv.len() < bytes {
            csv.push_str("1,2\n");
        }
        csv
    }

    fn upload_body(csv: &str) -> String {
        serde_json::json!({
            "filename": "big.csv",
            "content": format!("data:text/csv;base64,{}", BASE64.encode(csv.as_bytes())),
        })
        .to_string()
    }

    #[tokio::test]
    async fn accepts_uploads_beyond_the_framework_default_body_limit() {
        let state = test_state(AppConfig::default());
        let session = state.create_session().await;
        let app = build_router(state);

        // 3 MiB of CSV is within the 5 MiB cap but well past axum's 2 MiB
        // default body limit once base64-encoded.
        let csv = csv_of_at_least(3 * 1024 * 1024);
        let response = send_json(app, "POST", "/api/upload", &session, upload_body(&csv)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn oversized_uploads_are_rejected_by_the_handler_cap() {
        let state = test_state(AppConfig::default());
        let session = state.create_session().await;
        let app = build_router(state);

        let csv = csv_of_at_least(11 * 512 * 1024); // 5.5 MiB, over the cap
        let response = send_json(app, "POST", "/api/upload", &session, upload_body(&csv)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn restore_honors_the_upload_cap() {
        let mut config = AppConfig::default();
        config.upload.max_bytes = 64;
        let state = test_state(config);
        let session = state.create_session().await;

        let small = serde_json::json!({
            "dataset": { "columns": ["a"], "data": [["1"]] }
        })
        .to_string();
        let response =
            send_json(build_router(state.clone()), "PUT", "/api/dataset", &session, small).await;
        assert_eq!(response.status(), StatusCode::OK);

        let rows: Vec<Vec<String>> = (0..64).map(|_| vec!["x".repeat(8)]).collect();
        let big = serde_json::json!({
            "dataset": { "columns": ["a"], "data": rows }
        })
        .to_string();
        let response =
            send_json(build_router(state), "PUT", "/api/dataset", &session, big).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
