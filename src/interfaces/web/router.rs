use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{generate, health, models, process};

fn build_localhost_cors(port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{}", port),
        format!("http://localhost:{}", port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_router(state: AppState) -> Router {
    let port = state.port;

    Router::new()
        .route(
            "/generate",
            get(generate::generate_get).post(generate::generate_post),
        )
        .route("/process", post(process::process_endpoint))
        .route("/health", get(health::health_endpoint))
        .route("/api/models", get(models::list_models_endpoint))
        .route("/api/logs", get(super::sse_logs_endpoint))
        .fallback(super::static_handler)
        .layer(build_localhost_cors(port))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; connect-src 'self'",
        ),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AppConfig;
    use crate::core::llm::ModelClient;
    use crate::core::llm::scripted::{Reply, ScriptedClient};
    use crate::core::pipeline::GenerationEvent;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn state_with(replies: Vec<Reply>) -> (Arc<ScriptedClient>, AppState) {
        let client = Arc::new(ScriptedClient::new(replies));
        let shared: Arc<dyn ModelClient> = client.clone();
        let config = AppConfig {
            chunk_delay_ms: 0,
            ..AppConfig::default()
        };
        let (log_tx, _) = tokio::sync::broadcast::channel(16);
        (client, AppState::new(&config, shared, log_tx))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body_bytes = axum::body::to_bytes(resp.into_body(), 4 * 1024 * 1024)
            .await
            .unwrap();
        (status, headers, String::from_utf8_lossy(&body_bytes).to_string())
    }

    fn json_post(path: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(path: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    fn parse_sse(body: &str) -> Vec<GenerationEvent> {
        body.lines()
            .filter_map(|l| l.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim()).unwrap())
            .collect()
    }

    fn four_sections() -> Vec<Reply> {
        vec![
            Reply::tokens(&["Thought: hmm", "Users want", " lists"]),
            Reply::tokens(&["1. Lists"]),
            Reply::tokens(&["app = FastAPI()"]),
            Reply::tokens(&["Add auth"]),
        ]
    }

    #[tokio::test]
    async fn security_headers_present_on_responses() {
        let (_, state) = state_with(vec![]);
        let (status, headers, _) = send(build_router(state), get_req("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert!(
            headers
                .get("content-security-policy")
                .unwrap()
                .to_str()
                .unwrap()
                .contains("default-src 'self'")
        );
    }

    #[tokio::test]
    async fn index_and_assets_are_served() {
        let (_, state) = state_with(vec![]);
        let app = build_router(state);

        let (status, headers, body) = send(app.clone(), get_req("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            headers
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        assert!(body.contains("/static/app.js"));

        let (status, headers, _) = send(app.clone(), get_req("/static/app.js")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(
            headers
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .contains("javascript")
        );

        let (status, _, _) = send(app, get_req("/static/missing.css")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn generate_streams_events_in_order() {
        let (_, state) = state_with(four_sections());
        let (status, headers, body) = send(
            build_router(state),
            json_post("/generate", r#"{"idea":"a todo app"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(
            headers
                .get("content-type")
                .unwrap()
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
        assert!(body.contains("data: {\"type\":\"status\""));

        let events = parse_sse(&body);
        assert_eq!(events[0].kind(), "status");
        assert_eq!(events[1].kind(), "start");
        assert_eq!(events.last().map(|e| e.kind()), Some("complete"));
        assert!(events.contains(&GenerationEvent::StepComplete {
            step: "research".to_string(),
            final_content: "Users want lists".to_string(),
        }));
        assert!(!body.contains("Thought: hmm"));
    }

    #[tokio::test]
    async fn generate_accepts_the_idea_as_a_query_parameter() {
        let (client, state) = state_with(four_sections());
        let (status, _, body) =
            send(build_router(state), get_req("/generate?idea=a%20todo%20app")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(parse_sse(&body).last().map(|e| e.kind()), Some("complete"));
        assert!(client.calls()[0][1].content.contains("a todo app"));
    }

    #[tokio::test]
    async fn empty_idea_is_rejected_before_streaming() {
        let (client, state) = state_with(four_sections());
        let app = build_router(state);

        for req in [
            json_post("/generate", r#"{"idea":""}"#),
            json_post("/generate", r#"{}"#),
            get_req("/generate?idea="),
            get_req("/generate"),
        ] {
            let (status, _, body) = send(app.clone(), req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            let json: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert!(json["error"].is_string());
            assert!(!body.contains("data:"));
        }
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_a_client_error() {
        let (_, state) = state_with(vec![]);
        let (status, _, body) =
            send(build_router(state), json_post("/generate", "{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("error"));
    }

    #[tokio::test]
    async fn process_returns_all_four_outputs() {
        let (_, state) = state_with(vec![
            Reply::text("research out"),
            Reply::text("plan out"),
            Reply::text("code out"),
            Reply::text("review out"),
        ]);
        let (status, _, body) = send(
            build_router(state),
            json_post("/process", r#"{"idea":"a todo app"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["research"], "research out");
        assert_eq!(json["plan"], "plan out");
        assert_eq!(json["code"], "code out");
        assert_eq!(json["review"], "review out");
    }

    #[tokio::test]
    async fn process_failure_is_a_single_error_response() {
        let (_, state) = state_with(vec![
            Reply::text("research out"),
            Reply::Refuses("backend went away".to_string()),
        ]);
        let (status, _, body) = send(
            build_router(state),
            json_post("/process", r#"{"idea":"a todo app"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "backend went away" }));
    }

    #[tokio::test]
    async fn process_rejects_empty_idea() {
        let (client, state) = state_with(vec![]);
        let (status, _, _) =
            send(build_router(state), json_post("/process", r#"{"idea":"  "}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn health_reports_backend_state() {
        let (_, state) = state_with(vec![Reply::text("p")]);
        let (status, _, body) = send(build_router(state), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model"], "mistral");

        let (_, state) = state_with(vec![Reply::Refuses("connection refused".to_string())]);
        let (status, _, body) = send(build_router(state), get_req("/health")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["error"], "connection refused");
    }

    #[tokio::test]
    async fn models_endpoint_lists_backend_models() {
        let (_, state) = state_with(vec![]);
        let (status, _, body) = send(build_router(state), get_req("/api/models")).await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["models"][0]["id"], "scripted");
        assert_eq!(json["active"], "mistral");
    }

    fn state_with_logs(capacity: usize) -> (tokio::sync::broadcast::Sender<String>, AppState) {
        let client: Arc<dyn ModelClient> = Arc::new(ScriptedClient::new(vec![]));
        let (log_tx, _) = tokio::sync::broadcast::channel(capacity);
        let state = AppState::new(&AppConfig::default(), client, log_tx.clone());
        (log_tx, state)
    }

    async fn next_frame(body: &mut axum::body::BodyDataStream) -> String {
        use futures_util::StreamExt;
        let chunk = tokio::time::timeout(std::time::Duration::from_secs(2), body.next())
            .await
            .expect("no log frame arrived")
            .expect("log stream ended")
            .unwrap();
        String::from_utf8_lossy(&chunk).to_string()
    }

    #[tokio::test]
    async fn logs_endpoint_relays_tracing_lines() {
        let (log_tx, state) = state_with_logs(16);
        let resp = build_router(state).oneshot(get_req("/api/logs")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "text/event-stream");

        // The handler has subscribed by the time the response exists.
        log_tx.send("INFO buildpilot: hello".to_string()).unwrap();
        let mut body = resp.into_body().into_data_stream();
        let frame = next_frame(&mut body).await;
        let data = frame.trim().strip_prefix("data:").unwrap().trim();
        assert_eq!(data, "INFO buildpilot: hello");
    }

    #[tokio::test]
    async fn slow_log_subscribers_are_told_they_lagged() {
        let (log_tx, state) = state_with_logs(1);
        let resp = build_router(state).oneshot(get_req("/api/logs")).await.unwrap();

        for n in 0..3 {
            log_tx.send(format!("line {}", n)).unwrap();
        }
        let mut body = resp.into_body().into_data_stream();
        assert!(next_frame(&mut body).await.contains("Log stream lagged"));
        assert!(next_frame(&mut body).await.contains("line 2"));
    }
}
