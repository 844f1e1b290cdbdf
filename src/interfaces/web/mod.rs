mod error;
mod handlers;
mod router;

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    response::IntoResponse,
    response::sse::{Event, Sse},
};
use include_dir::{Dir, include_dir};
use tokio::sync::broadcast;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::core::chain::SimpleChain;
use crate::core::config::AppConfig;
use crate::core::llm::ModelClient;
use crate::core::pipeline::SectionPipeline;

static STATIC_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/static");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) client: Arc<dyn ModelClient>,
    pub(crate) pipeline: SectionPipeline,
    pub(crate) chain: SimpleChain,
    pub(crate) model: String,
    pub(crate) port: u16,
    pub(crate) log_tx: broadcast::Sender<String>,
}

impl AppState {
    pub(crate) fn new(
        config: &AppConfig,
        client: Arc<dyn ModelClient>,
        log_tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            pipeline: SectionPipeline::from_config(Arc::clone(&client), config),
            chain: SimpleChain::new(Arc::clone(&client), config.model.clone()),
            client,
            model: config.model.clone(),
            port: config.port,
            log_tx,
        }
    }
}

pub struct ApiServer {
    state: AppState,
    addr: String,
}

impl ApiServer {
    pub fn new(
        config: &AppConfig,
        client: Arc<dyn ModelClient>,
        log_tx: broadcast::Sender<String>,
    ) -> Self {
        Self {
            state: AppState::new(config, client, log_tx),
            addr: config.addr(),
        }
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.state
            .pipeline
            .sections()
            .iter()
            .map(|s| s.name.as_str())
            .collect()
    }

    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        info!("BuildPilot running at http://{}", self.addr);

        let app = router::build_router(self.state);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server crashed")?;

        info!("BuildPilot server stopped");
        Ok(())
    }
}

// --- SSE Logs (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(line) => Ok(Event::default().data(line)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream)
}

async fn static_handler(uri: axum::http::Uri) -> impl IntoResponse {
    let mut path = uri.path().trim_start_matches('/');
    if path.is_empty() {
        path = "index.html";
    }
    let path = path.strip_prefix("static/").unwrap_or(path);

    match STATIC_DIR.get_file(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(axum::http::header::CONTENT_TYPE, mime.as_ref().to_string())],
                file.contents(),
            )
                .into_response()
        }
        None => (axum::http::StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}
