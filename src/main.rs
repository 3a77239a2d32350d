use axum::{
    body::Body,
    extract::Query,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio_stream::{wrappers::ReceiverStream, StreamExt};
use url::Url;

mod config;
mod crawl;
mod error;
mod extract;
mod llm;
mod models;
mod pipeline;
mod prompt;
mod shape;

use config::Config;
use error::AnalyzeError;
use llm::ModelClient;
use models::{AnalyzeRequest, DownloadQuery};
use pipeline::{Progress, StreamMessage};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let app = Router::new()
        .route("/health", get(health))
        .route("/analyze", post(analyze_endpoint))
        .route("/analyze/stream", post(analyze_stream_endpoint))
        .route("/download", get(download_endpoint));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8000").await.unwrap();
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

fn error_response(e: &AnalyzeError) -> Response {
    let status = match e {
        AnalyzeError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        AnalyzeError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AnalyzeError::SeedFetch(_)
        | AnalyzeError::ModelService(_)
        | AnalyzeError::ModelParse => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({"detail": e.to_string()}))).into_response()
}

async fn analyze_endpoint(Json(req): Json<AnalyzeRequest>) -> Response {
    let cfg = Config::default();
    let llm = match ModelClient::from_env() {
        Ok(client) => client,
        Err(e) => return error_response(&e),
    };
    match pipeline::analyze(&req.url, &cfg, &llm, &Progress::none()).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// Same pipeline, but as a chunked text stream: `STATUS:` lines while the
/// crawl and model call run, then one `RESULT:` (or `ERROR:`) line. The
/// spawned task runs to completion even if the client goes away.
async fn analyze_stream_endpoint(Json(req): Json<AnalyzeRequest>) -> Response {
    let llm = match ModelClient::from_env() {
        Ok(client) => client,
        Err(e) => return error_response(&e),
    };

    let (tx, rx) = tokio::sync::mpsc::channel::<StreamMessage>(16);
    tokio::spawn(async move {
        let cfg = Config::default();
        let progress = Progress::channel(tx.clone());
        let message = match pipeline::analyze(&req.url, &cfg, &llm, &progress).await {
            Ok(result) => match serde_json::to_string(&result) {
                Ok(payload) => StreamMessage::Result(payload),
                Err(e) => StreamMessage::Error(e.to_string()),
            },
            Err(e) => StreamMessage::Error(e.to_string()),
        };
        let _ = tx.send(message).await;
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(axum::body::Bytes::from(msg.into_line())));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from_stream(stream))
        .unwrap()
}

/// Proxy an image back to the browser with its upstream content type, so the
/// client can save it without running into cross-origin restrictions.
async fn download_endpoint(Query(query): Query<DownloadQuery>) -> Response {
    let cfg = Config::default();
    let parsed = match Url::parse(&query.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "invalid image URL"})),
            )
                .into_response()
        }
    };

    let client = match crawl::build_client(&cfg) {
        Ok(client) => client,
        Err(e) => return error_response(&e),
    };

    let response = match client.get(parsed.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({"detail": format!("could not fetch image: {}", e)})),
            )
                .into_response()
        }
    };
    if !response.status().is_success() {
        return (
            StatusCode::BAD_GATEWAY,
            Json(json!({"detail": format!("upstream returned status {}", response.status())})),
        )
            .into_response();
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let filename = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("image")
        .to_string();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from_stream(response.bytes_stream()))
        .unwrap()
}
