//! Web interface.
//!
//! Serves a small HTML front end over the pipeline: a request form, display
//! pages for finished artifacts, and a question box backed by the
//! conversation index. Artifacts are served from the output directory.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::NewsreelError;
use crate::pipeline::{Pipeline, PipelineOutcome};
use crate::request::{Category, MediaFormat, MediaRequest};
use crate::synthesis::{COMBINED_FILE, NEWS_FILE, SPEECH_FILE};
use axum::{
    extract::{Path as UrlPath, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

/// Shared application state.
struct AppState {
    pipeline: Pipeline,
    cancel: CancellationToken,
}

/// Run the web interface until `cancel` fires.
pub async fn run_web(host: &str, port: u16, settings: Settings, cancel: CancellationToken) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(web_settings(settings))?;
    let output_root = pipeline.output_root().to_path_buf();
    tokio::fs::create_dir_all(&output_root).await?;

    let state = Arc::new(AppState {
        pipeline,
        cancel: cancel.clone(),
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Newsreel Web");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Request form", "GET  /");
    Output::kv("Produce brief", "POST /process");
    Output::kv("Show brief", "GET  /display/:media_type");
    Output::kv("Ask (RAG)", "POST /handle_question");
    Output::kv("Artifacts", "GET  /output/...");
    Output::kv("Health", "GET  /health");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state, &output_root))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}

/// Every web request gets its own run directory.
fn web_settings(mut settings: Settings) -> Settings {
    settings.output.unique_per_request = true;
    settings
}

fn router(state: Arc<AppState>, output_root: &Path) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/process", post(process))
        .route("/display/{media_type}", get(display))
        .route("/handle_question", post(handle_question))
        .route("/health", get(health))
        .nest_service("/output", ServeDir::new(output_root))
        .layer(cors)
        .with_state(state)
}

// === Forms ===

#[derive(Deserialize)]
struct ProcessForm {
    /// Free-text request, e.g. "AAPL as a video".
    #[serde(default)]
    message: String,
    #[serde(default)]
    ticker: String,
    #[serde(default)]
    media_type: String,
}

#[derive(Deserialize)]
struct QuestionForm {
    query: String,
}

#[derive(Deserialize)]
struct DisplayQuery {
    file: Option<String>,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn index() -> Html<String> {
    Html(page(
        "Newsreel",
        r#"<form method="post" action="/process">
  <p><label>Describe what you want<br><input name="message" size="60" placeholder="AAPL as a video"></label></p>
  <p>or pick a ticker and format:</p>
  <p><input name="ticker" placeholder="AAPL">
  <select name="media_type">
    <option value="text">text</option>
    <option value="audio">audio</option>
    <option value="video">video</option>
  </select></p>
  <p><button type="submit">Produce</button></p>
</form>
<h2>Ask about past research</h2>
<form method="post" action="/handle_question">
  <p><input name="query" size="60" placeholder="How did Apple's last quarter go?">
  <button type="submit">Ask</button></p>
</form>"#,
    ))
}

async fn process(State(state): State<Arc<AppState>>, Form(form): Form<ProcessForm>) -> Response {
    let request = state.cancel.child_token();

    let result = if !form.message.trim().is_empty() {
        state.pipeline.run_message(form.message.trim(), &request).await
    } else {
        match form_request(&form) {
            Ok(req) => state.pipeline.run_request(req, &request).await,
            Err(e) => Err(e),
        }
    };

    match result {
        Ok(outcome) => finished(&outcome, state.pipeline.output_root()),
        Err(e) => error_page(&e),
    }
}

/// See Other, pointing at the display page for the artifact.
fn finished(outcome: &PipelineOutcome, output_root: &Path) -> Response {
    Redirect::to(&display_location(outcome, output_root)).into_response()
}

async fn display(
    State(state): State<Arc<AppState>>,
    UrlPath(media_type): UrlPath<String>,
    Query(query): Query<DisplayQuery>,
) -> Response {
    let format: MediaFormat = match media_type.parse() {
        Ok(format) => format,
        Err(_) => {
            return error_page(&NewsreelError::InvalidInput(format!(
                "Unsupported media type: {}",
                media_type
            )))
        }
    };

    let relative = match query.file.as_deref().map(safe_relative) {
        Some(Some(path)) => path,
        Some(None) => {
            return error_page(&NewsreelError::InvalidInput("Invalid artifact path".to_string()));
        }
        None => PathBuf::from(default_file(format)),
    };

    match format {
        MediaFormat::Text => {
            let path = state.pipeline.output_root().join(&relative);
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => Html(page(
                    "Your brief",
                    &format!("<pre>{}</pre>\n{}", escape_html(&content), back_link()),
                ))
                .into_response(),
                Err(e) => {
                    warn!("Could not read {:?}: {}", path, e);
                    error_page(&NewsreelError::InvalidInput("That brief is no longer available.".to_string()))
                }
            }
        }
        MediaFormat::Audio => Html(page(
            "Your podcast",
            &format!(
                "<audio controls src=\"/output/{}\"></audio>\n{}",
                escape_html(&url_path(&relative)),
                back_link()
            ),
        ))
        .into_response(),
        MediaFormat::Video => Html(page(
            "Your video",
            &format!(
                "<video controls width=\"640\" src=\"/output/{}\"></video>\n{}",
                escape_html(&url_path(&relative)),
                back_link()
            ),
        ))
        .into_response(),
    }
}

async fn handle_question(State(state): State<Arc<AppState>>, Form(form): Form<QuestionForm>) -> Response {
    info!("Question received: {}", form.query);
    let request = state.cancel.child_token();

    match state.pipeline.ask(&form.query, &request).await {
        Ok(answer) => {
            let sources: String = answer
                .sources
                .iter()
                .map(|s| {
                    format!(
                        "<li><a href=\"{}\">{}</a> ({})</li>",
                        escape_html(&s.url),
                        escape_html(&s.title),
                        escape_html(&s.subject)
                    )
                })
                .collect();
            let body = if sources.is_empty() {
                format!("<p>{}</p>\n{}", escape_html(&answer.text), back_link())
            } else {
                format!(
                    "<p>{}</p>\n<h2>Sources</h2>\n<ul>{}</ul>\n{}",
                    escape_html(&answer.text),
                    sources,
                    back_link()
                )
            };
            Html(page("Answer", &body)).into_response()
        }
        Err(e) => error_page(&e),
    }
}

// === Helpers ===

fn form_request(form: &ProcessForm) -> crate::Result<MediaRequest> {
    let format: MediaFormat = form.media_type.parse().map_err(NewsreelError::InvalidInput)?;
    MediaRequest::new(format, Category::Ticker, &form.ticker)
}

/// Redirect target for a finished request.
fn display_location(outcome: &PipelineOutcome, output_root: &Path) -> String {
    let relative = outcome.artifact.relative_to(output_root);
    format!(
        "/display/{}?file={}",
        outcome.request.format(),
        urlencode(&url_path(&relative))
    )
}

fn default_file(format: MediaFormat) -> &'static str {
    match format {
        MediaFormat::Text => NEWS_FILE,
        MediaFormat::Audio => SPEECH_FILE,
        MediaFormat::Video => COMBINED_FILE,
    }
}

/// Accept only plain relative paths inside the output directory.
fn safe_relative(raw: &str) -> Option<PathBuf> {
    let path = Path::new(raw);
    if raw.is_empty() || !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(path.to_path_buf())
}

fn url_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn error_page(err: &NewsreelError) -> Response {
    warn!("Request failed: {}", err);
    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        page(
            "Something went wrong",
            &format!("<p>{}</p>\n{}", escape_html(&err.user_message()), back_link()),
        ),
    )
        .into_response()
}

fn back_link() -> &'static str {
    "<p><a href=\"/\">Make another</a></p>"
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n{body}\n</body></html>\n",
        title = escape_html(title),
        body = body
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
