use anyhow::{Context, Result};
use axum::{
    extract::{Form, Json, Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    serve, Router,
};
use minijinja::{path_loader, Environment, Value};
use minijinja_autoreload::AutoReloader;
use pulldown_cmark::{html, Event, Options, Parser};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::completion::CompletionClient;
use crate::constants::SESSION_COOKIE;
use crate::conversation::Turn;
use crate::error::{CompletionErrorKind, SubmitError};
use crate::session::{ChatSession, SessionRegistry, SessionView};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const PAGE_TITLE: &str = "Groq Chat";
const BUSY_NOTICE: &str =
    "Still waiting for the previous reply. Your new message was not sent; try again once it arrives.";

/// Settings for the HTTP front-end.
#[derive(Debug, Clone)]
pub struct WebOptions {
    pub addr: SocketAddr,
    /// Load templates from disk and reload them on change instead of using
    /// the copies compiled into the binary.
    pub templates_dir: Option<PathBuf>,
    pub static_dir: PathBuf,
    pub session_ttl: Duration,
}

// Shared application state
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(sessions: Arc<SessionRegistry>, templates_dir: Option<PathBuf>) -> Self {
        Self {
            templates: Arc::new(create_minijinja_env(templates_dir)),
            sessions,
        }
    }
}

/// Markdown to HTML for assistant replies. Raw HTML in the source is
/// emitted as escaped text, never passed through.
pub fn render_markdown(text: &str) -> String {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let events = Parser::new_ext(text, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut out, events);
    out
}

fn markdown_filter(value: &str) -> Value {
    Value::from_safe_string(render_markdown(value))
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: Option<PathBuf>) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.add_filter("markdown", markdown_filter);
        match &templates_dir {
            Some(dir) => {
                env.set_loader(path_loader(dir.clone()));
                // Watch the templates directory for changes
                notifier.watch_path(dir, true);
            }
            None => env.add_template("index.html", INDEX_TEMPLATE)?,
        }
        Ok(env)
    })
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == SESSION_COOKIE).then(|| value.trim())
        })
        .find_map(|value| Uuid::parse_str(value).ok())
}

async fn resolve_session(state: &AppState, headers: &HeaderMap) -> (Uuid, Arc<ChatSession>, bool) {
    state
        .sessions
        .get_or_create(session_id_from_headers(headers))
        .await
}

/// Existing session only; read-only and reset routes never start one.
async fn existing_session(state: &AppState, headers: &HeaderMap) -> Option<Arc<ChatSession>> {
    state.sessions.get(session_id_from_headers(headers)).await
}

/// Attach the session cookie when the request started a new session.
fn with_session_cookie(response: impl IntoResponse, id: Uuid, created: bool) -> Response {
    let mut response = response.into_response();
    if created {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}

/// Run the submission on its own task so the session always gets back to
/// `Idle`, even if the client disconnects mid-request.
async fn run_submission(
    session: Arc<ChatSession>,
    message: String,
) -> Result<Result<Turn, SubmitError>, tokio::task::JoinError> {
    tokio::spawn(async move { session.submit(&message).await }).await
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    error!("Submission task failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

async fn index_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, session, created) = resolve_session(&state, &headers).await;
    let view = session.view().await;
    let notice = session.take_notice().await;

    // Acquire env, get template, and render within the same block
    let page = state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                tmpl.render(minijinja::context! {
                    title => PAGE_TITLE,
                    turns => view.turns,
                    awaiting_response => view.awaiting_response,
                    last_error => view.last_error,
                    notice => notice,
                })
            })
        })
        .map(|html| Html(html).into_response())
        .unwrap_or_else(|e| {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
                .into_response()
        });

    with_session_cookie(page, id, created)
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    message: String,
}

// Form post: submit, then send the browser back to the page to re-render.
async fn chat_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ChatForm>,
) -> Response {
    let (id, session, created) = resolve_session(&state, &headers).await;

    match run_submission(session.clone(), form.message).await {
        Ok(Ok(_)) => {}
        Ok(Err(SubmitError::EmptyInput)) => {}
        Ok(Err(SubmitError::Busy)) => {
            info!(session = %id, "Ignoring submission while busy");
            session.set_notice(BUSY_NOTICE).await;
        }
        // Already recorded on the session and shown on the next render.
        Ok(Err(SubmitError::Completion(_))) => {}
        Err(e) => return internal_error(e),
    }

    with_session_cookie(Redirect::to("/"), id, created)
}

async fn reset_form_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(session) = existing_session(&state, &headers).await {
        if let Err(e) = session.reset().await {
            warn!("Reset refused: {}", e);
            session.set_notice(BUSY_NOTICE).await;
        }
    }
    Redirect::to("/").into_response()
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct ChatReply {
    reply: Turn,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    kind: &'static str,
}

fn api_error(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiError {
            error: message.into(),
            kind,
        }),
    )
        .into_response()
}

fn completion_kind_label(kind: CompletionErrorKind) -> &'static str {
    match kind {
        CompletionErrorKind::Network => "network",
        CompletionErrorKind::Auth => "auth",
        CompletionErrorKind::RateLimit => "rate_limit",
        CompletionErrorKind::Model => "model",
        CompletionErrorKind::InvalidResponse => "invalid_response",
    }
}

async fn api_history_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let view = match existing_session(&state, &headers).await {
        Some(session) => session.view().await,
        None => SessionView {
            turns: Vec::new(),
            awaiting_response: false,
            last_error: None,
            notice: None,
        },
    };
    Json(view).into_response()
}

async fn api_chat_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Response {
    let (id, session, created) = resolve_session(&state, &headers).await;

    let response = match run_submission(session, request.message).await {
        Ok(Ok(reply)) => Json(ChatReply { reply }).into_response(),
        Ok(Err(e @ SubmitError::EmptyInput)) => {
            api_error(StatusCode::BAD_REQUEST, "empty_input", e.to_string())
        }
        Ok(Err(e @ SubmitError::Busy)) => api_error(StatusCode::CONFLICT, "busy", e.to_string()),
        Ok(Err(SubmitError::Completion(e))) => api_error(
            StatusCode::BAD_GATEWAY,
            completion_kind_label(e.kind),
            e.to_string(),
        ),
        Err(e) => return internal_error(e),
    };

    with_session_cookie(response, id, created)
}

async fn api_reset_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session) = existing_session(&state, &headers).await else {
        return StatusCode::NO_CONTENT.into_response();
    };
    match session.reset().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => api_error(StatusCode::CONFLICT, "busy", e.to_string()),
    }
}

/// Build the application router. Split out from [`start_web_server`] so
/// tests can drive it without binding a socket.
pub fn build_router(state: AppState, static_dir: PathBuf) -> Router {
    // Serve static files from the configured directory
    let static_files_service =
        ServeDir::new(static_dir).not_found_service(tower::service_fn(|_req: Request| async {
            Ok::<_, Infallible>((StatusCode::NOT_FOUND, "Not Found").into_response())
        }));

    Router::new()
        .route("/", get(index_handler))
        .route("/chat", post(chat_form_handler))
        .route("/reset", post(reset_form_handler))
        .route("/api/history", get(api_history_handler))
        .route("/api/chat", post(api_chat_handler))
        .route("/api/reset", post(api_reset_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(options: WebOptions, client: Arc<dyn CompletionClient>) -> Result<()> {
    let sessions = Arc::new(SessionRegistry::new(client, options.session_ttl));
    let state = AppState::new(sessions, options.templates_dir.clone());
    let app = build_router(state, options.static_dir.clone());

    info!("Web server listening on http://{}", options.addr);

    // Bind using tokio::net::TcpListener
    let listener = tokio::net::TcpListener::bind(options.addr)
        .await
        .context(format!("Failed to bind to address {}", options.addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
