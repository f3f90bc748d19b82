use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::Mutex;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::extractor::{self, CodeState};
use crate::github::GitHubClient;
use crate::llm::LlmClient;
use crate::preview;
use crate::session::{SessionState, Speaker};

/// Failures crossing the HTTP boundary. Collaborator errors collapse to one
/// generic message each; the detail stays in the logs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("another generation is already in flight")]
    Busy,
    #[error("generation failed")]
    Generation(#[source] anyhow::Error),
    #[error("GitHub client configuration missing")]
    MissingOAuthConfig,
    #[error("failed to build authorization URL")]
    AuthorizeUrl(#[source] anyhow::Error),
    #[error("no code provided")]
    MissingOAuthCode,
    #[error("failed to exchange code for token")]
    TokenExchange(#[source] anyhow::Error),
    #[error("GitHub token not provided")]
    MissingToken,
    #[error("failed to create repository")]
    RepositoryCreation(#[source] anyhow::Error),
    #[error("failed to save session")]
    SessionPersistence(#[source] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::EmptyPrompt | ApiError::MissingOAuthCode | ApiError::TokenExchange(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::MissingToken => StatusCode::UNAUTHORIZED,
            ApiError::Busy => StatusCode::CONFLICT,
            ApiError::MissingOAuthConfig
            | ApiError::AuthorizeUrl(_)
            | ApiError::Generation(_)
            | ApiError::RepositoryCreation(_)
            | ApiError::SessionPersistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = ?self, "Request failed");
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Shared application state: one session, one generation in flight at a time.
#[derive(Clone)]
pub struct AppState {
    templates: Arc<AutoReloader>,
    session: Arc<Mutex<SessionState>>,
    session_file: Arc<PathBuf>,
    busy: Arc<AtomicBool>,
    llm: LlmClient,
    github: GitHubClient,
}

impl AppState {
    pub fn new(
        session: SessionState,
        session_file: PathBuf,
        llm: LlmClient,
        github: GitHubClient,
    ) -> Result<Self> {
        Ok(Self {
            templates: Arc::new(
                create_minijinja_env().context("Failed to initialize template engine")?,
            ),
            session: Arc::new(Mutex::new(session)),
            session_file: Arc::new(session_file),
            busy: Arc::new(AtomicBool::new(false)),
            llm,
            github,
        })
    }
}

// Minijinja Environment setup
fn create_minijinja_env() -> Result<AutoReloader> {
    create_minijinja_env_at(PathBuf::from("templates"))
}

fn create_minijinja_env_at(dir: PathBuf) -> Result<AutoReloader> {
    // Use AutoReloader for development convenience
    let reloader = AutoReloader::new(move |notifier| {
        let loader = path_loader(&dir);
        let mut env = Environment::new();
        env.set_loader(loader);
        notifier.watch_path(&dir, true);
        Ok(env)
    });
    Ok(reloader)
}

/// Holds the one-generation-in-flight flag and releases it on drop, so a
/// client disconnect that cancels the request future cannot leave the flag
/// stuck.
struct BusyGuard(Arc<AtomicBool>);

impl BusyGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| Self(Arc::clone(flag)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn index_handler(
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                let context = minijinja::context! {
                    title => "AI Code Generator",
                    github_enabled => state.github.is_configured(),
                };
                tmpl.render(context)
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
        })
}

#[derive(Deserialize)]
struct GenerateRequest {
    prompt: String,
}

#[derive(Serialize)]
struct GenerateResponse {
    code: CodeState,
    reply: String,
}

async fn generate_handler(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::EmptyPrompt);
    }
    // One generation in flight per session; later submissions bounce. The
    // guard releases the flag on every exit path, cancellation included.
    let _busy = BusyGuard::acquire(&state.busy).ok_or(ApiError::Busy)?;
    run_generation(&state, request).await
}

async fn run_generation(
    state: &AppState,
    request: GenerateRequest,
) -> Result<Json<GenerateResponse>, ApiError> {
    let current = state.session.lock().await.code.clone();

    let reply = state
        .llm
        .generate(&request.prompt, &current)
        .await
        .map_err(ApiError::Generation)?;

    let code = extractor::extract(&reply, &current);

    // Stage on a copy and commit only once the save succeeded, so a failed
    // save cannot leave memory and disk disagreeing.
    let mut session = state.session.lock().await;
    let mut staged = session.clone();
    staged.add_turn(Speaker::User, request.prompt);
    staged.add_turn(Speaker::Assistant, reply.clone());
    staged.code = code.clone();
    staged
        .save(&state.session_file)
        .map_err(ApiError::SessionPersistence)?;
    *session = staged;

    Ok(Json(GenerateResponse { code, reply }))
}

async fn clear_handler(State(state): State<AppState>) -> Result<Json<CodeState>, ApiError> {
    let mut session = state.session.lock().await;
    let mut staged = session.clone();
    staged.clear();
    staged
        .save(&state.session_file)
        .map_err(ApiError::SessionPersistence)?;
    *session = staged;
    Ok(Json(session.code.clone()))
}

async fn code_handler(State(state): State<AppState>) -> Json<CodeState> {
    Json(state.session.lock().await.code.clone())
}

async fn conversation_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.lock().await.conversation.clone())
}

async fn preview_handler(State(state): State<AppState>) -> Html<String> {
    let code = state.session.lock().await.code.clone();
    Html(preview::compose_document(&code))
}

async fn github_auth_handler(State(state): State<AppState>) -> Result<Redirect, ApiError> {
    if !state.github.is_configured() {
        return Err(ApiError::MissingOAuthConfig);
    }
    let url = state
        .github
        .authorize_url()
        .map_err(ApiError::AuthorizeUrl)?;
    Ok(Redirect::temporary(&url))
}

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

async fn github_callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, ApiError> {
    let code = params.code.ok_or(ApiError::MissingOAuthCode)?;
    if !state.github.is_configured() {
        return Err(ApiError::MissingOAuthConfig);
    }

    let token = state
        .github
        .exchange_code(&code)
        .await
        .map_err(ApiError::TokenExchange)?;

    // The token stays server-side in the session; the redirect carries
    // nothing.
    let mut session = state.session.lock().await;
    let mut staged = session.clone();
    staged.github_token = Some(token);
    staged
        .save(&state.session_file)
        .map_err(ApiError::SessionPersistence)?;
    *session = staged;
    info!("GitHub OAuth completed, token stored in session");

    Ok(Redirect::to("/"))
}

#[derive(Serialize)]
struct ExportResponse {
    url: String,
    message: String,
}

async fn github_export_handler(
    State(state): State<AppState>,
) -> Result<Json<ExportResponse>, ApiError> {
    let (token, code) = {
        let session = state.session.lock().await;
        (session.github_token.clone(), session.code.clone())
    };
    let token = token.ok_or(ApiError::MissingToken)?;

    let url = state
        .github
        .create_repository(&token, &code)
        .await
        .map_err(ApiError::RepositoryCreation)?;

    Ok(Json(ExportResponse {
        url,
        message: "Repository created successfully".to_string(),
    }))
}

/// Build the application router. Exposed separately so handler tests can
/// drive it without binding a socket.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/preview", get(preview_handler))
        .route("/api/generate", post(generate_handler))
        .route("/api/clear", post(clear_handler))
        .route("/api/code", get(code_handler))
        .route("/api/conversation", get(conversation_handler))
        .route("/auth/github", get(github_auth_handler))
        .route("/auth/github/callback", get(github_callback_handler))
        .route("/api/github/export", post(github_export_handler))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(port: u16, state: AppState) -> Result<()> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
