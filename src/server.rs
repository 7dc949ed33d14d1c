//! HTTP API.
//!
//! Exposes the question-answering agent over a small JSON API:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question with one agent session |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! One request drives exactly one agent session; sessions share nothing
//! but the read-only vector index, so concurrent requests need no locking.
//! Error responses use a JSON envelope:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! A missing or blank `question` is rejected with `400` before a session
//! starts; agent or upstream failures surface as `500`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::agent::AgentLoop;
use crate::config::Config;
use crate::db;
use crate::llm::{self, CompletionModel};
use crate::migrate;
use crate::tool::{RetrieverTool, ToolRegistry};

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tools: Arc<ToolRegistry>,
    pub model: Arc<dyn CompletionModel>,
}

/// Start the HTTP server on `[server].bind`, wiring up the configured
/// completion model and the built-in retriever tool.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let pool = db::connect(&config).await?;
    migrate::create_schema(&pool).await?;

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RetrieverTool::new(&config, pool)));

    let model: Arc<dyn CompletionModel> = llm::create_model(&config.llm)?.into();

    let state = AppState {
        config,
        tools: Arc::new(registry),
        model,
    };

    let app = build_router(state);

    tracing::info!(%bind_addr, "server listening");
    println!("CorpusQA server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Factored out so tests can drive it in-process with a
/// scripted model.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
}

/// Handler for `POST /ask`.
///
/// Validates the question, runs one agent session to completion (or
/// forced stop), and returns the answer. No partial or streaming output.
async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    tracing::info!(question, "answering question");

    let agent = AgentLoop::new(
        state.model.as_ref(),
        &state.tools,
        state.config.agent.max_iterations,
    );

    let answer = agent.run(question).await.map_err(|e| {
        tracing::error!(error = %e, "agent session failed");
        internal_error(e.to_string())
    })?;

    Ok(Json(AskResponse { answer }))
}
