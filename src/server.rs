//! HTTP API: chat, history, accounts and collections.

use crate::agent::ToolCallRecord;
use crate::app::AppContext;
use crate::auth::User;
use crate::conversation::Message;
use crate::error::RagChatError;
use crate::vector_store::CollectionInfo;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

/// Build the API router.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/chat/history", get(history))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/collections", get(collections))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(ctx)
}

/// Bind and serve until the process is stopped.
pub async fn serve(ctx: Arc<AppContext>, addr: &str) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    messages: Vec<String>,
    #[serde(default)]
    thread_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    thread_id: String,
    tool_calls: Vec<ToolCallRecord>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    thread_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Serialize)]
struct HistoryResponse {
    thread_id: String,
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    msg: &'static str,
}

#[derive(Serialize)]
struct LoginResponse {
    access_token: String,
    token_type: &'static str,
}

#[derive(Serialize)]
struct CollectionsResponse {
    collections: Vec<CollectionInfo>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Error wrapper that maps crate errors onto HTTP statuses.
struct ApiError(RagChatError);

impl From<RagChatError> for ApiError {
    fn from(e: RagChatError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            RagChatError::InvalidInput(_)
            | RagChatError::InvalidIdentifier(_)
            | RagChatError::EmailTaken => (StatusCode::BAD_REQUEST, self.0.to_string()),
            RagChatError::Auth(reason) => (StatusCode::UNAUTHORIZED, reason.clone()),
            RagChatError::AccountInactive => (StatusCode::FORBIDDEN, self.0.to_string()),
            RagChatError::CollectionNotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            RagChatError::ExternalServiceUnavailable { .. } => {
                error!("{}", self.0);
                (
                    StatusCode::BAD_GATEWAY,
                    "An upstream service is unavailable. Please retry.".to_string(),
                )
            }
            RagChatError::TurnTimedOut(_) => (StatusCode::GATEWAY_TIMEOUT, self.0.to_string()),
            RagChatError::ToolLoopExceeded { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            }
            other => {
                error!("Request failed: {}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError(RagChatError::Auth("Missing bearer token.".into())))
}

/// Caller identity for chat routes: the token's account when auth is required,
/// otherwise the client-supplied user id.
fn chat_user(
    ctx: &AppContext,
    headers: &HeaderMap,
    claimed: Option<String>,
) -> Result<String, ApiError> {
    if ctx.settings.server.require_auth {
        let user = ctx.auth.authenticate_active(bearer_token(headers)?)?;
        return Ok(user.id.to_string());
    }
    claimed
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError(RagChatError::InvalidInput("user_id is required".into())))
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn chat(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let user_id = chat_user(&ctx, &headers, req.user_id)?;
    let mut messages = req.messages;
    messages.extend(req.message);

    let reply = ctx
        .chat
        .handle_turn(&user_id, req.thread_id.as_deref(), messages)
        .await?;

    Ok(Json(ChatResponse {
        response: reply.response.content,
        thread_id: reply.thread_id,
        tool_calls: reply.response.tool_calls,
    }))
}

async fn history(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<HistoryResponse> {
    let user_id = chat_user(&ctx, &headers, query.user_id.clone().or(query.thread_id.clone()))?;
    let thread_id = query.thread_id.unwrap_or_else(|| user_id.clone());

    let messages = match ctx.chat.history(&thread_id).await? {
        Some(state) if state.user_id() == user_id => state.messages().to_vec(),
        _ => Vec::new(),
    };
    Ok(Json(HistoryResponse {
        thread_id,
        messages,
    }))
}

async fn register(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<Credentials>,
) -> ApiResult<RegisterResponse> {
    let user = ctx.auth.register(&req.email, &req.password)?;
    let msg = if user.is_active {
        "User registered successfully."
    } else {
        "User registered successfully. Pending activation."
    };
    Ok(Json(RegisterResponse { msg }))
}

async fn login(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<Credentials>,
) -> ApiResult<LoginResponse> {
    let access_token = ctx.auth.login(&req.email, &req.password)?;
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
    }))
}

async fn me(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> ApiResult<User> {
    Ok(Json(ctx.auth.authenticate(bearer_token(&headers)?)?))
}

async fn collections(State(ctx): State<Arc<AppContext>>) -> ApiResult<CollectionsResponse> {
    let mut collections = Vec::new();
    for name in ctx.tools.context().get_collections().await? {
        collections.push(ctx.vector_store.collection_info(&name).await?);
    }
    Ok(Json(CollectionsResponse { collections }))
}
