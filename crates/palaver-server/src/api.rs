//! HTTP binding for the chat engine.
//!
//! Routes, request DTOs and the bearer-claim extraction live here; all
//! domain behavior stays inside `palaver-core`. Handlers translate typed
//! engine errors into HTTP statuses via [`ApiError`].

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{header, HeaderMap, Method};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use palaver_core::conversations::{ConversationPage, ConversationSummary, CreateConversation};
use palaver_core::identity::ConnectRequest;
use palaver_core::messages::{EditMessage, SendMessage};
use palaver_core::ChatEngine;
use palaver_shared::claim::{ConnectClaim, SessionClaim, TokenSigner};
use palaver_shared::{CallId, ConversationId, DeviceType, MessageId, MessageKind};
use palaver_store::{Call, ChatUser, Conversation, Database, Message, Participant};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::portal;
use crate::uploads::UploadStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ChatEngine>,
    pub db: Arc<Mutex<Database>>,
    pub signer: Arc<TokenSigner>,
    pub uploads: Arc<UploadStore>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Lock the shared database handle for the portal's direct CRUD.
    pub(crate) fn db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let max_upload = state.config.max_upload_size;

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        // Connect / auth
        .route("/chat/connect", post(connect))
        // Conversations
        .route("/chat/conversations", post(create_conversation).get(my_conversations))
        .route("/chat/conversations/list", get(list_conversations))
        .route(
            "/chat/conversations/:id",
            get(get_conversation)
                .patch(update_conversation)
                .delete(delete_conversation),
        )
        .route("/chat/conversations/:id/purge", post(purge_conversation))
        .route("/chat/conversations/:id/participants", get(list_participants))
        // Group management
        .route("/chat/groups/:id/participants", post(add_participants))
        .route(
            "/chat/groups/:id/participants/:user_id",
            delete(remove_participant),
        )
        // Messages
        .route(
            "/chat/conversations/:id/messages",
            post(send_message).get(list_messages),
        )
        .route("/chat/messages/:id", patch(edit_message))
        // Read markers
        .route("/chat/conversations/:id/read", post(mark_read))
        .route("/chat/conversations/:id/unread", get(unread_count))
        // Calls
        .route("/chat/conversations/:id/call", post(start_call))
        .route("/chat/conversations/:id/calls", get(list_calls))
        .route("/chat/calls/:id/end", post(end_call))
        // Attachments
        .route("/chat/upload", post(upload_attachment))
        .route("/uploads/:name", get(download_attachment))
        // Portal & tenant registry
        .merge(portal::routes())
        .layer(DefaultBodyLimit::max(max_upload + 64 * 1024))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server until it fails or the process shuts down.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP API listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Claim extraction
// ---------------------------------------------------------------------------

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("missing bearer token".to_string()))
}

/// Verify the caller's chat claim. Everything after this point treats the
/// claim as opaque, pre-verified identity context.
fn chat_claim(state: &AppState, headers: &HeaderMap) -> Result<ConnectClaim, ApiError> {
    Ok(state.signer.verify(bearer_token(headers)?)?)
}

/// Verify a portal session token.
pub(crate) fn session_claim(state: &AppState, headers: &HeaderMap) -> Result<SessionClaim, ApiError> {
    Ok(state.signer.verify(bearer_token(headers)?)?)
}

// ---------------------------------------------------------------------------
// Meta
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ConnectBody {
    tenant_app_id: String,
    external_id: String,
    display_name: Option<String>,
    avatar: Option<String>,
    email: Option<String>,
    device_token: Option<String>,
    device_type: Option<DeviceType>,
}

#[derive(Serialize)]
struct ConnectResponse {
    user: ChatUser,
    token: String,
}

async fn connect(
    State(state): State<AppState>,
    Json(body): Json<ConnectBody>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let (user, claim) = state.engine.connect(ConnectRequest {
        tenant_app_id: body.tenant_app_id,
        external_id: body.external_id,
        display_name: body.display_name,
        avatar: body.avatar,
        email: body.email,
        device_token: body.device_token,
        device_type: body.device_type,
    })?;

    let token = state
        .signer
        .issue(&claim)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(ConnectResponse { user, token }))
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateConversationBody {
    participant_ids: Vec<String>,
    name: Option<String>,
}

async fn create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateConversationBody>,
) -> Result<Json<Conversation>, ApiError> {
    let claim = chat_claim(&state, &headers)?;
    let conversation = state.engine.create_conversation(
        &claim,
        CreateConversation {
            participant_external_ids: body.participant_ids,
            name: body.name,
        },
    )?;
    Ok(Json(conversation))
}

async fn my_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let claim = chat_claim(&state, &headers)?;
    Ok(Json(state.engine.conversation_summaries(&claim)?))
}

#[derive(Deserialize)]
struct PageQuery {
    page: Option<u32>,
    limit: Option<u32>,
}

async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<ConversationPage>, ApiError> {
    let claim = chat_claim(&state, &headers)?;
    let page = state.engine.conversations(
        &claim.tenant_app_id,
        query.page.unwrap_or(1),
        query.limit.unwrap_or(20),
    )?;
    Ok(Json(page))
}

async fn get_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Conversation>, ApiError> {
    chat_claim(&state, &headers)?;
    Ok(Json(state.engine.conversation(ConversationId(id))?))
}

#[derive(Deserialize)]
struct UpdateConversationBody {
    name: Option<String>,
}

async fn update_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateConversationBody>,
) -> Result<Json<Conversation>, ApiError> {
    chat_claim(&state, &headers)?;
    Ok(Json(
        state
            .engine
            .rename_conversation(ConversationId(id), body.name)?,
    ))
}

async fn delete_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    chat_claim(&state, &headers)?;
    state.engine.delete_conversation(ConversationId(id))?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn purge_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    chat_claim(&state, &headers)?;
    let (participants, messages) = state.engine.purge_conversation(ConversationId(id))?;
    Ok(Json(serde_json::json!({
        "participants": participants,
        "messages": messages,
    })))
}

async fn list_participants(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    chat_claim(&state, &headers)?;
    Ok(Json(state.engine.participants(ConversationId(id))?))
}

// ---------------------------------------------------------------------------
// Group management
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AddParticipantsBody {
    user_ids: Vec<String>,
}

async fn add_participants(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<AddParticipantsBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claim = chat_claim(&state, &headers)?;
    let added = state
        .engine
        .add_participants(&claim, ConversationId(id), &body.user_ids)?;
    Ok(Json(serde_json::json!({ "added": added })))
}

async fn remove_participant(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, user_id)): Path<(Uuid, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claim = chat_claim(&state, &headers)?;
    state
        .engine
        .remove_participant(&claim, ConversationId(id), &user_id)?;
    Ok(Json(serde_json::json!({ "removed": true })))
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SendMessageBody {
    kind: MessageKind,
    content: Option<String>,
    metadata: Option<serde_json::Value>,
}

async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<Message>, ApiError> {
    let claim = chat_claim(&state, &headers)?;
    let message = state.engine.send_message(
        &claim,
        ConversationId(id),
        SendMessage {
            kind: body.kind,
            content: body.content,
            metadata: body.metadata,
        },
    )?;
    Ok(Json(message))
}

#[derive(Deserialize)]
struct MessagesQuery {
    limit: Option<u32>,
    cursor: Option<Uuid>,
}

async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    chat_claim(&state, &headers)?;
    let messages = state.engine.messages(
        ConversationId(id),
        query.limit,
        query.cursor.map(MessageId),
    )?;
    Ok(Json(messages))
}

#[derive(Deserialize)]
struct EditMessageBody {
    content: Option<String>,
    metadata: Option<serde_json::Value>,
}

async fn edit_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<EditMessageBody>,
) -> Result<Json<Message>, ApiError> {
    let claim = chat_claim(&state, &headers)?;
    let message = state.engine.edit_message(
        &claim,
        MessageId(id),
        EditMessage {
            content: body.content,
            metadata: body.metadata,
        },
    )?;
    Ok(Json(message))
}

// ---------------------------------------------------------------------------
// Read markers
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct MarkReadBody {
    message_id: Uuid,
}

async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<MarkReadBody>,
) -> Result<Json<Participant>, ApiError> {
    let claim = chat_claim(&state, &headers)?;
    let participant =
        state
            .engine
            .mark_read(&claim, ConversationId(id), MessageId(body.message_id))?;
    Ok(Json(participant))
}

async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claim = chat_claim(&state, &headers)?;
    let unread = state.engine.unread_count(&claim, ConversationId(id))?;
    Ok(Json(serde_json::json!({ "unread": unread })))
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

async fn start_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Call>, ApiError> {
    let claim = chat_claim(&state, &headers)?;
    Ok(Json(state.engine.start_call(&claim, ConversationId(id))?))
}

async fn end_call(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Call>, ApiError> {
    chat_claim(&state, &headers)?;
    Ok(Json(state.engine.end_call(CallId(id))?))
}

async fn list_calls(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Call>>, ApiError> {
    chat_claim(&state, &headers)?;
    Ok(Json(state.engine.calls(ConversationId(id))?))
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

async fn upload_attachment(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    chat_claim(&state, &headers)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_owned)
            .ok_or_else(|| ApiError::BadRequest("Missing file name".to_string()))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read field: {}", e)))?;

        let url = state.uploads.store(&file_name, &data).await?;

        info!(name = %file_name, size = data.len(), "Attachment uploaded");
        return Ok(Json(UploadResponse { url }));
    }

    Err(ApiError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

async fn download_attachment(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Vec<u8>, ApiError> {
    state.uploads.load(&name).await
}
