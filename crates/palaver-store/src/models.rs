//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer as a response body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use palaver_shared::{
    CallId, CallStatus, ChatUserId, ConversationId, ConversationKind, DeviceType, MessageId,
    MessageKind,
};

// ---------------------------------------------------------------------------
// ChatUser
// ---------------------------------------------------------------------------

/// A resolved tenant-scoped chat identity.
///
/// The primary key is derived from `(tenant_app_id, external_id)`; the pair
/// itself is stored alongside for queries and display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatUser {
    pub id: ChatUserId,
    pub tenant_app_id: String,
    pub external_id: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub email: Option<String>,
    /// The user counts as online until this instant (TTL-style marker,
    /// refreshed on every connect).
    pub presence_expires_at: Option<DateTime<Utc>>,
    pub device_token: Option<String>,
    pub device_type: Option<DeviceType>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub tenant_app_id: String,
    /// Derived from the invited-participant count at creation; never mutated.
    pub kind: ConversationKind,
    pub name: Option<String>,
    /// Creator of the conversation; authorizes group membership mutation.
    pub admin_id: Option<ChatUserId>,
    pub created_at: DateTime<Utc>,
    /// Last-activity ordering key, bumped on every message append.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// Membership row joining a conversation and a chat user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub conversation_id: ConversationId,
    pub user_id: ChatUserId,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
    pub last_read_message_id: Option<MessageId>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message. Append-only; only content/metadata may be edited,
/// and only by the sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: ChatUserId,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Call
// ---------------------------------------------------------------------------

/// A call session. ONGOING is the initial state, ENDED is terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Call {
    pub id: CallId,
    pub conversation_id: ConversationId,
    pub caller_id: ChatUserId,
    pub status: CallStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// AppClient (tenant registry)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppClient {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Portal user
// ---------------------------------------------------------------------------

/// A management-portal account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortalUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
