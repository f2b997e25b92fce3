//! v001 -- Initial schema creation.
//!
//! Creates the chat tables (`chat_users`, `conversations`, `participants`,
//! `messages`, `calls`), the tenant registry (`app_clients`) and the portal
//! tables (`portal_users`, `posts`).

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
///
/// Conversation children (`participants`, `messages`, `calls`) reference
/// `conversations(id)` WITHOUT a foreign key: deleting a conversation must
/// not cascade, and orphan rows are cleaned up by the explicit purge
/// operation. `participants.user_id` is likewise soft so that invitees can
/// be added before their first connect.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Tenant registry
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS app_clients (
    id         TEXT PRIMARY KEY NOT NULL,   -- tenant-chosen identifier
    name       TEXT,
    created_at TEXT NOT NULL,               -- ISO-8601 / RFC-3339
    updated_at TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Chat users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_users (
    id                  TEXT PRIMARY KEY NOT NULL,  -- blake3-derived hex id
    tenant_app_id       TEXT NOT NULL,              -- soft ref -> app_clients(id)
    external_id         TEXT NOT NULL,
    display_name        TEXT,
    avatar              TEXT,
    email               TEXT,
    presence_expires_at TEXT,                       -- online until this instant
    device_token        TEXT,
    device_type         TEXT,                       -- ANDROID | IOS | WEB
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,

    UNIQUE (tenant_app_id, external_id)
);

CREATE INDEX IF NOT EXISTS idx_chat_users_tenant ON chat_users(tenant_app_id);

-- ----------------------------------------------------------------
-- Conversations
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id            TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    tenant_app_id TEXT NOT NULL,
    kind          TEXT NOT NULL,              -- DIRECT | GROUP
    name          TEXT,                       -- meaningful for groups
    admin_id      TEXT,                       -- soft ref -> chat_users(id)
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL               -- doubles as recency key
);

CREATE INDEX IF NOT EXISTS idx_conversations_tenant_updated
    ON conversations(tenant_app_id, updated_at DESC);

-- ----------------------------------------------------------------
-- Participants
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS participants (
    conversation_id      TEXT NOT NULL,       -- soft ref -> conversations(id)
    user_id              TEXT NOT NULL,       -- soft ref -> chat_users(id)
    joined_at            TEXT NOT NULL,
    last_read_at         TEXT,                -- monotonically non-decreasing
    last_read_message_id TEXT,

    PRIMARY KEY (conversation_id, user_id)
);

CREATE INDEX IF NOT EXISTS idx_participants_user ON participants(user_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    conversation_id TEXT NOT NULL,              -- soft ref -> conversations(id)
    sender_id       TEXT NOT NULL,              -- soft ref -> chat_users(id)
    kind            TEXT NOT NULL,              -- TEXT | IMAGE | DOCUMENT | AUDIO | CALL
    content         TEXT,
    metadata        TEXT,                       -- JSON blob
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
    ON messages(conversation_id, created_at DESC);

-- ----------------------------------------------------------------
-- Calls
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS calls (
    id              TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    conversation_id TEXT NOT NULL,              -- soft ref -> conversations(id)
    caller_id       TEXT NOT NULL,              -- soft ref -> chat_users(id)
    status          TEXT NOT NULL,              -- ONGOING | ENDED
    started_at      TEXT NOT NULL,
    ended_at        TEXT
);

CREATE INDEX IF NOT EXISTS idx_calls_conversation ON calls(conversation_id);

-- ----------------------------------------------------------------
-- Portal users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS portal_users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Posts
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    title      TEXT NOT NULL,
    content    TEXT NOT NULL,
    author_id  INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,

    FOREIGN KEY (author_id) REFERENCES portal_users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
