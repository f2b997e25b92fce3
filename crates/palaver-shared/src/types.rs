use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Composite identity of a chat user: a tenant application plus the id that
/// application uses for its own end user.
///
/// The pair never leaves this type as an ad-hoc string join; the opaque
/// storage id is derived by [`ChatUserKey::derived_id`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChatUserKey {
    pub tenant_app_id: String,
    pub external_id: String,
}

impl ChatUserKey {
    pub fn new(tenant_app_id: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            tenant_app_id: tenant_app_id.into(),
            external_id: external_id.into(),
        }
    }

    /// Derive the opaque internal id for this key.
    ///
    /// Both fields are length-prefixed before hashing, so distinct pairs can
    /// never produce the same digest the way a plain `tenant_user` string
    /// concatenation could.
    pub fn derived_id(&self) -> ChatUserId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.tenant_app_id.len() as u64).to_le_bytes());
        hasher.update(self.tenant_app_id.as_bytes());
        hasher.update(&(self.external_id.len() as u64).to_le_bytes());
        hasher.update(self.external_id.as_bytes());
        let digest = hasher.finalize();
        ChatUserId(hex::encode(&digest.as_bytes()[..16]))
    }
}

/// Opaque internal id of a chat user (32 hex chars, blake3-derived).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChatUserId(pub String);

impl ChatUserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChatUserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Device platform a chat user registered a push token from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    Android,
    Ios,
    Web,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Android => "ANDROID",
            Self::Ios => "IOS",
            Self::Web => "WEB",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ANDROID" => Some(Self::Android),
            "IOS" => Some(Self::Ios),
            "WEB" => Some(Self::Web),
            _ => None,
        }
    }
}

/// A conversation is either a one-to-one chat or an admin-managed group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationKind {
    Direct,
    Group,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "DIRECT",
            Self::Group => "GROUP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DIRECT" => Some(Self::Direct),
            "GROUP" => Some(Self::Group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Text,
    Image,
    Document,
    Audio,
    Call,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
            Self::Document => "DOCUMENT",
            Self::Audio => "AUDIO",
            Self::Call => "CALL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TEXT" => Some(Self::Text),
            "IMAGE" => Some(Self::Image),
            "DOCUMENT" => Some(Self::Document),
            "AUDIO" => Some(Self::Audio),
            "CALL" => Some(Self::Call),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallStatus {
    Ongoing,
    Ended,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ongoing => "ONGOING",
            Self::Ended => "ENDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ONGOING" => Some(Self::Ongoing),
            "ENDED" => Some(Self::Ended),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_id_is_deterministic() {
        let a = ChatUserKey::new("acme", "u-1").derived_id();
        let b = ChatUserKey::new("acme", "u-1").derived_id();
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 32);
    }

    #[test]
    fn derived_id_is_tenant_scoped() {
        let a = ChatUserKey::new("acme", "u-1").derived_id();
        let b = ChatUserKey::new("globex", "u-1").derived_id();
        assert_ne!(a, b);
    }

    #[test]
    fn derived_id_resists_concatenation_collisions() {
        // "a" + "b_c" and "a_b" + "c" join to the same string but must not
        // resolve to the same identity.
        let a = ChatUserKey::new("a", "b_c").derived_id();
        let b = ChatUserKey::new("a_b", "c").derived_id();
        assert_ne!(a, b);
    }

    #[test]
    fn enum_round_trips() {
        for kind in ["TEXT", "IMAGE", "DOCUMENT", "AUDIO", "CALL"] {
            assert_eq!(MessageKind::parse(kind).unwrap().as_str(), kind);
        }
        assert_eq!(DeviceType::parse("IOS"), Some(DeviceType::Ios));
        assert_eq!(ConversationKind::parse("GROUP"), Some(ConversationKind::Group));
        assert!(MessageKind::parse("VIDEO").is_none());
    }
}
