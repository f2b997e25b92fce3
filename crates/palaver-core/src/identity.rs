//! Identity resolution for tenant-scoped chat users.

use serde::{Deserialize, Serialize};

use palaver_shared::claim::ConnectClaim;
use palaver_shared::{ChatUserKey, DeviceType};
use palaver_store::{ChatUser, ChatUserUpsert};

use crate::error::Result;
use crate::{ChatEngine, ChatError};

/// Validated connect payload. Optional fields left `None` keep whatever the
/// store already holds for this identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectRequest {
    pub tenant_app_id: String,
    pub external_id: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub email: Option<String>,
    pub device_token: Option<String>,
    pub device_type: Option<DeviceType>,
}

impl ChatEngine {
    /// Resolve (or create) the chat identity for a tenant's end user and
    /// issue the claim every subsequent operation consumes.
    ///
    /// Idempotent: repeated calls converge to the same row, refreshing the
    /// presence window each time. The identity key itself is immutable.
    pub fn connect(&self, request: ConnectRequest) -> Result<(ChatUser, ConnectClaim)> {
        if request.tenant_app_id.trim().is_empty() || request.external_id.trim().is_empty() {
            return Err(ChatError::Validation(
                "tenant_app_id and external_id are required".to_string(),
            ));
        }

        let key = ChatUserKey::new(request.tenant_app_id, request.external_id);
        let claim = ConnectClaim::issue(&key);

        let user = self.db().upsert_chat_user(&ChatUserUpsert {
            key,
            display_name: request.display_name,
            avatar: request.avatar,
            email: request.email,
            device_token: request.device_token,
            device_type: request.device_type,
            // Online until the claim lapses; the next connect extends it.
            presence_expires_at: claim.expires_at,
        })?;

        tracing::debug!(user = %user.id, tenant = %user.tenant_app_id, "chat user connected");
        Ok((user, claim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn request(ext: &str) -> ConnectRequest {
        ConnectRequest {
            tenant_app_id: "acme".to_string(),
            external_id: ext.to_string(),
            display_name: Some("Alice".to_string()),
            avatar: None,
            email: None,
            device_token: Some("tok-1".to_string()),
            device_type: Some(DeviceType::Android),
        }
    }

    #[test]
    fn connect_is_idempotent() {
        let (engine, _rx) = testutil::engine();

        let (first, claim_a) = engine.connect(request("u-1")).unwrap();

        let mut second = request("u-1");
        second.display_name = Some("Alice B.".to_string());
        second.device_token = None;
        let (updated, claim_b) = engine.connect(second).unwrap();

        assert_eq!(first.id, updated.id);
        assert_eq!(claim_a.user_id(), claim_b.user_id());
        assert_eq!(updated.display_name.as_deref(), Some("Alice B."));
        // Absent device token keeps the stored one.
        assert_eq!(updated.device_token.as_deref(), Some("tok-1"));
        // Presence window is refreshed forward.
        assert!(updated.presence_expires_at.unwrap() >= first.presence_expires_at.unwrap());
    }

    #[test]
    fn presence_is_a_future_expiry() {
        let (engine, _rx) = testutil::engine();
        let (user, claim) = engine.connect(request("u-1")).unwrap();

        assert_eq!(user.presence_expires_at.unwrap(), claim.expires_at);
        assert!(claim.expires_at > claim.issued_at);
    }

    #[test]
    fn blank_identity_rejected() {
        let (engine, _rx) = testutil::engine();
        let mut bad = request("u-1");
        bad.external_id = "  ".to_string();

        assert!(matches!(
            engine.connect(bad),
            Err(ChatError::Validation(_))
        ));
    }
}
