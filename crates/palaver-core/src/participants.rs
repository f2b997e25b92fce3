//! Group membership: admin-gated add/remove of participants.

use chrono::Utc;

use palaver_shared::claim::ConnectClaim;
use palaver_shared::{ChatUserId, ChatUserKey, ConversationId, ConversationKind};
use palaver_store::{Conversation, Database, Participant};

use crate::error::{or_not_found, Result};
use crate::{ChatEngine, ChatError};

/// Load the conversation and enforce the two membership-mutation rules:
/// only groups can be mutated, and only by their stored admin.
fn authorize_mutation(
    db: &Database,
    conversation_id: ConversationId,
    claim: &ConnectClaim,
) -> Result<Conversation> {
    let conversation = db
        .get_conversation(conversation_id)
        .map_err(or_not_found("conversation"))?;

    if conversation.kind != ConversationKind::Group {
        return Err(ChatError::Forbidden(
            "membership of a direct conversation cannot be changed",
        ));
    }
    if conversation.admin_id.as_ref() != Some(&claim.user_id()) {
        return Err(ChatError::Forbidden(
            "only the conversation admin may manage participants",
        ));
    }
    Ok(conversation)
}

impl ChatEngine {
    /// Add members to a group. Re-adding an existing member is a silent
    /// no-op. Returns the number of rows actually inserted.
    pub fn add_participants(
        &self,
        claim: &ConnectClaim,
        conversation_id: ConversationId,
        external_ids: &[String],
    ) -> Result<usize> {
        if external_ids.is_empty() {
            return Err(ChatError::Validation(
                "at least one participant is required".to_string(),
            ));
        }

        let db = self.db();
        authorize_mutation(&db, conversation_id, claim)?;

        let mut user_ids: Vec<ChatUserId> = Vec::new();
        for external_id in external_ids {
            let id = ChatUserKey::new(claim.tenant_app_id.clone(), external_id.clone()).derived_id();
            if !user_ids.contains(&id) {
                user_ids.push(id);
            }
        }

        let inserted = db.insert_participants(conversation_id, &user_ids, Utc::now())?;
        tracing::debug!(
            conversation = %conversation_id,
            requested = user_ids.len(),
            inserted,
            "participants added"
        );
        Ok(inserted)
    }

    /// Remove a single member from a group. Removing a non-member is a
    /// silent no-op.
    pub fn remove_participant(
        &self,
        claim: &ConnectClaim,
        conversation_id: ConversationId,
        external_id: &str,
    ) -> Result<()> {
        let db = self.db();
        authorize_mutation(&db, conversation_id, claim)?;

        let target = ChatUserKey::new(claim.tenant_app_id.clone(), external_id).derived_id();
        let removed = db.delete_participant(conversation_id, &target)?;
        tracing::debug!(conversation = %conversation_id, removed, "participant removal");
        Ok(())
    }

    /// List the members of a conversation.
    pub fn participants(&self, conversation_id: ConversationId) -> Result<Vec<Participant>> {
        Ok(self.db().list_participants(conversation_id)?)
    }
}
