//! Conversation lifecycle: create, read, list, rename, delete, purge.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use palaver_shared::claim::ConnectClaim;
use palaver_shared::{ChatUserId, ChatUserKey, ConversationId, ConversationKind};
use palaver_store::{Conversation, Message};

use crate::error::{or_not_found, Result};
use crate::{ChatEngine, ChatError};

/// Hard cap on a conversation-list page.
pub const MAX_CONVERSATION_PAGE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateConversation {
    /// External ids of the invited participants (the creator is implicit).
    pub participant_external_ids: Vec<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationPage {
    pub items: Vec<Conversation>,
    pub total: u64,
}

/// One entry of a user's conversation overview.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    pub last_message: Option<Message>,
    pub unread_count: u64,
}

impl ChatEngine {
    /// Create a conversation and seed its membership in one transaction.
    ///
    /// The kind is derived from the invited-participant count: exactly one
    /// invitee makes a DIRECT chat, anything more a GROUP — regardless of
    /// what the caller intended. The creator becomes the admin.
    pub fn create_conversation(
        &self,
        claim: &ConnectClaim,
        input: CreateConversation,
    ) -> Result<Conversation> {
        if input.participant_external_ids.is_empty() {
            return Err(ChatError::Validation(
                "at least one participant is required".to_string(),
            ));
        }

        let kind = if input.participant_external_ids.len() == 1 {
            ConversationKind::Direct
        } else {
            ConversationKind::Group
        };

        let creator = claim.user_id();
        let now = Utc::now();
        let conversation = Conversation {
            id: ConversationId::new(),
            tenant_app_id: claim.tenant_app_id.clone(),
            kind,
            name: input.name,
            admin_id: Some(creator.clone()),
            created_at: now,
            updated_at: now,
        };

        // Creator first, invitees deduplicated after it.
        let mut member_ids: Vec<ChatUserId> = vec![creator];
        for external_id in &input.participant_external_ids {
            let id = ChatUserKey::new(claim.tenant_app_id.clone(), external_id.clone()).derived_id();
            if !member_ids.contains(&id) {
                member_ids.push(id);
            }
        }

        self.db().create_conversation(&conversation, &member_ids)?;

        tracing::debug!(
            conversation = %conversation.id,
            kind = conversation.kind.as_str(),
            members = member_ids.len(),
            "conversation created"
        );
        Ok(conversation)
    }

    /// Fetch a conversation by id.
    pub fn conversation(&self, id: ConversationId) -> Result<Conversation> {
        self.db()
            .get_conversation(id)
            .map_err(or_not_found("conversation"))
    }

    /// One page of a tenant's conversations, most recently active first,
    /// plus the tenant's total count. `page` is 1-based.
    pub fn conversations(
        &self,
        tenant_app_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<ConversationPage> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_CONVERSATION_PAGE);
        let offset = u64::from(page - 1) * u64::from(limit);

        let (items, total) = self.db().list_conversations(tenant_app_id, limit, offset)?;
        Ok(ConversationPage { items, total })
    }

    /// Rename a conversation. Verifies existence before writing.
    pub fn rename_conversation(
        &self,
        id: ConversationId,
        name: Option<String>,
    ) -> Result<Conversation> {
        let db = self.db();
        db.get_conversation(id).map_err(or_not_found("conversation"))?;
        db.update_conversation_name(id, name.as_deref())?;
        db.get_conversation(id).map_err(or_not_found("conversation"))
    }

    /// Delete a conversation row. Verifies existence before deleting.
    ///
    /// Participant and message rows are deliberately left behind; use
    /// [`ChatEngine::purge_conversation`] to clean them up.
    pub fn delete_conversation(&self, id: ConversationId) -> Result<()> {
        let db = self.db();
        db.get_conversation(id).map_err(or_not_found("conversation"))?;
        db.delete_conversation(id)?;
        Ok(())
    }

    /// Remove the participant and message rows a deletion left behind.
    /// Returns `(participants, messages)` counts.
    pub fn purge_conversation(&self, id: ConversationId) -> Result<(usize, usize)> {
        let counts = self.db().purge_conversation(id)?;
        tracing::debug!(
            conversation = %id,
            participants = counts.0,
            messages = counts.1,
            "purged conversation orphans"
        );
        Ok(counts)
    }

    /// The calling user's conversations, most recently active first, each
    /// with its last message and the caller's unread count.
    pub fn conversation_summaries(&self, claim: &ConnectClaim) -> Result<Vec<ConversationSummary>> {
        let user_id = claim.user_id();
        let db = self.db();

        let read_markers: std::collections::HashMap<_, _> = db
            .participations_for_user(&user_id)?
            .into_iter()
            .map(|p| (p.conversation_id, p.last_read_at))
            .collect();

        let conversations = db.conversations_for_user(&user_id)?;
        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let last_read_at = read_markers.get(&conversation.id).copied().flatten();
            let last_message = db.latest_message(conversation.id)?;
            let unread_count = db.count_messages_after(conversation.id, last_read_at)?;

            summaries.push(ConversationSummary {
                conversation,
                last_message,
                unread_count,
            });
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    fn create(engine: &ChatEngine, claim: &ConnectClaim, invitees: &[&str]) -> Conversation {
        engine
            .create_conversation(
                claim,
                CreateConversation {
                    participant_external_ids: invitees.iter().map(|s| s.to_string()).collect(),
                    name: None,
                },
            )
            .unwrap()
    }

    #[test]
    fn one_invitee_makes_a_direct_chat() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");

        let convo = create(&engine, &claim, &["u-2"]);
        assert_eq!(convo.kind, ConversationKind::Direct);
        assert_eq!(convo.admin_id, Some(claim.user_id()));

        let members = engine.participants(convo.id).unwrap();
        let ids: Vec<_> = members.iter().map(|p| p.user_id.clone()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&claim.user_id()));
        assert!(ids.contains(&ChatUserKey::new("acme", "u-2").derived_id()));
    }

    #[test]
    fn multiple_invitees_always_make_a_group() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");

        let convo = create(&engine, &claim, &["u-2", "u-3"]);
        assert_eq!(convo.kind, ConversationKind::Group);
        assert_eq!(engine.participants(convo.id).unwrap().len(), 3);
    }

    #[test]
    fn duplicate_invitees_are_collapsed() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");

        // Two elements, so GROUP, but only two membership rows.
        let convo = create(&engine, &claim, &["u-2", "u-2"]);
        assert_eq!(convo.kind, ConversationKind::Group);
        assert_eq!(engine.participants(convo.id).unwrap().len(), 2);
    }

    #[test]
    fn empty_invite_list_rejected() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");

        assert!(matches!(
            engine.create_conversation(
                &claim,
                CreateConversation {
                    participant_external_ids: vec![],
                    name: None,
                }
            ),
            Err(ChatError::Validation(_))
        ));
    }

    #[test]
    fn rename_and_delete_verify_existence() {
        let (engine, _rx) = testutil::engine();
        let missing = ConversationId::new();

        assert!(matches!(
            engine.rename_conversation(missing, Some("x".into())),
            Err(ChatError::NotFound("conversation"))
        ));
        assert!(matches!(
            engine.delete_conversation(missing),
            Err(ChatError::NotFound("conversation"))
        ));
    }

    #[test]
    fn list_pages_with_total() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");
        for _ in 0..3 {
            create(&engine, &claim, &["u-2", "u-3"]);
        }

        let page = engine.conversations("acme", 1, 2).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, 3);

        let rest = engine.conversations("acme", 2, 2).unwrap();
        assert_eq!(rest.items.len(), 1);
    }

    #[test]
    fn summaries_carry_unread_and_last_message() {
        let (engine, _rx) = testutil::engine();
        let alice = testutil::connected(&engine, "u-1");
        let bob = testutil::connected(&engine, "u-2");
        let convo = create(&engine, &alice, &["u-2"]);

        for body in ["one", "two"] {
            engine
                .send_message(
                    &alice,
                    convo.id,
                    crate::messages::SendMessage {
                        kind: palaver_shared::MessageKind::Text,
                        content: Some(body.to_string()),
                        metadata: None,
                    },
                )
                .unwrap();
        }

        let summaries = engine.conversation_summaries(&bob).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].unread_count, 2);
        assert_eq!(
            summaries[0].last_message.as_ref().unwrap().content.as_deref(),
            Some("two")
        );
    }
}
