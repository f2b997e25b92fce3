//! Per-participant unread tracking.
//!
//! Unread counts are computed on read, never maintained incrementally: the
//! count is simply the number of messages newer than the participant's
//! `last_read_at` marker.

use palaver_shared::claim::ConnectClaim;
use palaver_shared::{ConversationId, MessageId};
use palaver_store::Participant;

use crate::error::{or_not_found, Result};
use crate::ChatEngine;

impl ChatEngine {
    /// The caller's unread count for one conversation. A participant who
    /// never read anything sees the full message count.
    pub fn unread_count(
        &self,
        claim: &ConnectClaim,
        conversation_id: ConversationId,
    ) -> Result<u64> {
        let db = self.db();
        let participant = db
            .get_participant(conversation_id, &claim.user_id())
            .map_err(or_not_found("participant"))?;

        Ok(db.count_messages_after(conversation_id, participant.last_read_at)?)
    }

    /// Advance the caller's read marker to the given message.
    ///
    /// The marker is monotonic: marking an older message than the current
    /// `last_read_at` leaves the row untouched and returns it unchanged.
    pub fn mark_read(
        &self,
        claim: &ConnectClaim,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<Participant> {
        let db = self.db();
        let message = db.get_message(message_id).map_err(or_not_found("message"))?;
        let user_id = claim.user_id();

        // The caller must already be a member.
        db.get_participant(conversation_id, &user_id)
            .map_err(or_not_found("participant"))?;

        let participant =
            db.advance_read_marker(conversation_id, &user_id, message.created_at, message_id)?;
        Ok(participant)
    }
}
