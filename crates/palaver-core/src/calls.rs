//! Call sessions: a two-state machine keyed by conversation.

use chrono::Utc;

use palaver_shared::claim::ConnectClaim;
use palaver_shared::{CallId, CallStatus, ConversationId};
use palaver_store::Call;

use crate::error::{or_not_found, Result};
use crate::ChatEngine;

impl ChatEngine {
    /// Open a call session on a conversation. Nothing prevents several
    /// ONGOING calls on the same conversation; last write wins.
    pub fn start_call(&self, claim: &ConnectClaim, conversation_id: ConversationId) -> Result<Call> {
        let db = self.db();
        db.get_conversation(conversation_id)
            .map_err(or_not_found("conversation"))?;

        let call = Call {
            id: CallId::new(),
            conversation_id,
            caller_id: claim.user_id(),
            status: CallStatus::Ongoing,
            started_at: Utc::now(),
            ended_at: None,
        };
        db.insert_call(&call)?;

        tracing::debug!(call = %call.id, conversation = %conversation_id, "call started");
        Ok(call)
    }

    /// End a call. ENDED is terminal: ending an already-ended call returns
    /// the record unchanged instead of failing.
    pub fn end_call(&self, call_id: CallId) -> Result<Call> {
        let db = self.db();
        let call = db.get_call(call_id).map_err(or_not_found("call"))?;

        if call.status == CallStatus::Ended {
            return Ok(call);
        }

        db.mark_call_ended(call_id, Utc::now())?;
        db.get_call(call_id).map_err(or_not_found("call"))
    }

    /// Call history of a conversation, newest first.
    pub fn calls(&self, conversation_id: ConversationId) -> Result<Vec<Call>> {
        Ok(self.db().calls_for_conversation(conversation_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::CreateConversation;
    use crate::testutil;
    use crate::ChatError;

    fn conversation(engine: &ChatEngine, claim: &ConnectClaim) -> ConversationId {
        engine
            .create_conversation(
                claim,
                CreateConversation {
                    participant_external_ids: vec!["u-2".into()],
                    name: None,
                },
            )
            .unwrap()
            .id
    }

    #[test]
    fn lifecycle_ongoing_then_ended() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");
        let convo = conversation(&engine, &claim);

        let call = engine.start_call(&claim, convo).unwrap();
        assert_eq!(call.status, CallStatus::Ongoing);
        assert!(call.ended_at.is_none());

        let ended = engine.end_call(call.id).unwrap();
        assert_eq!(ended.status, CallStatus::Ended);
        assert!(ended.ended_at.is_some());
    }

    #[test]
    fn ending_twice_is_an_idempotent_noop() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");
        let convo = conversation(&engine, &claim);

        let call = engine.start_call(&claim, convo).unwrap();
        let first = engine.end_call(call.id).unwrap();
        let second = engine.end_call(call.id).unwrap();

        assert_eq!(second.ended_at, first.ended_at);
        assert_eq!(second.status, CallStatus::Ended);
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");

        assert!(matches!(
            engine.start_call(&claim, ConversationId::new()),
            Err(ChatError::NotFound("conversation"))
        ));
        assert!(matches!(
            engine.end_call(CallId::new()),
            Err(ChatError::NotFound("call"))
        ));
    }

    #[test]
    fn concurrent_ongoing_calls_are_not_prevented() {
        let (engine, _rx) = testutil::engine();
        let claim = testutil::connected(&engine, "u-1");
        let convo = conversation(&engine, &claim);

        engine.start_call(&claim, convo).unwrap();
        engine.start_call(&claim, convo).unwrap();

        let ongoing = engine
            .calls(convo)
            .unwrap()
            .into_iter()
            .filter(|c| c.status == CallStatus::Ongoing)
            .count();
        assert_eq!(ongoing, 2);
    }
}
