use anyhow::Result;

use crate::domain::message::{Message, MessageDraft, MessageRowId, User, UserId, UserToken};

/// Staged annotation writes for one message. Each `stage_*` call mutates one
/// field inside the run's transaction; nothing is durable until `commit`.
/// Dropping the run without committing rolls everything back.
pub trait AnnotationRun {
    fn stage_summary(&mut self, id: MessageRowId, summary: &str) -> Result<()>;
    fn stage_category(&mut self, id: MessageRowId, category: &str) -> Result<()>;
    fn stage_priority(&mut self, id: MessageRowId, score: i64) -> Result<()>;
    fn stage_action(&mut self, id: MessageRowId, action: &str) -> Result<()>;
    fn commit(self: Box<Self>) -> Result<()>;
}

pub trait MailStore: Send {
    fn get_or_create_user(&mut self, email: &str, full_name: Option<&str>) -> Result<User>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Replaces the user's stored token as one transaction: the old row is
    /// never observable as deleted without the new one inserted.
    fn replace_token(&mut self, token: &UserToken) -> Result<()>;
    fn get_token(&self, user_id: UserId) -> Result<Option<UserToken>>;

    /// Insert-or-skip keyed by the provider message id. Returns whether a
    /// row was actually inserted (duplicates are a successful no-op).
    /// A draft without a timestamp falls back to `ingested_at_epoch`.
    fn create_message(
        &mut self,
        owner_id: UserId,
        draft: &MessageDraft,
        ingested_at_epoch: i64,
    ) -> Result<bool>;

    /// Messages still awaiting processing, defined as "summary unset".
    fn get_unannotated(&self, user_id: UserId) -> Result<Vec<MessageRowId>>;
    fn get_message(&self, id: MessageRowId) -> Result<Option<Message>>;

    /// Annotated listing, sorted by priority score then recency.
    fn list_messages(&self, user_id: UserId, category: Option<&str>) -> Result<Vec<Message>>;

    /// Sender-dossier selection: case-insensitive substring match on the
    /// sender field, restricted to messages received at or after `since`.
    fn messages_from_sender(
        &self,
        user_id: UserId,
        sender_query: &str,
        since_epoch: i64,
    ) -> Result<Vec<Message>>;

    fn begin_annotation<'a>(&'a mut self) -> Result<Box<dyn AnnotationRun + 'a>>;

    /// Cheap liveness probe for the health endpoint.
    fn ping(&self) -> Result<()>;
}
