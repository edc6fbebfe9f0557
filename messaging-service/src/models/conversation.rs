use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A 1:1 conversation. The participant pair is stored normalized: the
/// smaller id always lands in `participant_one`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_one: Uuid,
    pub participant_two: Uuid,
    pub last_message_id: Option<Uuid>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participant_one == user_id || self.participant_two == user_id
    }

    /// The participant that is not `user_id`. Callers must have verified
    /// membership first.
    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.participant_one == user_id {
            self.participant_two
        } else {
            self.participant_one
        }
    }
}

/// Preview of the most recent message, denormalized into conversation lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessagePreview {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: String,
}

/// One entry of a user's conversation list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub other_participant_id: Uuid,
    pub last_message: Option<LastMessagePreview>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
    pub created_at: DateTime<Utc>,
}
