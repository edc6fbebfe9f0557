use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::conversation::{Conversation, ConversationSummary, LastMessagePreview};

const CONVERSATION_COLS: &str =
    "id, participant_one, participant_two, last_message_id, last_message_at, created_at";

/// Canonical representation of an unordered participant pair: the smaller id
/// always comes first, so both argument orders map to the same row.
pub fn normalized_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

pub struct ConversationService;

impl ConversationService {
    /// Return the conversation for the pair, creating it on first contact.
    ///
    /// Concurrent first contact from both sides races on the pair uniqueness
    /// constraint; the loser retries the lookup once and returns the
    /// winner's row instead of surfacing the constraint violation.
    pub async fn find_or_create(
        db: &Pool<Postgres>,
        user_a: Uuid,
        user_b: Uuid,
    ) -> AppResult<Conversation> {
        if user_a == user_b {
            return Err(AppError::BadRequest(
                "cannot start a conversation with yourself".into(),
            ));
        }
        let (first, second) = normalized_pair(user_a, user_b);

        if let Some(existing) = Self::find_by_pair(db, first, second).await? {
            return Ok(existing);
        }

        let insert = sqlx::query_as::<_, Conversation>(&format!(
            "INSERT INTO conversations (id, participant_one, participant_two) \
             VALUES ($1, $2, $3) RETURNING {CONVERSATION_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(first)
        .bind(second)
        .fetch_one(db)
        .await;

        match insert {
            Ok(conversation) => Ok(conversation),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                tracing::debug!(
                    participant_one = %first,
                    participant_two = %second,
                    "lost conversation-create race, returning existing row"
                );
                Self::find_by_pair(db, first, second)
                    .await?
                    .ok_or(AppError::Internal)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_pair(
        db: &Pool<Postgres>,
        first: Uuid,
        second: Uuid,
    ) -> AppResult<Option<Conversation>> {
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLS} FROM conversations \
             WHERE participant_one = $1 AND participant_two = $2"
        ))
        .bind(first)
        .bind(second)
        .fetch_optional(db)
        .await?;
        Ok(conversation)
    }

    /// Fetch a conversation, requiring `user_id` to be a participant.
    ///
    /// A conversation the caller cannot access reads as absent, so existence
    /// is not leaked to unauthorized callers.
    pub async fn get_for_participant(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLS} FROM conversations WHERE id = $1"
        ))
        .bind(conversation_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;

        if !conversation.has_participant(user_id) {
            return Err(AppError::NotFound);
        }
        Ok(conversation)
    }

    /// List a user's conversations, most recent activity first.
    ///
    /// Each entry resolves the other participant and carries an unread count
    /// computed on demand from the messages table; there is no counter
    /// column to drift. `search_term` restricts to conversations containing
    /// a matching non-deleted message.
    pub async fn list_for_user(
        db: &Pool<Postgres>,
        user_id: Uuid,
        page: i64,
        page_size: i64,
        search_term: Option<&str>,
    ) -> AppResult<(Vec<ConversationSummary>, i64)> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let offset = (page - 1) * page_size;

        let search_filter = if search_term.is_some() {
            "AND EXISTS (SELECT 1 FROM messages sm \
                         WHERE sm.conversation_id = c.id \
                           AND sm.is_deleted = FALSE \
                           AND sm.content ILIKE '%' || $4 || '%')"
        } else {
            ""
        };

        let list_sql = format!(
            r#"
            SELECT c.id,
                   c.participant_one,
                   c.participant_two,
                   c.last_message_at,
                   c.created_at,
                   lm.id AS last_message_id,
                   lm.sender_id AS last_message_sender_id,
                   lm.content AS last_message_content,
                   lm.message_type AS last_message_type,
                   (SELECT COUNT(*) FROM messages m
                     WHERE m.conversation_id = c.id
                       AND m.receiver_id = $1
                       AND m.is_read = FALSE
                       AND m.is_deleted = FALSE) AS unread_count
            FROM conversations c
            LEFT JOIN messages lm ON c.last_message_id = lm.id
            WHERE (c.participant_one = $1 OR c.participant_two = $1)
              {search_filter}
            ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );

        let mut list_query = sqlx::query(&list_sql)
            .bind(user_id)
            .bind(page_size)
            .bind(offset);
        if let Some(term) = search_term {
            list_query = list_query.bind(term);
        }
        let rows = list_query.fetch_all(db).await?;

        let summaries = rows
            .into_iter()
            .map(|row| {
                let participant_one: Uuid = row.get("participant_one");
                let participant_two: Uuid = row.get("participant_two");
                let other_participant_id = if participant_one == user_id {
                    participant_two
                } else {
                    participant_one
                };

                let last_message_id: Option<Uuid> = row.get("last_message_id");
                let last_message = last_message_id.map(|id| LastMessagePreview {
                    id,
                    sender_id: row.get("last_message_sender_id"),
                    content: row.get("last_message_content"),
                    message_type: row.get("last_message_type"),
                });

                ConversationSummary {
                    id: row.get("id"),
                    other_participant_id,
                    last_message,
                    last_message_at: row.get("last_message_at"),
                    unread_count: row.get("unread_count"),
                    created_at: row.get("created_at"),
                }
            })
            .collect();

        let count_sql = format!(
            "SELECT COUNT(*) FROM conversations c \
             WHERE (c.participant_one = $1 OR c.participant_two = $1) {search_filter_count}",
            search_filter_count = if search_term.is_some() {
                "AND EXISTS (SELECT 1 FROM messages sm \
                             WHERE sm.conversation_id = c.id \
                               AND sm.is_deleted = FALSE \
                               AND sm.content ILIKE '%' || $2 || '%')"
            } else {
                ""
            }
        );
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(user_id);
        if let Some(term) = search_term {
            count_query = count_query.bind(term);
        }
        let total = count_query.fetch_one(db).await?;

        Ok((summaries, total))
    }

    /// Refresh the denormalized last-message pointer.
    ///
    /// Callers treat failure as stale list ordering, not as a failed send;
    /// the message itself is already durable.
    pub async fn touch_last_message(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        message_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            "UPDATE conversations SET last_message_id = $2, last_message_at = NOW() WHERE id = $1",
        )
        .bind(conversation_id)
        .bind(message_id)
        .execute(db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_normalization_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(normalized_pair(a, b), normalized_pair(b, a));
    }

    #[test]
    fn pair_normalization_puts_smaller_id_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (first, second) = normalized_pair(a, b);
        assert!(first <= second);
    }

    #[test]
    fn pair_normalization_is_identity_for_equal_ids() {
        let a = Uuid::new_v4();
        assert_eq!(normalized_pair(a, a), (a, a));
    }
}
