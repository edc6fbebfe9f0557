use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::message::{Message, NewMessage};
use crate::services::conversation_service::ConversationService;

const MESSAGE_COLS: &str = "id, conversation_id, sender_id, receiver_id, content, message_type, \
     attachment_url, attachment_name, attachment_size, attachment_mime, reply_to_id, \
     is_read, read_at, is_deleted, deleted_by, deleted_at, created_at";

pub struct MessageService;

impl MessageService {
    /// Persist a message in a conversation.
    ///
    /// Validates sender/receiver against the conversation's participants and
    /// the reply target against the same conversation before touching the
    /// messages table.
    pub async fn send(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        payload: NewMessage,
    ) -> AppResult<Message> {
        if sender_id == receiver_id {
            return Err(AppError::BadRequest(
                "sender and receiver must differ".into(),
            ));
        }
        if payload.content.trim().is_empty() {
            return Err(AppError::BadRequest("message content cannot be empty".into()));
        }

        let conversation =
            ConversationService::get_for_participant(db, conversation_id, sender_id).await?;
        if !conversation.has_participant(receiver_id) {
            return Err(AppError::NotFound);
        }

        if let Some(reply_to) = payload.reply_to_id {
            let target = sqlx::query("SELECT conversation_id, is_deleted FROM messages WHERE id = $1")
                .bind(reply_to)
                .fetch_optional(db)
                .await?
                .ok_or_else(|| AppError::BadRequest("reply target does not exist".into()))?;

            let target_conversation: Uuid = target.get("conversation_id");
            let target_deleted: bool = target.get("is_deleted");
            if target_conversation != conversation_id {
                return Err(AppError::BadRequest(
                    "reply target belongs to another conversation".into(),
                ));
            }
            if target_deleted {
                return Err(AppError::BadRequest("reply target was deleted".into()));
            }
        }

        let attachment = payload.attachment.as_ref();
        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, \
             message_type, attachment_url, attachment_name, attachment_size, attachment_mime, \
             reply_to_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {MESSAGE_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(sender_id)
        .bind(receiver_id)
        .bind(&payload.content)
        .bind(payload.message_type.as_str())
        .bind(attachment.map(|a| a.url.as_str()))
        .bind(attachment.map(|a| a.name.as_str()))
        .bind(attachment.and_then(|a| a.size))
        .bind(attachment.and_then(|a| a.mime_type.as_deref()))
        .bind(payload.reply_to_id)
        .fetch_one(db)
        .await?;

        Ok(message)
    }

    /// Page through a conversation's messages.
    ///
    /// Rows are fetched newest-first for cheap "most recent N" access and
    /// reversed before returning, so each page reads oldest-first. Passing
    /// `before_id` switches from offset pagination to a cursor for infinite
    /// scroll.
    pub async fn list(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        requester_id: Uuid,
        page: i64,
        page_size: i64,
        before_id: Option<Uuid>,
    ) -> AppResult<(Vec<Message>, i64, bool)> {
        let conversation = sqlx::query_as::<_, crate::models::conversation::Conversation>(
            "SELECT id, participant_one, participant_two, last_message_id, last_message_at, \
             created_at FROM conversations WHERE id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;
        if !conversation.has_participant(requester_id) {
            return Err(AppError::Forbidden);
        }

        let page = page.max(1);
        let page_size = page_size.clamp(1, 200);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = $1 AND is_deleted = FALSE",
        )
        .bind(conversation_id)
        .fetch_one(db)
        .await?;

        // Fetch one row beyond the page to learn whether more remain
        let mut rows: Vec<Message> = match before_id {
            Some(before) => {
                let anchor = sqlx::query(
                    "SELECT created_at FROM messages WHERE id = $1 AND conversation_id = $2",
                )
                .bind(before)
                .bind(conversation_id)
                .fetch_optional(db)
                .await?
                .ok_or(AppError::NotFound)?;
                let anchor_at: DateTime<Utc> = anchor.get("created_at");

                sqlx::query_as::<_, Message>(&format!(
                    "SELECT {MESSAGE_COLS} FROM messages \
                     WHERE conversation_id = $1 AND is_deleted = FALSE \
                       AND (created_at, id) < ($2, $3) \
                     ORDER BY created_at DESC, id DESC LIMIT $4"
                ))
                .bind(conversation_id)
                .bind(anchor_at)
                .bind(before)
                .bind(page_size + 1)
                .fetch_all(db)
                .await?
            }
            None => {
                let offset = (page - 1) * page_size;
                sqlx::query_as::<_, Message>(&format!(
                    "SELECT {MESSAGE_COLS} FROM messages \
                     WHERE conversation_id = $1 AND is_deleted = FALSE \
                     ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
                ))
                .bind(conversation_id)
                .bind(page_size + 1)
                .bind(offset)
                .fetch_all(db)
                .await?
            }
        };

        let has_more = rows.len() as i64 > page_size;
        rows.truncate(page_size as usize);
        rows.reverse(); // conversational reading order
        Ok((rows, total, has_more))
    }

    /// Mark a single message read.
    ///
    /// Only the receiver may read, and a message already read reports
    /// NotFound (zero rows matched) rather than no-opping.
    pub async fn mark_read(
        db: &Pool<Postgres>,
        message_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<Message> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "UPDATE messages SET is_read = TRUE, read_at = NOW() \
             WHERE id = $1 AND receiver_id = $2 AND is_read = FALSE AND is_deleted = FALSE \
             RETURNING {MESSAGE_COLS}"
        ))
        .bind(message_id)
        .bind(reader_id)
        .fetch_optional(db)
        .await?
        .ok_or(AppError::NotFound)?;
        Ok(message)
    }

    /// Mark every unread message addressed to `reader_id` in the
    /// conversation as read. Zero matches is a successful no-op.
    pub async fn mark_all_read(
        db: &Pool<Postgres>,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE messages SET is_read = TRUE, read_at = NOW() \
             WHERE conversation_id = $1 AND receiver_id = $2 \
               AND is_read = FALSE AND is_deleted = FALSE",
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Soft-delete a message. Only the sender may delete; the ownership
    /// filter makes a non-sender attempt indistinguishable from a missing
    /// row.
    pub async fn soft_delete(
        db: &Pool<Postgres>,
        message_id: Uuid,
        requester_id: Uuid,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE messages SET is_deleted = TRUE, deleted_by = $2, deleted_at = NOW() \
             WHERE id = $1 AND sender_id = $2 AND is_deleted = FALSE",
        )
        .bind(message_id)
        .bind(requester_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    /// Full-text search across the requester's conversations.
    pub async fn search(
        db: &Pool<Postgres>,
        requester_id: Uuid,
        query: &str,
        page: i64,
        page_size: i64,
    ) -> AppResult<(Vec<Message>, i64)> {
        if query.trim().is_empty() {
            return Err(AppError::BadRequest("search query cannot be empty".into()));
        }
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let offset = (page - 1) * page_size;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages m \
             JOIN conversations c ON m.conversation_id = c.id \
             WHERE (c.participant_one = $1 OR c.participant_two = $1) \
               AND m.is_deleted = FALSE \
               AND m.content_tsv @@ plainto_tsquery('english', $2)",
        )
        .bind(requester_id)
        .bind(query)
        .fetch_one(db)
        .await?;

        let rows = sqlx::query_as::<_, Message>(
            "SELECT m.id, m.conversation_id, m.sender_id, m.receiver_id, m.content, \
             m.message_type, m.attachment_url, m.attachment_name, m.attachment_size, \
             m.attachment_mime, m.reply_to_id, m.is_read, m.read_at, m.is_deleted, \
             m.deleted_by, m.deleted_at, m.created_at \
             FROM messages m \
             JOIN conversations c ON m.conversation_id = c.id \
             WHERE (c.participant_one = $1 OR c.participant_two = $1) \
               AND m.is_deleted = FALSE \
               AND m.content_tsv @@ plainto_tsquery('english', $2) \
             ORDER BY m.created_at DESC LIMIT $3 OFFSET $4",
        )
        .bind(requester_id)
        .bind(query)
        .bind(page_size)
        .bind(offset)
        .fetch_all(db)
        .await?;

        Ok((rows, total))
    }

    /// Total unread messages across all conversations, for badge counters.
    pub async fn unread_count(db: &Pool<Postgres>, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages \
             WHERE receiver_id = $1 AND is_read = FALSE AND is_deleted = FALSE",
        )
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(count)
    }
}
