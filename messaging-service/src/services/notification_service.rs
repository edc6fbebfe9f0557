use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::notification::{
    Notification, NotificationKind, NotificationSettings, SettingsPatch,
};

const NOTIFICATION_COLS: &str =
    "id, user_id, kind, title, message, link, is_read, read_at, created_at";
const SETTINGS_COLS: &str = "user_id, enable_comment, enable_like, enable_mention, \
     enable_follow, enable_reply, enable_system, push_enabled, updated_at";

pub struct NotificationService;

impl NotificationService {
    /// Load the user's settings, creating the all-enabled default row on
    /// first access.
    pub async fn get_or_create_settings(
        db: &Pool<Postgres>,
        user_id: Uuid,
    ) -> AppResult<NotificationSettings> {
        let existing = sqlx::query_as::<_, NotificationSettings>(&format!(
            "SELECT {SETTINGS_COLS} FROM notification_settings WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?;

        if let Some(settings) = existing {
            return Ok(settings);
        }

        // ON CONFLICT covers a concurrent first access creating the row
        sqlx::query("INSERT INTO notification_settings (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(db)
            .await?;

        let settings = sqlx::query_as::<_, NotificationSettings>(&format!(
            "SELECT {SETTINGS_COLS} FROM notification_settings WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(settings)
    }

    /// Create a notification, honoring the recipient's per-kind opt-out.
    ///
    /// A disabled kind returns `Ok(None)` without inserting — callers never
    /// need to branch on settings themselves.
    pub async fn create(
        db: &Pool<Postgres>,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> AppResult<Option<Notification>> {
        let settings = Self::get_or_create_settings(db, user_id).await?;
        if !settings.allows(kind) {
            tracing::debug!(user_id = %user_id, kind = kind.as_str(), "notification kind disabled, skipping");
            return Ok(None);
        }

        let notification = sqlx::query_as::<_, Notification>(&format!(
            "INSERT INTO notifications (id, user_id, kind, title, message, link) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {NOTIFICATION_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind.as_str())
        .bind(title)
        .bind(message)
        .bind(link)
        .fetch_one(db)
        .await?;

        Ok(Some(notification))
    }

    /// List a user's notifications, newest first.
    pub async fn list(
        db: &Pool<Postgres>,
        user_id: Uuid,
        page: i64,
        page_size: i64,
        unread_only: bool,
    ) -> AppResult<Vec<Notification>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 50);
        let offset = (page - 1) * page_size;

        let unread_filter = if unread_only {
            "AND is_read = FALSE"
        } else {
            ""
        };
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLS} FROM notifications \
             WHERE user_id = $1 {unread_filter} \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(db)
        .await?;
        Ok(notifications)
    }

    pub async fn unread_count(db: &Pool<Postgres>, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(count)
    }

    /// Mark one notification read. Ownership lives in the WHERE clause:
    /// another user's notification affects zero rows and reports `false`,
    /// not an error.
    pub async fn mark_read(db: &Pool<Postgres>, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW() \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(db: &Pool<Postgres>, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = NOW() \
             WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete one notification; same ownership-via-filter contract as
    /// [`Self::mark_read`].
    pub async fn delete(db: &Pool<Postgres>, id: Uuid, user_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Retention sweep: drop notifications older than the window regardless
    /// of read state.
    pub async fn prune_older_than(db: &Pool<Postgres>, days: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE created_at < NOW() - make_interval(days => $1::int)",
        )
        .bind(days)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Apply a partial settings update. Unknown fields were already dropped
    /// during deserialization; an update carrying no recognized field is the
    /// only rejection.
    pub async fn update_settings(
        db: &Pool<Postgres>,
        user_id: Uuid,
        patch: SettingsPatch,
    ) -> AppResult<NotificationSettings> {
        if patch.is_empty() {
            return Err(AppError::BadRequest(
                "no recognized settings field in update".into(),
            ));
        }

        // Make sure the row exists before patching it
        Self::get_or_create_settings(db, user_id).await?;

        let settings = sqlx::query_as::<_, NotificationSettings>(&format!(
            "UPDATE notification_settings SET \
                enable_comment = COALESCE($2, enable_comment), \
                enable_like = COALESCE($3, enable_like), \
                enable_mention = COALESCE($4, enable_mention), \
                enable_follow = COALESCE($5, enable_follow), \
                enable_reply = COALESCE($6, enable_reply), \
                enable_system = COALESCE($7, enable_system), \
                push_enabled = COALESCE($8, push_enabled), \
                updated_at = NOW() \
             WHERE user_id = $1 RETURNING {SETTINGS_COLS}"
        ))
        .bind(user_id)
        .bind(patch.enable_comment)
        .bind(patch.enable_like)
        .bind(patch.enable_mention)
        .bind(patch.enable_follow)
        .bind(patch.enable_reply)
        .bind(patch.enable_system)
        .bind(patch.push_enabled)
        .fetch_one(db)
        .await?;
        Ok(settings)
    }

    // Trigger constructors: canned title/message templates per kind, all
    // delegating to `create` so the settings gate applies uniformly.

    pub async fn notify_comment(
        db: &Pool<Postgres>,
        recipient: Uuid,
        actor: &str,
        link: Option<&str>,
    ) -> AppResult<Option<Notification>> {
        Self::create(
            db,
            recipient,
            NotificationKind::Comment,
            "New comment",
            &format!("{actor} commented on your post"),
            link,
        )
        .await
    }

    pub async fn notify_like(
        db: &Pool<Postgres>,
        recipient: Uuid,
        actor: &str,
        link: Option<&str>,
    ) -> AppResult<Option<Notification>> {
        Self::create(
            db,
            recipient,
            NotificationKind::Like,
            "New like",
            &format!("{actor} liked your post"),
            link,
        )
        .await
    }

    pub async fn notify_mention(
        db: &Pool<Postgres>,
        recipient: Uuid,
        actor: &str,
        link: Option<&str>,
    ) -> AppResult<Option<Notification>> {
        Self::create(
            db,
            recipient,
            NotificationKind::Mention,
            "You were mentioned",
            &format!("{actor} mentioned you"),
            link,
        )
        .await
    }

    pub async fn notify_follow(
        db: &Pool<Postgres>,
        recipient: Uuid,
        actor: &str,
    ) -> AppResult<Option<Notification>> {
        Self::create(
            db,
            recipient,
            NotificationKind::Follow,
            "New follower",
            &format!("{actor} started following you"),
            None,
        )
        .await
    }

    pub async fn notify_reply(
        db: &Pool<Postgres>,
        recipient: Uuid,
        actor: &str,
        link: Option<&str>,
    ) -> AppResult<Option<Notification>> {
        Self::create(
            db,
            recipient,
            NotificationKind::Reply,
            "New reply",
            &format!("{actor} replied to your comment"),
            link,
        )
        .await
    }

    pub async fn notify_system(
        db: &Pool<Postgres>,
        recipient: Uuid,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> AppResult<Option<Notification>> {
        Self::create(db, recipient, NotificationKind::System, title, message, link).await
    }

    /// Batch mention insert: one transaction for all recipients that have
    /// the mention kind enabled. Returns the number of notifications
    /// created.
    pub async fn notify_mentions(
        db: &Pool<Postgres>,
        recipients: &[Uuid],
        actor: &str,
        link: Option<&str>,
    ) -> AppResult<u64> {
        let mut enabled = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let settings = Self::get_or_create_settings(db, *recipient).await?;
            if settings.allows(NotificationKind::Mention) {
                enabled.push(*recipient);
            }
        }
        if enabled.is_empty() {
            return Ok(0);
        }

        let message = format!("{actor} mentioned you");
        let mut tx = db.begin().await?;
        for recipient in &enabled {
            sqlx::query(
                "INSERT INTO notifications (id, user_id, kind, title, message, link) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(recipient)
            .bind(NotificationKind::Mention.as_str())
            .bind("You were mentioned")
            .bind(&message)
            .bind(link)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(enabled.len() as u64)
    }
}
