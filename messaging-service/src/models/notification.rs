use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of notification kinds. Each kind has its own opt-out toggle in
/// [`NotificationSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Comment,
    Like,
    Mention,
    Follow,
    Reply,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Comment => "comment",
            NotificationKind::Like => "like",
            NotificationKind::Mention => "mention",
            NotificationKind::Follow => "follow",
            NotificationKind::Reply => "reply",
            NotificationKind::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationSettings {
    pub user_id: Uuid,
    pub enable_comment: bool,
    pub enable_like: bool,
    pub enable_mention: bool,
    pub enable_follow: bool,
    pub enable_reply: bool,
    pub enable_system: bool,
    pub push_enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl NotificationSettings {
    /// Whether the owner accepts notifications of `kind`.
    pub fn allows(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::Comment => self.enable_comment,
            NotificationKind::Like => self.enable_like,
            NotificationKind::Mention => self.enable_mention,
            NotificationKind::Follow => self.enable_follow,
            NotificationKind::Reply => self.enable_reply,
            NotificationKind::System => self.enable_system,
        }
    }
}

/// Partial settings update. Unknown JSON fields are dropped during
/// deserialization; a patch with no recognized field is rejected by the
/// service layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub enable_comment: Option<bool>,
    #[serde(default)]
    pub enable_like: Option<bool>,
    #[serde(default)]
    pub enable_mention: Option<bool>,
    #[serde(default)]
    pub enable_follow: Option<bool>,
    #[serde(default)]
    pub enable_reply: Option<bool>,
    #[serde(default)]
    pub enable_system: Option<bool>,
    #[serde(default)]
    pub push_enabled: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.enable_comment.is_none()
            && self.enable_like.is_none()
            && self.enable_mention.is_none()
            && self.enable_follow.is_none()
            && self.enable_reply.is_none()
            && self.enable_system.is_none()
            && self.push_enabled.is_none()
    }
}
