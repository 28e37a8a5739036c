use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// The type used for primary keys by the persistence collaborator
pub type PrimaryKey = u64;

/// The kinds of discrete events a user can be told about.
///
/// These are the dashboard's notification settings, one flag each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    ChatMention,
    StreamStart,
    NewParticipant,
    StreamReminder,
}

/// Per-user delivery switches, all on by default.
///
/// These govern dispatcher filtering only; room state never consults them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPreferences {
    pub chat_mentions: bool,
    pub stream_starts: bool,
    pub new_participants: bool,
    pub stream_reminders: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            chat_mentions: true,
            stream_starts: true,
            new_participants: true,
            stream_reminders: true,
        }
    }
}

impl NotificationPreferences {
    pub fn enabled(&self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::ChatMention => self.chat_mentions,
            NotificationKind::StreamStart => self.stream_starts,
            NotificationKind::NewParticipant => self.new_participants,
            NotificationKind::StreamReminder => self.stream_reminders,
        }
    }
}

/// A delivered notification, as stored in the user's durable list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: PrimaryKey,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

/// An upcoming stream announced through the scheduling path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledStream {
    pub id: PrimaryKey,
    pub cohort_id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub description: Option<String>,
    /// The moderator who scheduled it
    pub created_by: UserId,
}

#[derive(Debug)]
pub struct NewScheduledStream {
    pub cohort_id: String,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub description: Option<String>,
    pub created_by: UserId,
}
