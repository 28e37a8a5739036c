//! All schemas that are exposed from endpoints are defined here
//! along with the conversion impls

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use greenroom_hub::{
    ChatMessage as HubChatMessage, LeaderboardEntry as HubLeaderboardEntry,
    Notification as HubNotification, NotificationKind,
    NotificationPreferences as HubNotificationPreferences, PollPhase, PollState,
    RoomSnapshot, ScheduledStream as HubScheduledStream, StreamStatus as HubStreamStatus,
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: u64,
    sender_id: String,
    sender_display_name: String,
    text: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    id: u64,
    question: String,
    options: Vec<String>,
    phase: String,
}

/// A poll together with its current vote counts
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollTally {
    pub poll: Poll,
    pub votes: HashMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    user_id: String,
    display_name: String,
    score: u64,
    rank: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub status: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CohortSnapshot {
    cohort_id: String,
    version: u64,
    stream: StreamStatus,
    poll: Option<PollTally>,
    banned_user_ids: Vec<String>,
    messages: Vec<Message>,
    leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    id: u64,
    kind: String,
    title: String,
    message: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    chat_mentions: bool,
    stream_starts: bool,
    new_participants: bool,
    stream_reminders: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledStream {
    id: u64,
    cohort_id: String,
    title: String,
    starts_at: DateTime<Utc>,
    description: Option<String>,
    created_by: String,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<Message> for HubChatMessage {
    fn to_serialized(&self) -> Message {
        Message {
            id: self.id,
            sender_id: self.sender_id.clone(),
            sender_display_name: self.sender_display_name.clone(),
            text: self.text.clone(),
            timestamp: self.sent_at,
        }
    }
}

impl ToSerialized<Poll> for PollState {
    fn to_serialized(&self) -> Poll {
        let phase = match self.phase {
            PollPhase::Open => "open",
            PollPhase::Closed => "closed",
        };

        Poll {
            id: self.id.value(),
            question: self.question.clone(),
            options: self.options.clone(),
            phase: phase.to_string(),
        }
    }
}

impl ToSerialized<PollTally> for PollState {
    fn to_serialized(&self) -> PollTally {
        PollTally {
            poll: self.to_serialized(),
            votes: self.votes.clone(),
        }
    }
}

impl ToSerialized<LeaderboardEntry> for HubLeaderboardEntry {
    fn to_serialized(&self) -> LeaderboardEntry {
        LeaderboardEntry {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            score: self.score,
            rank: self.rank,
        }
    }
}

impl ToSerialized<StreamStatus> for HubStreamStatus {
    fn to_serialized(&self) -> StreamStatus {
        let status = match self {
            HubStreamStatus::Offline => "offline",
            HubStreamStatus::Scheduled => "scheduled",
            HubStreamStatus::Live { .. } => "live",
        };

        StreamStatus {
            status: status.to_string(),
            url: self.url().map(|url| url.to_string()),
        }
    }
}

impl ToSerialized<CohortSnapshot> for RoomSnapshot {
    fn to_serialized(&self) -> CohortSnapshot {
        CohortSnapshot {
            cohort_id: self.cohort_id.clone(),
            version: self.version,
            stream: self.stream.to_serialized(),
            poll: self.poll.as_ref().map(|poll| poll.to_serialized()),
            banned_user_ids: self.bans.iter().map(|ban| ban.user_id.clone()).collect(),
            messages: self.messages.to_serialized(),
            leaderboard: self.leaderboard.to_serialized(),
        }
    }
}

impl ToSerialized<Notification> for HubNotification {
    fn to_serialized(&self) -> Notification {
        let kind = match self.kind {
            NotificationKind::ChatMention => "chat-mention",
            NotificationKind::StreamStart => "stream-start",
            NotificationKind::NewParticipant => "new-participant",
            NotificationKind::StreamReminder => "stream-reminder",
        };

        Notification {
            id: self.id,
            kind: kind.to_string(),
            title: self.title.clone(),
            message: self.message.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<NotificationPreferences> for HubNotificationPreferences {
    fn to_serialized(&self) -> NotificationPreferences {
        NotificationPreferences {
            chat_mentions: self.chat_mentions,
            stream_starts: self.stream_starts,
            new_participants: self.new_participants,
            stream_reminders: self.stream_reminders,
        }
    }
}

impl ToSerialized<ScheduledStream> for HubScheduledStream {
    fn to_serialized(&self) -> ScheduledStream {
        ScheduledStream {
            id: self.id,
            cohort_id: self.cohort_id.clone(),
            title: self.title.clone(),
            starts_at: self.starts_at,
            description: self.description.clone(),
            created_by: self.created_by.clone(),
        }
    }
}
