use std::{collections::HashMap, convert::Infallible};

use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive},
        Sse,
    },
};
use futures_util::{Stream, StreamExt};
use greenroom_hub::{Notification as HubNotification, RoomEventPayload, RoomUpdate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Session,
    context::ServerContext,
    serialized::{CohortSnapshot, LeaderboardEntry, Notification, Poll, ToSerialized},
};

/// The room-scoped push events, one per accepted mutation, tagged with
/// the room version they were stamped with
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum ServerEvent {
    /// The authoritative full state, always the first event of a
    /// subscription
    #[serde(rename_all = "camelCase")]
    Snapshot {
        cohort_id: String,
        version: u64,
        snapshot: CohortSnapshot,
    },
    #[serde(rename_all = "camelCase")]
    StreamStatusChange {
        cohort_id: String,
        version: u64,
        status: String,
        url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    PollUpdate {
        cohort_id: String,
        version: u64,
        poll: Poll,
        votes: HashMap<String, u64>,
    },
    #[serde(rename_all = "camelCase")]
    PollEnded { cohort_id: String, version: u64 },
    #[serde(rename_all = "camelCase")]
    Message {
        cohort_id: String,
        version: u64,
        id: u64,
        sender_id: String,
        sender_display_name: String,
        text: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
    #[serde(rename_all = "camelCase")]
    UserBanned {
        cohort_id: String,
        version: u64,
        user_id: String,
    },
    #[serde(rename_all = "camelCase")]
    LeaderboardUpdate {
        cohort_id: String,
        version: u64,
        entries: Vec<LeaderboardEntry>,
    },
}

/// A per-user push notification, outside any room's version order
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    notification: Notification,
}

impl From<RoomUpdate> for ServerEvent {
    fn from(update: RoomUpdate) -> Self {
        let RoomUpdate {
            cohort_id,
            version,
            payload,
        } = update;

        match payload {
            RoomEventPayload::Snapshot(snapshot) => Self::Snapshot {
                cohort_id,
                version,
                snapshot: snapshot.to_serialized(),
            },
            RoomEventPayload::StreamStatusChange { status } => {
                let status = status.to_serialized();

                Self::StreamStatusChange {
                    cohort_id,
                    version,
                    status: status.status,
                    url: status.url,
                }
            }
            RoomEventPayload::PollUpdate { poll } => Self::PollUpdate {
                cohort_id,
                version,
                votes: poll.votes.clone(),
                poll: poll.to_serialized(),
            },
            RoomEventPayload::PollEnded => Self::PollEnded { cohort_id, version },
            RoomEventPayload::Message(message) => Self::Message {
                cohort_id,
                version,
                id: message.id,
                sender_id: message.sender_id,
                sender_display_name: message.sender_display_name,
                text: message.text,
                timestamp: message.sent_at,
            },
            RoomEventPayload::UserBanned { user_id } => Self::UserBanned {
                cohort_id,
                version,
                user_id,
            },
            RoomEventPayload::LeaderboardUpdate { entries } => Self::LeaderboardUpdate {
                cohort_id,
                version,
                entries: entries.to_serialized(),
            },
        }
    }
}

impl From<HubNotification> for NotificationEvent {
    fn from(notification: HubNotification) -> Self {
        Self {
            notification: notification.to_serialized(),
        }
    }
}

fn to_sse_event(event: impl Serialize) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&event).expect("serializes properly");
    Ok(Event::default().data(data))
}

/// Subscribes the session to a cohort's room. The first event is the
/// authoritative snapshot; every later event arrives in version order.
/// A reconnect is a fresh request here, which resynchronizes through a
/// fresh snapshot instead of replaying a gap.
#[utoipa::path(
    get,
    path = "/v1/cohorts/{id}/events",
    tag = "events",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of room events for the cohort",
            body = ServerEvent
        )
    )
)]
pub(crate) async fn cohort_events(
    session: Session,
    State(context): State<ServerContext>,
    Path(cohort_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let handle = context.hub.rooms.join(&cohort_id, session.identity());

    let stream = handle.map(|update| to_sse_event(ServerEvent::from(update)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// The session user's live notifications, filtered by their preferences
#[utoipa::path(
    get,
    path = "/v1/notifications/events",
    tag = "events",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (
            status = 200,
            content_type = "text/event-stream",
            description = "A stream of notifications for the session user",
            body = NotificationEvent
        )
    )
)]
pub(crate) async fn notification_events(
    session: Session,
    State(context): State<ServerContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let handle = context
        .hub
        .notifications
        .subscribe(&session.identity().user_id);

    let stream = handle.map(|notification| to_sse_event(NotificationEvent::from(notification)));

    Sse::new(stream).keep_alive(KeepAlive::default())
}
