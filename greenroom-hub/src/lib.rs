mod auth;
mod config;
mod db;
mod errors;
mod events;
mod ledger;
mod notifications;
mod rooms;

pub mod util;

use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc::unbounded_channel;

pub use auth::*;
pub use config::*;
pub use db::{
    MemoryPersistence, NewNotification, NewScheduledStream, Notification, NotificationKind,
    NotificationPreferences, Persistence, PersistenceError, PrimaryKey, ScheduledStream,
};
pub use errors::*;
pub use events::*;
pub use ledger::*;
pub use notifications::*;
pub use rooms::*;

/// The cohort identifier, as issued by the dashboard
pub type CohortId = String;
/// The user identifier, as resolved by the authorization collaborator
pub type UserId = String;

// Reduces verbosity
type Store<K, T> = Arc<DashMap<K, Arc<T>>>;

/// The greenroom hub, the authority over all per-cohort live state.
///
/// Owns the room registry, the notification dispatcher, and the seams to
/// the external collaborators. Everything a transport needs goes through
/// this or a handle it produced.
pub struct Hub {
    pub rooms: RoomManager,
    pub notifications: Arc<NotificationDispatcher>,
    pub authority: Arc<dyn Authority>,

    context: HubContext,
    event_receiver: Mutex<Option<EventReceiver>>,
}

/// A type passed to various components of the hub, to access state, read
/// config, and emit events.
#[derive(Clone)]
pub struct HubContext {
    pub config: HubConfig,
    pub persistence: Arc<dyn Persistence>,
    pub ledger: Arc<dyn Ledger>,

    pub rooms: Store<CohortId, Room>,

    event_sender: EventSender,
}

impl Hub {
    pub fn new(
        config: HubConfig,
        persistence: Arc<dyn Persistence>,
        authority: Arc<dyn Authority>,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        let (event_sender, event_receiver) = unbounded_channel();

        let context = HubContext {
            config,
            persistence: persistence.clone(),
            ledger,
            rooms: Default::default(),
            event_sender,
        };

        let rooms = RoomManager::new(&context);
        let notifications = NotificationDispatcher::new(persistence);

        Self {
            rooms,
            notifications,
            authority,
            context,
            event_receiver: Mutex::new(Some(event_receiver)),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.context.config
    }

    /// Drains hub events, deriving targeted notifications and ledger
    /// calls from room activity. Spawn once next to the transport.
    pub async fn handle_events(&self) {
        let receiver = self.event_receiver.lock().take();

        let Some(mut receiver) = receiver else {
            warn!("Hub event loop started twice, ignoring");
            return;
        };

        while let Some(event) = receiver.recv().await {
            self.process_event(event).await;
        }
    }

    /// Records an upcoming stream and marks the room as scheduled
    pub async fn schedule_stream(
        &self,
        actor: &Identity,
        cohort_id: &str,
        title: String,
        starts_at: chrono::DateTime<chrono::Utc>,
        description: Option<String>,
    ) -> Result<ScheduledStream, HubError> {
        actor.require_moderator("schedule-stream")?;

        let stream = self
            .context
            .persistence
            .create_scheduled_stream(NewScheduledStream {
                cohort_id: cohort_id.to_string(),
                title,
                starts_at,
                description,
                created_by: actor.user_id.clone(),
            })
            .await?;

        if let Ok(room) = self.rooms.get(cohort_id) {
            room.mark_scheduled();
        }

        Ok(stream)
    }

    /// The upcoming streams recorded for a cohort
    pub async fn scheduled_streams(
        &self,
        cohort_id: &str,
    ) -> Result<Vec<ScheduledStream>, HubError> {
        Ok(self.context.persistence.scheduled_streams(cohort_id).await?)
    }

    /// Reminds every connected member of a cohort about an upcoming
    /// stream, subject to each member's preferences
    pub async fn send_reminder(
        &self,
        actor: &Identity,
        cohort_id: &str,
        stream_id: PrimaryKey,
    ) -> Result<(), HubError> {
        actor.require_moderator("send-reminder")?;

        let stream = self
            .context
            .persistence
            .scheduled_stream_by_id(stream_id)
            .await?;

        if stream.cohort_id != cohort_id {
            return Err(HubError::not_found("scheduled stream", stream_id.to_string()));
        }

        let room = self.rooms.get(cohort_id)?;

        for user_id in connected_user_ids(&room) {
            let result = self
                .notifications
                .notify(
                    &user_id,
                    NotificationKind::StreamReminder,
                    stream.title.clone(),
                    format!("Starts at {}", stream.starts_at.format("%Y-%m-%d %H:%M UTC")),
                )
                .await;

            if let Err(e) = result {
                warn!("Failed to deliver reminder to {}: {}", user_id, e);
            }
        }

        Ok(())
    }

    async fn process_event(&self, event: HubEvent) {
        match event {
            HubEvent::ParticipantJoined {
                cohort_id,
                user_id,
                display_name,
            } => {
                self.notify_members(
                    &cohort_id,
                    Some(&user_id),
                    NotificationKind::NewParticipant,
                    "New participant",
                    format!("{} joined cohort {}", display_name, cohort_id),
                )
                .await;
            }
            HubEvent::ParticipantLeft { cohort_id, user_id } => {
                debug!("User {} fully left cohort {}", user_id, cohort_id);
            }
            HubEvent::StreamStarted { cohort_id, url } => {
                self.notify_members(
                    &cohort_id,
                    None,
                    NotificationKind::StreamStart,
                    "Stream started",
                    format!("Cohort {} is live at {}", cohort_id, url),
                )
                .await;
            }
            HubEvent::MessageSent {
                cohort_id,
                message,
                mentioned,
            } => {
                for user_id in mentioned {
                    let result = self
                        .notifications
                        .notify(
                            &user_id,
                            NotificationKind::ChatMention,
                            "You were mentioned",
                            format!(
                                "{} in cohort {}: {}",
                                message.sender_display_name, cohort_id, message.text
                            ),
                        )
                        .await;

                    if let Err(e) = result {
                        warn!("Failed to deliver mention to {}: {}", user_id, e);
                    }
                }
            }
            HubEvent::LeaderChanged {
                cohort_id,
                user_id,
                display_name,
            } => {
                debug!("{} now leads cohort {}", display_name, cohort_id);

                // Fire and forget, the ledger owns its retry policy
                let ledger = self.context.ledger.clone();
                let reason = format!("leaderboard leader of cohort {}", cohort_id);

                tokio::spawn(async move {
                    if let Err(e) = ledger.mint(&user_id, &reason).await {
                        warn!("Mint for {} failed: {}", user_id, e);
                    }
                });
            }
        }
    }

    async fn notify_members(
        &self,
        cohort_id: &str,
        except: Option<&UserId>,
        kind: NotificationKind,
        title: &str,
        message: String,
    ) {
        let Ok(room) = self.rooms.get(cohort_id) else {
            return;
        };

        for user_id in connected_user_ids(&room) {
            if except == Some(&user_id) {
                continue;
            }

            let result = self
                .notifications
                .notify(&user_id, kind, title, message.clone())
                .await;

            if let Err(e) = result {
                warn!("Failed to deliver {:?} to {}: {}", kind, user_id, e);
            }
        }
    }
}

/// The distinct user ids currently connected to a room
fn connected_user_ids(room: &Room) -> Vec<UserId> {
    let mut user_ids: Vec<_> = room
        .current_connections()
        .into_iter()
        .map(|c| c.user_id)
        .collect();

    user_ids.sort();
    user_ids.dedup();
    user_ids
}

impl HubContext {
    pub fn emit(&self, event: HubEvent) {
        // The receiver lives in the hub, so this only fails during teardown
        let _ = self.event_sender.send(event);
    }
}

// Realistically, the context should always be created by the hub.
// However, in a test, this may not be possible.
#[cfg(test)]
impl HubContext {
    pub fn with_config(config: HubConfig) -> Self {
        let (event_sender, _) = unbounded_channel();

        Self {
            config,
            persistence: Arc::new(MemoryPersistence::new()),
            ledger: Arc::new(NoopLedger),
            rooms: Default::default(),
            event_sender,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    fn test_hub() -> Hub {
        Hub::new(
            HubConfig::default(),
            Arc::new(MemoryPersistence::new()),
            Arc::new(StaticAuthority::new()),
            Arc::new(NoopLedger),
        )
    }

    fn identity(user_id: &str, display_name: &str, role: Role) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            role,
        }
    }

    /// Runs every event the hub has emitted so far through the
    /// notification loop, without spawning it
    async fn drain_events(hub: &Hub) {
        let mut receiver = hub.event_receiver.lock().take().expect("receiver present");

        while let Ok(event) = receiver.try_recv() {
            hub.process_event(event).await;
        }

        *hub.event_receiver.lock() = Some(receiver);
    }

    #[tokio::test]
    async fn mentions_notify_connected_users() {
        let hub = test_hub();

        let sender = identity("u1", "Sam", Role::Member);
        let alice = identity("u2", "Alice", Role::Member);

        let _sender_conn = hub.rooms.join("rust-101", &sender);
        let _alice_conn = hub.rooms.join("rust-101", &alice);

        drain_events(&hub).await;
        let mut alice_notifications = hub.notifications.subscribe(&alice.user_id);

        let room = hub.rooms.get("rust-101").unwrap();
        room.send_message(&sender, "ping @Alice, thoughts?").unwrap();

        drain_events(&hub).await;

        let notification = alice_notifications.next().await.unwrap();
        assert_eq!(notification.kind, NotificationKind::ChatMention);
        assert!(notification.message.contains("Sam"));

        // The sender mentioned nobody else
        let history = hub.notifications.history(&sender.user_id).await.unwrap();
        assert!(history.iter().all(|n| n.kind != NotificationKind::ChatMention));
    }

    #[tokio::test]
    async fn stream_start_notifies_members() {
        let hub = test_hub();

        let host = identity("mod", "Host", Role::Moderator);
        let viewer = identity("u1", "Viewer", Role::Member);

        let _host_conn = hub.rooms.join("rust-101", &host);
        let _viewer_conn = hub.rooms.join("rust-101", &viewer);
        drain_events(&hub).await;

        let room = hub.rooms.get("rust-101").unwrap();
        room.start_stream(&host, "https://stream.example/rust-101")
            .unwrap();

        drain_events(&hub).await;

        let history = hub.notifications.history(&viewer.user_id).await.unwrap();
        assert!(history.iter().any(|n| n.kind == NotificationKind::StreamStart));
    }

    #[tokio::test]
    async fn joining_notifies_existing_members_only() {
        let hub = test_hub();

        let first = identity("u1", "First", Role::Member);
        let second = identity("u2", "Second", Role::Member);

        let _first_conn = hub.rooms.join("rust-101", &first);
        drain_events(&hub).await;

        let _second_conn = hub.rooms.join("rust-101", &second);
        drain_events(&hub).await;

        let first_history = hub.notifications.history(&first.user_id).await.unwrap();
        assert!(first_history
            .iter()
            .any(|n| n.kind == NotificationKind::NewParticipant));

        // The newcomer is not told about themselves
        let second_history = hub.notifications.history(&second.user_id).await.unwrap();
        assert!(second_history
            .iter()
            .all(|n| n.kind != NotificationKind::NewParticipant));
    }

    #[tokio::test]
    async fn scheduling_requires_moderator_and_marks_room() {
        let hub = test_hub();

        let member = identity("u1", "Member", Role::Member);
        let moderator = identity("mod", "Host", Role::Moderator);

        let _conn = hub.rooms.join("rust-101", &member);

        let denied = hub
            .schedule_stream(&member, "rust-101", "Kickoff".into(), chrono::Utc::now(), None)
            .await;
        assert!(matches!(denied, Err(HubError::Unauthorized { .. })));

        hub.schedule_stream(&moderator, "rust-101", "Kickoff".into(), chrono::Utc::now(), None)
            .await
            .unwrap();

        let room = hub.rooms.get("rust-101").unwrap();
        assert_eq!(room.snapshot().stream, StreamStatus::Scheduled);

        let listed = hub.scheduled_streams("rust-101").await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn reminders_reach_connected_members() {
        let hub = test_hub();

        let moderator = identity("mod", "Host", Role::Moderator);
        let viewer = identity("u1", "Viewer", Role::Member);

        let _conn = hub.rooms.join("rust-101", &viewer);

        let stream = hub
            .schedule_stream(
                &moderator,
                "rust-101",
                "Kickoff".into(),
                chrono::Utc::now(),
                None,
            )
            .await
            .unwrap();

        hub.send_reminder(&moderator, "rust-101", stream.id)
            .await
            .unwrap();

        let history = hub.notifications.history(&viewer.user_id).await.unwrap();
        assert!(history
            .iter()
            .any(|n| n.kind == NotificationKind::StreamReminder));

        let wrong_cohort = hub.send_reminder(&moderator, "other", stream.id).await;
        assert!(matches!(wrong_cohort, Err(HubError::NotFound { .. })));
    }
}
