use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::info;
use parking_lot::Mutex;

use crate::{
    events::{HubEvent, RoomEventPayload, RoomUpdate},
    CohortId, HubConfig, HubContext, HubError, Identity, UserId,
};

use super::{
    BanEntry, ChatLog, ChatMessage, LeaderboardEntry, PollPhase, PollState, RoomConnection,
    RoomConnectionHandle, RoomConnectionId, Scoreboard, StreamStatus,
};

/// A cohort room, owning all live state for one cohort.
///
/// Every mutation goes through the single [Mutex] below: operations
/// against one room run one at a time in arrival order, stamp a
/// monotonically increasing version, and append their broadcast to each
/// subscriber's queue before the lock is released. Different rooms share
/// nothing and proceed fully in parallel.
pub struct Room {
    context: HubContext,
    cohort_id: CohortId,
    inner: Mutex<RoomInner>,
}

struct RoomInner {
    version: u64,
    stream: StreamStatus,
    poll: Option<PollState>,
    bans: HashMap<UserId, BanEntry>,
    chat: ChatLog,
    scoreboard: Scoreboard,
    leader: Option<UserId>,
    /// The users currently subscribed to this room
    connections: Vec<RoomConnection>,
    /// Set when the last subscriber leaves, cleared on join
    idle_since: Option<Instant>,
}

/// The authoritative full state of a room plus its version, sent to every
/// connection as its first message and served by the snapshot endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSnapshot {
    pub cohort_id: CohortId,
    pub version: u64,
    pub stream: StreamStatus,
    pub poll: Option<PollState>,
    /// Sorted by user id so two snapshots of equal state compare equal
    pub bans: Vec<BanEntry>,
    pub messages: Vec<ChatMessage>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl Room {
    pub fn new(context: &HubContext, cohort_id: CohortId) -> Self {
        Self {
            context: context.clone(),
            cohort_id,
            inner: Mutex::new(RoomInner {
                version: 0,
                stream: StreamStatus::default(),
                poll: None,
                bans: HashMap::new(),
                chat: ChatLog::new(context.config.chat_history_limit),
                scoreboard: Scoreboard::default(),
                leader: None,
                connections: Vec::new(),
                idle_since: Some(Instant::now()),
            }),
        }
    }

    pub fn id(&self) -> CohortId {
        self.cohort_id.clone()
    }

    /// Registers a subscription for the given identity.
    ///
    /// The handle's first message is the authoritative snapshot at the
    /// current version; every later mutation follows in version order.
    /// Reconnection is a fresh call to this, never a replay.
    pub fn connect(&self, identity: &Identity) -> RoomConnectionHandle {
        let connection = RoomConnection::new(
            identity.user_id.clone(),
            identity.display_name.clone(),
            identity.role,
        );

        let handle = connection.handle(&self.context, self.cohort_id.clone());

        let first_join = {
            let mut inner = self.inner.lock();

            let first_join = !inner
                .connections
                .iter()
                .any(|c| c.user_id == identity.user_id);

            connection.push(RoomUpdate {
                cohort_id: self.cohort_id.clone(),
                version: inner.version,
                payload: RoomEventPayload::Snapshot(
                    inner.snapshot(&self.cohort_id, &self.context.config),
                ),
            });

            inner.connections.push(connection);
            inner.idle_since = None;

            first_join
        };

        info!(
            "User {} connected to cohort {}",
            identity.display_name, self.cohort_id
        );

        if first_join {
            self.context.emit(HubEvent::ParticipantJoined {
                cohort_id: self.cohort_id.clone(),
                user_id: identity.user_id.clone(),
                display_name: identity.display_name.clone(),
            });
        }

        handle
    }

    /// Called when a [RoomConnectionHandle] is dropped. Idempotent.
    pub fn remove_connection(&self, connection_id: RoomConnectionId) {
        let departed = {
            let mut inner = self.inner.lock();

            let Some(index) = inner.connections.iter().position(|c| c.id == connection_id) else {
                return;
            };

            let connection = inner.connections.remove(index);

            if inner.connections.is_empty() {
                inner.idle_since = Some(Instant::now());
            }

            let still_connected = inner
                .connections
                .iter()
                .any(|c| c.user_id == connection.user_id);

            (!still_connected).then(|| connection.user_id.clone())
        };

        if let Some(user_id) = departed {
            info!("User {} disconnected from cohort {}", user_id, self.cohort_id);

            self.context.emit(HubEvent::ParticipantLeft {
                cohort_id: self.cohort_id.clone(),
                user_id,
            });
        }
    }

    /// Admits a chat message.
    ///
    /// The ban check happens here, inside the room's serialization point:
    /// a send racing with a ban is admitted or rejected depending on which
    /// operation entered the room first, never on what the sender's client
    /// believed at the time.
    pub fn send_message(&self, sender: &Identity, text: &str) -> Result<ChatMessage, HubError> {
        let text = text.trim();

        if text.is_empty() {
            return Err(HubError::validation("text", "must not be empty"));
        }

        if text.chars().count() > self.context.config.max_message_length {
            return Err(HubError::validation(
                "text",
                format!(
                    "must not exceed {} characters",
                    self.context.config.max_message_length
                ),
            ));
        }

        let (message, mentioned, new_leader) = {
            let mut inner = self.inner.lock();

            if inner.bans.contains_key(&sender.user_id) {
                return Err(HubError::Banned {
                    user_id: sender.user_id.clone(),
                });
            }

            let message = inner.chat.push(
                sender.user_id.clone(),
                sender.display_name.clone(),
                text.to_string(),
            );

            inner.publish(&self.cohort_id, RoomEventPayload::Message(message.clone()));

            inner
                .scoreboard
                .record_message(&sender.user_id, &sender.display_name);

            let new_leader = inner.refresh_leaderboard(&self.cohort_id, &self.context);

            let mut mentioned: Vec<UserId> = inner
                .connections
                .iter()
                .filter(|c| {
                    c.user_id != sender.user_id
                        && message.text.contains(&format!("@{}", c.display_name))
                })
                .map(|c| c.user_id.clone())
                .collect();

            mentioned.sort();
            mentioned.dedup();

            (message, mentioned, new_leader)
        };

        self.context.emit(HubEvent::MessageSent {
            cohort_id: self.cohort_id.clone(),
            message: message.clone(),
            mentioned,
        });

        self.emit_leader_change(new_leader);

        Ok(message)
    }

    /// Adds a user to the room's ban set. Idempotent; enforcement is
    /// prospective only, admitted history stays.
    pub fn ban(&self, actor: &Identity, target_user_id: &UserId) -> Result<(), HubError> {
        actor.require_moderator("ban-user")?;

        let mut inner = self.inner.lock();

        if inner.bans.contains_key(target_user_id) {
            return Ok(());
        }

        inner.bans.insert(
            target_user_id.clone(),
            BanEntry {
                user_id: target_user_id.clone(),
                banned_by: actor.user_id.clone(),
                banned_at: chrono::Utc::now(),
            },
        );

        inner.publish(
            &self.cohort_id,
            RoomEventPayload::UserBanned {
                user_id: target_user_id.clone(),
            },
        );

        Ok(())
    }

    /// Opens a poll. At most one poll is open per room at any instant.
    pub fn create_poll(
        &self,
        actor: &Identity,
        question: String,
        options: Vec<String>,
    ) -> Result<PollState, HubError> {
        actor.require_moderator("start-poll")?;

        let mut inner = self.inner.lock();

        if inner.poll.is_some() {
            return Err(HubError::conflict("poll", "a poll is already open"));
        }

        let poll = PollState::open(question, options)?;

        inner.poll = Some(poll.clone());
        inner.publish(
            &self.cohort_id,
            RoomEventPayload::PollUpdate { poll: poll.clone() },
        );

        Ok(poll)
    }

    /// Counts a vote on the open poll, at most once per user
    pub fn vote(&self, voter: &Identity, option: &str) -> Result<PollState, HubError> {
        let (poll, new_leader) = {
            let mut inner = self.inner.lock();

            let slot = inner
                .poll
                .as_mut()
                .ok_or_else(|| HubError::not_found("poll", self.cohort_id.clone()))?;

            slot.register_vote(&voter.user_id, option)?;
            let poll = slot.clone();

            inner.publish(
                &self.cohort_id,
                RoomEventPayload::PollUpdate { poll: poll.clone() },
            );

            inner
                .scoreboard
                .record_vote(&voter.user_id, &voter.display_name);

            let new_leader = inner.refresh_leaderboard(&self.cohort_id, &self.context);

            (poll, new_leader)
        };

        self.emit_leader_change(new_leader);

        Ok(poll)
    }

    /// Closes the open poll and clears the active slot
    pub fn end_poll(&self, actor: &Identity) -> Result<PollState, HubError> {
        actor.require_moderator("end-poll")?;

        let mut inner = self.inner.lock();

        let mut poll = inner
            .poll
            .take()
            .ok_or_else(|| HubError::not_found("poll", self.cohort_id.clone()))?;

        poll.phase = PollPhase::Closed;

        inner.publish(&self.cohort_id, RoomEventPayload::PollEnded);

        Ok(poll)
    }

    /// Sets the room live. Starting an already-live stream with the same
    /// url re-broadcasts the current state without a version bump, giving
    /// optimistic clients an authoritative echo to reconcile against.
    pub fn start_stream(&self, actor: &Identity, url: &str) -> Result<StreamStatus, HubError> {
        actor.require_moderator("update-stream-status")?;

        let url = url.trim();

        if url.is_empty() {
            return Err(HubError::validation("url", "must not be empty"));
        }

        let status = {
            let mut inner = self.inner.lock();

            if inner.stream.url() == Some(url) {
                let status = inner.stream.clone();

                inner.republish(
                    &self.cohort_id,
                    RoomEventPayload::StreamStatusChange {
                        status: status.clone(),
                    },
                );

                return Ok(status);
            }

            inner.stream = StreamStatus::Live {
                url: url.to_string(),
            };

            let status = inner.stream.clone();

            inner.publish(
                &self.cohort_id,
                RoomEventPayload::StreamStatusChange {
                    status: status.clone(),
                },
            );

            status
        };

        info!("Cohort {} went live", self.cohort_id);

        self.context.emit(HubEvent::StreamStarted {
            cohort_id: self.cohort_id.clone(),
            url: url.to_string(),
        });

        Ok(status)
    }

    /// Takes the room offline and clears the stream url
    pub fn stop_stream(&self, actor: &Identity) -> Result<StreamStatus, HubError> {
        actor.require_moderator("update-stream-status")?;

        let mut inner = self.inner.lock();

        inner.stream = StreamStatus::Offline;

        inner.publish(
            &self.cohort_id,
            RoomEventPayload::StreamStatusChange {
                status: StreamStatus::Offline,
            },
        );

        Ok(StreamStatus::Offline)
    }

    /// Marks the room as having an upcoming stream. Set through the
    /// scheduling path; a live stream is left untouched.
    pub fn mark_scheduled(&self) -> StreamStatus {
        let mut inner = self.inner.lock();

        if inner.stream == StreamStatus::Offline {
            inner.stream = StreamStatus::Scheduled;

            inner.publish(
                &self.cohort_id,
                RoomEventPayload::StreamStatusChange {
                    status: StreamStatus::Scheduled,
                },
            );
        }

        inner.stream.clone()
    }

    /// Counts an attendance event from the presence collaborator
    pub fn record_attendance(&self, attendee: &Identity) -> Vec<LeaderboardEntry> {
        let (entries, new_leader) = {
            let mut inner = self.inner.lock();

            inner
                .scoreboard
                .record_attendance(&attendee.user_id, &attendee.display_name);

            let new_leader = inner.refresh_leaderboard(&self.cohort_id, &self.context);

            (inner.scoreboard.ranked(&self.context.config), new_leader)
        };

        self.emit_leader_change(new_leader);

        entries
    }

    /// The ranked leaderboard at this instant
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.inner.lock().scoreboard.ranked(&self.context.config)
    }

    /// The authoritative full state plus version
    pub fn snapshot(&self) -> RoomSnapshot {
        self.inner
            .lock()
            .snapshot(&self.cohort_id, &self.context.config)
    }

    /// The current subscriptions. The same user can appear more than once.
    pub fn current_connections(&self) -> Vec<RoomConnection> {
        self.inner.lock().connections.clone()
    }

    /// Whether the room has been empty for longer than the grace window
    pub fn should_evict(&self, grace_period: Duration) -> bool {
        let inner = self.inner.lock();

        inner.connections.is_empty()
            && inner
                .idle_since
                .map(|since| since.elapsed() >= grace_period)
                .unwrap_or(false)
    }

    fn emit_leader_change(&self, new_leader: Option<LeaderboardEntry>) {
        if let Some(leader) = new_leader {
            self.context.emit(HubEvent::LeaderChanged {
                cohort_id: self.cohort_id.clone(),
                user_id: leader.user_id,
                display_name: leader.display_name,
            });
        }
    }
}

impl RoomInner {
    /// Stamps the next version and appends the update to every
    /// subscriber's queue, all under the room lock
    fn publish(&mut self, cohort_id: &CohortId, payload: RoomEventPayload) {
        self.version += 1;
        self.fan_out(cohort_id, self.version, payload);
    }

    /// Re-broadcasts at the current version without bumping it
    fn republish(&self, cohort_id: &CohortId, payload: RoomEventPayload) {
        self.fan_out(cohort_id, self.version, payload);
    }

    fn fan_out(&self, cohort_id: &CohortId, version: u64, payload: RoomEventPayload) {
        let update = RoomUpdate {
            cohort_id: cohort_id.clone(),
            version,
            payload,
        };

        for connection in &self.connections {
            connection.push(update.clone());
        }
    }

    /// Publishes the recomputed ranking and reports a crown change
    fn refresh_leaderboard(
        &mut self,
        cohort_id: &CohortId,
        context: &HubContext,
    ) -> Option<LeaderboardEntry> {
        let entries = self.scoreboard.ranked(&context.config);
        let leader = entries.first().cloned();
        let leader_id = leader.as_ref().map(|e| e.user_id.clone());

        let crowned = (leader_id != self.leader).then_some(leader).flatten();

        self.leader = leader_id;

        self.publish(cohort_id, RoomEventPayload::LeaderboardUpdate { entries });

        crowned
    }

    fn snapshot(&self, cohort_id: &CohortId, config: &HubConfig) -> RoomSnapshot {
        let mut bans: Vec<_> = self.bans.values().cloned().collect();
        bans.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        RoomSnapshot {
            cohort_id: cohort_id.clone(),
            version: self.version,
            stream: self.stream.clone(),
            poll: self.poll.clone(),
            bans,
            messages: self.chat.messages(),
            leaderboard: self.scoreboard.ranked(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use crate::Role;

    use super::*;

    fn context() -> HubContext {
        HubContext::with_config(HubConfig::default())
    }

    fn identity(user_id: &str, display_name: &str, role: Role) -> Identity {
        Identity {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            role,
        }
    }

    fn moderator() -> Identity {
        identity("mod", "Host", Role::Moderator)
    }

    fn member(n: u32) -> Identity {
        identity(&format!("u{}", n), &format!("User {}", n), Role::Member)
    }

    #[test]
    fn at_most_one_poll_is_open() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        room.create_poll(&moderator(), "Favorite topic?".into(), vec!["A".into(), "B".into()])
            .unwrap();

        let second = room.create_poll(
            &moderator(),
            "Another?".into(),
            vec!["X".into(), "Y".into()],
        );
        assert!(matches!(second, Err(HubError::Conflict { .. })));

        room.end_poll(&moderator()).unwrap();

        // The slot is free again once the poll is closed
        room.create_poll(&moderator(), "Another?".into(), vec!["X".into(), "Y".into()])
            .unwrap();
    }

    #[test]
    fn poll_requires_moderator() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        let denied = room.create_poll(&member(1), "Q?".into(), vec!["A".into(), "B".into()]);
        assert!(matches!(denied, Err(HubError::Unauthorized { .. })));

        room.create_poll(&moderator(), "Q?".into(), vec!["A".into(), "B".into()])
            .unwrap();

        let denied = room.end_poll(&member(1));
        assert!(matches!(denied, Err(HubError::Unauthorized { .. })));
    }

    #[test]
    fn duplicate_votes_leave_the_tally_unchanged() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        room.create_poll(&moderator(), "Q?".into(), vec!["A".into(), "B".into()])
            .unwrap();

        room.vote(&member(1), "A").unwrap();

        let repeat = room.vote(&member(1), "B");
        assert!(matches!(repeat, Err(HubError::Conflict { .. })));

        let poll = room.snapshot().poll.unwrap();
        assert_eq!(poll.tally(), vec![("A".to_string(), 1), ("B".to_string(), 0)]);
    }

    #[test]
    fn poll_runs_through_its_lifecycle() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        room.create_poll(
            &moderator(),
            "Favorite topic?".into(),
            vec!["A".into(), "B".into(), "C".into()],
        )
        .unwrap();

        room.vote(&member(1), "A").unwrap();
        room.vote(&member(2), "A").unwrap();
        room.vote(&member(3), "B").unwrap();

        let unknown = room.vote(&member(4), "D");
        assert!(matches!(unknown, Err(HubError::Validation { .. })));

        let poll = room.snapshot().poll.unwrap();
        assert_eq!(
            poll.tally(),
            vec![
                ("A".to_string(), 2),
                ("B".to_string(), 1),
                ("C".to_string(), 0)
            ]
        );

        let ended = room.end_poll(&moderator()).unwrap();
        assert_eq!(ended.phase, PollPhase::Closed);
        assert_eq!(room.snapshot().poll, None);

        let late = room.vote(&member(5), "A");
        assert!(matches!(late, Err(HubError::NotFound { .. })));
    }

    #[test]
    fn bans_reject_every_later_send() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        let troll = member(4);

        room.send_message(&troll, "first").unwrap();
        room.ban(&moderator(), &troll.user_id).unwrap();

        let blocked = room.send_message(&troll, "second");
        assert!(matches!(blocked, Err(HubError::Banned { .. })));

        let snapshot = room.snapshot();
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].text, "first");
        assert_eq!(snapshot.bans.len(), 1);
        assert_eq!(snapshot.bans[0].banned_by, "mod");
    }

    #[test]
    fn banning_twice_changes_nothing() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        room.ban(&moderator(), &"u4".to_string()).unwrap();
        let version = room.snapshot().version;

        room.ban(&moderator(), &"u4".to_string()).unwrap();
        assert_eq!(room.snapshot().version, version);

        let denied = room.ban(&member(1), &"u5".to_string());
        assert!(matches!(denied, Err(HubError::Unauthorized { .. })));
    }

    #[test]
    fn message_validation() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        let empty = room.send_message(&member(1), "   ");
        assert!(matches!(empty, Err(HubError::Validation { .. })));

        let long = "x".repeat(context.config.max_message_length + 1);
        let too_long = room.send_message(&member(1), &long);
        assert!(matches!(too_long, Err(HubError::Validation { .. })));

        assert_eq!(room.snapshot().version, 0);
    }

    #[test]
    fn stream_transitions_are_moderator_gated() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        let denied = room.start_stream(&member(1), "https://stream.example/a");
        assert!(matches!(denied, Err(HubError::Unauthorized { .. })));
        assert_eq!(room.snapshot().stream, StreamStatus::Offline);

        let status = room
            .start_stream(&moderator(), "https://stream.example/a")
            .unwrap();
        assert!(status.is_live());

        room.stop_stream(&moderator()).unwrap();
        assert_eq!(room.snapshot().stream, StreamStatus::Offline);
    }

    #[tokio::test]
    async fn restarting_the_same_stream_rebroadcasts_without_a_bump() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        let mut updates = room.connect(&member(1));
        updates.next().await; // snapshot

        room.start_stream(&moderator(), "https://stream.example/a")
            .unwrap();
        let version = room.snapshot().version;

        room.start_stream(&moderator(), "https://stream.example/a")
            .unwrap();
        assert_eq!(room.snapshot().version, version);

        let first = updates.next().await.unwrap();
        let echo = updates.next().await.unwrap();

        assert_eq!(first.version, version);
        assert_eq!(echo.version, version);
        assert!(matches!(echo.payload, RoomEventPayload::StreamStatusChange { .. }));
    }

    #[tokio::test]
    async fn subscribers_observe_a_gap_free_version_order() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        let mut updates = room.connect(&member(1));

        let snapshot = updates.next().await.unwrap();
        assert_eq!(snapshot.version, 0);
        assert!(matches!(snapshot.payload, RoomEventPayload::Snapshot(_)));

        room.send_message(&member(2), "hello").unwrap();
        room.create_poll(&moderator(), "Q?".into(), vec!["A".into(), "B".into()])
            .unwrap();
        room.vote(&member(2), "A").unwrap();
        room.end_poll(&moderator()).unwrap();
        room.start_stream(&moderator(), "https://stream.example/a")
            .unwrap();
        room.ban(&moderator(), &"u9".to_string()).unwrap();

        let final_version = room.snapshot().version;

        for expected in 1..=final_version {
            let update = updates.next().await.unwrap();
            assert_eq!(update.version, expected);
        }

        assert_eq!(updates.last_seen_version(), final_version);
    }

    #[tokio::test]
    async fn rejoining_yields_the_live_state() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        let viewer = member(1);

        let first = room.connect(&viewer);
        drop(first);

        room.send_message(&member(2), "hello").unwrap();
        room.create_poll(&moderator(), "Q?".into(), vec!["A".into(), "B".into()])
            .unwrap();
        room.vote(&member(2), "B").unwrap();
        room.ban(&moderator(), &"u9".to_string()).unwrap();
        room.start_stream(&moderator(), "https://stream.example/a")
            .unwrap();

        let mut rejoined = room.connect(&viewer);
        let update = rejoined.next().await.unwrap();

        let RoomEventPayload::Snapshot(snapshot) = update.payload else {
            panic!("first message after a join is the snapshot");
        };

        assert_eq!(snapshot, room.snapshot());
    }

    #[test]
    fn chat_backlog_is_bounded() {
        let config = HubConfig {
            chat_history_limit: 2,
            ..Default::default()
        };
        let context = HubContext::with_config(config);
        let room = Room::new(&context, "rust-101".to_string());

        room.send_message(&member(1), "one").unwrap();
        room.send_message(&member(1), "two").unwrap();
        room.send_message(&member(1), "three").unwrap();

        let messages = room.snapshot().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "two");
        assert_eq!(messages[1].text, "three");
        // Ids keep counting even when the backlog drops old messages
        assert_eq!(messages[1].id, 3);
    }

    #[test]
    fn contributions_rank_the_leaderboard() {
        let context = context();
        let room = Room::new(&context, "rust-101".to_string());

        room.send_message(&member(1), "hello").unwrap();
        room.send_message(&member(1), "again").unwrap();

        room.create_poll(&moderator(), "Q?".into(), vec!["A".into(), "B".into()])
            .unwrap();
        room.vote(&member(2), "A").unwrap();

        // Default weights: a vote outweighs two messages
        let leaderboard = room.leaderboard();
        assert_eq!(leaderboard[0].user_id, "u2");
        assert_eq!(leaderboard[0].rank, 1);
        assert_eq!(leaderboard[1].user_id, "u1");
        assert_eq!(leaderboard[1].rank, 2);
    }
}
