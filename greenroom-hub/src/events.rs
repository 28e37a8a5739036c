use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::{
    ChatMessage, CohortId, LeaderboardEntry, PollState, RoomSnapshot, StreamStatus, UserId,
};

pub type EventSender = UnboundedSender<HubEvent>;
pub type EventReceiver = UnboundedReceiver<HubEvent>;

/// A versioned state mutation fanned out to every subscriber of a room.
///
/// Updates for one room are delivered in the order their versions were
/// stamped; there is no order across rooms.
#[derive(Debug, Clone)]
pub struct RoomUpdate {
    pub cohort_id: CohortId,
    pub version: u64,
    pub payload: RoomEventPayload,
}

/// The state carried by a [RoomUpdate]
#[derive(Debug, Clone)]
pub enum RoomEventPayload {
    /// The authoritative full state, always the first message a
    /// subscriber receives
    Snapshot(RoomSnapshot),
    StreamStatusChange { status: StreamStatus },
    PollUpdate { poll: PollState },
    PollEnded,
    Message(ChatMessage),
    UserBanned { user_id: UserId },
    LeaderboardUpdate { entries: Vec<LeaderboardEntry> },
}

/// Hub-wide events, consumed by the notification loop and logging.
///
/// These are side-channel signals derived from room mutations; the
/// room-ordered fan-out happens through [RoomUpdate] queues instead.
#[derive(Debug)]
pub enum HubEvent {
    /// A user connected to a room for the first time in this session
    ParticipantJoined {
        cohort_id: CohortId,
        user_id: UserId,
        display_name: String,
    },
    /// A user's last connection to a room went away
    ParticipantLeft {
        cohort_id: CohortId,
        user_id: UserId,
    },
    /// A moderator set the room live
    StreamStarted { cohort_id: CohortId, url: String },
    /// A message was admitted; `mentioned` holds the connected users
    /// whose display names it addressed
    MessageSent {
        cohort_id: CohortId,
        message: ChatMessage,
        mentioned: Vec<UserId>,
    },
    /// The top of the leaderboard changed hands
    LeaderChanged {
        cohort_id: CohortId,
        user_id: UserId,
        display_name: String,
    },
}
