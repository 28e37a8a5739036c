use std::time::Duration;

/// The configuration of the hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// The longest admissible chat message, in characters
    pub max_message_length: usize,
    /// How many chat messages a room retains for snapshots
    pub chat_history_limit: usize,
    /// How long a room with no subscribers is kept before eviction
    pub room_grace_period: Duration,
    /// How much an admitted chat message contributes to a participant's score
    pub message_weight: u64,
    /// How much a cast vote contributes to a participant's score
    pub vote_weight: u64,
    /// How much a stream attendance event contributes to a participant's score
    pub attendance_weight: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            // Enough for a paragraph, short enough to stay chat-like
            max_message_length: 500,
            // Reconnecting viewers get this much backlog in the snapshot
            chat_history_limit: 200,
            // Covers short disconnect/reconnect cycles of a single viewer
            room_grace_period: Duration::from_secs(30),
            message_weight: 1,
            // Votes take more deliberation than a chat message
            vote_weight: 3,
            attendance_weight: 5,
        }
    }
}
